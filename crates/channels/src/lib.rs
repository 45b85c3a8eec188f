//! Transport adapters for HermitClaw.
//!
//! Each adapter implements `hermitclaw_core::Channel`. The [`ChannelRegistry`]
//! pumps every adapter's inbound stream onto the message bus and routes
//! outbound bus messages back to the right adapter.

pub mod cli;
pub mod registry;

pub use cli::CliChannel;
pub use registry::ChannelRegistry;
