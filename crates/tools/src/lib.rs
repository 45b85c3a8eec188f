//! Built-in tool implementations for HermitClaw.
//!
//! Tools give the agent the ability to interact with the world: run shell
//! commands, read/write files, fetch web pages, and send messages straight
//! to the user. The `spawn`/`subagent` tools live in the agent crate since
//! they need to run agent turns themselves.

pub mod file_read;
pub mod file_write;
pub mod list_dir;
pub mod message;
pub mod shell;
pub mod web_fetch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hermitclaw_core::ToolRegistry;

pub use message::{MessageTool, SendCallback};

/// Create a registry with all built-in tools.
///
/// Shared between the main agent and subagents; `spawn`/`subagent` are
/// registered separately and only on the main agent. The message tool is
/// passed in so callers can keep a handle for duplicate suppression.
///
/// Security defaults:
/// - Shell: only common safe commands (ls, cat, echo, git, pwd, etc.)
/// - File tools: scoped to the workspace when `restrict` is set
pub fn default_registry(
    workspace: &Path,
    restrict: bool,
    message_tool: Arc<MessageTool>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    let scope = PathScope::new(workspace, restrict);
    registry.register(Arc::new(file_read::FileReadTool::new(scope.clone())));
    registry.register(Arc::new(file_write::FileWriteTool::new(scope.clone())));
    registry.register(Arc::new(list_dir::ListDirTool::new(scope.clone())));

    let safe_commands = vec![
        "ls".into(),
        "cat".into(),
        "head".into(),
        "tail".into(),
        "echo".into(),
        "pwd".into(),
        "date".into(),
        "whoami".into(),
        "wc".into(),
        "grep".into(),
        "find".into(),
        "which".into(),
        "git".into(),
        "cargo".into(),
        "python".into(),
        "uname".into(),
        "df".into(),
        "free".into(),
    ];
    registry.register(Arc::new(shell::ShellTool::new(
        workspace.to_path_buf(),
        safe_commands,
    )));

    registry.register(Arc::new(web_fetch::WebFetchTool::new()));
    registry.register(message_tool);

    registry
}

/// Workspace scoping shared by the file tools.
#[derive(Clone)]
pub struct PathScope {
    workspace: PathBuf,
    restrict: bool,
}

impl PathScope {
    pub fn new(workspace: impl Into<PathBuf>, restrict: bool) -> Self {
        Self {
            workspace: workspace.into(),
            restrict,
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Resolve a user-supplied path against the workspace.
    ///
    /// Relative paths are joined onto the workspace. When restricted,
    /// absolute paths outside the workspace and `..` traversal are refused.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, String> {
        let candidate = Path::new(raw);

        if self.restrict && candidate.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            return Err(format!("Path escapes the workspace: {raw}"));
        }

        let resolved = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.workspace.join(candidate)
        };

        if self.restrict && !resolved.starts_with(&self.workspace) {
            return Err(format!("Path outside the workspace: {raw}"));
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_workspace() {
        let scope = PathScope::new("/tmp/ws", true);
        assert_eq!(
            scope.resolve("notes.txt").unwrap(),
            PathBuf::from("/tmp/ws/notes.txt")
        );
    }

    #[test]
    fn restricted_scope_refuses_escape() {
        let scope = PathScope::new("/tmp/ws", true);
        assert!(scope.resolve("../etc/passwd").is_err());
        assert!(scope.resolve("/etc/passwd").is_err());
    }

    #[test]
    fn unrestricted_scope_allows_absolute() {
        let scope = PathScope::new("/tmp/ws", false);
        assert_eq!(
            scope.resolve("/etc/hostname").unwrap(),
            PathBuf::from("/etc/hostname")
        );
    }
}
