//! Response cache — bounded TTL cache for fast-path and short final
//! responses.
//!
//! Keys combine the classified intent with a fingerprint of the normalized
//! message, so "Oi" and "oi " collide (same answer) while distinct content
//! never shares a key. Expired entries are evicted lazily on `set`; when
//! the cache is still full the oldest entry goes first.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::reasoning::Intent;

/// Default entry cap.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Default time-to-live.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    response: String,
    timestamp: Instant,
    hit_count: u32,
}

/// Bounded TTL cache, safe for concurrent access behind a single lock.
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_size: usize,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }

    pub fn with_config(max_size: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size,
            ttl,
        }
    }

    /// Build the cache key for a classified message.
    pub fn key(intent: Intent, message: &str) -> String {
        format!("{intent}:{:016x}", fingerprint(message))
    }

    /// Look up a response. Entries past their TTL are misses.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(key)?;
        if entry.timestamp.elapsed() > self.ttl {
            return None;
        }
        entry.hit_count += 1;
        Some(entry.response.clone())
    }

    /// Store a response, evicting expired entries first and the oldest
    /// entry if the cache is still full.
    pub fn set(&self, key: impl Into<String>, response: impl Into<String>) {
        let mut entries = self.entries.lock().unwrap();

        if entries.len() >= self.max_size {
            let ttl = self.ttl;
            entries.retain(|_, e| e.timestamp.elapsed() <= ttl);

            if entries.len() >= self.max_size {
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.timestamp)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key.into(),
            CacheEntry {
                response: response.into(),
                timestamp: Instant::now(),
                hit_count: 1,
            },
        );
    }

    /// Number of live entries (including expired-but-unevicted ones).
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a message after trimming, lowercasing, and collapsing whitespace.
fn fingerprint(message: &str) -> u64 {
    let normalized = message
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut hasher = DefaultHasher::new();
    normalized.hash(&mut hasher);
    hasher.finish()
}
