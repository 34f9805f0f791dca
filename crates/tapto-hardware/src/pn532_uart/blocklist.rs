//! Negative cache of serial paths that failed to open during discovery.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Shared set of serial paths that are never probed again.
///
/// Cloning yields a handle to the same set. Entries are only ever added:
/// a device that was busy once stays hidden for the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    paths: Arc<RwLock<HashSet<String>>>,
}

impl Blocklist {
    /// Create an empty blocklist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `path` is blocked.
    pub fn contains(&self, path: &str) -> bool {
        self.paths
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(path)
    }

    /// Block `path`. Returns `false` if it was already blocked.
    pub fn insert(&self, path: impl Into<String>) -> bool {
        self.paths
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.into())
    }

    /// Number of blocked paths.
    pub fn len(&self) -> usize {
        self.paths.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check whether nothing is blocked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
