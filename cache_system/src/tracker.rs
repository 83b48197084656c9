//! Manifest of keys written by a cache client
//!
//! The manifest scopes bulk eviction to keys this process is responsible for.
//! It is a hint, not ground truth: keys removed out of band or by pattern
//! deletion stay listed until this client deletes them itself.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Shared set of tracked keys
#[derive(Clone, Default)]
pub struct KeyTracker {
    keys: Arc<RwLock<HashSet<String>>>,
}

impl std::fmt::Debug for KeyTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyTracker")
            .field("tracked", &self.len())
            .finish()
    }
}

impl KeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key; repeated writes keep a single entry
    pub fn track(&self, key: &str) {
        if let Ok(mut keys) = self.keys.write() {
            keys.insert(key.to_string());
        }
    }

    pub fn untrack(&self, key: &str) {
        if let Ok(mut keys) = self.keys.write() {
            keys.remove(key);
        }
    }

    pub fn untrack_all<S: AsRef<str>>(&self, removed: &[S]) {
        if let Ok(mut keys) = self.keys.write() {
            for key in removed {
                keys.remove(key.as_ref());
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.read().map(|k| k.contains(key)).unwrap_or(false)
    }

    /// Sorted copy of the tracked keys
    pub fn snapshot(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .keys
            .read()
            .map(|k| k.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.keys.read().map(|k| k.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
