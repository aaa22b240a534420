//! Keyed registry for helper and validator definitions
//!
//! Entries are stored behind `Arc` so a lookup hands out an immutable
//! snapshot. A run that is already in flight keeps using the snapshot it
//! took, even if the entry is replaced or removed meanwhile; mutation is not
//! coordinated with in-flight runs beyond that.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SandboxError;

/// A definition that can live in a [`SpecRegistry`]
pub trait RegistryEntry: Send + Sync {
    /// Unique key (helper id, validated command)
    fn key(&self) -> &str;
}

/// Summary of a registry's contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub count: usize,
    pub ids: Vec<String>,
}

/// Registry keyed by [`RegistryEntry::key`].
///
/// Registration rejects collisions; overwriting needs an explicit
/// [`replace`](SpecRegistry::replace).
pub struct SpecRegistry<S> {
    entries: RwLock<HashMap<String, Arc<S>>>,
}

impl<S> Default for SpecRegistry<S> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<S: RegistryEntry> SpecRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, failing if the key is blank or already taken
    pub fn register(&self, spec: S) -> Result<(), SandboxError> {
        let key = checked_key(&spec)?;
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            tracing::warn!(id = %key, "Entry already registered, rejecting duplicate");
            return Err(SandboxError::already_registered(key));
        }
        entries.insert(key, Arc::new(spec));
        Ok(())
    }

    /// Add or overwrite an entry
    pub fn replace(&self, spec: S) -> Result<(), SandboxError> {
        let key = checked_key(&spec)?;
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            tracing::debug!(id = %key, "Replacing existing entry");
        }
        entries.insert(key, Arc::new(spec));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Arc<S>> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let ids = self.keys();
        RegistryStats {
            count: ids.len(),
            ids,
        }
    }
}

impl<S: RegistryEntry> std::fmt::Debug for SpecRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

fn checked_key<S: RegistryEntry>(spec: &S) -> Result<String, SandboxError> {
    let key = spec.key().trim();
    if key.is_empty() {
        return Err(SandboxError::invalid_definition("", "key must not be empty"));
    }
    Ok(key.to_string())
}
