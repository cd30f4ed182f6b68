//! Opt-in cache of resolved type tables, keyed by document content.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::Result;
use crate::mapper::ResolvedTypeTable;
use crate::schema::SchemaDocument;

/// A loaded document together with its resolved type table.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub document: SchemaDocument,
    pub types: ResolvedTypeTable,
}

/// Read-through cache shared between generation runs.
///
/// Lookups are safe from many threads. Entries are never replaced: when two
/// runs resolve the same text concurrently, the first insertion is kept and
/// both get it back.
#[derive(Debug, Default)]
pub struct TypeTableCache {
    entries: Mutex<HashMap<u64, Arc<Resolved>>>,
}

impl TypeTableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(document_text: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        document_text.hash(&mut hasher);
        hasher.finish()
    }

    pub fn get(&self, document_text: &str) -> Option<Arc<Resolved>> {
        let key = Self::key(document_text);
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
            .cloned()
    }

    /// Returns the cached entry for `document_text`, calling `resolve` on a
    /// miss. Errors are not cached.
    pub fn get_or_resolve(
        &self,
        document_text: &str,
        resolve: impl FnOnce() -> Result<Resolved>,
    ) -> Result<Arc<Resolved>> {
        if let Some(hit) = self.get(document_text) {
            debug!("type table cache hit");
            return Ok(hit);
        }
        // Resolve outside the lock so unrelated documents do not wait.
        let resolved = Arc::new(resolve()?);
        let key = Self::key(document_text);
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.entry(key).or_insert(resolved).clone())
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
