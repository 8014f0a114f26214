//! Enrichment cache
//!
//! Maps an article id to the best-known enrichment. Writes merge per field,
//! so completions arriving in any order converge on the same entry and a
//! later partial result never erases an earlier one. There is no per-id
//! removal; only a session reset clears the cache.

use super::Enrichment;
use medfeed_common::api::ArticleId;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct EnrichmentCache {
    entries: HashMap<ArticleId, Enrichment>,
}

impl EnrichmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ArticleId) -> Option<&Enrichment> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &ArticleId) -> bool {
        self.entries.contains_key(id)
    }

    /// Merge `enrichment` into the entry for its id, creating it if needed
    ///
    /// Returns the merged entry.
    pub fn put(&mut self, enrichment: Enrichment) -> &Enrichment {
        let entry = self
            .entries
            .entry(enrichment.id.clone())
            .or_insert_with(|| Enrichment::empty(enrichment.id.clone()));
        entry.merge(enrichment);
        entry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of every entry, for view recomputation outside the lock
    pub fn snapshot(&self) -> HashMap<ArticleId, Enrichment> {
        self.entries.clone()
    }

    /// Session reset only
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
