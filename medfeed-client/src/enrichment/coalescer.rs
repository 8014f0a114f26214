//! Request coalescer
//!
//! Tracks ids with a fetch in flight. An id enters on dispatch and leaves on
//! completion, success or failure alike, so at most one fetch per id is ever
//! outstanding.

use super::EnrichmentCache;
use medfeed_common::api::ArticleId;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct Coalescer {
    pending: HashSet<ArticleId>,
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` pending unless it is already pending or already cached
    ///
    /// Returns false when the caller must skip the fetch.
    pub fn try_dispatch(&mut self, id: &ArticleId, cache: &EnrichmentCache) -> bool {
        if cache.contains(id) {
            return false;
        }
        self.try_dispatch_forced(id)
    }

    /// User-initiated variant: ignores the cache, still refuses a second
    /// concurrent fetch for the same id
    pub fn try_dispatch_forced(&mut self, id: &ArticleId) -> bool {
        self.pending.insert(id.clone())
    }

    /// Remove `id` from the pending set; returns whether it was pending
    pub fn complete(&mut self, id: &ArticleId) -> bool {
        self.pending.remove(id)
    }

    pub fn is_pending(&self, id: &ArticleId) -> bool {
        self.pending.contains(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn snapshot(&self) -> HashSet<ArticleId> {
        self.pending.clone()
    }

    /// Session reset only
    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::Enrichment;

    #[test]
    fn test_second_dispatch_is_refused() {
        let cache = EnrichmentCache::new();
        let mut coalescer = Coalescer::new();
        let id = ArticleId::from("A");

        assert!(coalescer.try_dispatch(&id, &cache));
        for _ in 0..5 {
            assert!(!coalescer.try_dispatch(&id, &cache));
        }
        assert_eq!(coalescer.len(), 1);
    }

    #[test]
    fn test_cached_id_is_refused() {
        let mut cache = EnrichmentCache::new();
        cache.put(Enrichment::empty(ArticleId::from("A")));
        let mut coalescer = Coalescer::new();

        assert!(!coalescer.try_dispatch(&ArticleId::from("A"), &cache));
        assert!(coalescer.is_empty());
    }

    #[test]
    fn test_forced_dispatch_ignores_cache_but_not_pending() {
        let mut cache = EnrichmentCache::new();
        cache.put(Enrichment::empty(ArticleId::from("A")));
        let mut coalescer = Coalescer::new();
        let id = ArticleId::from("A");

        assert!(coalescer.try_dispatch_forced(&id));
        assert!(!coalescer.try_dispatch_forced(&id));
        assert!(!coalescer.try_dispatch(&id, &cache));
    }

    #[test]
    fn test_complete_allows_redispatch() {
        let cache = EnrichmentCache::new();
        let mut coalescer = Coalescer::new();
        let id = ArticleId::from("B");

        assert!(coalescer.try_dispatch(&id, &cache));
        assert!(coalescer.complete(&id));
        assert!(!coalescer.is_pending(&id));
        assert!(!coalescer.complete(&id), "second complete is a no-op");
        assert!(coalescer.try_dispatch(&id, &cache));
    }
}
