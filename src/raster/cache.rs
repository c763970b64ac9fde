//! LRU cache for rasterized pages
//!
//! Keyed by page index alone: each document gets its own cache (and its own
//! service), and every page of a document rasterizes at one fixed scale, so
//! there is never more than one valid raster per page.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::analysis::PageIndex;

use super::types::RenderedPage;

/// LRU cache of rendered pages for the current document.
pub struct PageCache {
    cache: LruCache<PageIndex, Arc<RenderedPage>>,
}

impl PageCache {
    /// Create a new cache with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).expect("1 is non-zero")),
            ),
        }
    }

    /// Get a cached page, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, page: PageIndex) -> Option<Arc<RenderedPage>> {
        self.cache.get(&page).cloned()
    }

    /// Check if a page is cached without promoting it
    #[must_use]
    pub fn contains(&self, page: PageIndex) -> bool {
        self.cache.contains(&page)
    }

    /// Insert a page, returning an Arc to the data
    pub fn insert(&mut self, data: RenderedPage) -> Arc<RenderedPage> {
        let arc = Arc::new(data);
        self.cache.put(arc.index, arc.clone());
        arc
    }

    /// Clear all cached pages
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Number of cached pages
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Cache capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}
