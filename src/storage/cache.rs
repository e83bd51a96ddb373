pub mod gclock;

use crate::storage::page::{PageIndex, PageRef};
use std::fmt::Debug;

pub use gclock::GclockCache;

/// Maximum number of pages kept mapped by the default cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// A cached page together with its replacement counter.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub page: PageRef,
    pub reference_counter: i64,
}

pub trait Cache: Send + Debug {
    /// Look up a resident page. Returns None on a miss.
    fn get(&mut self, index: PageIndex) -> Option<PageRef>;

    /// Admit a page, evicting another one if the cache is full.
    /// Returns the index of the evicted page, if any.
    fn add(&mut self, page: PageRef) -> Option<PageIndex>;

    /// Number of resident pages.
    fn len(&self) -> usize;

    /// Maximum number of resident pages.
    fn capacity(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
