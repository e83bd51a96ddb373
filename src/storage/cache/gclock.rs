use super::{Cache, CacheEntry};
use crate::storage::page::{PageIndex, PageRef};
use log::{debug, trace};
use std::collections::HashMap;

/// Generalized CLOCK replacement.
///
/// Every slot carries a reference counter that starts at 1, grows on each hit
/// and shrinks whenever the clock hand sweeps past it. The first slot whose
/// counter falls to zero is replaced.
#[derive(Debug)]
pub struct GclockCache {
    entries: Vec<CacheEntry>,
    /// Maps page index -> slot in `entries`
    slots: HashMap<PageIndex, usize>,
    /// Where the next sweep starts
    clock_hand: usize,
    capacity: usize,
}

impl GclockCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Vec::with_capacity(capacity),
            slots: HashMap::with_capacity(capacity),
            clock_hand: 0,
            capacity,
        }
    }

    fn find_victim(&mut self) -> usize {
        loop {
            if self.clock_hand >= self.entries.len() {
                self.clock_hand = 0;
            }
            let slot = self.clock_hand;
            self.clock_hand = (self.clock_hand + 1) % self.capacity;

            let entry = &mut self.entries[slot];
            entry.reference_counter -= 1;
            if entry.reference_counter <= 0 {
                return slot;
            }
        }
    }
}

impl Cache for GclockCache {
    fn get(&mut self, index: PageIndex) -> Option<PageRef> {
        let slot = *self.slots.get(&index)?;
        let entry = &mut self.entries[slot];
        entry.reference_counter += 1;
        trace!(
            "cache hit for page {} (counter {})",
            index,
            entry.reference_counter
        );
        Some(entry.page.clone())
    }

    fn add(&mut self, page: PageRef) -> Option<PageIndex> {
        let index = page.index();
        let entry = CacheEntry {
            page,
            reference_counter: 1,
        };

        if self.entries.len() < self.capacity {
            self.entries.push(entry);
            self.slots.insert(index, self.entries.len() - 1);
            return None;
        }

        let slot = self.find_victim();
        // Dropping the old entry releases the cache's share of the mapping.
        let victim = std::mem::replace(&mut self.entries[slot], entry);
        let victim_index = victim.page.index();
        self.slots.remove(&victim_index);
        self.slots.insert(index, slot);
        debug!(
            "evicted page {} from slot {} to admit page {}",
            victim_index, slot, index
        );
        Some(victim_index)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
