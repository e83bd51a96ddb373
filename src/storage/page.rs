pub mod data_page;

use crate::storage::error::StorageResult;
use crate::storage::PAGE_SIZE;
use memmap2::MmapMut;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::Arc;

/// Zero-based index of a page in the backing file.
pub type PageIndex = u64;

/// Shared handle to a mapped page. Every holder of the same index sees the
/// same memory.
pub type PageRef = Arc<Page>;

/// One page of the backing file, mapped read-write and shared.
pub struct Page {
    index: PageIndex,
    memory: RwLock<MmapMut>,
}

impl Page {
    pub(crate) fn new(index: PageIndex, memory: MmapMut) -> Self {
        debug_assert_eq!(memory.len(), PAGE_SIZE);
        Self {
            index,
            memory: RwLock::new(memory),
        }
    }

    /// A page backed by anonymous memory instead of a file.
    #[cfg(test)]
    pub(crate) fn anonymous(index: PageIndex) -> PageRef {
        let memory = MmapMut::map_anon(PAGE_SIZE).expect("anonymous mapping");
        Arc::new(Self::new(index, memory))
    }

    pub fn index(&self) -> PageIndex {
        self.index
    }

    pub fn read(&self) -> RwLockReadGuard<'_, MmapMut> {
        self.memory.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, MmapMut> {
        self.memory.write()
    }

    /// Synchronously writes the page back to the file.
    pub fn flush(&self) -> StorageResult<()> {
        self.memory.read().flush()?;
        Ok(())
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page").field("index", &self.index).finish()
    }
}

pub use data_page::{DataPage, DataPageHeader};
