use crate::storage::cache::{Cache, GclockCache, DEFAULT_CACHE_CAPACITY};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{Page, PageIndex, PageRef};
use crate::storage::PAGE_SIZE;
use log::{debug, trace};
use memmap2::MmapOptions;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

/// Maps pages of a single backing file into memory.
///
/// Each page is its own shared read-write mapping, so a write through one
/// handle is visible to every other handle of the same page before it is
/// flushed. The pager is a cheap clonable handle; all clones share the file
/// and the cache.
#[derive(Clone)]
pub struct Pager {
    inner: Arc<PagerInner>,
}

struct PagerInner {
    file: Mutex<Option<File>>,
    cache: Mutex<Box<dyn Cache>>,
}

impl Pager {
    /// Open (or create) a backing file with the default GCLOCK cache.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::with_cache(path, Box::new(GclockCache::new(DEFAULT_CACHE_CAPACITY)))
    }

    pub fn with_cache(path: impl AsRef<Path>, cache: Box<dyn Cache>) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        Ok(Self {
            inner: Arc::new(PagerInner {
                file: Mutex::new(Some(file)),
                cache: Mutex::new(cache),
            }),
        })
    }

    /// Returns the page at `index`, mapping it if it is not cached.
    pub fn fetch(&self, index: PageIndex) -> StorageResult<PageRef> {
        let mut cache = self.inner.cache.lock();
        let file = self.inner.file.lock();
        let file = file.as_ref().ok_or(StorageError::Closed)?;

        if let Some(page) = cache.get(index) {
            return Ok(page);
        }
        trace!("cache miss for page {}", index);

        let file_size = file.metadata()?.len();
        let page_size = PAGE_SIZE as u64;
        if index.saturating_add(1).saturating_mul(page_size) > file_size {
            return Err(StorageError::OutOfRange {
                index,
                page_count: file_size / page_size,
            });
        }

        // SAFETY: the mapping covers a range inside the file and the file is
        // only ever grown, never truncated, while the pager is alive.
        let memory = unsafe {
            MmapOptions::new()
                .offset(index * page_size)
                .len(PAGE_SIZE)
                .map_mut(file)?
        };

        let page = Arc::new(Page::new(index, memory));
        cache.add(page.clone());
        Ok(page)
    }

    /// Grows the file by one zeroed page and returns it.
    pub fn append(&self) -> StorageResult<PageRef> {
        let index = {
            let file = self.inner.file.lock();
            let file = file.as_ref().ok_or(StorageError::Closed)?;

            let file_size = file.metadata()?.len();
            let page_size = PAGE_SIZE as u64;
            if file_size % page_size != 0 {
                return Err(StorageError::InvariantViolation(format!(
                    "file size {} is not a multiple of page size {}",
                    file_size, PAGE_SIZE
                )));
            }

            file.set_len(file_size + page_size)?;
            file.sync_all()?;
            file_size / page_size
        };

        debug!("appended page {}", index);
        self.fetch(index)
    }

    /// Number of whole pages in the backing file.
    pub fn page_count(&self) -> StorageResult<u64> {
        let file = self.inner.file.lock();
        let file = file.as_ref().ok_or(StorageError::Closed)?;
        Ok(file.metadata()?.len() / PAGE_SIZE as u64)
    }

    /// Releases the file handle. Mappings still held by callers stay valid.
    pub fn close(&self) {
        if self.inner.file.lock().take().is_some() {
            debug!("pager closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_fetch_out_of_range() -> Result<()> {
        let dir = tempdir()?;
        let pager = Pager::open(dir.path().join("test.db"))?;

        assert!(matches!(
            pager.fetch(0),
            Err(StorageError::OutOfRange { index: 0, page_count: 0 })
        ));

        Ok(())
    }

    #[test]
    fn test_append_and_fetch_share_memory() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.db");
        let pager = Pager::open(&file_path)?;

        let page = pager.append()?;
        assert_eq!(page.index(), 0);
        assert_eq!(pager.page_count()?, 1);

        let fetched = pager.fetch(page.index())?;
        assert!(Arc::ptr_eq(&page, &fetched));
        assert!(page.read().iter().all(|&b| b == 0));

        page.write()[0] = 255;
        assert_eq!(fetched.read()[0], 255);

        page.flush()?;
        let on_disk = std::fs::read(&file_path)?;
        assert_eq!(on_disk.len(), PAGE_SIZE);
        assert_eq!(on_disk[0], 255);

        Ok(())
    }

    #[test]
    fn test_append_grows_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.db");
        let pager = Pager::open(&file_path)?;

        for expected in 0..5 {
            let page = pager.append()?;
            assert_eq!(page.index(), expected);
        }
        assert_eq!(std::fs::metadata(&file_path)?.len(), 5 * PAGE_SIZE as u64);

        Ok(())
    }

    #[test]
    fn test_append_rejects_unaligned_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.db");
        std::fs::write(&file_path, [1u8; 100])?;

        let pager = Pager::open(&file_path)?;
        assert!(matches!(
            pager.append(),
            Err(StorageError::InvariantViolation(_))
        ));

        Ok(())
    }

    #[test]
    fn test_evicted_page_is_remapped() -> Result<()> {
        let dir = tempdir()?;
        let pager = Pager::with_cache(dir.path().join("test.db"), Box::new(GclockCache::new(1)))?;

        let first = pager.append()?;
        first.write()[10] = 42;
        first.flush()?;
        drop(first);

        // Admitting page 1 evicts page 0 from the single slot.
        pager.append()?;

        let again = pager.fetch(0)?;
        assert_eq!(again.read()[10], 42);

        Ok(())
    }

    #[test]
    fn test_persistence_across_reopen() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.db");

        {
            let pager = Pager::open(&file_path)?;
            pager.append()?;
            let page = pager.append()?;
            page.write()[PAGE_SIZE - 1] = 7;
            page.flush()?;
            pager.close();
        }

        {
            let pager = Pager::open(&file_path)?;
            assert_eq!(pager.page_count()?, 2);
            assert_eq!(pager.fetch(1)?.read()[PAGE_SIZE - 1], 7);
        }

        Ok(())
    }

    #[test]
    fn test_closed_pager_rejects_requests() -> Result<()> {
        let dir = tempdir()?;
        let pager = Pager::open(dir.path().join("test.db"))?;
        let page = pager.append()?;
        pager.close();

        assert!(matches!(pager.fetch(0), Err(StorageError::Closed)));
        assert!(matches!(pager.append(), Err(StorageError::Closed)));

        // Handles taken before closing stay usable.
        page.write()[0] = 1;
        page.flush()?;

        Ok(())
    }
}
