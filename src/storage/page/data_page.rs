//! Slotted data page.
//!
//! Layout (big-endian):
//!
//! ```text
//! +--------+--------+-------+-------+-----+-------------+---------+------------+
//! | next   | prev   | count | start | end | directory   |  free   | row heap   |
//! | i64    | i64    | u16   | u16   | u16 | count x i16 |         | grows down |
//! +--------+--------+-------+-------+-----+-------------+---------+------------+
//! 0        8        16      18      20    22            start     end   PAGE_SIZE
//! ```
//!
//! The directory grows forward from the header and the heap grows backward
//! from the end of the page. A row's length is not stored; callers decode
//! field by field from the row's first byte.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{PageIndex, PageRef};
use crate::storage::PAGE_SIZE;
use byteorder::{BigEndian, ByteOrder};
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard,
};

pub const HEADER_SIZE: usize = 22;
const NEXT_OFFSET: usize = 0;
const PREV_OFFSET: usize = 8;
const COUNT_OFFSET: usize = 16;
const FREE_START_OFFSET: usize = 18;
const FREE_END_OFFSET: usize = 20;

pub const ROW_POINTER_SIZE: usize = 2;

/// Space withheld from inserts so rows can grow in place.
pub const RESERVED_SPACE: usize = PAGE_SIZE / 5;

/// Largest row an empty page accepts.
pub const MAX_ROW_SIZE: usize = PAGE_SIZE - HEADER_SIZE - RESERVED_SPACE;

const NO_PAGE: i64 = -1;
const UNUSED_POINTER: i16 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPageHeader {
    pub next: Option<PageIndex>,
    pub prev: Option<PageIndex>,
    pub row_pointer_count: u16,
    /// End of the row pointer directory
    pub free_space_start: u16,
    /// Start of the row heap
    pub free_space_end: u16,
}

impl DataPageHeader {
    /// Header of a page with no rows and the whole body free.
    pub fn empty(prev: Option<PageIndex>) -> Self {
        Self {
            next: None,
            prev,
            row_pointer_count: 0,
            free_space_start: HEADER_SIZE as u16,
            free_space_end: PAGE_SIZE as u16,
        }
    }

    pub fn encode_into(&self, buf: &mut [u8]) {
        BigEndian::write_i64(&mut buf[NEXT_OFFSET..], encode_link(self.next));
        BigEndian::write_i64(&mut buf[PREV_OFFSET..], encode_link(self.prev));
        BigEndian::write_u16(&mut buf[COUNT_OFFSET..], self.row_pointer_count);
        BigEndian::write_u16(&mut buf[FREE_START_OFFSET..], self.free_space_start);
        BigEndian::write_u16(&mut buf[FREE_END_OFFSET..], self.free_space_end);
    }

    pub fn decode(buf: &[u8]) -> Self {
        Self {
            next: decode_link(BigEndian::read_i64(&buf[NEXT_OFFSET..])),
            prev: decode_link(BigEndian::read_i64(&buf[PREV_OFFSET..])),
            row_pointer_count: BigEndian::read_u16(&buf[COUNT_OFFSET..]),
            free_space_start: BigEndian::read_u16(&buf[FREE_START_OFFSET..]),
            free_space_end: BigEndian::read_u16(&buf[FREE_END_OFFSET..]),
        }
    }

    fn validate(&self) -> Result<(), String> {
        let start = self.free_space_start as usize;
        let end = self.free_space_end as usize;
        let directory_end = HEADER_SIZE + self.row_pointer_count as usize * ROW_POINTER_SIZE;
        if start != directory_end {
            return Err(format!(
                "free space starts at {} but directory of {} entries ends at {}",
                start, self.row_pointer_count, directory_end
            ));
        }
        if start > end || end > PAGE_SIZE {
            return Err(format!("invalid free span {}..{}", start, end));
        }
        Ok(())
    }

    /// A used row pointer must land inside the row heap.
    fn check_pointer(&self, slot_id: u16, pointer: i16) -> Result<(), String> {
        if pointer >= 0 {
            let offset = pointer as usize;
            if offset < self.free_space_end as usize || offset >= PAGE_SIZE {
                return Err(format!(
                    "row pointer {} of slot {} lies outside the row heap {}..{}",
                    pointer, slot_id, self.free_space_end, PAGE_SIZE
                ));
            }
        }
        Ok(())
    }
}

fn encode_link(link: Option<PageIndex>) -> i64 {
    link.map_or(NO_PAGE, |index| index as i64)
}

fn decode_link(raw: i64) -> Option<PageIndex> {
    (raw >= 0).then_some(raw as PageIndex)
}

/// Decoded view of a data page.
///
/// Header and directory live in this struct until [`DataPage::flush`] writes
/// them back; row bytes are read and written directly in the shared page.
#[derive(Debug)]
pub struct DataPage {
    page: PageRef,
    header: DataPageHeader,
    row_pointers: Vec<i16>,
}

impl DataPage {
    /// Fresh view over a page with no rows. Nothing is written until flushed.
    pub fn init(page: PageRef, prev: Option<PageIndex>) -> Self {
        Self {
            page,
            header: DataPageHeader::empty(prev),
            row_pointers: Vec::new(),
        }
    }

    pub fn decode(page: PageRef) -> StorageResult<Self> {
        let (header, row_pointers) = {
            let data = page.read();
            let header = DataPageHeader::decode(&data[..HEADER_SIZE]);
            header.validate().map_err(|reason| StorageError::Corrupt {
                index: page.index(),
                reason,
            })?;

            let row_pointers: Vec<i16> = data[HEADER_SIZE..header.free_space_start as usize]
                .chunks_exact(ROW_POINTER_SIZE)
                .map(BigEndian::read_i16)
                .collect();
            for (slot_id, pointer) in row_pointers.iter().enumerate() {
                header
                    .check_pointer(slot_id as u16, *pointer)
                    .map_err(|reason| StorageError::Corrupt {
                        index: page.index(),
                        reason,
                    })?;
            }
            (header, row_pointers)
        };

        Ok(Self {
            page,
            header,
            row_pointers,
        })
    }

    pub fn index(&self) -> PageIndex {
        self.page.index()
    }

    pub fn header(&self) -> &DataPageHeader {
        &self.header
    }

    pub fn next(&self) -> Option<PageIndex> {
        self.header.next
    }

    pub fn prev(&self) -> Option<PageIndex> {
        self.header.prev
    }

    pub fn set_next(&mut self, next: Option<PageIndex>) {
        self.header.next = next;
    }

    pub fn set_prev(&mut self, prev: Option<PageIndex>) {
        self.header.prev = prev;
    }

    pub fn row_pointer_count(&self) -> u16 {
        self.header.row_pointer_count
    }

    /// Writes header and directory back into the page.
    pub fn encode(&self) {
        let mut data = self.page.write();
        self.header.encode_into(&mut data[..HEADER_SIZE]);
        let directory = &mut data[HEADER_SIZE..self.header.free_space_start as usize];
        for (slot, pointer) in directory
            .chunks_exact_mut(ROW_POINTER_SIZE)
            .zip(&self.row_pointers)
        {
            BigEndian::write_i16(slot, *pointer);
        }
    }

    pub fn flush(&self) -> StorageResult<()> {
        self.encode();
        self.page.flush()
    }

    fn entry_offset(&self, slot_id: u16) -> StorageResult<usize> {
        let pointer = *self
            .row_pointers
            .get(slot_id as usize)
            .ok_or(StorageError::EntryOutOfRange {
                slot_id,
                count: self.header.row_pointer_count,
            })?;
        if pointer < 0 {
            return Err(StorageError::EntryEmpty { slot_id });
        }
        self.header
            .check_pointer(slot_id, pointer)
            .map_err(|reason| StorageError::Corrupt {
                index: self.page.index(),
                reason,
            })?;
        Ok(pointer as usize)
    }

    /// Bytes from the start of the entry to the end of the page.
    pub fn get_entry(&self, slot_id: u16) -> StorageResult<MappedRwLockReadGuard<'_, [u8]>> {
        let offset = self.entry_offset(slot_id)?;
        Ok(RwLockReadGuard::map(self.page.read(), |data| &data[offset..]))
    }

    pub fn get_entry_mut(&self, slot_id: u16) -> StorageResult<MappedRwLockWriteGuard<'_, [u8]>> {
        let offset = self.entry_offset(slot_id)?;
        Ok(RwLockWriteGuard::map(self.page.write(), |data| {
            &mut data[offset..]
        }))
    }

    /// Marks a slot unused. The row's heap bytes are not reclaimed.
    pub fn free_entry(&mut self, slot_id: u16) -> StorageResult<()> {
        self.entry_offset(slot_id)?;
        self.row_pointers[slot_id as usize] = UNUSED_POINTER;
        Ok(())
    }

    /// Space a new insert may use. Negative once the reserve is eaten into.
    pub fn available_space(&self) -> isize {
        let free = self.header.free_space_end as isize - self.header.free_space_start as isize;
        free - RESERVED_SPACE as isize
    }

    fn find_available_row_pointer(&mut self) -> usize {
        if let Some(slot) = self.row_pointers.iter().position(|&pointer| pointer < 0) {
            return slot;
        }
        self.row_pointers.push(UNUSED_POINTER);
        self.header.row_pointer_count += 1;
        self.header.free_space_start += ROW_POINTER_SIZE as u16;
        self.row_pointers.len() - 1
    }

    /// Claims a slot and `required_space` heap bytes for a new row.
    ///
    /// The slot is marked used immediately; the caller fills the returned
    /// buffer and flushes the page.
    pub fn find_free_entry(
        &mut self,
        required_space: usize,
    ) -> StorageResult<MappedRwLockWriteGuard<'_, [u8]>> {
        let available = self.available_space();
        if available < required_space as isize {
            return Err(StorageError::NoSpace {
                required: required_space,
                available,
            });
        }

        let slot = self.find_available_row_pointer();
        // One byte stays free between the new row and the previous one.
        let row_start = self.header.free_space_end as usize - required_space - 1;
        self.row_pointers[slot] = row_start as i16;
        self.header.free_space_end = row_start as u16;

        Ok(RwLockWriteGuard::map(self.page.write(), |data| {
            &mut data[row_start..row_start + required_space]
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::Pager;
    use anyhow::Result;
    use rand::Rng;
    use tempfile::{tempdir, TempDir};

    fn create_test_page() -> Result<(TempDir, Pager, DataPage)> {
        let dir = tempdir()?;
        let pager = Pager::open(dir.path().join("test.db"))?;
        let page = DataPage::init(pager.append()?, None);
        page.flush()?;
        Ok((dir, pager, page))
    }

    #[test]
    fn test_header_round_trip() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let header = DataPageHeader {
                next: rng.gen_bool(0.5).then(|| rng.gen_range(0..i64::MAX as u64)),
                prev: rng.gen_bool(0.5).then(|| rng.gen_range(0..i64::MAX as u64)),
                row_pointer_count: rng.gen(),
                free_space_start: rng.gen(),
                free_space_end: rng.gen(),
            };
            let mut buf = [0u8; HEADER_SIZE];
            header.encode_into(&mut buf);
            assert_eq!(DataPageHeader::decode(&buf), header);
        }
    }

    #[test]
    fn test_header_wire_format() {
        let header = DataPageHeader {
            next: Some(3),
            prev: None,
            row_pointer_count: 2,
            free_space_start: 26,
            free_space_end: 4000,
        };
        let mut buf = [0u8; HEADER_SIZE];
        header.encode_into(&mut buf);

        assert_eq!(&buf[0..8], &3i64.to_be_bytes());
        assert_eq!(&buf[8..16], &(-1i64).to_be_bytes());
        assert_eq!(&buf[16..18], &2u16.to_be_bytes());
        assert_eq!(&buf[18..20], &26u16.to_be_bytes());
        assert_eq!(&buf[20..22], &4000u16.to_be_bytes());
    }

    #[test]
    fn test_empty_page() -> Result<()> {
        let (_dir, pager, page) = create_test_page()?;
        assert_eq!(page.row_pointer_count(), 0);
        assert_eq!(
            page.available_space(),
            (PAGE_SIZE - HEADER_SIZE - RESERVED_SPACE) as isize
        );

        let decoded = DataPage::decode(pager.fetch(page.index())?)?;
        assert_eq!(decoded.header(), &DataPageHeader::empty(None));

        Ok(())
    }

    #[test]
    fn test_find_free_entry_accounting() -> Result<()> {
        let (_dir, pager, mut page) = create_test_page()?;
        let before = page.available_space();

        {
            let mut entry = page.find_free_entry(10)?;
            assert_eq!(entry.len(), 10);
            entry.copy_from_slice(b"0123456789");
        }
        page.flush()?;

        let decoded = DataPage::decode(pager.fetch(page.index())?)?;
        // Row bytes, the guard byte and one new directory entry.
        assert_eq!(
            decoded.available_space(),
            before - 10 - 1 - ROW_POINTER_SIZE as isize
        );
        assert_eq!(decoded.row_pointer_count(), 1);
        assert_eq!(decoded.header().free_space_end as usize, PAGE_SIZE - 11);
        assert_eq!(&decoded.get_entry(0)?[..10], b"0123456789");

        Ok(())
    }

    #[test]
    fn test_rows_grow_downward() -> Result<()> {
        let (_dir, _pager, mut page) = create_test_page()?;

        page.find_free_entry(4)?.copy_from_slice(b"aaaa");
        page.find_free_entry(4)?.copy_from_slice(b"bbbb");

        // The second row sits below the first, separated by the guard byte.
        assert_eq!(&page.get_entry(1)?[..4], b"bbbb");
        assert_eq!(&page.get_entry(1)?[5..9], b"aaaa");
        assert_eq!(page.get_entry(0)?.len(), 5);

        Ok(())
    }

    #[test]
    fn test_get_entry_errors() -> Result<()> {
        let (_dir, _pager, mut page) = create_test_page()?;
        assert!(matches!(
            page.get_entry(0),
            Err(StorageError::EntryOutOfRange { slot_id: 0, count: 0 })
        ));

        drop(page.find_free_entry(8)?);
        page.free_entry(0)?;
        assert!(matches!(
            page.get_entry(0),
            Err(StorageError::EntryEmpty { slot_id: 0 })
        ));
        assert!(matches!(
            page.free_entry(0),
            Err(StorageError::EntryEmpty { slot_id: 0 })
        ));

        Ok(())
    }

    #[test]
    fn test_freed_slot_is_reused() -> Result<()> {
        let (_dir, _pager, mut page) = create_test_page()?;
        drop(page.find_free_entry(8)?);
        drop(page.find_free_entry(8)?);
        page.free_entry(0)?;

        let start = page.header().free_space_start;
        drop(page.find_free_entry(8)?);
        assert_eq!(page.row_pointer_count(), 2);
        assert_eq!(page.header().free_space_start, start);
        assert!(page.get_entry(0).is_ok());

        Ok(())
    }

    #[test]
    fn test_no_space() -> Result<()> {
        let (_dir, _pager, mut page) = create_test_page()?;
        let available = page.available_space() as usize;

        assert!(matches!(
            page.find_free_entry(available + 1),
            Err(StorageError::NoSpace { .. })
        ));
        assert_eq!(page.row_pointer_count(), 0);

        drop(page.find_free_entry(available)?);
        assert!(page.available_space() < 0);
        assert!(matches!(
            page.find_free_entry(1),
            Err(StorageError::NoSpace { .. })
        ));

        Ok(())
    }

    #[test]
    fn test_views_share_page_memory() -> Result<()> {
        let (_dir, pager, mut page) = create_test_page()?;
        page.find_free_entry(3)?.copy_from_slice(b"old");
        page.flush()?;

        let other = DataPage::decode(pager.fetch(page.index())?)?;
        other.get_entry_mut(0)?[..3].copy_from_slice(b"new");
        assert_eq!(&page.get_entry(0)?[..3], b"new");

        Ok(())
    }

    #[test]
    fn test_decode_rejects_uninitialized_page() -> Result<()> {
        let dir = tempdir()?;
        let pager = Pager::open(dir.path().join("test.db"))?;
        let raw = pager.append()?;

        assert!(matches!(
            DataPage::decode(raw),
            Err(StorageError::Corrupt { index: 0, .. })
        ));

        Ok(())
    }

    #[test]
    fn test_decode_rejects_row_pointer_outside_heap() -> Result<()> {
        let (_dir, pager, mut page) = create_test_page()?;
        page.find_free_entry(4)?.copy_from_slice(b"row!");
        page.flush()?;

        let raw = pager.fetch(page.index())?;
        BigEndian::write_i16(&mut raw.write()[HEADER_SIZE..], 5000);
        assert!(matches!(
            DataPage::decode(raw.clone()),
            Err(StorageError::Corrupt { index: 0, .. })
        ));

        // Pointing into the directory or free span is just as broken.
        BigEndian::write_i16(&mut raw.write()[HEADER_SIZE..], HEADER_SIZE as i16);
        assert!(matches!(
            DataPage::decode(raw.clone()),
            Err(StorageError::Corrupt { .. })
        ));

        // A freed slot is not checked.
        BigEndian::write_i16(&mut raw.write()[HEADER_SIZE..], UNUSED_POINTER);
        assert!(DataPage::decode(raw)?.get_entry(0).is_err());

        Ok(())
    }
}
