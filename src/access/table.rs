use crate::access::error::{AccessError, AccessResult};
use crate::access::row::Row;
use crate::access::schema::TableSchema;
use crate::access::value::Value;
use crate::storage::disk::Pager;
use crate::storage::error::StorageError;
use crate::storage::page::data_page::MAX_ROW_SIZE;
use crate::storage::page::{DataPage, PageIndex};
use log::{debug, trace};
use std::cmp::Ordering;

/// A row matched by a scan, with the page view it was found on.
struct RowMatch {
    page: DataPage,
    slot_id: u16,
    row: Row,
    /// Bytes the row occupies in the page
    length: usize,
}

/// A schema-typed table stored as a doubly linked chain of data pages.
///
/// The chain only grows. Its anchors (first and last page) are meant to be
/// persisted by the caller, usually through the catalog.
pub struct Table {
    name: String,
    schema: TableSchema,
    first_page: Option<PageIndex>,
    last_page: Option<PageIndex>,
    pager: Pager,
}

impl Table {
    /// A table with no pages yet.
    pub fn create(pager: Pager, name: impl Into<String>, schema: TableSchema) -> Self {
        Self::open(pager, name, schema, None, None)
    }

    /// Reattaches a table to previously persisted anchors.
    pub fn open(
        pager: Pager,
        name: impl Into<String>,
        schema: TableSchema,
        first_page: Option<PageIndex>,
        last_page: Option<PageIndex>,
    ) -> Self {
        Self {
            name: name.into(),
            schema,
            first_page,
            last_page,
            pager,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn first_page(&self) -> Option<PageIndex> {
        self.first_page
    }

    pub fn last_page(&self) -> Option<PageIndex> {
        self.last_page
    }

    /// Appends a page to the file and links it as the new tail of the chain.
    pub fn new_data_page(&mut self) -> AccessResult<DataPage> {
        let prev = self.last_page;
        let page = DataPage::init(self.pager.append()?, prev);
        page.flush()?;
        let index = page.index();

        match prev {
            Some(prev_index) => {
                let mut prev_page = self.fetch_data_page(prev_index)?;
                prev_page.set_next(Some(index));
                prev_page.flush()?;
                debug!(
                    "table {}: linked page {} after page {}",
                    self.name, index, prev_index
                );
            }
            None => {
                self.first_page = Some(index);
                debug!("table {}: first page is {}", self.name, index);
            }
        }
        self.last_page = Some(index);

        Ok(page)
    }

    /// Follows `next` links from the recorded tail and adopts the page the
    /// chain really ends on. Anchors persisted before a failed write may lag
    /// behind pages that were already linked.
    pub fn recover_tail(&mut self) -> AccessResult<()> {
        let Some(start) = self.last_page.or(self.first_page) else {
            return Ok(());
        };
        let mut page = self.fetch_data_page(start)?;
        while let Some(next) = page.next() {
            page = self.fetch_data_page(next)?;
        }

        let tail = page.index();
        if self.last_page != Some(tail) {
            debug!(
                "table {}: recorded tail {:?} is behind, chain ends at page {}",
                self.name, self.last_page, tail
            );
            self.last_page = Some(tail);
        }
        Ok(())
    }

    pub fn fetch_data_page(&self, index: PageIndex) -> AccessResult<DataPage> {
        let page = self.pager.fetch(index)?;
        Ok(DataPage::decode(page)?)
    }

    pub fn next_page(&self, page: &DataPage) -> AccessResult<DataPage> {
        let next = page.next().ok_or(AccessError::EndOfChain {
            index: page.index(),
            direction: "next",
        })?;
        self.fetch_data_page(next)
    }

    pub fn previous_page(&self, page: &DataPage) -> AccessResult<DataPage> {
        let prev = page.prev().ok_or(AccessError::EndOfChain {
            index: page.index(),
            direction: "previous",
        })?;
        self.fetch_data_page(prev)
    }

    /// First page in the chain with room for `required_space` bytes, or a new
    /// tail page if there is none.
    // TODO: keep pages with free space on a free list instead of walking the chain.
    pub fn find_free_page(&mut self, required_space: usize) -> AccessResult<DataPage> {
        let mut next = self.first_page;
        while let Some(index) = next {
            let page = self.fetch_data_page(index)?;
            if page.available_space() >= required_space as isize {
                return Ok(page);
            }
            next = page.next();
        }
        self.new_data_page()
    }

    /// Encodes `row` into a free slot. The slot is claimed before the page is
    /// flushed, so a failed flush leaves it marked used.
    pub fn insert(&mut self, row: &Row) -> AccessResult<()> {
        self.schema.check(row)?;
        let length = row.length();
        if length > MAX_ROW_SIZE {
            return Err(StorageError::NoSpace {
                required: length,
                available: MAX_ROW_SIZE as isize,
            }
            .into());
        }

        let mut page = self.find_free_page(length)?;
        {
            let mut entry = page.find_free_entry(length)?;
            row.encode_into(&mut entry);
        }
        page.flush()?;
        trace!("table {}: inserted row into page {}", self.name, page.index());

        Ok(())
    }

    /// Returns the first row whose `column` equals `value`.
    pub fn select(&self, column: &str, value: &Value) -> AccessResult<Row> {
        Ok(self.find_row(column, value)?.row)
    }

    /// Replaces the first row whose `column` equals `value` with `new_row`.
    ///
    /// A row that encodes no longer than the one it replaces is rewritten in
    /// place. A longer row is inserted like a new row and the old slot is
    /// freed afterwards; its heap bytes are not reclaimed.
    pub fn update(&mut self, column: &str, value: &Value, new_row: &Row) -> AccessResult<()> {
        self.schema.check(new_row)?;
        let found = self.find_row(column, value)?;
        let new_length = new_row.length();

        if new_length <= found.length {
            {
                let mut entry = found.page.get_entry_mut(found.slot_id)?;
                new_row.encode_into(&mut entry[..new_length]);
            }
            found.page.flush()?;
            return Ok(());
        }

        let index = found.page.index();
        drop(found.page);
        self.insert(new_row)?;

        // The insert may have changed this page's directory; decode it again.
        let mut page = self.fetch_data_page(index)?;
        page.free_entry(found.slot_id)?;
        page.flush()?;
        debug!(
            "table {}: relocated row from page {} slot {} ({} -> {} bytes)",
            self.name, index, found.slot_id, found.length, new_length
        );

        Ok(())
    }

    fn find_row(&self, column: &str, value: &Value) -> AccessResult<RowMatch> {
        let (column_idx, column_def) = self.schema.find_column(column)?;
        if value.data_type() != column_def.data_type {
            return Err(AccessError::TypeMismatch {
                expected: column_def.data_type,
                found: value.data_type(),
            });
        }

        let not_found = || AccessError::NotFound {
            column: column.to_string(),
            value: value.to_string(),
        };

        let Some(first) = self.first_page else {
            return Err(not_found());
        };
        let mut page = self.fetch_data_page(first)?;

        loop {
            for slot_id in 0..page.row_pointer_count() {
                let entry = match page.get_entry(slot_id) {
                    Ok(entry) => entry,
                    Err(
                        StorageError::EntryEmpty { .. } | StorageError::EntryOutOfRange { .. },
                    ) => {
                        trace!("page {} slot {} is empty", page.index(), slot_id);
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };
                let (row, length) = self.schema.decode_row(&entry)?;
                drop(entry);

                if row.values()[column_idx].compare(value)? == Ordering::Equal {
                    return Ok(RowMatch {
                        page,
                        slot_id,
                        row,
                        length,
                    });
                }
            }

            page = match self.next_page(&page) {
                Ok(next) => next,
                Err(AccessError::EndOfChain { .. }) => return Err(not_found()),
                Err(e) => return Err(e),
            };
        }
    }
}
