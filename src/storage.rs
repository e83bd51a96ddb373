//! Storage layer implementation for slotdb.
//!
//! This module maps a single backing file into memory page by page and lays
//! rows out inside those pages. Key components:
//!
//! - **Page**: Fixed-size (4KB) memory-mapped region of the file, shared by
//!   every holder of the same index
//! - **Pager**: Maps pages on demand and grows the file one page at a time
//! - **Cache**: Bounds the number of mapped pages; GCLOCK by default
//! - **DataPage**: Slotted page format for variable-length rows
//!
//! Nothing is written back implicitly: a page reaches the disk only when it
//! is flushed.

pub mod cache;
pub mod disk;
pub mod error;
pub mod page;

pub use cache::{Cache, GclockCache};
pub use disk::{Pager, PAGE_SIZE};
pub use error::{StorageError, StorageResult};
pub use page::{DataPage, Page, PageIndex, PageRef};
