//! Storage layer error types.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Page {index} is out of range: file holds {page_count} pages")]
    OutOfRange { index: u64, page_count: u64 },

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Entry {slot_id} is out of range (row pointers: {count})")]
    EntryOutOfRange { slot_id: u16, count: u16 },

    #[error("Entry {slot_id} is empty")]
    EntryEmpty { slot_id: u16 },

    #[error("Page is full: requires {required} bytes but only {available} available")]
    NoSpace { required: usize, available: isize },

    #[error("Corrupt data page {index}: {reason}")]
    Corrupt { index: u64, reason: String },

    #[error("Pager is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
