//! Access layer error types.

use crate::access::value::DataType;
use crate::storage::error::StorageError;
use crate::storage::page::PageIndex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Page {index} has no {direction} page")]
    EndOfChain {
        index: PageIndex,
        direction: &'static str,
    },

    #[error("No row with {column} = {value}")]
    NotFound { column: String, value: String },

    #[error("Row does not match schema: {0}")]
    SchemaMismatch(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: DataType, found: DataType },

    #[error("Column '{0}' not found")]
    UnknownColumn(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Failed to decode {data_type} value: {reason}")]
    Decode { data_type: DataType, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type AccessResult<T> = Result<T, AccessError>;
