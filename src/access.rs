//! Access layer for row-oriented operations.
//!
//! This module turns pages into tables of typed rows:
//!
//! - **Table**: Schema plus a doubly linked chain of data pages
//! - **Row**: Column values in schema order
//! - **Value**: Typed column value with its binary codec
//! - **TableSchema**: Ordered column definitions a row must conform to
//!
//! Rows are located by a linear scan over the page chain; there are no
//! indexes.

pub mod error;
pub mod row;
pub mod schema;
pub mod table;
pub mod value;

pub use error::{AccessError, AccessResult};
pub use row::Row;
pub use schema::{ColumnDef, TableSchema};
pub use table::Table;
pub use value::{DataType, Value};
