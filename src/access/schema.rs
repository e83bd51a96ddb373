use crate::access::error::{AccessError, AccessResult};
use crate::access::row::Row;
use crate::access::value::{DataType, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered column definitions of a table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Column names must be unique and short enough for a schema descriptor.
    pub fn new(columns: Vec<ColumnDef>) -> AccessResult<Self> {
        let mut names = HashSet::new();
        for column in &columns {
            if column.name.len() > u16::MAX as usize {
                return Err(AccessError::InvalidSchema(format!(
                    "column name of {} bytes is too long",
                    column.name.len()
                )));
            }
            if !names.insert(column.name.as_str()) {
                return Err(AccessError::InvalidSchema(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Rebuilds a schema from a persisted descriptor value.
    pub fn from_value(value: Value) -> AccessResult<Self> {
        match value {
            Value::ColumnDefs(columns) => Self::new(columns),
            other => Err(AccessError::TypeMismatch {
                expected: DataType::ColumnDefs,
                found: other.data_type(),
            }),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::ColumnDefs(self.columns.clone())
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn find_column(&self, name: &str) -> AccessResult<(usize, &ColumnDef)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, column)| column.name == name)
            .ok_or_else(|| AccessError::UnknownColumn(name.to_string()))
    }

    /// Checks that `row` has one value per column, each of the declared type.
    pub fn check(&self, row: &Row) -> AccessResult<()> {
        if row.len() != self.columns.len() {
            return Err(AccessError::SchemaMismatch(format!(
                "expected {} values, got {}",
                self.columns.len(),
                row.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(row.values()) {
            if value.data_type() != column.data_type {
                return Err(AccessError::SchemaMismatch(format!(
                    "column '{}' is {}, got {}",
                    column.name,
                    column.data_type,
                    value.data_type()
                )));
            }
        }
        Ok(())
    }

    pub fn conforms(&self, row: &Row) -> bool {
        self.check(row).is_ok()
    }

    /// Decodes one row from the front of `bytes`, column by column.
    /// Returns the row and the number of bytes it occupied.
    pub fn decode_row(&self, bytes: &[u8]) -> AccessResult<(Row, usize)> {
        let mut values = Vec::with_capacity(self.columns.len());
        let mut offset = 0;
        for column in &self.columns {
            let (value, used) = column.data_type.decode(&bytes[offset..])?;
            values.push(value);
            offset += used;
        }
        Ok((Row::new(values), offset))
    }
}
