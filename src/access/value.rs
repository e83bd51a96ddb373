use crate::access::error::{AccessError, AccessResult};
use crate::access::schema::ColumnDef;
use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use std::cmp::Ordering;
use std::fmt;
use std::io::{Cursor, Read};

/// Byte length of the length prefix in front of a string value
pub const STRING_LENGTH_SIZE: usize = 8;
/// Byte length of the column count in front of a column definition list
pub const COLUMN_COUNT_SIZE: usize = 8;
pub const LONG_SIZE: usize = 8;

/// Data types a column can be declared with.
///
/// The discriminant is the stable id persisted in schema descriptors.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Long = 0,
    String = 1,
    ColumnDefs = 2,
}

impl DataType {
    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_id(id: u16) -> AccessResult<Self> {
        match id {
            0 => Ok(DataType::Long),
            1 => Ok(DataType::String),
            2 => Ok(DataType::ColumnDefs),
            _ => Err(AccessError::Decode {
                data_type: DataType::ColumnDefs,
                reason: format!("unknown type id {}", id),
            }),
        }
    }

    /// Decodes a value from the front of `bytes`, which may extend past it.
    /// Returns the value and the number of bytes it occupied.
    pub fn decode(self, bytes: &[u8]) -> AccessResult<(Value, usize)> {
        let mut cursor = Cursor::new(bytes);
        let value = match self {
            DataType::Long => Value::Long(
                cursor
                    .read_i64::<BigEndian>()
                    .map_err(|e| self.decode_error(e))?,
            ),
            DataType::String => {
                let length = cursor
                    .read_u64::<BigEndian>()
                    .map_err(|e| self.decode_error(e))?;
                Value::String(self.read_string(&mut cursor, length)?)
            }
            DataType::ColumnDefs => {
                let count = cursor
                    .read_u64::<BigEndian>()
                    .map_err(|e| self.decode_error(e))?;
                let remaining = bytes.len() - COLUMN_COUNT_SIZE;
                // Every definition takes at least four bytes.
                if count > (remaining / 4) as u64 {
                    return Err(self.decode_error(format!(
                        "{} column definitions cannot fit in {} bytes",
                        count, remaining
                    )));
                }

                let mut columns = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let type_id = cursor
                        .read_u16::<BigEndian>()
                        .map_err(|e| self.decode_error(e))?;
                    let name_length = cursor
                        .read_u16::<BigEndian>()
                        .map_err(|e| self.decode_error(e))?;
                    let name = self.read_string(&mut cursor, name_length as u64)?;
                    columns.push(ColumnDef::new(name, DataType::from_id(type_id)?));
                }
                Value::ColumnDefs(columns)
            }
        };
        Ok((value, cursor.position() as usize))
    }

    fn read_string(self, cursor: &mut Cursor<&[u8]>, length: u64) -> AccessResult<String> {
        let available = cursor.get_ref().len() as u64 - cursor.position();
        if length > available {
            return Err(self.decode_error(format!(
                "length {} exceeds remaining {} bytes",
                length, available
            )));
        }
        let mut buf = vec![0u8; length as usize];
        cursor
            .read_exact(&mut buf)
            .map_err(|e| self.decode_error(e))?;
        String::from_utf8(buf).map_err(|e| self.decode_error(e))
    }

    fn decode_error(self, reason: impl fmt::Display) -> AccessError {
        AccessError::Decode {
            data_type: self,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Long => write!(f, "LONG"),
            DataType::String => write!(f, "STRING"),
            DataType::ColumnDefs => write!(f, "COLUMN_DEFS"),
        }
    }
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Long(i64),
    String(String),
    /// Schema descriptor, stored by the catalog
    ColumnDefs(Vec<ColumnDef>),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Long(_) => DataType::Long,
            Value::String(_) => DataType::String,
            Value::ColumnDefs(_) => DataType::ColumnDefs,
        }
    }

    /// Exact encoded size in bytes.
    pub fn length(&self) -> usize {
        match self {
            Value::Long(_) => LONG_SIZE,
            Value::String(s) => STRING_LENGTH_SIZE + s.len(),
            Value::ColumnDefs(columns) => {
                COLUMN_COUNT_SIZE + columns.iter().map(|c| 4 + c.name.len()).sum::<usize>()
            }
        }
    }

    /// Writes the value to the front of `buf` and returns the bytes written.
    pub fn encode_into(&self, buf: &mut [u8]) -> usize {
        match self {
            Value::Long(v) => BigEndian::write_i64(buf, *v),
            Value::String(s) => {
                BigEndian::write_u64(buf, s.len() as u64);
                let end = STRING_LENGTH_SIZE + s.len();
                buf[STRING_LENGTH_SIZE..end].copy_from_slice(s.as_bytes());
            }
            Value::ColumnDefs(columns) => {
                BigEndian::write_u64(buf, columns.len() as u64);
                let mut offset = COLUMN_COUNT_SIZE;
                for column in columns {
                    BigEndian::write_u16(&mut buf[offset..], column.data_type.id());
                    BigEndian::write_u16(&mut buf[offset + 2..], column.name.len() as u16);
                    offset += 4;
                    let end = offset + column.name.len();
                    buf[offset..end].copy_from_slice(column.name.as_bytes());
                    offset = end;
                }
            }
        }
        self.length()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.length()];
        self.encode_into(&mut buf);
        buf
    }

    /// Orders `self` relative to `other`: `Less` means `self` is smaller.
    pub fn compare(&self, other: &Value) -> AccessResult<Ordering> {
        match (self, other) {
            (Value::Long(a), Value::Long(b)) => Ok(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Ok(a.as_bytes().cmp(b.as_bytes())),
            (Value::ColumnDefs(a), Value::ColumnDefs(b)) => {
                let key = |c: &ColumnDef| (c.data_type.id(), c.name.clone());
                Ok(a.iter().map(key).cmp(b.iter().map(key)))
            }
            _ => Err(AccessError::TypeMismatch {
                expected: self.data_type(),
                found: other.data_type(),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Long(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::ColumnDefs(columns) => {
                write!(f, "(")?;
                for (i, column) in columns.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", column.name, column.data_type)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}
