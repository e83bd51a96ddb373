use crate::access::value::Value;
use std::fmt;

/// Column values in schema order.
///
/// Encoded as the plain concatenation of its values, with no padding and no
/// length prefix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Encoded size in bytes.
    pub fn length(&self) -> usize {
        self.values.iter().map(Value::length).sum()
    }

    /// Writes every value back to back into the front of `buf`.
    pub fn encode_into(&self, buf: &mut [u8]) -> usize {
        let mut offset = 0;
        for value in &self.values {
            offset += value.encode_into(&mut buf[offset..]);
        }
        offset
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}
