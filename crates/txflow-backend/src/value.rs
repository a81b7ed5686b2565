//! Statement parameters and result rows.
//!
//! Deliberately small: txflow moves values between a unit of work and a
//! provider, it does not model a type system. Providers map these variants
//! onto whatever their store speaks.

use std::sync::Arc;

use crate::error::BackendError;

/// A statement parameter or result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl Value {
    /// Name of the variant, for diagnostics and type errors.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Conversion from a result cell into a Rust type.
pub trait FromValue: Sized {
    /// Convert from a value, failing with a type error on mismatch.
    fn from_value(value: &Value) -> Result<Self, BackendError>;
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, BackendError> {
        match value {
            Value::Int(v) => Ok(*v),
            other => Err(BackendError::Type {
                expected: "i64",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, BackendError> {
        match value {
            Value::Bool(v) => Ok(*v),
            other => Err(BackendError::Type {
                expected: "bool",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, BackendError> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            other => Err(BackendError::Type {
                expected: "f64",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, BackendError> {
        match value {
            Value::Text(v) => Ok(v.clone()),
            other => Err(BackendError::Type {
                expected: "String",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, BackendError> {
        match value {
            Value::Bytes(v) => Ok(v.clone()),
            other => Err(BackendError::Type {
                expected: "Vec<u8>",
                actual: other.type_name(),
            }),
        }
    }
}

impl<T> FromValue for Option<T>
where
    T: FromValue,
{
    fn from_value(value: &Value) -> Result<Self, BackendError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// One result row: column names plus cells.
///
/// Column names are shared across all rows of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row. Providers call this when decoding result sets.
    #[must_use]
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Column names, in result order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a cell by index.
    pub fn get(&self, index: usize) -> Result<&Value, BackendError> {
        self.values.get(index).ok_or(BackendError::ColumnIndex {
            index,
            len: self.values.len(),
        })
    }

    /// Get a cell by index, converted to `T`.
    pub fn try_get<T: FromValue>(&self, index: usize) -> Result<T, BackendError> {
        T::from_value(self.get(index)?)
    }

    /// Get a cell by column name (case-insensitive), converted to `T`.
    pub fn try_get_named<T: FromValue>(&self, name: &str) -> Result<T, BackendError> {
        let index = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| BackendError::ColumnNotFound(name.to_string()))?;
        self.try_get(index)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        let columns: Arc<[String]> = Arc::from(vec!["id".to_string(), "name".to_string()]);
        Row::new(columns, vec![Value::Int(7), Value::Text("ada".into())])
    }

    #[test]
    fn test_value_from_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from("x"), Value::Text("x".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(5i64)), Value::Int(5));
    }

    #[test]
    fn test_row_indexed_access() {
        let row = sample_row();
        assert_eq!(row.len(), 2);
        assert_eq!(row.try_get::<i64>(0).unwrap(), 7);
        assert_eq!(row.try_get::<String>(1).unwrap(), "ada");

        let err = row.get(5).unwrap_err();
        assert!(matches!(err, BackendError::ColumnIndex { index: 5, len: 2 }));
    }

    #[test]
    fn test_row_named_access_case_insensitive() {
        let row = sample_row();
        assert_eq!(row.try_get_named::<i64>("ID").unwrap(), 7);
        assert!(matches!(
            row.try_get_named::<i64>("missing"),
            Err(BackendError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let row = sample_row();
        let err = row.try_get::<bool>(0).unwrap_err();
        assert!(matches!(
            err,
            BackendError::Type {
                expected: "bool",
                actual: "int"
            }
        ));
    }

    #[test]
    fn test_option_from_value() {
        assert_eq!(Option::<i64>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(Option::<i64>::from_value(&Value::Int(3)).unwrap(), Some(3));
    }
}
