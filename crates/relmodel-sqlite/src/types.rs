//! Conversion between relmodel values and SQLite storage classes.

use relmodel_core::Value;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};

/// A borrowed parameter bound by position.
#[derive(Debug, Clone, Copy)]
pub struct SqlParam<'a>(pub &'a Value);

impl ToSql for SqlParam<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self.0 {
            Value::Null => ValueRef::Null,
            Value::Bool(b) => ValueRef::Integer(i64::from(*b)),
            Value::Integer(i) => ValueRef::Integer(*i),
            Value::Real(f) => ValueRef::Real(*f),
            Value::Text(s) => ValueRef::Text(s.as_bytes()),
            Value::Blob(b) => ValueRef::Blob(b),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

/// Copy a column value out of a result row.
///
/// Text that is not valid UTF-8 is decoded lossily.
pub fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_binds_as_integer() {
        let value = Value::Bool(true);
        let param = SqlParam(&value);
        let out = param.to_sql().unwrap();
        assert!(matches!(out, ToSqlOutput::Borrowed(ValueRef::Integer(1))));
    }

    #[test]
    fn test_read_back_storage_classes() {
        assert_eq!(from_value_ref(ValueRef::Null), Value::Null);
        assert_eq!(from_value_ref(ValueRef::Integer(4)), Value::Integer(4));
        assert_eq!(
            from_value_ref(ValueRef::Text(b"abc")),
            Value::Text("abc".into())
        );
        assert_eq!(
            from_value_ref(ValueRef::Blob(&[1, 2])),
            Value::Blob(vec![1, 2])
        );
    }
}
