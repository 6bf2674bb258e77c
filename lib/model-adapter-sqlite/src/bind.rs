//! Conversion between adapter values and rusqlite values.

use model_adapter::{MappedType, Row, SqlValue, StorageError};
use rusqlite::types::Value;

pub(crate) fn failure(error: rusqlite::Error) -> StorageError {
    StorageError::StorageFailure(error.to_string())
}

pub(crate) fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(n) => Value::Integer(*n),
        SqlValue::Real(n) => Value::Real(*n),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(b) => Value::Blob(b.clone()),
    }
}

pub(crate) fn from_sqlite(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(n) => SqlValue::Integer(n),
        Value::Real(n) => SqlValue::Real(n),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    }
}

/// Values in bind order, as rusqlite parameters.
pub(crate) fn parameters<'a>(values: impl IntoIterator<Item = &'a SqlValue>) -> Vec<Value> {
    values.into_iter().map(to_sqlite).collect()
}

/// Read every mapped column of a result row, in declaration order.
///
/// Values are taken as stored; type checking happens when the row is decoded.
pub(crate) fn read_row(mapping: &MappedType, row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    let mut out = Row::with_capacity(mapping.columns.len());
    for (idx, column) in mapping.columns.iter().enumerate() {
        out.push(column.name, from_sqlite(row.get::<_, Value>(idx)?));
    }
    Ok(out)
}
