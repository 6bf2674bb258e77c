//! Serde-based conversion between records and rows.
//!
//! A record is serialized to a JSON object, and each mapped column reads its
//! value by [`Column::key`]. Decoding goes the other way: a JSON object is
//! assembled from the row and deserialized into a fresh instance. Values are
//! checked against the column's declared [`SemanticType`] in both directions
//! and never coerced.

use serde_json::{Map, Number, Value};

use crate::{Column, MappedType, Model, Row, SemanticType, SqlValue, StorageError};

/// Convert a record to its full row, in column order.
pub fn to_row<T: Model>(record: &T) -> Result<Row, StorageError> {
    let mapping = T::mapped_type();
    let json = serde_json::to_value(record)?;
    let obj = json.as_object().ok_or_else(|| {
        StorageError::Configuration(format!(
            "{} must serialize to an object to be stored",
            mapping.type_name
        ))
    })?;

    let mut row = Row::with_capacity(mapping.columns.len());
    for column in mapping.columns {
        let value = obj.get(column.key).unwrap_or(&Value::Null);
        row.push(column.name, json_to_sql(mapping, column, value)?);
    }
    Ok(row)
}

/// Decode a new record from a row.
///
/// Columns absent from the row are left out of the decoded object, so
/// partial projections work for fields serde can default.
pub fn from_row<T: Model>(row: &Row) -> Result<T, StorageError> {
    let mapping = T::mapped_type();
    let mut obj = Map::new();

    for column in mapping.columns {
        let Some(value) = row.get(column.name) else {
            continue;
        };
        obj.insert(column.key.to_string(), sql_to_json(mapping, column, value)?);
    }

    Ok(serde_json::from_value(Value::Object(obj))?)
}

/// Values bound by the insert statement: every column but the autoincrement one.
pub fn insert_values<T: Model>(record: &T) -> Result<Row, StorageError> {
    writable_row::<T>(record)
}

/// Values assigned by an update. Same column set as inserts.
pub fn update_values<T: Model>(record: &T) -> Result<Row, StorageError> {
    writable_row::<T>(record)
}

/// Copy of `row` without the mapping's autoincrement column.
pub fn writable_values(mapping: &MappedType, row: &Row) -> Row {
    row.iter()
        .filter(|(column, _)| !mapping.is_autoincrement(column))
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect()
}

fn writable_row<T: Model>(record: &T) -> Result<Row, StorageError> {
    let row = to_row(record)?;
    Ok(writable_values(T::mapped_type(), &row))
}

fn accepts_null(mapping: &MappedType, column: &Column) -> bool {
    column.nullable || mapping.is_autoincrement(column.name)
}

fn json_to_sql(
    mapping: &MappedType,
    column: &Column,
    value: &Value,
) -> Result<SqlValue, StorageError> {
    let mismatch = || StorageError::mismatch(column.name, column.semantic_type, json_type_name(value));

    match (column.semantic_type, value) {
        (_, Value::Null) if accepts_null(mapping, column) => Ok(SqlValue::Null),
        (SemanticType::Integer, Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(SqlValue::Integer(i))
            } else if n.is_u64() {
                Err(StorageError::mismatch(
                    column.name,
                    column.semantic_type,
                    format!("integer out of range ({})", n),
                ))
            } else {
                Err(mismatch())
            }
        }
        (SemanticType::Real, Value::Number(n)) if n.is_f64() => {
            n.as_f64().map(SqlValue::Real).ok_or_else(mismatch)
        }
        (SemanticType::Text, Value::String(s)) => Ok(SqlValue::Text(s.clone())),
        (SemanticType::Blob, Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(mismatch)
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(SqlValue::Blob),
        _ => Err(mismatch()),
    }
}

fn sql_to_json(
    mapping: &MappedType,
    column: &Column,
    value: &SqlValue,
) -> Result<Value, StorageError> {
    let mismatch = || StorageError::mismatch(column.name, column.semantic_type, value.type_name());

    match (column.semantic_type, value) {
        (_, SqlValue::Null) if accepts_null(mapping, column) => Ok(Value::Null),
        (SemanticType::Integer, SqlValue::Integer(n)) => Ok(Value::Number((*n).into())),
        (SemanticType::Real, SqlValue::Real(n)) => Number::from_f64(*n)
            .map(Value::Number)
            .ok_or_else(|| {
                StorageError::mismatch(column.name, column.semantic_type, "non-finite real")
            }),
        (SemanticType::Text, SqlValue::Text(s)) => Ok(Value::String(s.clone())),
        (SemanticType::Blob, SqlValue::Blob(b)) => Ok(Value::Array(
            b.iter().map(|byte| Value::Number((*byte).into())).collect(),
        )),
        _ => Err(mismatch()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "real",
        Value::Number(_) => "integer",
        Value::String(_) => "text",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::StorageDatetime;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Note {
        #[serde(default)]
        id: i64,
        title: String,
        body: Option<String>,
        score: f64,
        attachment: Vec<u8>,
        created_at: StorageDatetime,
    }

    static NOTE: MappedType = MappedType::new(
        "Note",
        "notes",
        &[
            Column::new("id", SemanticType::Integer),
            Column::new("title", SemanticType::Text),
            Column::new("body", SemanticType::Text).nullable(),
            Column::new("score", SemanticType::Real),
            Column::new("attachment", SemanticType::Blob),
            Column::new("created_at", SemanticType::Text).key("createdAt"),
        ],
    )
    .primary_keys(&["id"])
    .autoincrement("id");

    impl Model for Note {
        fn mapped_type() -> &'static MappedType {
            &NOTE
        }
    }

    fn note() -> Note {
        Note {
            id: 4,
            title: "groceries".to_string(),
            body: None,
            score: 2.5,
            attachment: vec![0, 7, 255],
            created_at: StorageDatetime::now(),
        }
    }

    #[test]
    fn round_trips_through_row() {
        let original = note();
        let row = to_row(&original).unwrap();
        let decoded: Note = from_row(&row).unwrap();
        assert_eq!(decoded, original);

        let with_body = Note {
            body: Some("milk".to_string()),
            ..note()
        };
        let decoded: Note = from_row(&to_row(&with_body).unwrap()).unwrap();
        assert_eq!(decoded, with_body);
    }

    #[test]
    fn row_follows_declared_column_order_and_names() {
        let row = to_row(&note()).unwrap();
        assert_eq!(
            row.columns().collect::<Vec<_>>(),
            ["id", "title", "body", "score", "attachment", "created_at"]
        );
        assert_eq!(row.get("body"), Some(&SqlValue::Null));
        assert_eq!(row.get("attachment"), Some(&SqlValue::Blob(vec![0, 7, 255])));
    }

    #[test]
    fn insert_values_skip_autoincrement_column() {
        let row = insert_values(&note()).unwrap();
        assert!(row.get("id").is_none());
        assert_eq!(row.len(), NOTE.columns.len() - 1);
    }

    #[test]
    fn mismatched_cursor_value_is_rejected() {
        let mut row = to_row(&note()).unwrap();
        row.remove("score");
        row.push("score", "high");

        let err = from_row::<Note>(&row).unwrap_err();
        match err {
            StorageError::TypeMismatch {
                column,
                expected,
                actual,
            } => {
                assert_eq!(column, "score");
                assert_eq!(expected, "real");
                assert_eq!(actual, "text");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn integers_are_not_coerced_into_real_columns() {
        let mut row = to_row(&note()).unwrap();
        row.remove("score");
        row.push("score", 3_i64);
        assert!(matches!(
            from_row::<Note>(&row),
            Err(StorageError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn null_in_required_column_is_rejected() {
        let mut row = to_row(&note()).unwrap();
        row.remove("title");
        row.push("title", SqlValue::Null);
        assert!(matches!(
            from_row::<Note>(&row),
            Err(StorageError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn partial_rows_decode_defaultable_fields() {
        let mut row = to_row(&note()).unwrap();
        row.remove("id");
        let decoded: Note = from_row(&row).unwrap();
        assert_eq!(decoded.id, 0);
    }

    #[test]
    fn record_field_of_wrong_shape_is_rejected_on_encode() {
        #[derive(Serialize, Deserialize)]
        struct Flag {
            on: bool,
        }

        static FLAG: MappedType =
            MappedType::new("Flag", "flags", &[Column::new("on", SemanticType::Integer)]);

        impl Model for Flag {
            fn mapped_type() -> &'static MappedType {
                &FLAG
            }
        }

        assert!(matches!(
            to_row(&Flag { on: true }),
            Err(StorageError::TypeMismatch { .. })
        ));
    }
}
