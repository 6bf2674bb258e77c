//! Storage-level values and rows.
//!
//! A [`Row`] is the tabular form of a record: column names paired with
//! [`SqlValue`]s, in column order. Executors produce rows from cursors and
//! consume rows when binding statements.

use std::fmt;

/// The declared storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Integer,
    Text,
    Real,
    Blob,
}

impl SemanticType {
    /// SQL type name used in table definitions.
    pub fn sql_name(&self) -> &'static str {
        match self {
            SemanticType::Integer => "INTEGER",
            SemanticType::Text => "TEXT",
            SemanticType::Real => "REAL",
            SemanticType::Blob => "BLOB",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticType::Integer => "integer",
            SemanticType::Text => "text",
            SemanticType::Real => "real",
            SemanticType::Blob => "blob",
        };
        f.write_str(name)
    }
}

/// A value that can be bound to a statement parameter or read from a cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// The storage class of this value, `None` for NULL.
    pub fn semantic_type(&self) -> Option<SemanticType> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(_) => Some(SemanticType::Integer),
            SqlValue::Real(_) => Some(SemanticType::Real),
            SqlValue::Text(_) => Some(SemanticType::Text),
            SqlValue::Blob(_) => Some(SemanticType::Blob),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Name of the runtime type, as used in mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Blob(_) => "blob",
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Integer(n) => write!(f, "{}", n),
            SqlValue::Real(n) => write!(f, "{}", n),
            SqlValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            SqlValue::Blob(b) => {
                f.write_str("X'")?;
                for byte in b {
                    write!(f, "{:02X}", byte)?;
                }
                f.write_str("'")
            }
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<&String> for SqlValue {
    fn from(s: &String) -> Self {
        SqlValue::Text(s.clone())
    }
}

impl From<i64> for SqlValue {
    fn from(n: i64) -> Self {
        SqlValue::Integer(n)
    }
}

impl From<i32> for SqlValue {
    fn from(n: i32) -> Self {
        SqlValue::Integer(n.into())
    }
}

impl From<f64> for SqlValue {
    fn from(n: f64) -> Self {
        SqlValue::Real(n)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(v: &[u8]) -> Self {
        SqlValue::Blob(v.to_vec())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// An ordered column → value mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Append a column. Column order is preserved.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.entries.push((column.into(), value.into()));
    }

    /// Builder-style [`Row::push`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    /// Value of the named column, if present.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Value at a column position, if present.
    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        self.entries.get(index).map(|(_, value)| value)
    }

    /// Position of the named column.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.entries.iter().position(|(name, _)| name == column)
    }

    /// Drop the named column if present.
    pub fn remove(&mut self, column: &str) -> Option<SqlValue> {
        let idx = self.column_index(column)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
