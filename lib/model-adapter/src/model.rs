//! Model trait: the per-type hooks the adapter dispatches through.
//!
//! Implementing `Model` binds a serde type to its [`MappedType`]. Every
//! method except [`Model::mapped_type`] has a default derived from the
//! descriptor; types override the autoincrement and caching hooks when
//! they have a storage-assigned key or a custom identity scheme.
//!
//! # Example
//!
//! ```text
//! #[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
//! pub struct User {
//!     #[serde(default)]
//!     pub id: i64,
//!     pub name: String,
//! }
//!
//! static USER: MappedType = MappedType::new("User", "users", &[
//!     Column::new("id", SemanticType::Integer),
//!     Column::new("name", SemanticType::Text),
//! ])
//! .primary_keys(&["id"])
//! .autoincrement("id");
//!
//! impl Model for User {
//!     fn mapped_type() -> &'static MappedType {
//!         &USER
//!     }
//!
//!     fn update_auto_increment(&mut self, id: i64) {
//!         self.id = id;
//!     }
//!
//!     fn auto_incrementing_id(&self) -> Result<i64, StorageError> {
//!         Ok(self.id)
//!     }
//! }
//! ```

use std::borrow::Cow;

use serde::{Serialize, de::DeserializeOwned};

use crate::{MappedType, PrimaryKeyPredicate, Row, SemanticType, SqlValue, StorageError};

/// Opaque identity used by an external object cache. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheId {
    Integer(i64),
    Text(String),
    Blob(Vec<u8>),
    Composite(Vec<CacheId>),
}

impl CacheId {
    /// Convert a stored value of the caching column's declared type.
    pub fn from_value(
        column: &str,
        semantic_type: SemanticType,
        value: &SqlValue,
    ) -> Result<Self, StorageError> {
        match (semantic_type, value) {
            (SemanticType::Integer, SqlValue::Integer(n)) => Ok(CacheId::Integer(*n)),
            (SemanticType::Text, SqlValue::Text(s)) => Ok(CacheId::Text(s.clone())),
            (SemanticType::Blob, SqlValue::Blob(b)) => Ok(CacheId::Blob(b.clone())),
            (SemanticType::Real, _) => Err(StorageError::Configuration(format!(
                "Column {} is real-valued and cannot be used as a cache identity",
                column
            ))),
            (expected, other) => Err(StorageError::mismatch(column, expected, other.type_name())),
        }
    }
}

/// A domain type bound to a table.
pub trait Model: Serialize + DeserializeOwned + Send + Sync {
    /// The descriptor for this type. One static instance per type.
    fn mapped_type() -> &'static MappedType;

    /// Text of the cached insert statement.
    fn insert_statement_sql() -> Cow<'static, str> {
        Cow::Owned(Self::mapped_type().insert_sql())
    }

    /// Text of the table definition.
    fn creation_sql() -> Cow<'static, str> {
        Cow::Owned(Self::mapped_type().creation_sql())
    }

    /// Columns that identify one stored record.
    fn primary_key_columns() -> &'static [&'static str] {
        Self::mapped_type().primary_keys
    }

    /// Build the primary-key predicate. Called once per adapter.
    fn create_primary_key_predicate() -> Result<PrimaryKeyPredicate, StorageError> {
        PrimaryKeyPredicate::new(Self::mapped_type(), Self::primary_key_columns())
    }

    /// Store a storage-generated key into the record. No-op unless overridden.
    fn update_auto_increment(&mut self, _id: i64) {}

    /// The record's autoincrement key. Overridden by types that have one.
    fn auto_incrementing_id(&self) -> Result<i64, StorageError> {
        Err(StorageError::Configuration(format!(
            "{} must declare a single autoincrementing or integer primary key to expose its id",
            Self::mapped_type().type_name
        )))
    }

    fn auto_incrementing_column_name() -> Result<&'static str, StorageError> {
        let mapping = Self::mapped_type();
        mapping.autoincrement.ok_or_else(|| {
            StorageError::Configuration(format!(
                "{} has no autoincrementing primary key column",
                mapping.type_name
            ))
        })
    }

    /// Identity handed to object caches. Defaults to the autoincrement key.
    fn caching_id(&self) -> Result<CacheId, StorageError> {
        self.auto_incrementing_id().map(CacheId::Integer)
    }

    fn caching_column_name() -> Result<&'static str, StorageError> {
        Self::auto_incrementing_column_name()
    }

    /// Read the cache identity from a row without decoding a whole record.
    fn caching_id_from_row(row: &Row, index: usize) -> Result<CacheId, StorageError> {
        let mapping = Self::mapped_type();
        let name = Self::caching_column_name()?;
        let column = mapping.column(name).ok_or_else(|| {
            StorageError::Configuration(format!(
                "{} caching column {} is not a mapped column",
                mapping.type_name, name
            ))
        })?;
        let value = row.get_index(index).ok_or_else(|| {
            StorageError::NotFound(format!("column index {} in row for {}", index, mapping.table))
        })?;
        CacheId::from_value(name, column.semantic_type, value)
    }
}
