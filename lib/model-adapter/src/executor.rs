//! The storage-execution contract the adapter delegates row mutation to.
//!
//! Implemented by database-specific types (e.g. `SqliteDatabase`). The
//! executor owns connections and transactions; the adapter supplies column
//! values, the bound primary-key predicate and the compiled insert statement.

use std::sync::Arc;

use crate::{MappedType, PrimaryKeyPredicate, Row, StatementHandle, StorageError};

/// Result of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub rows_affected: u64,
    /// Storage-assigned key of the written row, when a row was written.
    pub generated_id: Option<i64>,
}

/// Which write `save` ended up performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted(InsertOutcome),
    Updated(u64),
}

impl SaveOutcome {
    pub fn rows_affected(&self) -> u64 {
        match self {
            SaveOutcome::Inserted(outcome) => outcome.rows_affected,
            SaveOutcome::Updated(rows) => *rows,
        }
    }
}

/// Everything `save` needs to insert or update one record.
#[derive(Debug, Clone, Copy)]
pub struct SaveRequest<'a> {
    pub mapping: &'a MappedType,
    pub statement: &'a StatementHandle,
    pub insert_values: &'a Row,
    pub update_values: &'a Row,
    /// Bound to the record's key.
    pub predicate: &'a PrimaryKeyPredicate,
}

/// Executes writes and key lookups against a storage backend.
///
/// Rows-affected counts are reported, never turned into errors. Backend
/// failures are returned as [`StorageError::StorageFailure`].
pub trait StorageExecutor: Send + Sync {
    /// Counter bumped whenever the underlying connection is replaced.
    fn connection_generation(&self) -> u64;

    /// Compile `sql` on the writable connection serving `mapping`.
    fn compile_statement(
        &self,
        mapping: &MappedType,
        sql: &str,
    ) -> Result<StatementHandle, StorageError>;

    /// Run a compiled insert with `values` bound in order.
    fn insert(
        &self,
        statement: &StatementHandle,
        values: &Row,
    ) -> Result<InsertOutcome, StorageError>;

    /// Update the row matched by `predicate`, applying the type's update conflict action.
    fn update(
        &self,
        mapping: &MappedType,
        values: &Row,
        predicate: &PrimaryKeyPredicate,
    ) -> Result<u64, StorageError>;

    fn delete(
        &self,
        mapping: &MappedType,
        predicate: &PrimaryKeyPredicate,
    ) -> Result<u64, StorageError>;

    fn exists(
        &self,
        mapping: &MappedType,
        predicate: &PrimaryKeyPredicate,
    ) -> Result<bool, StorageError>;

    /// The stored row matched by `predicate`, all mapped columns in order.
    fn fetch_one(
        &self,
        mapping: &MappedType,
        predicate: &PrimaryKeyPredicate,
    ) -> Result<Option<Row>, StorageError>;

    /// Update the record if its key exists, insert it otherwise, atomically.
    fn save(&self, request: SaveRequest<'_>) -> Result<SaveOutcome, StorageError>;
}

impl<E: StorageExecutor + ?Sized> StorageExecutor for Arc<E> {
    fn connection_generation(&self) -> u64 {
        (**self).connection_generation()
    }

    fn compile_statement(
        &self,
        mapping: &MappedType,
        sql: &str,
    ) -> Result<StatementHandle, StorageError> {
        (**self).compile_statement(mapping, sql)
    }

    fn insert(
        &self,
        statement: &StatementHandle,
        values: &Row,
    ) -> Result<InsertOutcome, StorageError> {
        (**self).insert(statement, values)
    }

    fn update(
        &self,
        mapping: &MappedType,
        values: &Row,
        predicate: &PrimaryKeyPredicate,
    ) -> Result<u64, StorageError> {
        (**self).update(mapping, values, predicate)
    }

    fn delete(
        &self,
        mapping: &MappedType,
        predicate: &PrimaryKeyPredicate,
    ) -> Result<u64, StorageError> {
        (**self).delete(mapping, predicate)
    }

    fn exists(
        &self,
        mapping: &MappedType,
        predicate: &PrimaryKeyPredicate,
    ) -> Result<bool, StorageError> {
        (**self).exists(mapping, predicate)
    }

    fn fetch_one(
        &self,
        mapping: &MappedType,
        predicate: &PrimaryKeyPredicate,
    ) -> Result<Option<Row>, StorageError> {
        (**self).fetch_one(mapping, predicate)
    }

    fn save(&self, request: SaveRequest<'_>) -> Result<SaveOutcome, StorageError> {
        (**self).save(request)
    }
}
