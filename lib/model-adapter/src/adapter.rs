//! CRUD dispatch for one mapped type.
//!
//! A [`ModelAdapter`] pairs a [`Model`] type with a [`StorageExecutor`]. It
//! owns the two lazily built per-type resources: the primary-key predicate
//! and the compiled insert statement. Row values come from the codec; the
//! executor performs the writes.

use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::codec;
use crate::{
    CacheId, InsertOutcome, MappedType, Model, OnceCache, PrimaryKeyPredicate, Row, SaveOutcome,
    SaveRequest, SqlValue, StatementCache, StatementHandle, StorageError, StorageExecutor,
};

/// Dispatches save/insert/update/delete for `T` to an executor.
///
/// `Send + Sync` whenever the executor is; share it behind an `Arc` to use
/// one adapter (and so one cached statement and predicate) across threads.
pub struct ModelAdapter<T, E> {
    executor: E,
    primary_where: OnceCache<Mutex<PrimaryKeyPredicate>>,
    insert_statement: StatementCache,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Model, E: StorageExecutor> ModelAdapter<T, E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            primary_where: OnceCache::new(),
            insert_statement: StatementCache::new(),
            _marker: PhantomData,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn mapped_type(&self) -> &'static MappedType {
        T::mapped_type()
    }

    /// The cached primary-key predicate, locked and reset to unbound.
    ///
    /// Built once through [`Model::create_primary_key_predicate`]. Bind and
    /// execute while holding the guard; do not call other adapter methods
    /// that use the predicate until it is dropped.
    pub fn primary_key_predicate(
        &self,
    ) -> Result<MutexGuard<'_, PrimaryKeyPredicate>, StorageError> {
        let cell = self.primary_where.get_or_try_init(|| {
            let predicate = T::create_primary_key_predicate()?;
            debug!(
                table = predicate.table(),
                predicate = %predicate,
                "built primary key predicate"
            );
            Ok::<_, StorageError>(Mutex::new(predicate))
        })?;

        let mut predicate = cell.lock().unwrap_or_else(PoisonError::into_inner);
        predicate.set_use_empty_params(true);
        Ok(predicate)
    }

    /// The compiled insert statement, compiled on first use and again after
    /// the executor replaces its connection.
    pub fn insert_statement(&self) -> Result<StatementHandle, StorageError> {
        let generation = self.executor.connection_generation();
        self.insert_statement.get_or_compile(generation, || {
            let mapping = T::mapped_type();
            let sql = T::insert_statement_sql();
            let handle = self.executor.compile_statement(mapping, &sql)?;
            debug!(
                table = mapping.table,
                generation = handle.generation(),
                sql = handle.sql(),
                "compiled insert statement"
            );
            Ok(handle)
        })
    }

    /// Discard the cached insert statement; the next insert recompiles.
    pub fn reset_insert_statement(&self) {
        self.insert_statement.invalidate();
    }

    /// Decode a new record from a row read off a cursor.
    pub fn load_from_row(&self, row: &Row) -> Result<T, StorageError> {
        codec::from_row(row)
    }

    /// Insert the record, or update it if a row with its key exists.
    ///
    /// A record whose autoincrement key is NULL has never been stored and
    /// goes straight to the insert.
    pub fn save(&self, record: &mut T) -> Result<SaveOutcome, StorageError> {
        let mapping = T::mapped_type();
        let row = codec::to_row(record)?;
        let values = codec::writable_values(mapping, &row);
        let statement = self.insert_statement()?;

        let outcome = if Self::is_unsaved(&row) {
            self.executor
                .insert(&statement, &values)
                .map(SaveOutcome::Inserted)
                .inspect_err(|e| warn!(table = mapping.table, error = %e, "save failed"))?
        } else {
            let mut predicate = self.primary_key_predicate()?;
            predicate.bind_row(&row)?;
            self.executor
                .save(SaveRequest {
                    mapping,
                    statement: &statement,
                    insert_values: &values,
                    update_values: &values,
                    predicate: &predicate,
                })
                .inspect_err(|e| warn!(table = mapping.table, error = %e, "save failed"))?
        };

        trace!(table = mapping.table, outcome = ?outcome, "saved record");
        if let SaveOutcome::Inserted(inserted) = outcome {
            self.write_back_id(record, inserted);
        }
        Ok(outcome)
    }

    /// Insert the record with the cached insert statement.
    ///
    /// When a row is written and the type has an autoincrement column, the
    /// generated key is stored into the record.
    pub fn insert(&self, record: &mut T) -> Result<InsertOutcome, StorageError> {
        let mapping = T::mapped_type();
        let values = codec::insert_values(record)?;
        let statement = self.insert_statement()?;

        let outcome = self
            .executor
            .insert(&statement, &values)
            .inspect_err(|e| warn!(table = mapping.table, error = %e, "insert failed"))?;

        trace!(table = mapping.table, outcome = ?outcome, "inserted record");
        self.write_back_id(record, outcome);
        Ok(outcome)
    }

    /// Update the stored row with the record's key. Returns rows affected;
    /// zero means no row had that key.
    pub fn update(&self, record: &T) -> Result<u64, StorageError> {
        let mapping = T::mapped_type();
        let row = codec::to_row(record)?;
        if Self::is_unsaved(&row) {
            return Ok(0);
        }
        let values = codec::writable_values(mapping, &row);

        let mut predicate = self.primary_key_predicate()?;
        predicate.bind_row(&row)?;
        let rows = self
            .executor
            .update(mapping, &values, &predicate)
            .inspect_err(|e| warn!(table = mapping.table, error = %e, "update failed"))?;

        trace!(table = mapping.table, predicate = %*predicate, rows, "updated record");
        Ok(rows)
    }

    /// Delete the stored row with the record's key. Returns rows affected.
    pub fn delete(&self, record: &T) -> Result<u64, StorageError> {
        let mapping = T::mapped_type();
        let row = codec::to_row(record)?;
        if Self::is_unsaved(&row) {
            return Ok(0);
        }

        let mut predicate = self.primary_key_predicate()?;
        predicate.bind_row(&row)?;
        let rows = self
            .executor
            .delete(mapping, &predicate)
            .inspect_err(|e| warn!(table = mapping.table, error = %e, "delete failed"))?;

        trace!(table = mapping.table, predicate = %*predicate, rows, "deleted record");
        Ok(rows)
    }

    /// Whether a row with the record's key is stored.
    pub fn exists(&self, record: &T) -> Result<bool, StorageError> {
        let mapping = T::mapped_type();
        let row = codec::to_row(record)?;
        if Self::is_unsaved(&row) {
            return Ok(false);
        }

        let mut predicate = self.primary_key_predicate()?;
        predicate.bind_row(&row)?;
        self.executor.exists(mapping, &predicate)
    }

    /// Read back the stored version of the record, as a new instance.
    pub fn load(&self, record: &T) -> Result<Option<T>, StorageError> {
        let mapping = T::mapped_type();
        let row = codec::to_row(record)?;
        if Self::is_unsaved(&row) {
            return Ok(None);
        }

        let stored = {
            let mut predicate = self.primary_key_predicate()?;
            predicate.bind_row(&row)?;
            self.executor.fetch_one(mapping, &predicate)?
        };
        stored.map(|row| codec::from_row(&row)).transpose()
    }

    pub fn auto_incrementing_id(&self, record: &T) -> Result<i64, StorageError> {
        record.auto_incrementing_id()
    }

    pub fn caching_id(&self, record: &T) -> Result<CacheId, StorageError> {
        record.caching_id()
    }

    pub fn caching_column_name(&self) -> Result<&'static str, StorageError> {
        T::caching_column_name()
    }

    pub fn caching_id_from_row(&self, row: &Row, index: usize) -> Result<CacheId, StorageError> {
        T::caching_id_from_row(row, index)
    }

    /// NULL in the autoincrement column: no stored row can match.
    fn is_unsaved(row: &Row) -> bool {
        T::mapped_type()
            .autoincrement
            .and_then(|column| row.get(column))
            .is_some_and(SqlValue::is_null)
    }

    fn write_back_id(&self, record: &mut T, outcome: InsertOutcome) {
        if T::mapped_type().autoincrement.is_none() || outcome.rows_affected == 0 {
            return;
        }
        if let Some(id) = outcome.generated_id {
            record.update_auto_increment(id);
        }
    }
}
