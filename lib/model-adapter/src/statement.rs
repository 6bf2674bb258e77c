//! Compiled statement handles and their per-adapter cache.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::StorageError;

#[derive(Debug)]
struct CompiledStatement {
    table: &'static str,
    sql: String,
    parameter_count: usize,
    generation: u64,
}

/// A statement compiled against one connection generation.
///
/// Cloning is cheap and clones compare equal under [`StatementHandle::ptr_eq`].
/// Executors must refuse a handle whose generation is not their current one.
#[derive(Debug, Clone)]
pub struct StatementHandle {
    inner: Arc<CompiledStatement>,
}

impl StatementHandle {
    pub fn new(
        table: &'static str,
        sql: impl Into<String>,
        parameter_count: usize,
        generation: u64,
    ) -> Self {
        Self {
            inner: Arc::new(CompiledStatement {
                table,
                sql: sql.into(),
                parameter_count,
                generation,
            }),
        }
    }

    pub fn table(&self) -> &'static str {
        self.inner.table
    }

    pub fn sql(&self) -> &str {
        &self.inner.sql
    }

    pub fn parameter_count(&self) -> usize {
        self.inner.parameter_count
    }

    /// Connection generation this handle was compiled against.
    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    /// Whether both handles come from the same compilation.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn ensure_current(&self, current: u64) -> Result<(), StorageError> {
        if self.generation() != current {
            return Err(StorageError::StaleStatement {
                table: self.table().to_string(),
                compiled: self.generation(),
                current,
            });
        }
        Ok(())
    }
}

/// Lazily compiled statement, recompiled when the connection generation moves.
#[derive(Debug, Default)]
pub struct StatementCache {
    slot: Mutex<Option<StatementHandle>>,
}

impl StatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached handle if it matches `current_generation`, otherwise
    /// compile a new one. Check, compile and store happen under one lock.
    pub fn get_or_compile(
        &self,
        current_generation: u64,
        compile: impl FnOnce() -> Result<StatementHandle, StorageError>,
    ) -> Result<StatementHandle, StorageError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(handle) = slot.as_ref() {
            if handle.generation() == current_generation {
                return Ok(handle.clone());
            }
            debug!(
                table = handle.table(),
                compiled = handle.generation(),
                current = current_generation,
                "discarding statement compiled against a replaced connection"
            );
        }

        let handle = compile()?;
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// The cached handle, without compiling.
    pub fn current(&self) -> Option<StatementHandle> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Discard the cached handle; the next use recompiles.
    pub fn invalidate(&self) -> Option<StatementHandle> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn compile_counting(counter: &Cell<u32>, generation: u64) -> Result<StatementHandle, StorageError> {
        counter.set(counter.get() + 1);
        Ok(StatementHandle::new("users", "INSERT", 1, generation))
    }

    #[test]
    fn reuses_handle_within_a_generation() {
        let cache = StatementCache::new();
        let compiled = Cell::new(0);

        let first = cache.get_or_compile(0, || compile_counting(&compiled, 0)).unwrap();
        let second = cache.get_or_compile(0, || compile_counting(&compiled, 0)).unwrap();

        assert!(StatementHandle::ptr_eq(&first, &second));
        assert_eq!(compiled.get(), 1);
    }

    #[test]
    fn recompiles_after_generation_change() {
        let cache = StatementCache::new();
        let compiled = Cell::new(0);

        let first = cache.get_or_compile(0, || compile_counting(&compiled, 0)).unwrap();
        let second = cache.get_or_compile(1, || compile_counting(&compiled, 1)).unwrap();

        assert!(!StatementHandle::ptr_eq(&first, &second));
        assert_eq!(second.generation(), 1);
        assert_eq!(compiled.get(), 2);
    }

    #[test]
    fn invalidate_forces_recompile() {
        let cache = StatementCache::new();
        let compiled = Cell::new(0);

        cache.get_or_compile(0, || compile_counting(&compiled, 0)).unwrap();
        assert!(cache.invalidate().is_some());
        assert!(cache.current().is_none());
        cache.get_or_compile(0, || compile_counting(&compiled, 0)).unwrap();
        assert_eq!(compiled.get(), 2);
    }

    #[test]
    fn stale_handles_are_reported() {
        let handle = StatementHandle::new("users", "INSERT", 1, 3);
        handle.ensure_current(3).unwrap();
        assert!(matches!(
            handle.ensure_current(4),
            Err(StorageError::StaleStatement {
                compiled: 3,
                current: 4,
                ..
            })
        ));
    }
}
