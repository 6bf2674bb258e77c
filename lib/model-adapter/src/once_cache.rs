use std::sync::{Mutex, OnceLock, PoisonError};

/// A value computed at most once, on first use, under a lock.
///
/// Readers that find the value populated never take the lock. The first
/// caller to find it empty takes the init lock, checks again, and runs the
/// initializer; concurrent callers wait and then see the stored value.
/// A failing initializer stores nothing, so the next caller retries.
#[derive(Debug)]
pub struct OnceCache<T> {
    cell: OnceLock<T>,
    init: Mutex<()>,
}

impl<T> OnceCache<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// The cached value, if initialized.
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let value = init()?;
        Ok(self.cell.get_or_init(|| value))
    }

    /// Drop the cached value. Requires exclusive access.
    pub fn take(&mut self) -> Option<T> {
        self.cell.take()
    }
}

impl<T> Default for OnceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn initializes_once_across_threads() {
        let cache = Arc::new(OnceCache::<usize>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    *cache
                        .get_or_try_init(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, ()>(42)
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_initialization_is_not_cached() {
        let cache = OnceCache::<u8>::new();
        assert_eq!(cache.get_or_try_init(|| Err("boom")), Err("boom"));
        assert!(cache.get().is_none());
        assert_eq!(cache.get_or_try_init(|| Ok::<_, &str>(3)), Ok(&3));
    }

    #[test]
    fn take_resets() {
        let mut cache = OnceCache::<u8>::new();
        cache.get_or_try_init(|| Ok::<_, ()>(1)).unwrap();
        assert_eq!(cache.take(), Some(1));
        assert!(cache.get().is_none());
    }
}
