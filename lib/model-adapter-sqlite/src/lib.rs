//! SQLite implementation for model-adapter.
//!
//! [`SqliteDatabase`] owns one writable connection and the registry of types
//! mapped onto it, and implements [`StorageExecutor`] so a [`ModelAdapter`]
//! can run its writes through it.
//!
//! # Usage
//!
//! ```text
//! use std::sync::Arc;
//! use model_adapter_sqlite::{DatabaseConnection, ModelAdapter, SqliteDatabase};
//!
//! let db = Arc::new(SqliteDatabase::connect(":memory:")?);
//! db.register::<User>()?;
//! db.initialize()?;
//!
//! let users: ModelAdapter<User, _> = ModelAdapter::new(Arc::clone(&db));
//! let mut ann = User { id: 0, name: "Ann".into() };
//! users.insert(&mut ann)?;
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod bind;
mod executor;

pub use executor::SqliteDatabase;

// Re-export core types for convenience
pub use model_adapter::{
    CacheId, Column, ConflictAction, ConnectionConfig, DatabaseConnection, InsertOutcome,
    MappedType, Model, ModelAdapter, PrimaryKeyPredicate, Row, SaveOutcome, SemanticType, SqlValue,
    StatementHandle, StorageDatetime, StorageError, StorageExecutor, codec,
};
