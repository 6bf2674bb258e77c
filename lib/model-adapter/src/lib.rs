//! Model Adapter - per-type persistence plumbing for table-mapped records.
//!
//! Each domain type declares how it maps onto a table by implementing
//! [`Model`]. A [`ModelAdapter`] then moves records between that type and a
//! storage backend.
//!
//! # Core Concepts
//!
//! - **Mapped type**: a static [`MappedType`] naming the table, its columns
//!   with their [`SemanticType`], the primary key and the conflict policies.
//! - **Primary-key predicate**: a reusable `WHERE` clause over the key
//!   columns, built once per adapter and rebound for every operation.
//! - **Insert statement**: compiled lazily, shared by every insert, and
//!   recompiled when the backend replaces its connection.
//!
//! # Traits
//!
//! - [`Model`]: capability set of a mapped type, with overridable hooks for
//!   autoincrement keys and cache identity
//! - [`StorageExecutor`]: the backend that runs compiled statements
//! - [`DatabaseConnection`]: how a backend opens and initializes storage

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::unwrap_in_result,
        clippy::panic
    )
)]

mod adapter;
pub mod codec;
mod conflict;
mod connection;
mod error;
mod executor;
mod mapping;
mod model;
mod once_cache;
mod predicate;
mod registry;
mod statement;
mod time;
mod value;

pub use adapter::ModelAdapter;
pub use conflict::ConflictAction;
pub use connection::{ConnectionConfig, DatabaseConnection};
pub use error::StorageError;
pub use executor::{InsertOutcome, SaveOutcome, SaveRequest, StorageExecutor};
pub use mapping::{Column, MappedType, quote_identifier};
pub use model::{CacheId, Model};
pub use once_cache::OnceCache;
pub use predicate::PrimaryKeyPredicate;
pub use registry::Registry;
pub use statement::{StatementCache, StatementHandle};
pub use time::StorageDatetime;
pub use value::{Row, SemanticType, SqlValue};
