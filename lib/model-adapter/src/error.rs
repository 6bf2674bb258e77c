use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// A mapped type lacks a declaration the caller relied on. Never retried.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Type mismatch on column {column}: expected {expected}, found {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("Unbound parameter for column {0}")]
    UnboundParameter(String),

    #[error(
        "Stale statement for table {table}: compiled against connection {compiled}, current is {current}"
    )]
    StaleStatement {
        table: String,
        compiled: u64,
        current: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl StorageError {
    pub fn mismatch(
        column: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        StorageError::TypeMismatch {
            column: column.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
