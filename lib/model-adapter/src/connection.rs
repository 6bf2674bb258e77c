//! Connection configuration and lifecycle.

use std::path::{Path, PathBuf};

use crate::StorageError;

/// Where a backend opens its database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionConfig {
    /// A database file on disk, created if missing.
    Path(PathBuf),
    /// A private in-memory database. Contents do not survive a reopen.
    InMemory,
}

impl ConnectionConfig {
    pub const IN_MEMORY_NAME: &'static str = ":memory:";
}

impl From<&str> for ConnectionConfig {
    fn from(path: &str) -> Self {
        if path == Self::IN_MEMORY_NAME {
            ConnectionConfig::InMemory
        } else {
            ConnectionConfig::Path(PathBuf::from(path))
        }
    }
}

impl From<String> for ConnectionConfig {
    fn from(path: String) -> Self {
        ConnectionConfig::from(path.as_str())
    }
}

impl From<&String> for ConnectionConfig {
    fn from(path: &String) -> Self {
        ConnectionConfig::from(path.as_str())
    }
}

impl From<PathBuf> for ConnectionConfig {
    fn from(path: PathBuf) -> Self {
        ConnectionConfig::Path(path)
    }
}

impl From<&Path> for ConnectionConfig {
    fn from(path: &Path) -> Self {
        ConnectionConfig::Path(path.to_path_buf())
    }
}

/// Trait for database connection and initialization.
///
/// Lets each backend implement its own open and table-creation logic.
pub trait DatabaseConnection: Sized + Send + Sync {
    /// Connect to the database using the provided configuration.
    fn connect(config: impl Into<ConnectionConfig>) -> Result<Self, StorageError>;

    /// Create the tables of every registered mapped type.
    fn initialize(&self) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_name_maps_to_in_memory() {
        assert_eq!(ConnectionConfig::from(":memory:"), ConnectionConfig::InMemory);
        assert_eq!(
            ConnectionConfig::from("app.db".to_string()),
            ConnectionConfig::Path(PathBuf::from("app.db"))
        );
    }
}
