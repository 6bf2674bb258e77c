use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::StorageError;

/// Action taken when a write violates a table constraint.
///
/// Rendered into statements as the `OR <ACTION>` clause, e.g.
/// `INSERT OR REPLACE INTO ...` or `UPDATE OR IGNORE ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConflictAction {
    #[default]
    Abort,
    Rollback,
    Fail,
    Ignore,
    Replace,
}

impl ConflictAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ConflictAction::Abort => "ABORT",
            ConflictAction::Rollback => "ROLLBACK",
            ConflictAction::Fail => "FAIL",
            ConflictAction::Ignore => "IGNORE",
            ConflictAction::Replace => "REPLACE",
        }
    }
}

impl fmt::Display for ConflictAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for ConflictAction {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ABORT" => Ok(ConflictAction::Abort),
            "ROLLBACK" => Ok(ConflictAction::Rollback),
            "FAIL" => Ok(ConflictAction::Fail),
            "IGNORE" => Ok(ConflictAction::Ignore),
            "REPLACE" => Ok(ConflictAction::Replace),
            other => Err(StorageError::Configuration(format!(
                "Unknown conflict action: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_abort() {
        assert_eq!(ConflictAction::default(), ConflictAction::Abort);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(
            "replace".parse::<ConflictAction>().unwrap(),
            ConflictAction::Replace
        );
        assert!(matches!(
            "merge".parse::<ConflictAction>(),
            Err(StorageError::Configuration(_))
        ));
    }

    #[test]
    fn serializes_as_upper_case_name() {
        let json = serde_json::to_string(&ConflictAction::Ignore).unwrap();
        assert_eq!(json, "\"IGNORE\"");
        let back: ConflictAction = serde_json::from_str("\"FAIL\"").unwrap();
        assert_eq!(back, ConflictAction::Fail);
    }
}
