//! Primary-key predicates.
//!
//! A [`PrimaryKeyPredicate`] is the `WHERE` condition that identifies one
//! stored record. Its shape (table and key columns) is fixed when built; its
//! parameter slots are rebound before every execution.

use std::fmt;

use crate::mapping::quote_identifier;
use crate::{MappedType, Row, SemanticType, SqlValue, StorageError};

#[derive(Debug, Clone)]
struct Slot {
    column: &'static str,
    semantic_type: SemanticType,
    value: Option<SqlValue>,
}

/// Equality condition over a table's primary-key columns.
#[derive(Debug, Clone)]
pub struct PrimaryKeyPredicate {
    table: &'static str,
    slots: Vec<Slot>,
    use_empty_params: bool,
}

impl PrimaryKeyPredicate {
    /// Build the predicate for `columns` of `mapping`.
    ///
    /// Fails with a configuration error if `columns` is empty or names a
    /// column the type does not map.
    pub fn new(mapping: &MappedType, columns: &[&'static str]) -> Result<Self, StorageError> {
        if columns.is_empty() {
            return Err(StorageError::Configuration(format!(
                "{} declares no primary key columns; a primary key predicate cannot be built",
                mapping.type_name
            )));
        }

        let slots = columns
            .iter()
            .map(|name| {
                let column = mapping.column(name).ok_or_else(|| {
                    StorageError::Configuration(format!(
                        "{} primary key {} is not a mapped column",
                        mapping.type_name, name
                    ))
                })?;
                Ok(Slot {
                    column: column.name,
                    semantic_type: column.semantic_type,
                    value: None,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        Ok(Self {
            table: mapping.table,
            slots,
            use_empty_params: true,
        })
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.iter().map(|s| s.column)
    }

    /// Switch to unbound mode. Turning it on clears every bound value.
    pub fn set_use_empty_params(&mut self, use_empty_params: bool) {
        if use_empty_params {
            for slot in &mut self.slots {
                slot.value = None;
            }
        }
        self.use_empty_params = use_empty_params;
    }

    pub fn uses_empty_params(&self) -> bool {
        self.use_empty_params
    }

    /// True once every slot holds a value.
    pub fn is_bound(&self) -> bool {
        self.slots.iter().all(|s| s.value.is_some())
    }

    /// Bind one key column.
    pub fn bind(
        &mut self,
        column: &str,
        value: impl Into<SqlValue>,
    ) -> Result<&mut Self, StorageError> {
        let table = self.table;
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.column == column)
            .ok_or_else(|| {
                StorageError::Configuration(format!(
                    "{} is not a primary key column of {}",
                    column, table
                ))
            })?;

        let value = value.into();
        if value.semantic_type() != Some(slot.semantic_type) {
            return Err(StorageError::mismatch(
                slot.column,
                slot.semantic_type,
                value.type_name(),
            ));
        }
        slot.value = Some(value);

        if self.is_bound() {
            self.use_empty_params = false;
        }
        Ok(self)
    }

    /// Bind every key column from a record's row.
    pub fn bind_row(&mut self, row: &Row) -> Result<&mut Self, StorageError> {
        for idx in 0..self.slots.len() {
            let column = self.slots[idx].column;
            let value = row
                .get(column)
                .ok_or_else(|| StorageError::UnboundParameter(column.to_string()))?;
            self.bind(column, value.clone())?;
        }
        Ok(self)
    }

    /// ` WHERE "a" = ? AND "b" = ?` with one placeholder per key column.
    pub fn where_clause(&self) -> String {
        let clauses: Vec<String> = self
            .slots
            .iter()
            .map(|s| format!("{} = ?", quote_identifier(s.column)))
            .collect();
        format!(" WHERE {}", clauses.join(" AND "))
    }

    /// Bound values in placeholder order.
    pub fn parameters(&self) -> Result<Vec<SqlValue>, StorageError> {
        self.slots
            .iter()
            .map(|s| {
                s.value
                    .clone()
                    .ok_or_else(|| StorageError::UnboundParameter(s.column.to_string()))
            })
            .collect()
    }
}

/// Renders literal values where bound and `?` elsewhere. For logging only.
impl fmt::Display for PrimaryKeyPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, slot) in self.slots.iter().enumerate() {
            if idx > 0 {
                f.write_str(" AND ")?;
            }
            match &slot.value {
                Some(value) if !self.use_empty_params => {
                    write!(f, "{} = {}", quote_identifier(slot.column), value)?
                }
                _ => write!(f, "{} = ?", quote_identifier(slot.column))?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Column;

    static MEMBERSHIP: MappedType = MappedType::new(
        "Membership",
        "memberships",
        &[
            Column::new("team", SemanticType::Text),
            Column::new("user_id", SemanticType::Integer),
            Column::new("role", SemanticType::Text),
        ],
    )
    .primary_keys(&["team", "user_id"]);

    fn predicate() -> PrimaryKeyPredicate {
        PrimaryKeyPredicate::new(&MEMBERSHIP, MEMBERSHIP.primary_keys).unwrap()
    }

    #[test]
    fn renders_one_placeholder_per_key() {
        let p = predicate();
        assert_eq!(p.where_clause(), r#" WHERE "team" = ? AND "user_id" = ?"#);
        assert_eq!(p.columns().collect::<Vec<_>>(), ["team", "user_id"]);
        assert!(p.uses_empty_params());
    }

    #[test]
    fn parameters_require_every_slot() {
        let mut p = predicate();
        p.bind("team", "core").unwrap();
        assert!(!p.is_bound());
        assert!(matches!(
            p.parameters(),
            Err(StorageError::UnboundParameter(column)) if column == "user_id"
        ));

        p.bind("user_id", 9_i64).unwrap();
        assert!(p.is_bound());
        assert!(!p.uses_empty_params());
        assert_eq!(
            p.parameters().unwrap(),
            vec![SqlValue::Text("core".into()), SqlValue::Integer(9)]
        );
        assert_eq!(p.to_string(), r#""team" = 'core' AND "user_id" = 9"#);
    }

    #[test]
    fn empty_params_mode_clears_bindings() {
        let mut p = predicate();
        let row = Row::new()
            .with("team", "core")
            .with("user_id", 9_i64)
            .with("role", "owner");
        p.bind_row(&row).unwrap();
        assert!(p.is_bound());

        p.set_use_empty_params(true);
        assert!(!p.is_bound());
        assert_eq!(p.to_string(), r#""team" = ? AND "user_id" = ?"#);
    }

    #[test]
    fn bind_checks_declared_types_and_columns() {
        let mut p = predicate();
        assert!(matches!(
            p.bind("user_id", "nine"),
            Err(StorageError::TypeMismatch { .. })
        ));
        assert!(matches!(
            p.bind("role", "owner"),
            Err(StorageError::Configuration(_))
        ));
        assert!(matches!(
            p.bind("team", SqlValue::Null),
            Err(StorageError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn bind_row_reports_missing_key_columns() {
        let mut p = predicate();
        let row = Row::new().with("team", "core");
        assert!(matches!(
            p.bind_row(&row),
            Err(StorageError::UnboundParameter(column)) if column == "user_id"
        ));
    }

    #[test]
    fn requires_at_least_one_key_column() {
        static LOG: MappedType =
            MappedType::new("LogLine", "log_lines", &[Column::new("line", SemanticType::Text)]);
        assert!(matches!(
            PrimaryKeyPredicate::new(&LOG, LOG.primary_keys),
            Err(StorageError::Configuration(_))
        ));
    }
}
