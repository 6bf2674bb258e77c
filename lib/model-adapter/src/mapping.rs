//! Mapped type descriptors.
//!
//! A [`MappedType`] binds one domain type to one table: table name, ordered
//! columns, primary key, optional autoincrement column and the conflict
//! actions applied on insert and update. Descriptors are const-constructible
//! so each domain type declares a single `static`:
//!
//! ```text
//! static USER: MappedType = MappedType::new("User", "users", &[
//!     Column::new("id", SemanticType::Integer),
//!     Column::new("name", SemanticType::Text),
//! ])
//! .primary_keys(&["id"])
//! .autoincrement("id");
//! ```

use std::collections::HashSet;

use crate::{ConflictAction, SemanticType, StorageError};

/// One mapped column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Database column name.
    pub name: &'static str,
    /// Serde field name on the record. Defaults to `name`.
    pub key: &'static str,
    pub semantic_type: SemanticType,
    pub nullable: bool,
    /// Declared `UNIQUE` in the table definition.
    pub unique: bool,
}

impl Column {
    pub const fn new(name: &'static str, semantic_type: SemanticType) -> Self {
        Self {
            name,
            key: name,
            semantic_type,
            nullable: false,
            unique: false,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Use a different serde field name (e.g. camelCase) for this column.
    pub const fn key(mut self, key: &'static str) -> Self {
        self.key = key;
        self
    }
}

/// Descriptor binding a domain type to a table schema.
#[derive(Debug, Clone, Copy)]
pub struct MappedType {
    pub type_name: &'static str,
    pub table: &'static str,
    pub columns: &'static [Column],
    pub primary_keys: &'static [&'static str],
    pub autoincrement: Option<&'static str>,
    pub insert_conflict: ConflictAction,
    pub update_conflict: ConflictAction,
}

impl MappedType {
    pub const fn new(
        type_name: &'static str,
        table: &'static str,
        columns: &'static [Column],
    ) -> Self {
        Self {
            type_name,
            table,
            columns,
            primary_keys: &[],
            autoincrement: None,
            insert_conflict: ConflictAction::Abort,
            update_conflict: ConflictAction::Abort,
        }
    }

    pub const fn primary_keys(mut self, keys: &'static [&'static str]) -> Self {
        self.primary_keys = keys;
        self
    }

    /// Mark a column as storage-assigned. It must also be the only primary key.
    pub const fn autoincrement(mut self, column: &'static str) -> Self {
        self.autoincrement = Some(column);
        self
    }

    pub const fn on_insert_conflict(mut self, action: ConflictAction) -> Self {
        self.insert_conflict = action;
        self
    }

    pub const fn on_update_conflict(mut self, action: ConflictAction) -> Self {
        self.update_conflict = action;
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn is_autoincrement(&self, name: &str) -> bool {
        self.autoincrement == Some(name)
    }

    /// Columns bound on insert and update: everything but the autoincrement column.
    pub fn writable_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(move |c| !self.is_autoincrement(c.name))
    }

    /// Check the declaration is internally consistent.
    pub fn validate(&self) -> Result<(), StorageError> {
        let mut seen = HashSet::new();
        for column in self.columns {
            if !seen.insert(column.name) {
                return Err(StorageError::Configuration(format!(
                    "{} declares column {} twice",
                    self.type_name, column.name
                )));
            }
        }

        for key in self.primary_keys {
            if self.column(key).is_none() {
                return Err(StorageError::Configuration(format!(
                    "{} declares primary key {} which is not a column",
                    self.type_name, key
                )));
            }
        }

        if let Some(auto) = self.autoincrement {
            let column = self.column(auto).ok_or_else(|| {
                StorageError::Configuration(format!(
                    "{} declares autoincrement column {} which is not a column",
                    self.type_name, auto
                ))
            })?;
            if column.semantic_type != SemanticType::Integer {
                return Err(StorageError::Configuration(format!(
                    "{} autoincrement column {} must be an integer column",
                    self.type_name, auto
                )));
            }
            if self.primary_keys != [auto] {
                return Err(StorageError::Configuration(format!(
                    "{} autoincrement column {} must be its single primary key",
                    self.type_name, auto
                )));
            }
        }

        Ok(())
    }

    /// `INSERT OR <action> INTO table (...) VALUES (?, ...)` over the writable columns.
    pub fn insert_sql(&self) -> String {
        let columns: Vec<String> = self
            .writable_columns()
            .map(|c| quote_identifier(c.name))
            .collect();

        if columns.is_empty() {
            return format!(
                "INSERT OR {} INTO {} DEFAULT VALUES",
                self.insert_conflict,
                quote_identifier(self.table)
            );
        }

        let placeholders = vec!["?"; columns.len()];
        format!(
            "INSERT OR {} INTO {} ({}) VALUES ({})",
            self.insert_conflict,
            quote_identifier(self.table),
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this type.
    pub fn creation_sql(&self) -> String {
        let mut definitions: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut def = format!("{} {}", quote_identifier(c.name), c.semantic_type.sql_name());
                if self.is_autoincrement(c.name) {
                    def.push_str(" PRIMARY KEY AUTOINCREMENT");
                } else if !c.nullable {
                    def.push_str(" NOT NULL");
                }
                if c.unique {
                    def.push_str(" UNIQUE");
                }
                def
            })
            .collect();

        if self.autoincrement.is_none() && !self.primary_keys.is_empty() {
            let keys: Vec<String> = self
                .primary_keys
                .iter()
                .map(|k| quote_identifier(k))
                .collect();
            definitions.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(self.table),
            definitions.join(", ")
        )
    }

    /// `UPDATE OR <action> table SET ... <where_clause>`.
    ///
    /// Parameters are the writable columns in order, followed by the
    /// where clause's parameters.
    pub fn update_sql(&self, where_clause: &str) -> String {
        let mut assignments: Vec<String> = self
            .writable_columns()
            .map(|c| format!("{} = ?", quote_identifier(c.name)))
            .collect();

        // Only an autoincrement key: nothing to assign, keep the statement valid.
        if assignments.is_empty() {
            if let Some(auto) = self.autoincrement {
                let quoted = quote_identifier(auto);
                assignments.push(format!("{} = {}", quoted, quoted));
            }
        }

        format!(
            "UPDATE OR {} {} SET {}{}",
            self.update_conflict,
            quote_identifier(self.table),
            assignments.join(", "),
            where_clause
        )
    }

    pub fn delete_sql(&self, where_clause: &str) -> String {
        format!("DELETE FROM {}{}", quote_identifier(self.table), where_clause)
    }

    pub fn select_sql(&self, where_clause: &str) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| quote_identifier(c.name)).collect();
        format!(
            "SELECT {} FROM {}{}",
            columns.join(", "),
            quote_identifier(self.table),
            where_clause
        )
    }

    pub fn exists_sql(&self, where_clause: &str) -> String {
        format!(
            "SELECT EXISTS(SELECT 1 FROM {}{})",
            quote_identifier(self.table),
            where_clause
        )
    }
}

/// Quote an identifier for use in SQL text.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    static USER: MappedType = MappedType::new(
        "User",
        "users",
        &[
            Column::new("id", SemanticType::Integer),
            Column::new("name", SemanticType::Text),
            Column::new("nickname", SemanticType::Text).nullable(),
        ],
    )
    .primary_keys(&["id"])
    .autoincrement("id");

    static MEMBERSHIP: MappedType = MappedType::new(
        "Membership",
        "memberships",
        &[
            Column::new("team", SemanticType::Text),
            Column::new("user_id", SemanticType::Integer).key("userId"),
        ],
    )
    .primary_keys(&["team", "user_id"])
    .on_insert_conflict(ConflictAction::Replace)
    .on_update_conflict(ConflictAction::Ignore);

    #[test]
    fn insert_sql_skips_autoincrement_and_uses_conflict_action() {
        assert_eq!(
            USER.insert_sql(),
            r#"INSERT OR ABORT INTO "users" ("name", "nickname") VALUES (?, ?)"#
        );
        assert_eq!(
            MEMBERSHIP.insert_sql(),
            r#"INSERT OR REPLACE INTO "memberships" ("team", "user_id") VALUES (?, ?)"#
        );
    }

    #[test]
    fn creation_sql_declares_keys() {
        assert_eq!(
            USER.creation_sql(),
            r#"CREATE TABLE IF NOT EXISTS "users" ("id" INTEGER PRIMARY KEY AUTOINCREMENT, "name" TEXT NOT NULL, "nickname" TEXT)"#
        );
        assert_eq!(
            MEMBERSHIP.creation_sql(),
            r#"CREATE TABLE IF NOT EXISTS "memberships" ("team" TEXT NOT NULL, "user_id" INTEGER NOT NULL, PRIMARY KEY ("team", "user_id"))"#
        );
    }

    #[test]
    fn creation_sql_declares_unique_columns() {
        static ACCOUNT: MappedType = MappedType::new(
            "Account",
            "accounts",
            &[
                Column::new("id", SemanticType::Integer),
                Column::new("email", SemanticType::Text).unique(),
                Column::new("handle", SemanticType::Text).nullable().unique(),
            ],
        )
        .primary_keys(&["id"])
        .autoincrement("id");

        assert_eq!(
            ACCOUNT.creation_sql(),
            r#"CREATE TABLE IF NOT EXISTS "accounts" ("id" INTEGER PRIMARY KEY AUTOINCREMENT, "email" TEXT NOT NULL UNIQUE, "handle" TEXT UNIQUE)"#
        );
    }

    #[test]
    fn update_sql_uses_update_conflict_action() {
        assert_eq!(
            MEMBERSHIP.update_sql(" WHERE \"team\" = ?"),
            r#"UPDATE OR IGNORE "memberships" SET "team" = ?, "user_id" = ? WHERE "team" = ?"#
        );
    }

    #[test]
    fn key_only_tables_still_render_valid_statements() {
        static COUNTER: MappedType =
            MappedType::new("Counter", "counters", &[Column::new("id", SemanticType::Integer)])
                .primary_keys(&["id"])
                .autoincrement("id");

        assert_eq!(
            COUNTER.insert_sql(),
            r#"INSERT OR ABORT INTO "counters" DEFAULT VALUES"#
        );
        assert_eq!(
            COUNTER.update_sql(""),
            r#"UPDATE OR ABORT "counters" SET "id" = "id""#
        );
    }

    #[test]
    fn validate_accepts_well_formed_types() {
        USER.validate().unwrap();
        MEMBERSHIP.validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_declarations() {
        static TEXT_AUTO: MappedType =
            MappedType::new("Tag", "tags", &[Column::new("slug", SemanticType::Text)])
                .primary_keys(&["slug"])
                .autoincrement("slug");
        static MISSING_KEY: MappedType =
            MappedType::new("Tag", "tags", &[Column::new("slug", SemanticType::Text)])
                .primary_keys(&["id"]);
        static DUPLICATE: MappedType = MappedType::new(
            "Tag",
            "tags",
            &[
                Column::new("slug", SemanticType::Text),
                Column::new("slug", SemanticType::Text),
            ],
        );
        static AUTO_NOT_KEY: MappedType = MappedType::new(
            "Tag",
            "tags",
            &[
                Column::new("id", SemanticType::Integer),
                Column::new("slug", SemanticType::Text),
            ],
        )
        .primary_keys(&["slug"])
        .autoincrement("id");

        for mapping in [&TEXT_AUTO, &MISSING_KEY, &DUPLICATE, &AUTO_NOT_KEY] {
            assert!(matches!(
                mapping.validate(),
                Err(StorageError::Configuration(_))
            ));
        }
    }

    #[test]
    fn quote_identifier_escapes_quotes() {
        assert_eq!(quote_identifier(r#"we"ird"#), r#""we""ird""#);
    }
}
