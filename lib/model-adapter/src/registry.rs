//! Registry of mapped types.
//!
//! Executors route a type to its connection through the registry: a table
//! that was never registered has no connection to compile against.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::{MappedType, Model, StorageError};

#[derive(Debug)]
struct Registered {
    mapping: &'static MappedType,
    creation_sql: String,
}

#[derive(Debug, Default)]
struct Entries {
    registered: Vec<Registered>,
    by_type: HashMap<TypeId, usize>,
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<Entries>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and record `T`'s mapped type. Registering `T` again is a no-op.
    pub fn register<T: Model + 'static>(&self) -> Result<&'static MappedType, StorageError> {
        let mapping = T::mapped_type();
        let type_id = TypeId::of::<T>();

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if entries.by_type.contains_key(&type_id) {
            return Ok(mapping);
        }
        if let Some(existing) = entries
            .registered
            .iter()
            .find(|e| e.mapping.table == mapping.table)
        {
            return Err(StorageError::Configuration(format!(
                "Table {} is already mapped by {}",
                mapping.table, existing.mapping.type_name
            )));
        }
        mapping.validate()?;

        debug!(
            type_name = mapping.type_name,
            table = mapping.table,
            "registered mapped type"
        );
        let idx = entries.registered.len();
        entries.by_type.insert(type_id, idx);
        entries.registered.push(Registered {
            mapping,
            creation_sql: T::creation_sql().into_owned(),
        });
        Ok(mapping)
    }

    pub fn mapping_for<T: 'static>(&self) -> Result<&'static MappedType, StorageError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .by_type
            .get(&TypeId::of::<T>())
            .and_then(|idx| entries.registered.get(*idx))
            .map(|e| e.mapping)
            .ok_or_else(|| {
                StorageError::Configuration(format!(
                    "{} is not registered",
                    std::any::type_name::<T>()
                ))
            })
    }

    pub fn mapping_for_table(&self, table: &str) -> Result<&'static MappedType, StorageError> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .registered
            .iter()
            .find(|e| e.mapping.table == table)
            .map(|e| e.mapping)
            .ok_or_else(|| {
                StorageError::Configuration(format!(
                    "No mapped type is registered for table {}",
                    table
                ))
            })
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_type
            .contains_key(&TypeId::of::<T>())
    }

    /// Table definitions in registration order.
    pub fn creation_statements(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .registered
            .iter()
            .map(|e| e.creation_sql.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .registered
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{Column, SemanticType};

    #[derive(Serialize, Deserialize)]
    struct Tag {
        slug: String,
    }

    #[derive(Serialize, Deserialize)]
    struct Label {
        slug: String,
    }

    #[derive(Serialize, Deserialize)]
    struct Broken {
        id: i64,
    }

    static TAG: MappedType =
        MappedType::new("Tag", "tags", &[Column::new("slug", SemanticType::Text)])
            .primary_keys(&["slug"]);

    static BROKEN: MappedType =
        MappedType::new("Broken", "broken", &[Column::new("id", SemanticType::Integer)])
            .primary_keys(&["missing"]);

    impl Model for Tag {
        fn mapped_type() -> &'static MappedType {
            &TAG
        }
    }

    // Deliberately maps onto the same table as Tag.
    impl Model for Label {
        fn mapped_type() -> &'static MappedType {
            &TAG
        }
    }

    impl Model for Broken {
        fn mapped_type() -> &'static MappedType {
            &BROKEN
        }
    }

    #[test]
    fn registers_and_looks_up_by_type_and_table() {
        let registry = Registry::new();
        registry.register::<Tag>().unwrap();
        registry.register::<Tag>().unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.is_registered::<Tag>());
        assert_eq!(registry.mapping_for::<Tag>().unwrap().table, "tags");
        assert_eq!(registry.mapping_for_table("tags").unwrap().type_name, "Tag");
        assert_eq!(
            registry.creation_statements(),
            vec![r#"CREATE TABLE IF NOT EXISTS "tags" ("slug" TEXT NOT NULL, PRIMARY KEY ("slug"))"#]
        );
    }

    #[test]
    fn unknown_types_are_configuration_errors() {
        let registry = Registry::new();
        assert!(matches!(
            registry.mapping_for::<Tag>(),
            Err(StorageError::Configuration(_))
        ));
        assert!(matches!(
            registry.mapping_for_table("tags"),
            Err(StorageError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_second_type_on_same_table_and_invalid_mappings() {
        let registry = Registry::new();
        registry.register::<Tag>().unwrap();
        assert!(matches!(
            registry.register::<Label>(),
            Err(StorageError::Configuration(_))
        ));
        assert!(matches!(
            registry.register::<Broken>(),
            Err(StorageError::Configuration(_))
        ));
        assert_eq!(registry.len(), 1);
    }
}
