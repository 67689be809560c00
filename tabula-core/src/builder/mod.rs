//! SQL part builders
//!
//! Each part renders one clause of a statement through [`QueryPart`]. The
//! [`QueryBuilder`](crate::QueryBuilder) assembles them into full statements.

pub mod create;
pub mod delete;
pub mod from;
pub mod insert;
pub mod mass_update;
pub mod select;
pub mod update;
pub mod where_clause;

pub use create::Create;
pub use delete::Delete;
pub use from::FromTables;
pub use insert::Insert;
pub use mass_update::MassUpdate;
pub use select::Select;
pub use update::Update;
pub use where_clause::Where;

use crate::naming::FieldTransformer;
use crate::registry::Registry;
use std::sync::Arc;

/// Resolves application field names to column names.
///
/// Registry aliases of the tables in scope win, then the naming transformer,
/// then the name is used as is. `table.field` names are resolved against
/// their own table only.
#[derive(Debug, Clone, Default)]
pub struct FieldMapper {
    registry: Option<Arc<Registry>>,
    transformer: Option<Arc<dyn FieldTransformer>>,
}

impl FieldMapper {
    pub fn new(
        registry: Option<Arc<Registry>>,
        transformer: Option<Arc<dyn FieldTransformer>>,
    ) -> Self {
        Self {
            registry,
            transformer,
        }
    }

    pub fn storage_name<S: AsRef<str>>(&self, tables: &[S], field: &str) -> String {
        if field == "*" {
            return field.to_string();
        }
        if let Some((table, column)) = field.rsplit_once('.') {
            let column = self.resolve(&[table], column);
            return format!("{}.{}", table, column);
        }
        self.resolve(tables, field)
    }

    fn resolve<S: AsRef<str>>(&self, tables: &[S], field: &str) -> String {
        if let Some(registry) = &self.registry {
            let alias = tables
                .iter()
                .find_map(|table| registry.storage_name(table.as_ref(), field));
            if let Some(alias) = alias {
                return alias.to_string();
            }
        }
        match &self.transformer {
            Some(transformer) => transformer.to_storage_name(field),
            None => field.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::SnakeCase;
    use crate::registry::{FieldDescriptor, StorageType};

    fn registry() -> Arc<Registry> {
        let mut registry = Registry::new();
        registry
            .declare(
                "wine",
                vec![
                    FieldDescriptor::primary_key("id", StorageType::Serial),
                    FieldDescriptor::field("isOrganic", StorageType::Bool).alias("organic"),
                ],
            )
            .unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_registry_alias_wins_over_transformer() {
        let mapper = FieldMapper::new(Some(registry()), Some(Arc::new(SnakeCase)));
        assert_eq!(mapper.storage_name(&["wine"], "isOrganic"), "organic");
        assert_eq!(mapper.storage_name(&["wine"], "grapeVariety"), "grape_variety");
    }

    #[test]
    fn test_qualified_field() {
        let mapper = FieldMapper::new(Some(registry()), None);
        assert_eq!(mapper.storage_name::<&str>(&[], "wine.isOrganic"), "wine.organic");
        assert_eq!(mapper.storage_name(&["wine"], "*"), "*");
    }

    #[test]
    fn test_raw_fallback() {
        let mapper = FieldMapper::default();
        assert_eq!(mapper.storage_name(&["bottle"], "isOrganic"), "isOrganic");
    }
}
