//! Naming conventions between application field names and storage names

use convert_case::{Case, Casing};
use serde::Deserialize;
use std::fmt::Debug;
use std::sync::Arc;

/// Translates identifiers between application-level and storage-level naming.
///
/// The registry's explicit aliases always win; a transformer only applies to
/// names the registry does not know about.
pub trait FieldTransformer: Debug + Send + Sync {
    /// Application field name to column name
    fn to_storage_name(&self, field: &str) -> String;

    /// Column name to application field name
    fn to_field_name(&self, column: &str) -> String;
}

/// Leaves identifiers untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl FieldTransformer for Identity {
    fn to_storage_name(&self, field: &str) -> String {
        field.to_string()
    }

    fn to_field_name(&self, column: &str) -> String {
        column.to_string()
    }
}

/// `camelCase` fields stored as `snake_case` columns
#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeCase;

impl FieldTransformer for SnakeCase {
    fn to_storage_name(&self, field: &str) -> String {
        field.trim().to_case(Case::Snake)
    }

    fn to_field_name(&self, column: &str) -> String {
        column.trim().to_case(Case::Camel)
    }
}

/// Configurable choice of transformer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingConvention {
    #[default]
    Identity,
    SnakeCase,
}

impl NamingConvention {
    pub fn transformer(self) -> Arc<dyn FieldTransformer> {
        match self {
            NamingConvention::Identity => Arc::new(Identity),
            NamingConvention::SnakeCase => Arc::new(SnakeCase),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kebab_to_snake() {
        assert_eq!(SnakeCase.to_storage_name("history-x-friend"), "history_x_friend");
    }

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(SnakeCase.to_storage_name("historyXFriend"), "history_x_friend");
        assert_eq!(SnakeCase.to_storage_name("wineId"), "wine_id");
    }

    #[test]
    fn test_snake_to_camel() {
        assert_eq!(SnakeCase.to_field_name("account_id"), "accountId");
        assert_eq!(SnakeCase.to_field_name(" id"), "id");
        assert_eq!(SnakeCase.to_field_name(" tasting_taste_comment "), "tastingTasteComment");
    }

    #[test]
    fn test_identity() {
        assert_eq!(Identity.to_storage_name("isOrganic"), "isOrganic");
        assert_eq!(Identity.to_field_name("is_organic"), "is_organic");
    }

    #[test]
    fn test_convention_deserializes_from_snake_case() {
        let convention: NamingConvention = serde_json::from_str("\"snake_case\"").unwrap();
        assert_eq!(convention, NamingConvention::SnakeCase);
        assert_eq!(convention.transformer().to_storage_name("bottleSize"), "bottle_size");
    }
}
