//! Field registry: declared tables, their columns and storage aliases
//!
//! The registry is filled during schema declaration (`&mut self`) and shared
//! read-only afterwards, typically behind an `Arc`. Its one-shot
//! initialization flag is the only state that changes after sharing.

use crate::{Error, Result};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicBool, Ordering};

/// Postgres column type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    Serial,
    BigSerial,
    SmallInt,
    Int,
    BigInt,
    Real,
    DoublePrecision,
    Numeric,
    Bool,
    Char,
    Varchar,
    Text,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    Json,
    Jsonb,
    Bytea,
}

impl StorageType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            StorageType::Serial => "SERIAL",
            StorageType::BigSerial => "BIGSERIAL",
            StorageType::SmallInt => "SMALLINT",
            StorageType::Int => "INT",
            StorageType::BigInt => "BIGINT",
            StorageType::Real => "REAL",
            StorageType::DoublePrecision => "DOUBLE PRECISION",
            StorageType::Numeric => "NUMERIC",
            StorageType::Bool => "BOOL",
            StorageType::Char => "CHAR",
            StorageType::Varchar => "VARCHAR",
            StorageType::Text => "TEXT",
            StorageType::Date => "DATE",
            StorageType::Time => "TIME",
            StorageType::Timestamp => "TIMESTAMP",
            StorageType::TimestampTz => "TIMESTAMPTZ",
            StorageType::Uuid => "UUID",
            StorageType::Json => "JSON",
            StorageType::Jsonb => "JSONB",
            StorageType::Bytea => "BYTEA",
        }
    }

    /// Whether the type accepts a `(size)` modifier
    pub fn is_sizeable(&self) -> bool {
        matches!(
            self,
            StorageType::Char | StorageType::Varchar | StorageType::Numeric
        )
    }
}

impl Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Static description of one declared column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub storage_type: StorageType,
    pub nullable: bool,
    pub size: Option<u32>,
    pub is_primary_key: bool,
    pub storage_alias: String,
    pub table: String,
}

impl FieldDescriptor {
    /// A regular, non-nullable column stored under its own name
    ///
    /// # Examples
    /// ```
    /// use tabula_core::{FieldDescriptor, StorageType};
    ///
    /// let organic = FieldDescriptor::field("isOrganic", StorageType::Bool).alias("is_organic");
    /// assert_eq!(organic.storage_name(), "is_organic");
    /// ```
    pub fn field(name: impl Into<String>, storage_type: StorageType) -> Self {
        let name = name.into();
        Self {
            storage_alias: name.clone(),
            name,
            storage_type,
            nullable: false,
            size: None,
            is_primary_key: false,
            table: String::new(),
        }
    }

    /// A column with a size modifier, e.g. `VARCHAR(255)`
    pub fn sized_field(name: impl Into<String>, storage_type: StorageType, size: u32) -> Self {
        Self {
            size: Some(size),
            ..Self::field(name, storage_type)
        }
    }

    /// The table's primary key
    pub fn primary_key(name: impl Into<String>, storage_type: StorageType) -> Self {
        Self {
            is_primary_key: true,
            ..Self::field(name, storage_type)
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Store the field under a different column name
    pub fn alias(mut self, storage_alias: impl Into<String>) -> Self {
        self.storage_alias = storage_alias.into();
        self
    }

    pub fn storage_name(&self) -> &str {
        &self.storage_alias
    }
}

/// A type whose table layout is declared explicitly
pub trait Entity {
    /// Table name
    const TABLE: &'static str;

    /// Columns, in declaration order
    fn fields() -> Vec<FieldDescriptor>;
}

/// One item of a flat declaration stream: a table boundary or a field
/// belonging to the most recent boundary
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaItem {
    Table(String),
    Field(FieldDescriptor),
}

/// Process-lifetime table of declared schemas
#[derive(Debug, Default)]
pub struct Registry {
    tables: IndexMap<String, Vec<FieldDescriptor>>,
    // table -> storage alias -> field name
    aliases: HashMap<String, HashMap<String, String>>,
    // table -> field name -> storage alias
    storage_names: HashMap<String, HashMap<String, String>>,
    initialized: AtomicBool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table and its fields.
    ///
    /// Fails if the registry was already initialized, the table is already
    /// declared, or the field list is not a valid table (see [`Registry::collect`]).
    pub fn declare(&mut self, table: &str, fields: Vec<FieldDescriptor>) -> Result<()> {
        self.ensure_open()?;
        let fields = self.validate_table(table, fields)?;
        self.insert_table(table, fields);
        Ok(())
    }

    /// Register an [`Entity`]
    pub fn register<E: Entity>(&mut self) -> Result<()> {
        self.declare(E::TABLE, E::fields())
    }

    /// Register tables from a flat stream of boundaries and fields.
    ///
    /// Either every table in the stream is registered or none is.
    pub fn collect<I>(&mut self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = SchemaItem>,
    {
        self.ensure_open()?;

        let mut grouped: Vec<(String, Vec<FieldDescriptor>)> = Vec::new();
        for item in items {
            match item {
                SchemaItem::Table(name) => grouped.push((name, Vec::new())),
                SchemaItem::Field(field) => match grouped.last_mut() {
                    Some((_, fields)) => fields.push(field),
                    None => {
                        return Err(Error::schema(format!(
                            "Field \"{}\" declared before any table boundary",
                            field.name
                        )))
                    }
                },
            }
        }

        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(grouped.len());
        for (table, fields) in grouped {
            if !seen.insert(table.clone()) {
                return Err(Error::schema(format!("Table \"{}\" declared twice", table)));
            }
            let fields = self.validate_table(&table, fields)?;
            validated.push((table, fields));
        }

        for (table, fields) in validated {
            self.insert_table(&table, fields);
        }
        Ok(())
    }

    /// Fields of a declared table, in declaration order
    pub fn lookup(&self, table: &str) -> Option<&[FieldDescriptor]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    /// Field name stored under `storage_name` in `table`
    pub fn resolve_alias(&self, table: &str, storage_name: &str) -> Option<&str> {
        self.aliases
            .get(table)
            .and_then(|aliases| aliases.get(storage_name))
            .map(String::as_str)
    }

    /// Column name of `field` in `table`
    pub fn storage_name(&self, table: &str, field: &str) -> Option<&str> {
        self.storage_names
            .get(table)
            .and_then(|names| names.get(field))
            .map(String::as_str)
    }

    pub fn primary_key(&self, table: &str) -> Option<&FieldDescriptor> {
        self.tables
            .get(table)
            .and_then(|fields| fields.iter().find(|field| field.is_primary_key))
    }

    /// Declared tables, in declaration order
    pub fn tables(&self) -> impl Iterator<Item = (&str, &[FieldDescriptor])> {
        self.tables
            .iter()
            .map(|(table, fields)| (table.as_str(), fields.as_slice()))
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Claim the single initialization pass allowed for this registry.
    ///
    /// Succeeds exactly once; every further call is a schema error.
    pub fn mark_initialized(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Err(Error::schema("Cannot initialize tables multiple times"));
        }
        Ok(())
    }

    /// Forget every declaration and the initialization flag
    pub fn reset(&mut self) {
        self.tables.clear();
        self.aliases.clear();
        self.storage_names.clear();
        *self.initialized.get_mut() = false;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::schema(
                "Registry is already initialized, declare every table before initializing",
            ));
        }
        Ok(())
    }

    fn validate_table(
        &self,
        table: &str,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Vec<FieldDescriptor>> {
        if table.trim().is_empty() {
            return Err(Error::schema("Table name cannot be empty"));
        }
        if self.tables.contains_key(table) {
            return Err(Error::schema(format!("Table \"{}\" declared twice", table)));
        }

        match fields.iter().filter(|field| field.is_primary_key).count() {
            0 => {
                return Err(Error::schema(format!(
                    "Table \"{}\" has no primary key, declare one with FieldDescriptor::primary_key",
                    table
                )))
            }
            1 => {}
            n => {
                return Err(Error::schema(format!(
                    "Table \"{}\" declares {} primary keys, exactly one is required",
                    table, n
                )))
            }
        }

        let mut names = HashSet::new();
        let mut columns = HashSet::new();
        for field in &fields {
            if !names.insert(field.name.as_str()) {
                return Err(Error::schema(format!(
                    "Field \"{}\" declared twice on table \"{}\"",
                    field.name, table
                )));
            }
            if !columns.insert(field.storage_alias.as_str()) {
                return Err(Error::schema(format!(
                    "Column \"{}\" used twice on table \"{}\"",
                    field.storage_alias, table
                )));
            }
            if field.size.is_some() && !field.storage_type.is_sizeable() {
                return Err(Error::schema(format!(
                    "The type {} of field \"{}\" cannot have a size",
                    field.storage_type, field.name
                )));
            }
        }

        Ok(fields
            .into_iter()
            .map(|field| FieldDescriptor {
                table: table.to_string(),
                ..field
            })
            .collect())
    }

    fn insert_table(&mut self, table: &str, fields: Vec<FieldDescriptor>) {
        let aliases = fields
            .iter()
            .map(|field| (field.storage_alias.clone(), field.name.clone()))
            .collect();
        let storage_names = fields
            .iter()
            .map(|field| (field.name.clone(), field.storage_alias.clone()))
            .collect();

        self.aliases.insert(table.to_string(), aliases);
        self.storage_names.insert(table.to_string(), storage_names);
        self.tables.insert(table.to_string(), fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wine_fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::primary_key("id", StorageType::Serial),
            FieldDescriptor::field("name", StorageType::Varchar),
            FieldDescriptor::field("naming", StorageType::Varchar),
            FieldDescriptor::field("isOrganic", StorageType::Bool).alias("is_organic"),
        ]
    }

    #[test]
    fn test_declare_and_lookup() {
        let mut registry = Registry::new();
        registry.declare("wine", wine_fields()).unwrap();

        let fields = registry.lookup("wine").unwrap();
        assert_eq!(fields.len(), 4);
        assert!(fields.iter().all(|field| field.table == "wine"));
        assert_eq!(registry.primary_key("wine").unwrap().name, "id");
        assert!(registry.lookup("bottle").is_none());
    }

    #[test]
    fn test_alias_defaults_to_name() {
        let field = FieldDescriptor::field("naming", StorageType::Varchar);
        assert_eq!(field.storage_alias, "naming");
    }

    #[test]
    fn test_resolve_alias_both_ways() {
        let mut registry = Registry::new();
        registry.declare("wine", wine_fields()).unwrap();

        assert_eq!(registry.resolve_alias("wine", "is_organic"), Some("isOrganic"));
        assert_eq!(registry.resolve_alias("wine", "name"), Some("name"));
        assert_eq!(registry.storage_name("wine", "isOrganic"), Some("is_organic"));
        assert_eq!(registry.resolve_alias("bottle", "is_organic"), None);
    }

    #[test]
    fn test_missing_primary_key_fails() {
        let mut registry = Registry::new();
        let err = registry
            .declare(
                "bottle",
                vec![FieldDescriptor::field("comment", StorageType::Varchar)],
            )
            .unwrap_err();
        assert!(err.is_schema());
        assert!(err.to_string().contains("has no primary key"));
    }

    #[test]
    fn test_two_primary_keys_fail() {
        let mut registry = Registry::new();
        let err = registry
            .declare(
                "bottle",
                vec![
                    FieldDescriptor::primary_key("id", StorageType::Serial),
                    FieldDescriptor::primary_key("code", StorageType::Int),
                ],
            )
            .unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn test_size_on_unsizeable_type_fails() {
        let mut registry = Registry::new();
        let err = registry
            .declare(
                "bottle",
                vec![
                    FieldDescriptor::primary_key("id", StorageType::Serial),
                    FieldDescriptor::sized_field("volume", StorageType::Int, 4),
                ],
            )
            .unwrap_err();
        assert!(err.to_string().contains("cannot have a size"));
    }

    #[test]
    fn test_duplicate_table_fails() {
        let mut registry = Registry::new();
        registry.declare("wine", wine_fields()).unwrap();
        assert!(registry.declare("wine", wine_fields()).unwrap_err().is_schema());
    }

    #[test]
    fn test_collect_groups_fields_under_boundaries() {
        let mut registry = Registry::new();
        registry
            .collect(vec![
                SchemaItem::Table("bottle".to_string()),
                SchemaItem::Field(
                    FieldDescriptor::primary_key("bottleId", StorageType::Serial).alias("bottle_id"),
                ),
                SchemaItem::Field(
                    FieldDescriptor::field("bottleSize", StorageType::Varchar).alias("bottle_size"),
                ),
                SchemaItem::Table("cellar".to_string()),
                SchemaItem::Field(FieldDescriptor::primary_key("id", StorageType::Serial)),
            ])
            .unwrap();

        let tables: Vec<&str> = registry.tables().map(|(table, _)| table).collect();
        assert_eq!(tables, vec!["bottle", "cellar"]);
        assert_eq!(registry.resolve_alias("bottle", "bottle_size"), Some("bottleSize"));
    }

    #[test]
    fn test_collect_rejects_field_without_boundary() {
        let mut registry = Registry::new();
        let err = registry
            .collect(vec![
                SchemaItem::Field(FieldDescriptor::primary_key("id", StorageType::Serial)),
                SchemaItem::Table("wine".to_string()),
            ])
            .unwrap_err();
        assert!(err.is_schema());
        assert!(err.to_string().contains("before any table boundary"));
    }

    #[test]
    fn test_collect_is_all_or_nothing() {
        let mut registry = Registry::new();
        let result = registry.collect(vec![
            SchemaItem::Table("wine".to_string()),
            SchemaItem::Field(FieldDescriptor::primary_key("id", StorageType::Serial)),
            SchemaItem::Table("bottle".to_string()),
            SchemaItem::Field(FieldDescriptor::field("comment", StorageType::Varchar)),
        ]);
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_initialization_happens_once() {
        let mut registry = Registry::new();
        registry.declare("wine", wine_fields()).unwrap();

        registry.mark_initialized().unwrap();
        let err = registry.mark_initialized().unwrap_err();
        assert!(err.is_schema());
        assert!(registry.declare("bottle", vec![]).unwrap_err().is_schema());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut registry = Registry::new();
        registry.declare("wine", wine_fields()).unwrap();
        registry.mark_initialized().unwrap();

        registry.reset();
        assert!(registry.is_empty());
        assert!(!registry.is_initialized());
        registry.declare("wine", wine_fields()).unwrap();
    }

    struct Bottle;

    impl Entity for Bottle {
        const TABLE: &'static str = "bottle";

        fn fields() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::primary_key("id", StorageType::Serial),
                FieldDescriptor::sized_field("comment", StorageType::Varchar, 255).nullable(),
            ]
        }
    }

    #[test]
    fn test_register_entity() {
        let mut registry = Registry::new();
        registry.register::<Bottle>().unwrap();
        let comment = &registry.lookup("bottle").unwrap()[1];
        assert_eq!(comment.size, Some(255));
        assert!(comment.nullable);
    }
}
