//! Multi-row INSERT

use super::FieldMapper;
use crate::statement::{placeholder_list, PreparedStatement, QueryPart};
use crate::{Error, Record, Result, Value};

/// `INSERT INTO <table> (columns) VALUES (...), (...)`
///
/// Columns come from the first row. Every row is expected to share that shape;
/// a field missing from a later row is bound as NULL and extra fields are ignored.
#[derive(Debug, Clone)]
pub struct Insert {
    table: String,
    rows: Vec<Record>,
    mapper: FieldMapper,
}

impl Insert {
    pub fn new(table: impl Into<String>, rows: Vec<Record>) -> Self {
        Self {
            table: table.into(),
            rows,
            mapper: FieldMapper::default(),
        }
    }

    /// Resolve row keys to column names through `mapper`
    pub fn with_mapper(mut self, mapper: FieldMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }
}

impl QueryPart for Insert {
    fn render(&self, offset: usize) -> Result<PreparedStatement> {
        let first = self
            .rows
            .first()
            .ok_or_else(|| Error::validation("Insert cannot be empty"))?;
        let keys: Vec<&str> = first.fields().collect();
        if keys.is_empty() {
            return Err(Error::validation("Insert rows must have at least one field"));
        }

        let columns = keys
            .iter()
            .map(|key| self.mapper.storage_name(&[self.table.as_str()], key))
            .collect::<Vec<_>>()
            .join(", ");

        let mut groups = Vec::with_capacity(self.rows.len());
        let mut args = Vec::with_capacity(self.rows.len() * keys.len());
        for row in &self.rows {
            groups.push(format!("({})", placeholder_list(offset + args.len(), keys.len())));
            args.extend(
                keys.iter()
                    .map(|key| row.get(key).cloned().unwrap_or(Value::Null)),
            );
        }

        Ok(PreparedStatement::new(
            format!(
                "INSERT INTO {} ({}) VALUES {}",
                self.table,
                columns,
                groups.join(", ")
            ),
            args,
        )
        .with_scope([self.table.clone()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FieldDescriptor, Registry, StorageType};
    use std::sync::Arc;

    fn wine(name: &str, organic: bool) -> Record {
        Record::new()
            .with("name", name)
            .with("naming", "Bordeaux")
            .with("isOrganic", organic)
    }

    #[test]
    fn test_single_row() {
        let insert = Insert::new("wine", vec![wine("Chateau Margaux", false)]);
        let rendered = insert.render(0).unwrap();

        assert_eq!(
            rendered.text,
            "INSERT INTO wine (name, naming, isOrganic) VALUES ($1, $2, $3)"
        );
        assert_eq!(
            rendered.args,
            vec![
                Value::from("Chateau Margaux"),
                Value::from("Bordeaux"),
                Value::Bool(false)
            ]
        );
    }

    #[test]
    fn test_groups_are_numbered_across_rows() {
        let rows: Vec<Record> = (0..4).map(|i| wine(&format!("wine {}", i), i % 2 == 0)).collect();
        let rendered = Insert::new("wine", rows).render(0).unwrap();

        assert_eq!(rendered.args.len(), 4 * 3);
        assert_eq!(rendered.text.matches('(').count(), 1 + 4);
        assert!(rendered.text.ends_with("($10, $11, $12)"));
        assert!(rendered.check_placeholders(0).is_ok());
        assert_eq!(rendered.args[3], Value::from("wine 1"));
        assert_eq!(rendered.args[5], Value::Bool(false));
    }

    #[test]
    fn test_columns_resolved_through_registry() {
        let mut registry = Registry::new();
        registry
            .declare(
                "wine",
                vec![
                    FieldDescriptor::primary_key("id", StorageType::Serial),
                    FieldDescriptor::field("isOrganic", StorageType::Bool).alias("is_organic"),
                ],
            )
            .unwrap();
        let mapper = FieldMapper::new(Some(Arc::new(registry)), None);

        let rendered = Insert::new("wine", vec![wine("Merlot", true)])
            .with_mapper(mapper)
            .render(0)
            .unwrap();
        assert_eq!(
            rendered.text,
            "INSERT INTO wine (name, naming, is_organic) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn test_missing_field_binds_null() {
        let rows = vec![
            Record::new().with("name", "a").with("year", 2001),
            Record::new().with("name", "b"),
        ];
        let rendered = Insert::new("wine", rows).render(0).unwrap();
        assert_eq!(rendered.args[3], Value::Null);
    }

    #[test]
    fn test_empty_insert() {
        let err = Insert::new("wine", vec![]).render(0).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Insert cannot be empty"));
    }
}
