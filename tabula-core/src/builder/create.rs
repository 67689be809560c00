//! CREATE TABLE IF NOT EXISTS

use crate::registry::FieldDescriptor;
use crate::statement::{PreparedStatement, QueryPart};
use crate::{Error, Result};

/// Table definition rendered from field descriptors
#[derive(Debug, Clone, PartialEq)]
pub struct Create {
    table: String,
    fields: Vec<FieldDescriptor>,
}

impl Create {
    pub fn new(table: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            table: table.into(),
            fields,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn column(field: &FieldDescriptor) -> String {
        let mut column = format!("{} {}", field.storage_name(), field.storage_type);
        if let Some(size) = field.size {
            column.push_str(&format!("({})", size));
        }
        if field.is_primary_key {
            column.push_str(" PRIMARY KEY");
        } else if !field.nullable {
            column.push_str(" NOT NULL");
        }
        column
    }
}

impl QueryPart for Create {
    fn render(&self, _offset: usize) -> Result<PreparedStatement> {
        if self.fields.is_empty() {
            return Err(Error::validation("Create table cannot be empty"));
        }

        let columns = self
            .fields
            .iter()
            .map(Self::column)
            .collect::<Vec<_>>()
            .join(", ");

        Ok(PreparedStatement::raw(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table, columns
        )))
    }
}
