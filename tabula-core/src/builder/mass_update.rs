//! One UPDATE per row, each guarded by the row's primary key

use super::{FieldMapper, Update, Where};
use crate::registry::Registry;
use crate::statement::{PreparedStatement, QueryPart};
use crate::{Error, Record, Result, Value};
use std::sync::Arc;

/// Rows written back to a declared table.
///
/// Every field present in a row is assigned, the primary key included. Each
/// statement numbers its placeholders from `$1` on its own.
#[derive(Debug, Clone)]
pub struct MassUpdate {
    table: String,
    rows: Vec<Record>,
    registry: Arc<Registry>,
    mapper: FieldMapper,
}

impl MassUpdate {
    pub fn new(table: impl Into<String>, rows: Vec<Record>, registry: Arc<Registry>) -> Self {
        Self {
            table: table.into(),
            rows,
            mapper: FieldMapper::new(Some(registry.clone()), None),
            registry,
        }
    }

    pub fn with_mapper(mut self, mapper: FieldMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn statements(&self) -> Result<Vec<PreparedStatement>> {
        if self.rows.is_empty() {
            return Err(Error::validation("Cannot perform empty UPDATE query"));
        }

        let primary_key = self.registry.primary_key(&self.table).ok_or_else(|| {
            Error::schema(format!(
                "Table \"{}\" has no primary key, declare one with FieldDescriptor::primary_key",
                self.table
            ))
        })?;

        let scope = [self.table.as_str()];
        self.rows
            .iter()
            .map(|row| {
                let key = row
                    .get(&primary_key.name)
                    .or_else(|| row.get(primary_key.storage_name()))
                    .ok_or_else(|| {
                        Error::validation(format!(
                            "Row to update in \"{}\" has no value for primary key \"{}\"",
                            self.table, primary_key.name
                        ))
                    })?;
                if matches!(key, Value::Null | Value::Json(_)) {
                    return Err(Error::validation(format!(
                        "Primary key \"{}\" of a row to update in \"{}\" cannot be {}",
                        primary_key.name,
                        self.table,
                        key.type_name()
                    )));
                }

                let update = Update::new(
                    self.table.as_str(),
                    row.iter()
                        .map(|(field, value)| (self.mapper.storage_name(&scope, field), value.clone())),
                );
                let guard = Where::new((primary_key.storage_name(), key.clone()));

                let set = update.render(0)?;
                let filter = guard.render(update.arg_count())?;

                let mut args = set.args;
                args.extend(filter.args);
                Ok(PreparedStatement::new(format!("{} {};", set.text, filter.text), args)
                    .with_scope([self.table.clone()]))
            })
            .collect()
    }
}
