//! FROM clause

use crate::statement::{PreparedStatement, QueryPart};
use crate::{Error, Result};

/// Tables of a FROM clause, joined naively with commas
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FromTables {
    tables: Vec<String>,
}

impl FromTables {
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
        }
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }
}

impl QueryPart for FromTables {
    fn render(&self, _offset: usize) -> Result<PreparedStatement> {
        if self.tables.is_empty() {
            return Err(Error::validation("FROM requires at least one table"));
        }
        Ok(PreparedStatement::raw(format!(
            "FROM {}",
            self.tables.join(", ")
        ))
        .with_scope(self.tables.iter().cloned()))
    }
}
