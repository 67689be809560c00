//! UPDATE ... SET assignments

use crate::statement::{PreparedStatement, QueryPart};
use crate::{Error, Result, Value};

/// `UPDATE <table> SET field = $n, ...`
///
/// The matching WHERE clause is rendered with an offset equal to the number
/// of assignments.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    table: String,
    assignments: Vec<(String, Value)>,
}

impl Update {
    pub fn new<I, K, V>(table: impl Into<String>, assignments: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            table: table.into(),
            assignments: assignments
                .into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Number of parameters the SET list binds
    pub fn arg_count(&self) -> usize {
        self.assignments.len()
    }
}

impl QueryPart for Update {
    fn render(&self, offset: usize) -> Result<PreparedStatement> {
        if self.assignments.is_empty() {
            return Err(Error::validation("Cannot perform empty UPDATE query"));
        }

        let sets = self
            .assignments
            .iter()
            .enumerate()
            .map(|(i, (field, _))| format!("{} = ${}", field, offset + i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let args = self
            .assignments
            .iter()
            .map(|(_, value)| value.clone())
            .collect();

        Ok(PreparedStatement::new(format!("UPDATE {} SET {}", self.table, sets), args)
            .with_scope([self.table.clone()]))
    }
}
