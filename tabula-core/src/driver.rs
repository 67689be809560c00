//! Database driver interface

use crate::{Result, Row, Value};
use std::future::Future;

/// Everything a driver reports about one executed statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    pub rows: Vec<Row>,
    /// Rows returned or affected
    pub row_count: u64,
    /// Leading keyword of the statement, e.g. `INSERT`
    pub command_tag: String,
}

impl QueryOutcome {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            row_count: rows.len() as u64,
            rows,
            command_tag: "SELECT".to_string(),
        }
    }

    pub fn affected(command_tag: impl Into<String>, row_count: u64) -> Self {
        Self {
            rows: Vec::new(),
            row_count,
            command_tag: command_tag.into(),
        }
    }
}

/// Opens connections to a database
pub trait Driver: Send + Sync + 'static {
    /// The connection type for this driver
    type Connection: Connection;

    /// Open a new connection
    fn connect(&self) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// A single open database connection
pub trait Connection: Send + 'static {
    /// Run one statement with positional `$n` parameters
    fn query(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<QueryOutcome>> + Send;

    /// Close the connection
    fn end(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

/// Leading keyword(s) of a statement, as a command tag
pub(crate) fn command_tag(sql: &str) -> String {
    let mut words = sql.split_whitespace();
    match words.next().map(str::to_uppercase) {
        Some(first) if first == "CREATE" || first == "DROP" || first == "ALTER" => {
            match words.next() {
                Some(second) => format!("{} {}", first, second.to_uppercase()),
                None => first,
            }
        }
        Some(first) => first.trim_end_matches(';').to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_tag() {
        assert_eq!(command_tag("SELECT * FROM wine;"), "SELECT");
        assert_eq!(command_tag("insert into wine (id) values ($1)"), "INSERT");
        assert_eq!(
            command_tag("CREATE TABLE IF NOT EXISTS wine (id SERIAL PRIMARY KEY);"),
            "CREATE TABLE"
        );
        assert_eq!(command_tag("COMMIT;"), "COMMIT");
        assert_eq!(command_tag("   "), "");
    }

    #[test]
    fn test_outcome_constructors() {
        let outcome = QueryOutcome::rows(vec![Row::new(), Row::new()]);
        assert_eq!(outcome.row_count, 2);
        assert_eq!(QueryOutcome::affected("DELETE", 3).command_tag, "DELETE");
    }
}
