//! In-memory driver for tests
//!
//! [`MockDriver`] records every statement it receives, replays scripted
//! outcomes, fails statements on demand and keeps just enough table state
//! (`CREATE TABLE IF NOT EXISTS`, `INSERT`, `SELECT`, `UPDATE` and `DELETE`
//! with AND-joined equality filters, `BEGIN`/`COMMIT`/`ROLLBACK`) to run
//! whole flows without a database.

use crate::driver::{command_tag, Connection, Driver, QueryOutcome};
use crate::{Result, Row, Value};
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<String>,
    serial: Vec<String>,
    next_serial: i64,
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct State {
    connects: usize,
    closes: usize,
    executed: Vec<(String, Vec<Value>)>,
    responses: VecDeque<QueryOutcome>,
    failures: Vec<String>,
    connect_error: Option<String>,
    tables: IndexMap<String, Table>,
    snapshot: Option<IndexMap<String, Table>>,
}

fn protocol(message: impl Into<String>) -> crate::Error {
    sqlx::Error::Protocol(message.into()).into()
}

/// Scripted in-memory driver; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<State>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an outcome returned, in order, instead of interpreting the next
    /// non-transactional statement
    pub fn respond_with(&self, outcome: QueryOutcome) -> &Self {
        self.state().responses.push_back(outcome);
        self
    }

    pub fn respond_with_rows(&self, rows: Vec<Row>) -> &Self {
        self.respond_with(QueryOutcome::rows(rows))
    }

    /// Fail every statement whose text, or one of whose string arguments,
    /// contains `fragment`
    pub fn fail_on(&self, fragment: impl Into<String>) -> &Self {
        self.state().failures.push(fragment.into());
        self
    }

    pub fn fail_connect(&self, message: impl Into<String>) -> &Self {
        self.state().connect_error = Some(message.into());
        self
    }

    pub fn connect_count(&self) -> usize {
        self.state().connects
    }

    pub fn close_count(&self) -> usize {
        self.state().closes
    }

    /// Text of every statement received, in order
    pub fn statements(&self) -> Vec<String> {
        self.state()
            .executed
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    /// Text and arguments of every statement received, in order
    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.state().executed.clone()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state().tables.contains_key(table)
    }

    pub fn columns(&self, table: &str) -> Vec<String> {
        self.state()
            .tables
            .get(table)
            .map(|table| table.columns.clone())
            .unwrap_or_default()
    }

    /// Stored rows of `table`, keyed by column name
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state()
            .tables
            .get(table)
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    }
}

impl Driver for MockDriver {
    type Connection = MockConnection;

    async fn connect(&self) -> Result<MockConnection> {
        let mut state = self.state();
        if let Some(message) = &state.connect_error {
            return Err(protocol(message.clone()));
        }
        state.connects += 1;
        drop(state);

        Ok(MockConnection {
            driver: self.clone(),
        })
    }
}

/// Connection handed out by [`MockDriver`]
#[derive(Debug)]
pub struct MockConnection {
    driver: MockDriver,
}

impl Connection for MockConnection {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutcome> {
        self.driver.state().execute(sql, params)
    }

    async fn end(self) -> Result<()> {
        self.driver.state().closes += 1;
        Ok(())
    }
}

impl Drop for MockConnection {
    /// A server discards the open transaction of a connection that goes away
    fn drop(&mut self) {
        let mut state = self.driver.state();
        if let Some(tables) = state.snapshot.take() {
            state.tables = tables;
        }
    }
}

impl State {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutcome> {
        self.executed.push((sql.to_string(), params.to_vec()));

        let failing = self.failures.iter().any(|fragment| {
            sql.contains(fragment.as_str())
                || params
                    .iter()
                    .any(|param| matches!(param, Value::String(s) if s.contains(fragment.as_str())))
        });
        if failing {
            return Err(protocol(format!("mock failure on: {}", sql)));
        }

        let statement = sql.trim().trim_end_matches(';').trim();
        let upper = statement.to_ascii_uppercase();

        match upper.split_whitespace().next().unwrap_or_default() {
            "BEGIN" => {
                self.snapshot = Some(self.tables.clone());
                return Ok(QueryOutcome::affected("BEGIN", 0));
            }
            "COMMIT" => {
                self.snapshot = None;
                return Ok(QueryOutcome::affected("COMMIT", 0));
            }
            "ROLLBACK" => {
                if let Some(tables) = self.snapshot.take() {
                    self.tables = tables;
                }
                return Ok(QueryOutcome::affected("ROLLBACK", 0));
            }
            _ => {}
        }

        if let Some(outcome) = self.responses.pop_front() {
            return Ok(outcome);
        }

        if upper.starts_with("CREATE TABLE IF NOT EXISTS ") {
            self.create(statement)
        } else if upper.starts_with("INSERT INTO ") {
            self.insert(statement, params)
        } else if upper.starts_with("SELECT ") {
            self.select(statement, params)
        } else if upper.starts_with("UPDATE ") {
            self.update(statement, params)
        } else if upper.starts_with("DELETE FROM ") {
            self.delete(statement, params)
        } else {
            Ok(QueryOutcome::affected(command_tag(statement), 0))
        }
    }

    fn create(&mut self, statement: &str) -> Result<QueryOutcome> {
        let rest = &statement["CREATE TABLE IF NOT EXISTS ".len()..];
        let (name, body) = split_parens(rest, true)?;

        let mut table = Table::default();
        for definition in body.split(',') {
            let mut tokens = definition.split_whitespace();
            let Some(column) = tokens.next() else {
                continue;
            };
            if tokens.any(|token| token.to_uppercase().ends_with("SERIAL")) {
                table.serial.push(column.to_string());
            }
            table.columns.push(column.to_string());
        }

        self.tables.entry(name.to_string()).or_insert(table);
        Ok(QueryOutcome::affected("CREATE TABLE", 0))
    }

    fn insert(&mut self, statement: &str, params: &[Value]) -> Result<QueryOutcome> {
        let rest = &statement["INSERT INTO ".len()..];
        let (name, columns) = split_parens(rest, false)?;
        let columns: Vec<&str> = columns.split(',').map(str::trim).collect();
        let table = self
            .tables
            .get_mut(name)
            .ok_or_else(|| protocol(format!("relation \"{}\" does not exist", name)))?;

        if let Some(unknown) = columns
            .iter()
            .copied()
            .find(|c| !table.columns.iter().any(|t| t == c))
        {
            return Err(protocol(format!(
                "column \"{}\" of relation \"{}\" does not exist",
                unknown, name
            )));
        }
        if columns.is_empty() || params.len() % columns.len() != 0 {
            return Err(protocol("argument count does not match the column list"));
        }

        let mut inserted = 0;
        for values in params.chunks(columns.len()) {
            let mut row = Row::new();
            for column in &table.columns {
                let value = match columns.iter().position(|c| c == column) {
                    Some(i) => values[i].to_json(),
                    None if table.serial.contains(column) => {
                        table.next_serial += 1;
                        serde_json::Value::from(table.next_serial)
                    }
                    None => serde_json::Value::Null,
                };
                row.insert(column.clone(), value);
            }
            table.rows.push(row);
            inserted += 1;
        }

        Ok(QueryOutcome::affected("INSERT", inserted))
    }

    fn select(&mut self, statement: &str, params: &[Value]) -> Result<QueryOutcome> {
        let rest = &statement["SELECT ".len()..];
        let (projection, rest) = split_keyword(rest, " FROM ")
            .ok_or_else(|| protocol("SELECT without FROM"))?;
        let (name, filter) = match split_keyword(rest, " WHERE ") {
            Some((name, filter)) => (name, Some(filter)),
            None => (rest, None),
        };
        let filters = parse_filters(filter, params)?;
        let table = self
            .tables
            .get(name.trim())
            .ok_or_else(|| protocol(format!("relation \"{}\" does not exist", name.trim())))?;

        let fields: Vec<&str> = projection.split(',').map(str::trim).collect();
        let rows: Vec<Row> = table
            .rows
            .iter()
            .filter(|row| matches(row, &filters))
            .map(|row| match fields.as_slice() {
                ["*"] => row.clone(),
                _ => fields
                    .iter()
                    .map(|field| {
                        let column = field.rsplit('.').next().unwrap_or(*field);
                        (
                            column.to_string(),
                            row.get(column).cloned().unwrap_or(serde_json::Value::Null),
                        )
                    })
                    .collect(),
            })
            .collect();

        Ok(QueryOutcome::rows(rows))
    }

    fn update(&mut self, statement: &str, params: &[Value]) -> Result<QueryOutcome> {
        let rest = &statement["UPDATE ".len()..];
        let (name, rest) =
            split_keyword(rest, " SET ").ok_or_else(|| protocol("UPDATE without SET"))?;
        let (assignments, filter) = match split_keyword(rest, " WHERE ") {
            Some((assignments, filter)) => (assignments, Some(filter)),
            None => (rest, None),
        };
        let assignments = parse_filters(Some(&assignments.replace(',', " AND ")), params)?;
        let filters = parse_filters(filter, params)?;
        let table = self
            .tables
            .get_mut(name.trim())
            .ok_or_else(|| protocol(format!("relation \"{}\" does not exist", name.trim())))?;

        let mut updated = 0;
        for row in table.rows.iter_mut().filter(|row| matches(row, &filters)) {
            for (column, value) in &assignments {
                row.insert(column.clone(), value.clone());
            }
            updated += 1;
        }
        Ok(QueryOutcome::affected("UPDATE", updated))
    }

    fn delete(&mut self, statement: &str, params: &[Value]) -> Result<QueryOutcome> {
        let rest = &statement["DELETE FROM ".len()..];
        let (name, filter) = match split_keyword(rest, " WHERE ") {
            Some((name, filter)) => (name, Some(filter)),
            None => (rest, None),
        };
        let filters = parse_filters(filter, params)?;
        let table = self
            .tables
            .get_mut(name.trim())
            .ok_or_else(|| protocol(format!("relation \"{}\" does not exist", name.trim())))?;

        let before = table.rows.len();
        table.rows.retain(|row| !matches(row, &filters));
        Ok(QueryOutcome::affected("DELETE", (before - table.rows.len()) as u64))
    }
}

/// `name (inside) ...` into `("name", "inside")`; `nested` keeps inner
/// parentheses and stops at the last `)` instead of the first
fn split_parens(text: &str, nested: bool) -> Result<(&str, &str)> {
    let open = text
        .find('(')
        .ok_or_else(|| protocol(format!("expected '(' in: {}", text)))?;
    let close = if nested {
        text.rfind(')')
    } else {
        text[open..].find(')').map(|end| open + end)
    }
    .filter(|close| *close > open)
    .ok_or_else(|| protocol(format!("expected ')' in: {}", text)))?;
    Ok((text[..open].trim(), &text[open + 1..close]))
}

fn split_keyword<'a>(text: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let index = text.to_ascii_uppercase().find(keyword)?;
    Some((&text[..index], &text[index + keyword.len()..]))
}

/// AND-joined `column = $n` pairs, parentheses ignored
fn parse_filters(
    filter: Option<&str>,
    params: &[Value],
) -> Result<Vec<(String, serde_json::Value)>> {
    let Some(filter) = filter else {
        return Ok(Vec::new());
    };
    if filter.to_ascii_uppercase().contains(" OR ") {
        return Err(protocol("mock driver only understands AND-joined filters"));
    }

    filter
        .replace(['(', ')'], "")
        .split(" AND ")
        .map(|comparison| -> Result<(String, serde_json::Value)> {
            let (column, placeholder) = comparison
                .split_once(" = ")
                .ok_or_else(|| protocol(format!("unsupported comparison: {}", comparison)))?;
            let value = placeholder
                .trim()
                .strip_prefix('$')
                .and_then(|n| n.parse::<usize>().ok())
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| params.get(i))
                .ok_or_else(|| protocol(format!("unbound placeholder: {}", placeholder)))?;
            Ok((column.trim().to_string(), value.to_json()))
        })
        .collect()
}

fn matches(row: &Row, filters: &[(String, serde_json::Value)]) -> bool {
    filters
        .iter()
        .all(|(column, value)| row.get(column) == Some(value))
}
