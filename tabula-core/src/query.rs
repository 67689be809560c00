//! Fluent statement assembly
//!
//! [`QueryBuilder`] collects the calls of one statement chain, checks that
//! they form a legal statement, then renders every part in order with the
//! right placeholder offset. Rendering always clears the collected state so
//! the same builder can be reused for the next statement.
//!
//! ```
//! use tabula_core::{Condition, QueryBuilder};
//!
//! let mut builder = QueryBuilder::new();
//! let statement = builder
//!     .select(["name", "naming"])
//!     .from(["wine"])
//!     .where_(("id", 1))
//!     .or([Condition::like("name", "Ch%"), Condition::equals("is_organic", true)])
//!     .render()
//!     .unwrap();
//!
//! assert_eq!(
//!     statement.text,
//!     "SELECT name, naming FROM wine WHERE id = $1 OR (name LIKE $2 OR is_organic = $3);"
//! );
//! ```

use crate::builder::{Create, Delete, FieldMapper, FromTables, Insert, Select, Update, Where};
use crate::condition::Conditions;
use crate::executor::Submit;
use crate::naming::FieldTransformer;
use crate::registry::{FieldDescriptor, Registry};
use crate::statement::{PreparedStatement, QueryPart};
use crate::{Error, Record, Result, Row, Value};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chain {
    Select,
    Insert,
    Update,
    Create,
    Delete,
}

impl Chain {
    fn name(&self) -> &'static str {
        match self {
            Chain::Select => "select()",
            Chain::Insert => "insert()",
            Chain::Update => "update()",
            Chain::Create => "create()",
            Chain::Delete => "delete()",
        }
    }

    fn accepts_from(&self) -> bool {
        matches!(self, Chain::Select | Chain::Delete)
    }

    fn accepts_where(&self) -> bool {
        matches!(self, Chain::Select | Chain::Update | Chain::Delete)
    }
}

#[derive(Debug, Default)]
struct State {
    chain: Option<Chain>,
    select: Vec<String>,
    from: Option<Vec<String>>,
    where_: Option<Where>,
    insert: Option<(String, Vec<Record>)>,
    update: Option<(String, Vec<(String, Value)>)>,
    create: Option<(String, Vec<FieldDescriptor>)>,
    misuse: Option<String>,
}

impl State {
    fn reject(&mut self, message: String) {
        self.misuse.get_or_insert(message);
    }

    fn enter(&mut self, chain: Chain) {
        match self.chain {
            None => self.chain = Some(chain),
            Some(current) if current == chain => {
                self.reject(format!("{} called twice in the same statement", chain.name()))
            }
            Some(current) => self.reject(format!(
                "Cannot mix {} with {} in the same statement",
                chain.name(),
                current.name()
            )),
        }
    }
}

/// Reusable builder for one statement at a time
#[derive(Debug, Default)]
pub struct QueryBuilder {
    registry: Option<Arc<Registry>>,
    transformer: Option<Arc<dyn FieldTransformer>>,
    state: State,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve field names through the registry's storage aliases
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Resolve field names the registry does not know through `transformer`
    pub fn with_transformer(mut self, transformer: Arc<dyn FieldTransformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// Start a SELECT; an empty projection selects `*`
    pub fn select<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.enter(Chain::Select);
        self.state.select = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn from<I, S>(&mut self, tables: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.state.chain {
            Some(chain) if !chain.accepts_from() => self
                .state
                .reject(format!("from() cannot be used with {}", chain.name())),
            _ if self.state.from.is_some() => {
                self.state.reject("from() called twice in the same statement".to_string())
            }
            _ => self.state.from = Some(tables.into_iter().map(Into::into).collect()),
        }
        self
    }

    /// Open the WHERE clause. A single condition anchors it; a group of
    /// conditions starts it in group mode, joined with AND.
    pub fn where_(&mut self, conditions: impl Into<Conditions>) -> &mut Self {
        let clause = match conditions.into() {
            Conditions::Single(anchor) => Where::new(anchor),
            Conditions::Group(members) => Where::group().and(members),
        };
        self.where_clause(clause)
    }

    /// Use an already assembled WHERE clause, e.g. a bound template
    pub fn where_clause(&mut self, clause: Where) -> &mut Self {
        match self.state.chain {
            Some(chain) if !chain.accepts_where() => {
                self.state
                    .reject(format!("where() cannot be used with {}", chain.name()));
            }
            _ if self.state.where_.is_some() => {
                self.state
                    .reject("where() called twice, use and() or or() instead".to_string());
            }
            _ => self.state.where_ = Some(clause),
        }
        self
    }

    pub fn and(&mut self, conditions: impl Into<Conditions>) -> &mut Self {
        match self.state.where_.take() {
            Some(clause) => self.state.where_ = Some(clause.and(conditions)),
            None => self
                .state
                .reject("where() has not been called yet, you can't use and()".to_string()),
        }
        self
    }

    pub fn or(&mut self, conditions: impl Into<Conditions>) -> &mut Self {
        match self.state.where_.take() {
            Some(clause) => self.state.where_ = Some(clause.or(conditions)),
            None => self
                .state
                .reject("where() has not been called yet, you can't use or()".to_string()),
        }
        self
    }

    pub fn insert(&mut self, table: impl Into<String>, rows: Vec<Record>) -> &mut Self {
        self.state.enter(Chain::Insert);
        self.state.insert = Some((table.into(), rows));
        self
    }

    pub fn update<I, K, V>(&mut self, table: impl Into<String>, assignments: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.state.enter(Chain::Update);
        self.state.update = Some((
            table.into(),
            assignments
                .into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        ));
        self
    }

    pub fn create(&mut self, table: impl Into<String>, fields: Vec<FieldDescriptor>) -> &mut Self {
        self.state.enter(Chain::Create);
        self.state.create = Some((table.into(), fields));
        self
    }

    /// Start a DELETE; it needs `from()` and a `where_()` guard
    pub fn delete(&mut self) -> &mut Self {
        self.state.enter(Chain::Delete);
        self
    }

    /// Validate and render the collected statement, then reset the builder
    pub fn render(&mut self) -> Result<PreparedStatement> {
        let state = std::mem::take(&mut self.state);

        if let Some(misuse) = state.misuse {
            return Err(Error::usage(misuse));
        }
        let chain = state
            .chain
            .ok_or_else(|| Error::usage("Cannot render an empty statement"))?;
        if state.from.is_some() && !chain.accepts_from() {
            return Err(Error::usage(format!("from() cannot be used with {}", chain.name())));
        }
        if state.where_.is_some() && !chain.accepts_where() {
            return Err(Error::usage(format!("where() cannot be used with {}", chain.name())));
        }

        let mapper = FieldMapper::new(self.registry.clone(), self.transformer.clone());
        let mut parts: Vec<Box<dyn QueryPart>> = Vec::new();
        let mut tables: Vec<String> = Vec::new();

        match chain {
            Chain::Select => {
                let from = state
                    .from
                    .ok_or_else(|| Error::usage("select() requires from()"))?;
                let fields: Vec<String> = state
                    .select
                    .iter()
                    .map(|field| mapper.storage_name(&from, field))
                    .collect();
                let select = Select::new(fields);
                tables.extend(from.iter().cloned());
                tables.extend(select.qualified_fields().into_iter().map(|(table, _)| table));
                parts.push(Box::new(select));
                parts.push(Box::new(FromTables::new(from)));
            }
            Chain::Delete => {
                let from = state
                    .from
                    .ok_or_else(|| Error::usage("delete() requires from()"))?;
                if state.where_.is_none() {
                    return Err(Error::usage(
                        "delete() requires a where() condition, use a raw statement to delete every row",
                    ));
                }
                tables.extend(from.iter().cloned());
                parts.push(Box::new(Delete));
                parts.push(Box::new(FromTables::new(from)));
            }
            Chain::Insert => {
                let (table, rows) = state
                    .insert
                    .ok_or_else(|| Error::usage("insert() is missing its rows"))?;
                tables.push(table.clone());
                parts.push(Box::new(Insert::new(table, rows).with_mapper(mapper.clone())));
            }
            Chain::Update => {
                let (table, assignments) = state
                    .update
                    .ok_or_else(|| Error::usage("update() is missing its assignments"))?;
                let assignments: Vec<(String, Value)> = assignments
                    .into_iter()
                    .map(|(field, value)| (mapper.storage_name(&[table.as_str()], &field), value))
                    .collect();
                tables.push(table.clone());
                parts.push(Box::new(Update::new(table, assignments)));
            }
            Chain::Create => {
                let (table, fields) = state
                    .create
                    .ok_or_else(|| Error::usage("create() is missing its fields"))?;
                tables.push(table.clone());
                parts.push(Box::new(Create::new(table, fields)));
            }
        }

        if let Some(clause) = state.where_ {
            let clause = clause.map_fields(|field| mapper.storage_name(&tables, field));
            parts.push(Box::new(clause));
        }

        let mut texts = Vec::with_capacity(parts.len());
        let mut args = Vec::new();
        for part in &parts {
            let rendered = part.render(args.len())?;
            texts.push(rendered.text);
            args.extend(rendered.args);
        }

        let mut seen = HashSet::new();
        tables.retain(|table| seen.insert(table.clone()));
        let statement = PreparedStatement::new(format!("{};", texts.join(" ")), args)
            .with_scope(tables);
        statement.check_placeholders(0)?;
        Ok(statement)
    }

    /// Render and run the statement, returning the affected row count
    pub async fn execute<S: Submit>(&mut self, target: &S) -> Result<u64> {
        let statement = self.render()?;
        Ok(target.run(&statement).await?.row_count)
    }

    /// Render and run the statement, returning the (remapped) rows
    pub async fn fetch_rows<S: Submit>(&mut self, target: &S) -> Result<Vec<Row>> {
        let statement = self.render()?;
        target.submit(&statement).await
    }

    pub async fn fetch_all<T, S>(&mut self, target: &S) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        S: Submit,
    {
        self.fetch_rows(target)
            .await?
            .into_iter()
            .map(|row| Ok(serde_json::from_value(serde_json::Value::Object(row))?))
            .collect()
    }

    pub async fn fetch_optional<T, S>(&mut self, target: &S) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        S: Submit,
    {
        match self.fetch_rows(target).await?.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(serde_json::Value::Object(row))?)),
            None => Ok(None),
        }
    }

    pub async fn fetch_one<T, S>(&mut self, target: &S) -> Result<T>
    where
        T: DeserializeOwned,
        S: Submit,
    {
        self.fetch_optional(target)
            .await?
            .ok_or(Error::Database(sqlx::Error::RowNotFound))
    }
}
