//! Per-table repositories
//!
//! A [`Dao`] wraps an [`Executor`] and one declared table. Every shorthand
//! builds its statement with the executor's naming rules and submits it to
//! the executor, or to the transaction the DAO is currently bound to.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tabula_core::{
    transaction, Driver, Error, Executor, MassUpdate, Participant, PreparedStatement,
    QueryOutcome, Record, Result, Row, Submit, Transaction, Value, Where,
};

pub struct Dao<D: Driver> {
    executor: Executor<D>,
    table: String,
    binding: Mutex<Option<Arc<Transaction<D>>>>,
}

impl<D: Driver> Dao<D> {
    pub fn new(executor: &Executor<D>, table: impl Into<String>) -> Self {
        Self {
            executor: executor.clone(),
            table: table.into(),
            binding: Mutex::new(None),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// The transaction statements are currently routed through, if any
    pub fn bound_transaction(&self) -> Option<Arc<Transaction<D>>> {
        self.binding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every row of the table
    pub async fn find_all<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.executor
            .query_builder()
            .select(["*"])
            .from([self.table.as_str()])
            .fetch_all(self)
            .await
    }

    /// Only the given fields of every row
    pub async fn project(&self, fields: &[&str]) -> Result<Vec<Row>> {
        self.executor
            .query_builder()
            .select(fields.iter().copied())
            .from([self.table.as_str()])
            .fetch_rows(self)
            .await
    }

    pub async fn find_where<T: DeserializeOwned>(&self, clause: Where) -> Result<Vec<T>> {
        self.executor
            .query_builder()
            .select(["*"])
            .from([self.table.as_str()])
            .where_clause(clause)
            .fetch_all(self)
            .await
    }

    /// Rows matching `template` once its parameters are bound to `args`
    ///
    /// ```ignore
    /// let by_name = Where::new(Condition::param("name", op::EQ, 1));
    /// let wines: Vec<Wine> = dao.find_by(&by_name, &["Pinot".into()]).await?;
    /// ```
    pub async fn find_by<T: DeserializeOwned>(&self, template: &Where, args: &[Value]) -> Result<Vec<T>> {
        let clause = template.clone().bind(args)?;
        self.find_where(clause).await
    }

    /// First row matching `clause`, if any
    pub async fn find_optional<T: DeserializeOwned>(&self, clause: Where) -> Result<Option<T>> {
        self.executor
            .query_builder()
            .select(["*"])
            .from([self.table.as_str()])
            .where_clause(clause)
            .fetch_optional(self)
            .await
    }

    /// Insert entities, returning the number of rows written
    pub async fn insert<T: Serialize>(&self, entities: &[T]) -> Result<u64> {
        let records = self.records(entities)?;
        self.insert_records(records).await
    }

    pub async fn insert_records(&self, records: Vec<Record>) -> Result<u64> {
        self.executor
            .query_builder()
            .insert(self.table.as_str(), records)
            .execute(self)
            .await
    }

    /// Write entities back by primary key, all or nothing.
    ///
    /// Returns the number of rows updated, or [`Error::TransactionFailed`]
    /// if any of the updates failed and the batch was rolled back. While the
    /// DAO is bound to a transaction the updates join it instead, and the
    /// first failure is returned for that transaction's coordinator to act on.
    pub async fn update<T: Serialize>(&self, entities: &[T]) -> Result<u64> {
        let records = self.records(entities)?;
        self.update_records(records).await
    }

    pub async fn update_records(&self, records: Vec<Record>) -> Result<u64> {
        let statements = MassUpdate::new(self.table.as_str(), records, self.executor.registry().clone())
            .with_mapper(self.executor.field_mapper())
            .statements()?;

        if let Some(bound) = self.bound_transaction() {
            return run_all(bound.as_ref(), &statements).await;
        }

        let updated = AtomicU64::new(0);
        let (statements, counter) = (&statements, &updated);
        let succeeded = transaction(&[self as &dyn Participant<D>], |transaction| async move {
            let count = run_all(transaction.as_ref(), statements).await?;
            counter.store(count, Ordering::Relaxed);
            Ok::<(), Error>(())
        })
        .await?;

        if succeeded {
            Ok(updated.into_inner())
        } else {
            Err(Error::transaction_failed(self.table.as_str()))
        }
    }

    /// Delete the rows matching `clause`
    pub async fn delete(&self, clause: Where) -> Result<u64> {
        self.executor
            .query_builder()
            .delete()
            .from([self.table.as_str()])
            .where_clause(clause)
            .execute(self)
            .await
    }

    /// Run a hand-written statement and deserialize its rows
    pub async fn query<T: DeserializeOwned>(&self, sql: &str, args: Vec<Value>) -> Result<Vec<T>> {
        self.submit(&self.raw(sql, args))
            .await?
            .into_iter()
            .map(|row| Ok(serde_json::from_value(serde_json::Value::Object(row))?))
            .collect()
    }

    /// Run a hand-written statement and return the affected row count
    pub async fn execute(&self, sql: &str, args: Vec<Value>) -> Result<u64> {
        Ok(self.run(&self.raw(sql, args)).await?.row_count)
    }

    fn raw(&self, sql: &str, args: Vec<Value>) -> PreparedStatement {
        PreparedStatement::new(sql, args).with_scope([self.table.clone()])
    }

    /// Convert entities to records, rejecting fields the table does not declare
    fn records<T: Serialize>(&self, entities: &[T]) -> Result<Vec<Record>> {
        let declared = self.executor.registry().lookup(&self.table);
        entities
            .iter()
            .map(|entity| {
                let record = Record::from_entity(entity)?;
                if let Some(fields) = declared {
                    if let Some(unknown) = record.fields().find(|field| {
                        !fields
                            .iter()
                            .any(|known| known.name == *field || known.storage_name() == *field)
                    }) {
                        return Err(Error::validation(format!(
                            "Field \"{}\" is not declared on table \"{}\"",
                            unknown, self.table
                        )));
                    }
                }
                Ok(record)
            })
            .collect()
    }
}

async fn run_all<S: Submit>(target: &S, statements: &[PreparedStatement]) -> Result<u64> {
    let mut count = 0;
    for statement in statements {
        count += target.run(statement).await?.row_count;
    }
    Ok(count)
}

impl<D: Driver> Submit for Dao<D> {
    async fn run(&self, statement: &PreparedStatement) -> Result<QueryOutcome> {
        match self.bound_transaction() {
            Some(transaction) => transaction.run(statement).await,
            None => self.executor.run(statement).await,
        }
    }
}

impl<D: Driver> Participant<D> for Dao<D> {
    fn executor(&self) -> &Executor<D> {
        &self.executor
    }

    fn on_transaction(&self, transaction: Arc<Transaction<D>>) {
        *self.binding.lock().unwrap_or_else(PoisonError::into_inner) = Some(transaction);
    }

    fn on_transaction_end(&self) {
        self.binding
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
