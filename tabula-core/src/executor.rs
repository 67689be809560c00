//! Statement execution over a single lazily opened connection

use crate::builder::FieldMapper;
use crate::config::{Config, RemapMode};
use crate::driver::{Connection, Driver, QueryOutcome};
use crate::naming::FieldTransformer;
use crate::registry::Registry;
use crate::statement::PreparedStatement;
use crate::transaction::Transaction;
use crate::{Error, QueryBuilder, Result, Row};
use std::future::Future;
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Something prepared statements can be submitted to: an [`Executor`] or an
/// open [`Transaction`]
pub trait Submit: Send + Sync {
    /// Run a statement and return the full outcome, rows already remapped
    fn run(
        &self,
        statement: &PreparedStatement,
    ) -> impl Future<Output = Result<QueryOutcome>> + Send;

    /// Run a statement and return its rows
    fn submit(
        &self,
        statement: &PreparedStatement,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send {
        async move { self.run(statement).await.map(|outcome| outcome.rows) }
    }
}

/// Owns one database connection, opened on first use and shared serially by
/// every statement submitted through this executor and its clones.
///
/// Statements run in submission order since each submission holds the
/// connection until the driver answers.
pub struct Executor<D: Driver> {
    driver: Arc<D>,
    connection: Arc<Mutex<Option<D::Connection>>>,
    /// Name of the transaction currently holding the connection
    open_transaction: Arc<std::sync::Mutex<Option<String>>>,
    registry: Arc<Registry>,
    remap: RemapMode,
    transformer: Option<Arc<dyn FieldTransformer>>,
}

impl<D: Driver> Clone for Executor<D> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            connection: self.connection.clone(),
            open_transaction: self.open_transaction.clone(),
            registry: self.registry.clone(),
            remap: self.remap,
            transformer: self.transformer.clone(),
        }
    }
}

impl<D: Driver> Executor<D> {
    /// Executor remapping result columns through the registry's aliases.
    /// No connection is opened until the first statement.
    pub fn new(driver: D, registry: Arc<Registry>) -> Self {
        Self {
            driver: Arc::new(driver),
            connection: Arc::new(Mutex::new(None)),
            open_transaction: Arc::new(std::sync::Mutex::new(None)),
            registry,
            remap: RemapMode::default(),
            transformer: None,
        }
    }

    pub fn from_config(driver: D, registry: Arc<Registry>, config: &Config) -> Self {
        Self::new(driver, registry)
            .with_remap(config.remap)
            .with_transformer(config.naming.transformer())
    }

    pub fn with_remap(mut self, remap: RemapMode) -> Self {
        self.remap = remap;
        self
    }

    /// Naming fallback for names the registry has no alias for
    pub fn with_transformer(mut self, transformer: Arc<dyn FieldTransformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn remap_mode(&self) -> RemapMode {
        self.remap
    }

    /// A statement builder resolving names the way this executor remaps them
    pub fn query_builder(&self) -> QueryBuilder {
        let builder = QueryBuilder::new().with_registry(self.registry.clone());
        match &self.transformer {
            Some(transformer) => builder.with_transformer(transformer.clone()),
            None => builder,
        }
    }

    /// Field name resolution matching `query_builder`, for parts built directly
    pub fn field_mapper(&self) -> FieldMapper {
        FieldMapper::new(Some(self.registry.clone()), self.transformer.clone())
    }

    /// Whether both executors share the same connection
    pub fn same_as(&self, other: &Executor<D>) -> bool {
        Arc::ptr_eq(&self.connection, &other.connection)
    }

    /// Open a transaction named `name` on the shared connection.
    ///
    /// The connection stays reserved for the transaction until every handle
    /// to it is dropped; statements submitted to the executor meanwhile wait.
    /// Beginning another transaction while one is open is a usage error,
    /// since it could only wait on itself. Run nested work on the open
    /// [`Transaction`] instead.
    pub async fn begin(&self, name: &str) -> Result<Transaction<D>> {
        if let Some(open) = self.open_transaction() {
            return Err(Error::usage(format!(
                "Cannot begin transaction {}: transaction {} is already open on this connection",
                name, open
            )));
        }

        let mut slot = self.connection.clone().lock_owned().await;
        let connection = self.connected(&mut slot).await?;
        connection.query("BEGIN;", &[]).await?;
        *self.transaction_slot() = Some(name.to_string());
        info!(transaction = %name, "Transaction started");

        Ok(Transaction::new(name.to_string(), self.clone(), slot))
    }

    /// Name of the transaction currently holding the connection, if any
    pub fn open_transaction(&self) -> Option<String> {
        self.transaction_slot().clone()
    }

    pub(crate) fn release_transaction(&self) {
        self.transaction_slot().take();
    }

    fn transaction_slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.open_transaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Close the connection if one is open; the next statement reconnects
    pub async fn close(&self) -> Result<()> {
        let connection = self.connection.lock().await.take();
        if let Some(connection) = connection {
            connection.end().await?;
            info!("Database connection closed");
        }
        Ok(())
    }

    pub(crate) async fn connected<'a>(
        &self,
        slot: &'a mut Option<D::Connection>,
    ) -> Result<&'a mut D::Connection> {
        match slot {
            Some(connection) => Ok(connection),
            empty => {
                let connection = self.driver.connect().await?;
                info!("Database connection opened");
                Ok(empty.insert(connection))
            }
        }
    }

    /// Rename result keys from column names to field names
    pub(crate) fn remap(&self, scope: &[String], outcome: QueryOutcome) -> QueryOutcome {
        if self.remap == RemapMode::Native {
            return outcome;
        }

        let rows = outcome
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(column, value)| (self.field_name(scope, &column), value))
                    .collect()
            })
            .collect();
        QueryOutcome { rows, ..outcome }
    }

    fn field_name(&self, scope: &[String], column: &str) -> String {
        scope
            .iter()
            .find_map(|table| self.registry.resolve_alias(table, column))
            .map(str::to_string)
            .or_else(|| {
                self.transformer
                    .as_ref()
                    .map(|transformer| transformer.to_field_name(column))
            })
            .unwrap_or_else(|| column.to_string())
    }
}

impl<D: Driver> Submit for Executor<D> {
    async fn run(&self, statement: &PreparedStatement) -> Result<QueryOutcome> {
        debug!(sql = %statement.text, args = statement.args.len(), "Submitting statement");

        let mut slot = self.connection.lock().await;
        let connection = self.connected(&mut slot).await?;
        let outcome = connection.query(&statement.text, &statement.args).await?;
        drop(slot);

        Ok(self.remap(&statement.scope, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDriver;
    use crate::naming::SnakeCase;
    use crate::registry::{FieldDescriptor, StorageType};
    use crate::Record;
    use serde::Deserialize;
    use serde_json::json;
    use tokio_test::assert_ok;

    fn registry() -> Arc<Registry> {
        let mut registry = Registry::new();
        registry
            .declare(
                "wine",
                vec![
                    FieldDescriptor::primary_key("id", StorageType::Serial),
                    FieldDescriptor::field("name", StorageType::Varchar),
                    FieldDescriptor::field("naming", StorageType::Varchar),
                    FieldDescriptor::field("isOrganic", StorageType::Bool).alias("is_organic"),
                ],
            )
            .unwrap();
        Arc::new(registry)
    }

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("rows are objects"),
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Wine {
        id: i32,
        name: String,
        naming: String,
        is_organic: bool,
    }

    #[tokio::test]
    async fn test_connects_lazily_once() {
        let driver = MockDriver::new();
        let executor = Executor::new(driver.clone(), registry());
        assert_eq!(driver.connect_count(), 0);

        let statement = PreparedStatement::raw("SHOW server_version;");
        assert_ok!(executor.run(&statement).await);
        assert_ok!(executor.clone().run(&statement).await);

        assert_eq!(driver.connect_count(), 1);
        assert_eq!(driver.statements(), vec!["SHOW server_version;", "SHOW server_version;"]);
    }

    #[tokio::test]
    async fn test_connect_failure_propagates() {
        let driver = MockDriver::new();
        driver.fail_connect("connection refused");
        let executor = Executor::new(driver.clone(), registry());

        let err = executor
            .run(&PreparedStatement::raw("SHOW server_version;"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Database(_)));
    }

    #[tokio::test]
    async fn test_rows_are_remapped_through_aliases() {
        let driver = MockDriver::new();
        driver.respond_with_rows(vec![row(json!({
            "id": 1, "name": "Riesling", "naming": "Alsace", "is_organic": true
        }))]);
        let executor = Executor::new(driver, registry());

        let statement = PreparedStatement::raw("SELECT * FROM wine;").with_scope(["wine"]);
        let rows = executor.submit(&statement).await.unwrap();

        assert_eq!(rows[0].get("isOrganic"), Some(&json!(true)));
        assert!(rows[0].get("is_organic").is_none());
    }

    #[tokio::test]
    async fn test_native_mode_passes_rows_through() {
        let driver = MockDriver::new();
        driver.respond_with_rows(vec![row(json!({ "is_organic": true }))]);
        let executor = Executor::new(driver, registry()).with_remap(RemapMode::Native);

        let statement = PreparedStatement::raw("SELECT * FROM wine;").with_scope(["wine"]);
        let rows = executor.submit(&statement).await.unwrap();
        assert!(rows[0].contains_key("is_organic"));
    }

    #[tokio::test]
    async fn test_transformer_handles_unknown_columns() {
        let driver = MockDriver::new();
        driver.respond_with_rows(vec![row(json!({ "bottle_size": 75 }))]);
        let executor = Executor::new(driver, registry()).with_transformer(Arc::new(SnakeCase));

        let statement = PreparedStatement::raw("SELECT * FROM bottle;").with_scope(["bottle"]);
        let rows = executor.submit(&statement).await.unwrap();
        assert_eq!(rows[0].get("bottleSize"), Some(&json!(75)));
    }

    #[tokio::test]
    async fn test_insert_then_select_round_trip() {
        let driver = MockDriver::new();
        let registry = registry();
        let executor = Executor::new(driver.clone(), registry.clone());
        let mut builder = executor.query_builder();

        let fields = registry.lookup("wine").unwrap().to_vec();
        builder.create("wine", fields).execute(&executor).await.unwrap();
        let inserted = builder
            .insert(
                "wine",
                vec![Record::new()
                    .with("id", 1)
                    .with("name", "Gewurztraminer")
                    .with("naming", "Alsace")
                    .with("isOrganic", true)],
            )
            .execute(&executor)
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(
            driver.columns("wine"),
            vec!["id", "name", "naming", "is_organic"]
        );

        let wines: Vec<Wine> = builder
            .select(["*"])
            .from(["wine"])
            .fetch_all(&executor)
            .await
            .unwrap();
        assert_eq!(
            wines,
            vec![Wine {
                id: 1,
                name: "Gewurztraminer".to_string(),
                naming: "Alsace".to_string(),
                is_organic: true,
            }]
        );
    }

    #[tokio::test]
    async fn test_create_twice_is_idempotent() {
        let driver = MockDriver::new();
        let registry = registry();
        let executor = Executor::new(driver.clone(), registry.clone());
        let mut builder = executor.query_builder();
        let fields = registry.lookup("wine").unwrap().to_vec();

        assert_ok!(builder.create("wine", fields.clone()).execute(&executor).await);
        builder
            .insert("wine", vec![Record::new().with("name", "a").with("naming", "b").with("isOrganic", false)])
            .execute(&executor)
            .await
            .unwrap();
        assert_ok!(builder.create("wine", fields).execute(&executor).await);

        assert_eq!(driver.rows("wine").len(), 1);
        assert_eq!(driver.columns("wine").len(), 4);
    }

    #[tokio::test]
    async fn test_fetch_one_without_rows() {
        let driver = MockDriver::new();
        driver.respond_with_rows(vec![]);
        let executor = Executor::new(driver, registry());

        let result: Result<Wine> = executor
            .query_builder()
            .select(["*"])
            .from(["wine"])
            .fetch_one(&executor)
            .await;
        assert!(matches!(
            result,
            Err(crate::Error::Database(sqlx::Error::RowNotFound))
        ));
    }

    #[tokio::test]
    async fn test_close_reconnects_on_next_statement() {
        let driver = MockDriver::new();
        let executor = Executor::new(driver.clone(), registry());
        let statement = PreparedStatement::raw("SHOW server_version;");

        executor.run(&statement).await.unwrap();
        executor.close().await.unwrap();
        executor.run(&statement).await.unwrap();

        assert_eq!(driver.close_count(), 1);
        assert_eq!(driver.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_usage_errors_never_reach_the_driver() {
        let driver = MockDriver::new();
        let executor = Executor::new(driver.clone(), registry());

        let err = executor
            .query_builder()
            .delete()
            .from(["wine"])
            .execute(&executor)
            .await
            .unwrap_err();
        assert!(err.is_usage());
        assert!(driver.statements().is_empty());
        assert_eq!(driver.connect_count(), 0);
    }
}
