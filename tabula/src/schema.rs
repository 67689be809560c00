//! Table creation for every declared entity

use tabula_core::{Driver, Executor, Result};
use tracing::info;

/// Run `CREATE TABLE IF NOT EXISTS` for every table in the executor's
/// registry, in declaration order.
///
/// A registry can only be initialized once; a second call fails with a
/// schema error before anything is sent.
pub async fn init_tables<D: Driver>(executor: &Executor<D>) -> Result<()> {
    let registry = executor.registry();
    registry.mark_initialized()?;

    for (table, fields) in registry.tables() {
        executor
            .query_builder()
            .create(table, fields.to_vec())
            .execute(executor)
            .await?;
        info!(table, columns = fields.len(), "Table created");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tabula_core::mock::MockDriver;
    use tabula_core::{FieldDescriptor, Registry, StorageType};
    use tokio_test::assert_ok;

    fn registry() -> Arc<Registry> {
        let mut registry = Registry::new();
        registry
            .declare(
                "wine",
                vec![
                    FieldDescriptor::primary_key("id", StorageType::Serial),
                    FieldDescriptor::sized_field("name", StorageType::Varchar, 80),
                    FieldDescriptor::field("isOrganic", StorageType::Bool).alias("is_organic"),
                ],
            )
            .unwrap();
        registry
            .declare(
                "bottle",
                vec![
                    FieldDescriptor::primary_key("id", StorageType::Serial),
                    FieldDescriptor::field("comment", StorageType::Text).nullable(),
                ],
            )
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_creates_tables_in_declaration_order() {
        let driver = MockDriver::new();
        let executor = Executor::new(driver.clone(), registry());

        assert_ok!(init_tables(&executor).await);
        assert_eq!(
            driver.statements(),
            vec![
                "CREATE TABLE IF NOT EXISTS wine (id SERIAL PRIMARY KEY, name VARCHAR(80) NOT NULL, is_organic BOOL NOT NULL);",
                "CREATE TABLE IF NOT EXISTS bottle (id SERIAL PRIMARY KEY, comment TEXT);",
            ]
        );
        assert_eq!(driver.columns("wine"), vec!["id", "name", "is_organic"]);
        assert!(executor.registry().is_initialized());
    }

    #[tokio::test]
    async fn test_second_initialization_is_rejected() {
        let driver = MockDriver::new();
        let executor = Executor::new(driver.clone(), registry());
        assert_ok!(init_tables(&executor).await);

        let err = init_tables(&executor).await.unwrap_err();
        assert!(err.is_schema());
        assert_eq!(driver.statements().len(), 2);
    }
}
