//! A wine cellar run against the in-memory driver.
//!
//! Swap `MockDriver` for `tabula::postgres::PgDriver` (feature `postgres`)
//! to run the same flow against a database.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tabula::prelude::*;
use tabula_core::mock::MockDriver;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Wine {
    id: i32,
    name: String,
    naming: String,
    is_organic: bool,
}

impl Entity for Wine {
    const TABLE: &'static str = "wine";

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::primary_key("id", StorageType::Int),
            FieldDescriptor::field("name", StorageType::Varchar),
            FieldDescriptor::field("naming", StorageType::Varchar),
            FieldDescriptor::field("isOrganic", StorageType::Bool).alias("is_organic"),
        ]
    }
}

fn wine(id: i32, name: &str, naming: &str, is_organic: bool) -> Wine {
    Wine {
        id,
        name: name.to_string(),
        naming: naming.to_string(),
        is_organic,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("Tabula - cellar walkthrough\n");

    let mut registry = Registry::new();
    registry.register::<Wine>()?;

    let driver = MockDriver::new();
    let executor = Executor::new(driver.clone(), Arc::new(registry));
    init_tables(&executor).await?;

    let wines = Dao::new(&executor, Wine::TABLE);
    let inserted = wines
        .insert(&[
            wine(1, "Riesling", "Alsace", true),
            wine(2, "Chinon", "Loire", false),
            wine(3, "Sylvaner", "Alsace", true),
        ])
        .await?;
    println!("Inserted {} wines", inserted);

    let from_alsace: Vec<Wine> = wines
        .find_where(Where::new(("naming", "Alsace")).and(("isOrganic", true)))
        .await?;
    println!("Organic wines from Alsace: {:?}", from_alsace);

    let mut renamed = from_alsace.clone();
    for wine in &mut renamed {
        wine.name.push_str(" Grand Cru");
    }
    println!("Updated {} wines", wines.update(&renamed).await?);

    let deleted = wines.delete(Where::new(("id", 2))).await?;
    println!("Deleted {} wine", deleted);

    println!("\nStatements sent:");
    for statement in driver.statements() {
        println!("   {}", statement);
    }
    Ok(())
}
