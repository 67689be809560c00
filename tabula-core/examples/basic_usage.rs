use std::sync::Arc;
use tabula_core::{
    op, Condition, FieldDescriptor, NamingConvention, QueryBuilder, Record, Registry, StorageType,
    Value,
};

fn main() -> tabula_core::Result<()> {
    println!("Tabula Core - statement rendering\n");

    let mut registry = Registry::new();
    registry.declare(
        "wine",
        vec![
            FieldDescriptor::primary_key("id", StorageType::Serial),
            FieldDescriptor::sized_field("name", StorageType::Varchar, 120),
            FieldDescriptor::field("naming", StorageType::Varchar),
            FieldDescriptor::field("isOrganic", StorageType::Bool).alias("is_organic"),
        ],
    )?;
    let registry = Arc::new(registry);

    let mut builder = QueryBuilder::new()
        .with_registry(registry.clone())
        .with_transformer(NamingConvention::SnakeCase.transformer());

    // 1. Table definition
    let fields = registry.lookup("wine").unwrap_or_default().to_vec();
    let create = builder.create("wine", fields).render()?;
    println!("1. {}", create);

    // 2. Multi-row insert, one placeholder group per row
    let insert = builder
        .insert(
            "wine",
            vec![
                Record::new()
                    .with("name", "Riesling")
                    .with("naming", "Alsace")
                    .with("isOrganic", true),
                Record::new()
                    .with("name", "Chinon")
                    .with("naming", "Loire")
                    .with("isOrganic", false),
            ],
        )
        .render()?;
    println!("2. {}\n   args: {:?}", insert, insert.args);

    // 3. Anchored clause followed by an OR group
    let select = builder
        .select(["name", "isOrganic"])
        .from(["wine"])
        .where_(("naming", "Alsace"))
        .or([
            Condition::like("name", "Ch%"),
            Condition::greater_than("id", 10),
        ])
        .render()?;
    println!("3. {}\n   args: {:?}", select, select.args);

    // 4. SET arguments come first, the WHERE clause continues the numbering
    let update = builder
        .update("wine", [("isOrganic", Value::Bool(true))])
        .where_(("id", 2))
        .and(("name", op::LIKE, "Chi%"))
        .render()?;
    println!("4. {}\n   args: {:?}", update, update.args);

    // 5. Misuse is reported when rendering, and the builder starts over
    match builder.delete().from(["wine"]).render() {
        Ok(statement) => println!("5. unexpected: {}", statement),
        Err(err) => println!("5. {}", err),
    }

    Ok(())
}
