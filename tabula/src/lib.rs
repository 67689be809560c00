//! Tabula - a small ORM layer for PostgreSQL
//!
//! Tables are declared once in a [`Registry`], created with
//! [`init_tables`], and read or written through one [`Dao`] per table.
//! Statements always use `$n` placeholders; nothing is interpolated.
//!
//! # Examples
//!
//! ```ignore
//! use std::sync::Arc;
//! use tabula::prelude::*;
//! use tabula::postgres::PgDriver;
//!
//! let mut registry = Registry::new();
//! registry.declare("wine", vec![
//!     FieldDescriptor::primary_key("id", StorageType::Serial),
//!     FieldDescriptor::field("name", StorageType::Varchar),
//!     FieldDescriptor::field("isOrganic", StorageType::Bool).alias("is_organic"),
//! ])?;
//!
//! let config = Config::from_env()?;
//! let executor = Executor::from_config(PgDriver::new(&config.database_url), Arc::new(registry), &config);
//! init_tables(&executor).await?;
//!
//! let wines = Dao::new(&executor, "wine");
//! let organic: Vec<Wine> = wines.find_where(Where::new(("isOrganic", true))).await?;
//! ```

pub mod dao;
pub mod schema;

pub use dao::Dao;
pub use schema::init_tables;
pub use tabula_core::*;

/// Everything needed to declare tables and query them
pub mod prelude {
    pub use crate::dao::Dao;
    pub use crate::schema::init_tables;
    pub use tabula_core::{
        op, transaction, transaction_with_policy, CommitPolicy, Condition, Config, Entity,
        Error, Executor, FieldDescriptor, QueryBuilder, Record, Registry, Result, StorageType,
        Submit, Value, Where,
    };
}
