//! Tabula Core - statement construction and execution for a small PostgreSQL ORM
//!
//! This crate holds the field registry, the `$n`-numbered statement parts,
//! the query builder that stitches them together, and the lazy-connecting
//! executor and transaction coordinator that run the result.

pub mod builder;
pub mod condition;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod naming;
pub mod operator;
pub mod query;
pub mod registry;
pub mod statement;
pub mod transaction;
pub mod value;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

#[cfg(feature = "postgres")]
pub mod postgres;

// Re-export main types
pub use builder::{Create, Delete, FieldMapper, FromTables, Insert, MassUpdate, Select, Update, Where};
pub use condition::{Combinator, Condition, Conditions, Operand};
pub use config::{Config, RemapMode};
pub use driver::{Connection, Driver, QueryOutcome};
pub use error::{Error, Result};
pub use executor::{Executor, Submit};
pub use naming::{FieldTransformer, Identity, NamingConvention, SnakeCase};
pub use operator::{op, Operator};
pub use query::QueryBuilder;
pub use registry::{Entity, FieldDescriptor, Registry, SchemaItem, StorageType};
pub use statement::{PreparedStatement, QueryPart};
pub use transaction::{transaction, transaction_with_policy, CommitPolicy, Participant, Transaction};
pub use value::{Record, Row, Value};
