//! Error types for Tabula

use thiserror::Error;

/// The main error type for Tabula operations
#[derive(Error, Debug)]
pub enum Error {
    /// Error raised by the database driver, passed through untouched
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Invalid schema declaration
    #[error("Schema error: {message}")]
    Schema { message: String },

    /// Builder or coordinator used in an illegal order or combination
    #[error("Usage error: {message}")]
    Usage { message: String },

    /// Statement input that cannot produce valid SQL
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Row (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing or malformed configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A mass update could not be applied atomically
    #[error("Transaction on table '{table}' failed and was not applied")]
    TransactionFailed { table: String },
}

/// Convenience Result type for Tabula operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a new usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new failed-transaction error
    pub fn transaction_failed(table: impl Into<String>) -> Self {
        Self::TransactionFailed {
            table: table.into(),
        }
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }
}
