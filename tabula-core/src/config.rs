//! Connection and naming configuration

use crate::naming::NamingConvention;
use crate::{Error, Result};
use serde::Deserialize;
use std::env;

/// How result rows are renamed after a statement runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemapMode {
    /// Rename columns to field names through registry aliases, then the
    /// naming transformer
    #[default]
    Aliases,
    /// The driver already returns field names; rows pass through untouched
    Native,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub database_url: String,
    #[serde(default)]
    pub remap: RemapMode,
    #[serde(default)]
    pub naming: NamingConvention,
}

impl Config {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            remap: RemapMode::default(),
            naming: NamingConvention::default(),
        }
    }

    /// Read `TABULA_DATABASE_URL` (or `DATABASE_URL`), `TABULA_REMAP` and
    /// `TABULA_NAMING` from the environment
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("TABULA_DATABASE_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .map_err(|_| {
                Error::config("Set TABULA_DATABASE_URL or DATABASE_URL to the database connection URL")
            })?;

        let mut config = Self::new(database_url);
        if let Ok(remap) = env::var("TABULA_REMAP") {
            config.remap = parse_setting("TABULA_REMAP", &remap)?;
        }
        if let Ok(naming) = env::var("TABULA_NAMING") {
            config.naming = parse_setting("TABULA_NAMING", &naming)?;
        }
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| Error::config(err.to_string()))
    }
}

fn parse_setting<T: serde::de::DeserializeOwned>(name: &str, raw: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_lowercase()))
        .map_err(|err| Error::config(format!("Invalid value for {}: {}", name, err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_with_defaults() {
        let config = Config::from_json(r#"{ "database_url": "postgres://localhost/cellar" }"#).unwrap();
        assert_eq!(config.database_url, "postgres://localhost/cellar");
        assert_eq!(config.remap, RemapMode::Aliases);
        assert_eq!(config.naming, NamingConvention::Identity);
    }

    #[test]
    fn test_from_json_full() {
        let config = Config::from_json(
            r#"{ "database_url": "postgres://db/cellar", "remap": "native", "naming": "snake_case" }"#,
        )
        .unwrap();
        assert_eq!(config.remap, RemapMode::Native);
        assert_eq!(config.naming, NamingConvention::SnakeCase);
    }

    #[test]
    fn test_missing_url_is_config_error() {
        let err = Config::from_json(r#"{ "remap": "aliases" }"#).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_parse_setting() {
        let mode: RemapMode = parse_setting("TABULA_REMAP", " Native ").unwrap();
        assert_eq!(mode, RemapMode::Native);
        assert!(parse_setting::<NamingConvention>("TABULA_NAMING", "kebab").is_err());
    }
}
