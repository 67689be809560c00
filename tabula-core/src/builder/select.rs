//! SELECT projection

use crate::statement::{PreparedStatement, QueryPart};
use crate::{Error, Result};

/// Projection list of a SELECT statement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    fields: Vec<String>,
}

impl Select {
    /// An empty projection renders as `SELECT *`
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// `(table, field)` pairs for every `table.field` entry of the projection
    pub fn qualified_fields(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .filter_map(|field| field.rsplit_once('.'))
            .map(|(table, field)| (table.to_string(), field.to_string()))
            .collect()
    }
}

impl QueryPart for Select {
    fn render(&self, _offset: usize) -> Result<PreparedStatement> {
        if self.fields.is_empty() {
            return Ok(PreparedStatement::raw("SELECT *"));
        }
        if self.fields.len() > 1 && self.fields.iter().any(|field| field == "*") {
            return Err(Error::validation(
                "SELECT * cannot be combined with other fields",
            ));
        }
        Ok(PreparedStatement::raw(format!(
            "SELECT {}",
            self.fields.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_fields() {
        let select = Select::new(["id", "name", "is_organic"]);
        assert_eq!(
            select.render(0).unwrap().text,
            "SELECT id, name, is_organic"
        );
    }

    #[test]
    fn test_select_all() {
        assert_eq!(Select::new(["*"]).render(0).unwrap().text, "SELECT *");
        assert_eq!(Select::default().render(0).unwrap().text, "SELECT *");
    }

    #[test]
    fn test_star_mixed_with_fields() {
        let err = Select::new(["*", "name"]).render(0).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_qualified_fields() {
        let select = Select::new(["wine.name", "bottle.comment", "id"]);
        assert_eq!(
            select.qualified_fields(),
            vec![
                ("wine".to_string(), "name".to_string()),
                ("bottle".to_string(), "comment".to_string()),
            ]
        );
    }
}
