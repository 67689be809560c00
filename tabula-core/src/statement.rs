//! Prepared statements and the part trait every SQL fragment implements

use crate::{Error, Result, Value};
use std::fmt::{self, Display};

/// SQL text paired with its ordered positional arguments
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreparedStatement {
    pub text: String,
    pub args: Vec<Value>,
    /// Tables the statement reads from, used to resolve result aliases
    pub scope: Vec<String>,
}

impl PreparedStatement {
    pub fn new(text: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            text: text.into(),
            args,
            scope: Vec::new(),
        }
    }

    /// A statement without parameters
    pub fn raw(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    pub fn with_scope<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Placeholder numbers in order of appearance
    pub fn placeholders(&self) -> Vec<usize> {
        let bytes = self.text.as_bytes();
        let mut found = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'$' {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                if end > start {
                    if let Ok(n) = self.text[start..end].parse() {
                        found.push(n);
                    }
                }
                i = end.max(start);
            } else {
                i += 1;
            }
        }
        found
    }

    /// Verify that placeholders run from `offset + 1` without gaps and that
    /// there is exactly one argument per placeholder.
    pub fn check_placeholders(&self, offset: usize) -> Result<()> {
        let mut numbers = self.placeholders();
        numbers.sort_unstable();
        numbers.dedup();

        let expected: Vec<usize> = (offset + 1..=offset + self.args.len()).collect();
        if numbers != expected {
            return Err(Error::validation(format!(
                "Placeholders {:?} do not match {} argument(s) starting at ${}",
                numbers,
                self.args.len(),
                offset + 1
            )));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl Display for PreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A renderable piece of a statement.
///
/// `offset` is the number of arguments already bound by the parts rendered
/// before this one; placeholders produced by the part start at `offset + 1`.
pub trait QueryPart {
    fn render(&self, offset: usize) -> Result<PreparedStatement>;
}

/// Format the placeholder list `$a, $b, ...` for `count` values after `offset`
pub(crate) fn placeholder_list(offset: usize, count: usize) -> String {
    (offset + 1..=offset + count)
        .map(|n| format!("${}", n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_in_order() {
        let stmt = PreparedStatement::new(
            "UPDATE wine SET name = $1 WHERE id = $2 AND price > $10",
            vec![],
        );
        assert_eq!(stmt.placeholders(), vec![1, 2, 10]);
    }

    #[test]
    fn test_check_placeholders() {
        let stmt = PreparedStatement::new(
            "WHERE wine_id = $1 AND comment = $2",
            vec![1.into(), "Hi mom!".into()],
        );
        assert!(stmt.check_placeholders(0).is_ok());

        let offset = PreparedStatement::new("WHERE id = $4", vec![2.into()]);
        assert!(offset.check_placeholders(3).is_ok());
        assert!(offset.check_placeholders(0).is_err());
    }

    #[test]
    fn test_check_placeholders_detects_gaps() {
        let stmt = PreparedStatement::new("WHERE a = $1 AND b = $3", vec![1.into(), 2.into()]);
        let err = stmt.check_placeholders(0).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_lone_dollar_is_not_a_placeholder() {
        let stmt = PreparedStatement::raw("SELECT '$' FROM wine");
        assert!(stmt.placeholders().is_empty());
        assert!(stmt.check_placeholders(0).is_ok());
    }

    #[test]
    fn test_placeholder_list() {
        assert_eq!(placeholder_list(0, 3), "$1, $2, $3");
        assert_eq!(placeholder_list(4, 2), "$5, $6");
        assert_eq!(placeholder_list(0, 0), "");
    }
}
