//! DELETE keyword
//!
//! The table and the mandatory WHERE guard come from the FROM and WHERE parts.

use crate::statement::{PreparedStatement, QueryPart};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delete;

impl QueryPart for Delete {
    fn render(&self, _offset: usize) -> Result<PreparedStatement> {
        Ok(PreparedStatement::raw("DELETE"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_keyword() {
        assert_eq!(Delete.render(0).unwrap().text, "DELETE");
    }
}
