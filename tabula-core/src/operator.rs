//! Comparison operators usable in WHERE conditions

use crate::{Error, Result};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    GreaterThan,
    LessThan,
    Like,
}

impl Operator {
    /// Get the SQL representation of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::Like => "LIKE",
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" | "equals" => Ok(Operator::Equals),
            ">" | "greaterThan" => Ok(Operator::GreaterThan),
            "<" | "lessThan" => Ok(Operator::LessThan),
            "LIKE" | "like" => Ok(Operator::Like),
            _ => Err(Error::usage(format!(
                "Unknown operator '{}'. Supported operators are =, >, < and LIKE",
                s
            ))),
        }
    }
}

/// Convenience module for operator constants
pub mod op {
    use super::Operator;

    pub const EQ: Operator = Operator::Equals;
    pub const GT: Operator = Operator::GreaterThan;
    pub const LT: Operator = Operator::LessThan;
    pub const LIKE: Operator = Operator::Like;
}
