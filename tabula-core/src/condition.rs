//! Conditions: `field <operator> operand` triples tagged for WHERE rendering

use crate::{Operator, Value};
use std::fmt::{self, Display};

/// How a condition is joined to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Combinator::And => "AND",
            Combinator::Or => "OR",
        }
    }
}

impl Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a condition
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A literal value, bound as a parameter when rendered
    Value(Value),
    /// The n-th (1-based) argument supplied later through `Where::bind`
    Param(usize),
}

/// A single comparison in a WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub operand: Operand,
    pub(crate) chained: bool,
    pub(crate) combinator: Option<Combinator>,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            operand: Operand::Value(value.into()),
            chained: false,
            combinator: None,
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Equals, value)
    }

    pub fn greater_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::GreaterThan, value)
    }

    pub fn less_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::LessThan, value)
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Self::new(field, Operator::Like, pattern)
    }

    /// A condition whose operand is the `index`-th bound argument (1-based)
    ///
    /// # Examples
    /// ```
    /// use tabula_core::{Condition, Operator, Where};
    ///
    /// let template = Where::new(Condition::param("id", Operator::Equals, 1));
    /// let bound = template.bind(&[42.into()]).unwrap();
    /// assert_eq!(bound.conditions()[0].operand, tabula_core::Operand::Value(42.into()));
    /// ```
    pub fn param(field: impl Into<String>, operator: Operator, index: usize) -> Self {
        Self {
            field: field.into(),
            operator,
            operand: Operand::Param(index),
            chained: false,
            combinator: None,
        }
    }

    /// Whether the condition sits inside a parenthesized group and is not its last member
    pub fn is_chained(&self) -> bool {
        self.chained
    }

    pub fn combinator(&self) -> Option<Combinator> {
        self.combinator
    }
}

impl<T> From<(&str, T)> for Condition
where
    T: Into<Value>,
{
    fn from((field, value): (&str, T)) -> Self {
        Condition::equals(field, value)
    }
}

impl<T> From<(&str, Operator, T)> for Condition
where
    T: Into<Value>,
{
    fn from((field, operator, value): (&str, Operator, T)) -> Self {
        Condition::new(field, operator, value)
    }
}

/// One condition or a group of conditions passed to `and` / `or`
#[derive(Debug, Clone, PartialEq)]
pub enum Conditions {
    Single(Condition),
    Group(Vec<Condition>),
}

impl From<Condition> for Conditions {
    fn from(condition: Condition) -> Self {
        Conditions::Single(condition)
    }
}

impl From<Vec<Condition>> for Conditions {
    fn from(conditions: Vec<Condition>) -> Self {
        Conditions::Group(conditions)
    }
}

impl<const N: usize> From<[Condition; N]> for Conditions {
    fn from(conditions: [Condition; N]) -> Self {
        Conditions::Group(conditions.into())
    }
}

impl<T> From<(&str, T)> for Conditions
where
    T: Into<Value>,
{
    fn from(pair: (&str, T)) -> Self {
        Conditions::Single(pair.into())
    }
}

impl<T> From<(&str, Operator, T)> for Conditions
where
    T: Into<Value>,
{
    fn from(triple: (&str, Operator, T)) -> Self {
        Conditions::Single(triple.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op;

    #[test]
    fn test_tuple_shorthand_is_equality() {
        let condition: Condition = ("wine_id", 1).into();
        assert_eq!(condition.operator, Operator::Equals);
        assert_eq!(condition.operand, Operand::Value(Value::I32(1)));
        assert!(!condition.is_chained());
        assert_eq!(condition.combinator(), None);
    }

    #[test]
    fn test_tuple_with_operator() {
        let condition: Condition = ("price", op::GT, 12.5).into();
        assert_eq!(condition.operator, Operator::GreaterThan);
        assert_eq!(condition.field, "price");
    }

    #[test]
    fn test_named_constructors() {
        assert_eq!(Condition::less_than("year", 2000).operator, Operator::LessThan);
        assert_eq!(Condition::like("name", "Chateau%").operator, Operator::Like);
        assert_eq!(
            Condition::param("id", Operator::Equals, 2).operand,
            Operand::Param(2)
        );
    }

    #[test]
    fn test_conditions_from_array() {
        let group: Conditions = [
            Condition::equals("comment", "Hi mom!"),
            Condition::equals("type", 2),
        ]
        .into();
        assert!(matches!(group, Conditions::Group(ref members) if members.len() == 2));
    }
}
