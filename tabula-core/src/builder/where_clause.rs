//! WHERE clause engine
//!
//! A [`Where`] is an ordered list of conditions. It is either anchored on a
//! first condition ([`Where::new`]) or started empty in group mode
//! ([`Where::group`]), then extended with [`Where::and`] / [`Where::or`].
//!
//! Passing several conditions at once opens a parenthesized group: every
//! member but the last is marked as chained, and all members are joined with
//! the combinator of the call.
//!
//! ```
//! use tabula_core::{Condition, QueryPart, Where};
//!
//! let clause = Where::group()
//!     .and([
//!         Condition::equals("comment", "Hi mom!"),
//!         Condition::equals("type", 2),
//!     ])
//!     .or(Condition::equals("type", 1))
//!     .render(0)
//!     .unwrap();
//!
//! assert_eq!(clause.text, "WHERE (comment = $1 AND type = $2) OR type = $3");
//! ```

use crate::condition::{Combinator, Condition, Conditions, Operand};
use crate::statement::{PreparedStatement, QueryPart};
use crate::{Error, Result, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    #[default]
    Unset,
    Anchored,
    Grouped,
}

/// Composable WHERE clause
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Where {
    mode: Mode,
    conditions: Vec<Condition>,
    misuse: Option<String>,
}

impl Where {
    /// Start a clause anchored on `anchor`, which is rendered without a combinator
    pub fn new(anchor: impl Into<Condition>) -> Self {
        let mut anchor = anchor.into();
        anchor.chained = false;
        anchor.combinator = None;
        Self {
            mode: Mode::Anchored,
            conditions: vec![anchor],
            misuse: None,
        }
    }

    /// Start a clause without anchor; the first combinator added is not rendered
    pub fn group() -> Self {
        Self {
            mode: Mode::Grouped,
            conditions: Vec::new(),
            misuse: None,
        }
    }

    pub fn and(self, conditions: impl Into<Conditions>) -> Self {
        self.push(Combinator::And, conditions.into())
    }

    pub fn or(self, conditions: impl Into<Conditions>) -> Self {
        self.push(Combinator::Or, conditions.into())
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Substitute every `Operand::Param(n)` with `args[n - 1]`
    pub fn bind(mut self, args: &[Value]) -> Result<Self> {
        for condition in &mut self.conditions {
            if let Operand::Param(index) = condition.operand {
                let value = index
                    .checked_sub(1)
                    .and_then(|i| args.get(i))
                    .ok_or_else(|| {
                        Error::validation(format!(
                            "No argument bound for parameter {} of field \"{}\" ({} supplied)",
                            index,
                            condition.field,
                            args.len()
                        ))
                    })?;
                condition.operand = Operand::Value(value.clone());
            }
        }
        Ok(self)
    }

    /// Rename every condition field
    pub fn map_fields<F>(mut self, map: F) -> Self
    where
        F: Fn(&str) -> String,
    {
        for condition in &mut self.conditions {
            condition.field = map(&condition.field);
        }
        self
    }

    fn push(mut self, combinator: Combinator, conditions: Conditions) -> Self {
        if self.mode == Mode::Unset {
            self.misuse.get_or_insert_with(|| {
                format!(
                    "{}() called before the clause has an anchor or group",
                    combinator.as_str().to_lowercase()
                )
            });
            return self;
        }

        match conditions {
            Conditions::Single(mut condition) => {
                condition.chained = false;
                condition.combinator = Some(combinator);
                self.conditions.push(condition);
            }
            Conditions::Group(members) => {
                let last = members.len().saturating_sub(1);
                for (i, mut condition) in members.into_iter().enumerate() {
                    condition.chained = i < last;
                    condition.combinator = Some(combinator);
                    self.conditions.push(condition);
                }
            }
        }
        self
    }
}

impl QueryPart for Where {
    fn render(&self, offset: usize) -> Result<PreparedStatement> {
        if let Some(misuse) = &self.misuse {
            return Err(Error::usage(misuse.clone()));
        }
        if self.conditions.is_empty() {
            return Err(Error::validation(
                "WHERE clause requires at least one condition",
            ));
        }

        let mut parts = Vec::with_capacity(self.conditions.len());
        let mut args = Vec::with_capacity(self.conditions.len());
        let mut previous_chained = false;

        for (i, condition) in self.conditions.iter().enumerate() {
            let value = match &condition.operand {
                Operand::Value(value) => value.clone(),
                Operand::Param(index) => {
                    return Err(Error::validation(format!(
                        "Parameter {} of field \"{}\" is not bound",
                        index, condition.field
                    )))
                }
            };

            let mut part = String::new();
            if i > 0 {
                if let Some(combinator) = condition.combinator {
                    part.push_str(combinator.as_str());
                    part.push(' ');
                }
            }
            if condition.chained && !previous_chained {
                part.push('(');
            }
            part.push_str(&format!(
                "{} {} ${}",
                condition.field,
                condition.operator.as_str(),
                offset + args.len() + 1
            ));
            if !condition.chained && previous_chained {
                part.push(')');
            }

            previous_chained = condition.chained;
            args.push(value);
            parts.push(part);
        }

        Ok(PreparedStatement::new(
            format!("WHERE {}", parts.join(" ")),
            args,
        ))
    }
}
