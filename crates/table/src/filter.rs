//! Table filter expressions
//!
//! Supports conjunctions of property comparisons against quoted literals:
//! `PartitionKey eq 'a' and RowKey ge 'b'`. A quote inside a literal is
//! written twice.

use crate::backend::Entity;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use stowage_core::{BackendError, Value};

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl FilterOperator {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            FilterOperator::Equal => ordering == Ordering::Equal,
            FilterOperator::NotEqual => ordering != Ordering::Equal,
            FilterOperator::GreaterThan => ordering == Ordering::Greater,
            FilterOperator::GreaterThanOrEqual => ordering != Ordering::Less,
            FilterOperator::LessThan => ordering == Ordering::Less,
            FilterOperator::LessThanOrEqual => ordering != Ordering::Greater,
        }
    }
}

impl FromStr for FilterOperator {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eq" => Ok(FilterOperator::Equal),
            "ne" => Ok(FilterOperator::NotEqual),
            "gt" => Ok(FilterOperator::GreaterThan),
            "ge" => Ok(FilterOperator::GreaterThanOrEqual),
            "lt" => Ok(FilterOperator::LessThan),
            "le" => Ok(FilterOperator::LessThanOrEqual),
            other => Err(BackendError::Service(format!(
                "unknown filter operator '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOperator::Equal => write!(f, "eq"),
            FilterOperator::NotEqual => write!(f, "ne"),
            FilterOperator::GreaterThan => write!(f, "gt"),
            FilterOperator::GreaterThanOrEqual => write!(f, "ge"),
            FilterOperator::LessThan => write!(f, "lt"),
            FilterOperator::LessThanOrEqual => write!(f, "le"),
        }
    }
}

/// One `property op 'literal'` comparison
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub property: String,
    pub operator: FilterOperator,
    pub literal: String,
}

impl FilterCondition {
    /// Missing properties never match
    pub fn matches(&self, entity: &Entity) -> bool {
        let Some(value) = entity.get(&self.property) else {
            return false;
        };
        let ordering = match value {
            Value::Integer(i) => match self.literal.parse::<i64>() {
                Ok(literal) => i.cmp(&literal),
                Err(_) => i.to_string().cmp(&self.literal),
            },
            Value::Float(f) => match self.literal.parse::<f64>() {
                Ok(literal) => match f.partial_cmp(&literal) {
                    Some(ordering) => ordering,
                    None => return false,
                },
                Err(_) => f.to_string().cmp(&self.literal),
            },
            Value::Null => return false,
            other => other.to_string().cmp(&self.literal),
        };
        self.operator.accepts(ordering)
    }
}

/// A conjunction of conditions; empty matches everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<FilterCondition>,
}

#[derive(Debug, PartialEq)]
enum Token {
    Word(String),
    Literal(String),
}

impl Filter {
    pub fn parse(expression: &str) -> Result<Self, BackendError> {
        let tokens = tokenize(expression)?;
        let mut conditions = Vec::new();
        let mut tokens = tokens.into_iter();

        loop {
            let property = match tokens.next() {
                None if conditions.is_empty() => break,
                Some(Token::Word(word)) => word,
                _ => return Err(invalid(expression, "expected a property name")),
            };
            let operator = match tokens.next() {
                Some(Token::Word(word)) => word.parse::<FilterOperator>()?,
                _ => return Err(invalid(expression, "expected an operator")),
            };
            let literal = match tokens.next() {
                Some(Token::Literal(literal)) => literal,
                _ => return Err(invalid(expression, "expected a quoted literal")),
            };
            conditions.push(FilterCondition {
                property,
                operator,
                literal,
            });

            match tokens.next() {
                None => break,
                Some(Token::Word(word)) if word.eq_ignore_ascii_case("and") => continue,
                _ => return Err(invalid(expression, "conditions must be joined with 'and'")),
            }
        }

        Ok(Self { conditions })
    }

    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        self.conditions.iter().all(|c| c.matches(entity))
    }
}

fn invalid(expression: &str, reason: &str) -> BackendError {
    BackendError::Service(format!("invalid filter \"{}\": {}", expression, reason))
}

fn tokenize(expression: &str) -> Result<Vec<Token>, BackendError> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '\'' {
            chars.next();
            let mut literal = String::new();
            loop {
                match chars.next() {
                    Some('\'') if chars.peek() == Some(&'\'') => {
                        chars.next();
                        literal.push('\'');
                    }
                    Some('\'') => break,
                    Some(other) => literal.push(other),
                    None => return Err(invalid(expression, "unterminated literal")),
                }
            }
            tokens.push(Token::Literal(literal));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '\'' {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }

    Ok(tokens)
}
