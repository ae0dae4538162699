//! Condition evaluation for Branch nodes and While loops.
//!
//! Evaluation is total: a missing variable, a type mismatch or an invalid
//! pattern yields `false` (or `true` for `neq`), never an error.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::environment::VariableEnvironment;

/// Comparison applied between a variable and a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    Matches,
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    String(String),
}

impl Literal {
    /// Strict equality against a variable value: same type and same value.
    /// Arrays and objects are never equal to a literal.
    pub fn strictly_equals(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Bool(a), Value::Bool(b)) => a == b,
            (Self::Number(a), Value::Number(b)) => b.as_f64().is_some_and(|b| *a == b),
            (Self::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i32> for Literal {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// `field <comparator> value`, evaluated against the variable environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Variable name looked up in the environment.
    pub field: String,
    #[serde(rename = "type")]
    pub comparator: Comparator,
    pub value: Literal,
}

impl Condition {
    pub fn new(field: impl Into<String>, comparator: Comparator, value: impl Into<Literal>) -> Self {
        Self {
            field: field.into(),
            comparator,
            value: value.into(),
        }
    }
}

/// Evaluate one condition against the environment.
pub fn evaluate(env: &VariableEnvironment, condition: &Condition) -> bool {
    let value = env.get(&condition.field);
    let rhs = &condition.value;

    match condition.comparator {
        Comparator::Eq => value.is_some_and(|v| rhs.strictly_equals(v)),
        Comparator::Neq => !value.is_some_and(|v| rhs.strictly_equals(v)),
        Comparator::Gt => compare_numbers(value, rhs, |a, b| a > b),
        Comparator::Lt => compare_numbers(value, rhs, |a, b| a < b),
        Comparator::Gte => compare_numbers(value, rhs, |a, b| a >= b),
        Comparator::Lte => compare_numbers(value, rhs, |a, b| a <= b),
        Comparator::Contains => match value {
            Some(Value::String(s)) => s.contains(&rhs.to_string()),
            Some(Value::Array(items)) => items.iter().any(|item| rhs.strictly_equals(item)),
            _ => false,
        },
        Comparator::Matches => match value {
            Some(Value::String(s)) => match Regex::new(&rhs.to_string()) {
                Ok(re) => re.is_match(s),
                Err(e) => {
                    warn!(field = %condition.field, error = %e, "Invalid match pattern, treating as no match");
                    false
                }
            },
            _ => false,
        },
    }
}

/// Index of the first satisfied condition, if any.
pub fn first_match(env: &VariableEnvironment, conditions: &[Condition]) -> Option<usize> {
    conditions.iter().position(|c| evaluate(env, c))
}

fn compare_numbers(value: Option<&Value>, rhs: &Literal, op: impl Fn(f64, f64) -> bool) -> bool {
    match (value.and_then(Value::as_f64), rhs.as_f64()) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}
