//! Argument values and the argument queue.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::monolith::GrammarError;

/// A value carried in an argument queue or a context variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// A single byte
    Byte(u8),
    /// A signed integer (lengths, seeds, semantic values)
    Int(i64),
    /// A flag
    Bool(bool),
}

impl Value {
    /// Name of the variant, used in type mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Byte(_) => "byte",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
        }
    }

    /// Integer view of a numeric value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Byte(b) => Some(i64::from(*b)),
            Value::Int(n) => Some(*n),
            Value::Bool(_) => None,
        }
    }

    /// Byte view of a numeric value that fits in `0..=255`.
    pub fn as_byte(&self) -> Option<u8> {
        match self {
            Value::Byte(b) => Some(*b),
            Value::Int(n) => u8::try_from(*n).ok(),
            Value::Bool(_) => None,
        }
    }
}

impl From<u8> for Value {
    fn from(b: u8) -> Self {
        Value::Byte(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

/// Ordered queue of values consumed front to back during generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Args {
    values: VecDeque<Value>,
}

impl Args {
    /// Create a queue holding `values` in order.
    pub fn new(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Create an empty queue.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when nothing is left to pop.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of values left.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Remove and return the front value.
    pub fn pop(&mut self) -> Result<Value, GrammarError> {
        self.values
            .pop_front()
            .ok_or(GrammarError::EmptyArgumentQueue)
    }

    /// Pop the front value as an integer.
    pub fn pop_int(&mut self) -> Result<i64, GrammarError> {
        let value = self.pop()?;
        value.as_int().ok_or(GrammarError::ArgumentTypeMismatch {
            expected: "int",
            found: value.kind(),
        })
    }

    /// Pop the front value as a byte.
    ///
    /// Integers are accepted when they fit in a byte.
    pub fn pop_byte(&mut self) -> Result<u8, GrammarError> {
        let value = self.pop()?;
        value.as_byte().ok_or(GrammarError::ArgumentTypeMismatch {
            expected: "byte",
            found: value.kind(),
        })
    }

    /// Append a value to the back of the queue.
    pub fn push(&mut self, value: impl Into<Value>) {
        self.values.push_back(value.into());
    }

    /// Iterate over the remaining values without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }
}

impl FromIterator<Value> for Args {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::new(iter)
    }
}
