//! Leaf pattern elements: one byte each.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::crypto::SecureRandom;
use crate::monolith::{Args, Buffer, Context, GrammarError, Validity, Value};

/// A single-byte pattern element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ByteType {
    /// Always this byte
    Fixed { byte: u8 },
    /// A caller-supplied byte that must be one of `options`
    Enumerated { options: Vec<u8> },
    /// Any byte; generated from the OS entropy source
    Random,
    /// A uniformly chosen member of `options`
    RandomEnumerated { options: Vec<u8> },
    /// Evaluates `value` and records the byte under `name`
    SemanticProducer { name: String, value: Box<ByteType> },
    /// The byte previously recorded under `name`
    SemanticConsumer { name: String },
}

impl ByteType {
    pub fn fixed(byte: u8) -> Self {
        ByteType::Fixed { byte }
    }

    pub fn enumerated(options: Vec<u8>) -> Self {
        ByteType::Enumerated { options }
    }

    pub fn random() -> Self {
        ByteType::Random
    }

    pub fn random_enumerated(options: Vec<u8>) -> Self {
        ByteType::RandomEnumerated { options }
    }

    pub fn producer(name: impl Into<String>, value: ByteType) -> Self {
        ByteType::SemanticProducer {
            name: name.into(),
            value: Box::new(value),
        }
    }

    pub fn consumer(name: impl Into<String>) -> Self {
        ByteType::SemanticConsumer { name: name.into() }
    }

    /// Number of bytes this element occupies on the wire.
    pub fn count(&self) -> usize {
        1
    }

    /// Produce this element's byte, popping from `args` where the variant
    /// takes caller input.
    pub fn byte_from_args(&self, args: &mut Args, context: &mut Context) -> Result<u8, GrammarError> {
        match self {
            ByteType::Fixed { byte } => Ok(*byte),
            ByteType::Enumerated { options } => {
                let byte = args.pop_byte()?;
                if options.contains(&byte) {
                    Ok(byte)
                } else {
                    Err(GrammarError::ByteNotInSet(byte))
                }
            }
            ByteType::Random => Ok(SecureRandom::bytes::<1>()[0]),
            ByteType::RandomEnumerated { options } => options
                .choose(&mut SecureRandom::rng())
                .copied()
                .ok_or(GrammarError::EmptyOptionSet),
            ByteType::SemanticProducer { name, value } => {
                let byte = value.byte_from_args(args, context)?;
                context.set(name.clone(), Value::Int(i64::from(byte)));
                Ok(byte)
            }
            ByteType::SemanticConsumer { name } => {
                let value = context
                    .get(name)
                    .ok_or_else(|| GrammarError::UndefinedContextVariable(name.clone()))?;
                value.as_byte().ok_or(GrammarError::ArgumentTypeMismatch {
                    expected: "byte",
                    found: value.kind(),
                })
            }
        }
    }

    /// Consume one byte, recording semantic values.
    ///
    /// Callers are expected to have validated the buffer first; on an empty
    /// buffer this does nothing.
    pub fn parse(&self, buffer: &mut Buffer, args: &mut Args, context: &mut Context) {
        let Some(byte) = buffer.pop() else {
            return;
        };

        match self {
            ByteType::Fixed { .. } | ByteType::Random => {}
            ByteType::Enumerated { .. } | ByteType::RandomEnumerated { .. } => {
                args.push(Value::Byte(byte));
            }
            ByteType::SemanticProducer { name, value } => {
                if matches!(
                    **value,
                    ByteType::Enumerated { .. } | ByteType::RandomEnumerated { .. }
                ) {
                    args.push(Value::Byte(byte));
                }
                context.set(name.clone(), Value::Int(i64::from(byte)));
            }
            ByteType::SemanticConsumer { name } => {
                if let Some(value) = context.get(name).copied() {
                    args.push(value);
                }
            }
        }
    }

    /// Check the front byte of `buffer` against this element, consuming it.
    pub fn validate(&self, buffer: &mut Buffer, context: &mut Context) -> Validity {
        let Some(byte) = buffer.pop() else {
            return Validity::Incomplete;
        };
        self.check(byte, context)
    }

    fn check(&self, byte: u8, context: &mut Context) -> Validity {
        let valid = match self {
            ByteType::Fixed { byte: expected } => byte == *expected,
            ByteType::Enumerated { options } | ByteType::RandomEnumerated { options } => {
                options.contains(&byte)
            }
            ByteType::Random => true,
            ByteType::SemanticProducer { name, value } => {
                let validity = value.check(byte, context);
                if validity == Validity::Valid {
                    context.set(name.clone(), Value::Int(i64::from(byte)));
                }
                return validity;
            }
            ByteType::SemanticConsumer { name } => {
                context.get_int(name) == Some(i64::from(byte))
            }
        };

        if valid {
            Validity::Valid
        } else {
            Validity::Invalid
        }
    }
}
