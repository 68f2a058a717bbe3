//! Byte-pattern grammar.
//!
//! A small typed language for describing the bytes a toneburst sends and
//! expects. Patterns are built from:
//!
//! - [`ByteType`]: one byte that is fixed, enumerated, random, or tied to a
//!   named context variable
//! - [`Part`]: an ordered run of byte types, a timed run, a dynamic run whose
//!   length is computed at evaluation time, or an optional run
//! - [`Description`]: an ordered list of parts, one per handshake step
//! - [`Instance`]: a description bound to an argument queue, ready to
//!   produce concrete [`Message`]s
//!
//! Every pattern supports three operations that share one [`Context`] per
//! evaluation pass:
//!
//! ```text
//!   generate   Args + Context  -> bytes
//!   parse      bytes + Context -> Args, Context variables
//!   validate   bytes + Context -> Valid | Invalid | Incomplete
//! ```
//!
//! Pattern trees are immutable during evaluation. Dynamic and optional parts
//! record what they resolved to in the [`Context`], so one description can
//! be evaluated by many connections at once as long as each uses its own
//! context.

mod buffer;
mod byte_type;
mod context;
mod dynamic;
mod instance;
mod optional;
mod part;
pub mod persistence;
mod value;

pub use buffer::Buffer;
pub use byte_type::ByteType;
pub use context::Context;
pub use dynamic::{DynamicKind, DynamicPart, PartId, MAX_DYNAMIC_LENGTH};
pub use instance::{Instance, Message};
pub use optional::{Condition, OptionalPart};
pub use part::{BytesPart, Description, Part, TimedPart};
pub use value::{Args, Value};

use std::fmt;

use thiserror::Error;

/// Outcome of validating a buffer against a pattern.
///
/// Parts are checked in order and the first non-`Valid` outcome wins. An
/// empty buffer is `Incomplete` against a part whose length is known, but a
/// dynamic or optional part whose driving variable is unset, or whose
/// dynamic length is past [`MAX_DYNAMIC_LENGTH`], is `Invalid` before any
/// bytes are looked at. So a description that opens with such a part is
/// `Invalid` even on an empty buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Validity {
    /// Every byte matched
    Valid,
    /// A byte failed its pattern; more input cannot fix this
    Invalid,
    /// The buffer ran out before the pattern did
    Incomplete,
}

impl Validity {
    /// True only for [`Validity::Valid`].
    pub fn is_valid(self) -> bool {
        self == Validity::Valid
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Validity::Valid => "Valid",
            Validity::Invalid => "Invalid",
            Validity::Incomplete => "Incomplete",
        };
        f.write_str(name)
    }
}

/// Errors raised while producing a byte from a pattern element.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// The argument queue had nothing left to pop
    #[error("argument queue is empty")]
    EmptyArgumentQueue,

    /// An argument or context value had the wrong type or range
    #[error("argument type mismatch: expected {expected}, got {found}")]
    ArgumentTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// An enumerated element was given a byte outside its option set
    #[error("byte {0:#04x} is not in the allowed set")]
    ByteNotInSet(u8),

    /// A semantic consumer or dynamic part read a variable nobody set
    #[error("undefined context variable `{0}`")]
    UndefinedContextVariable(String),

    /// A random enumerated element has no options to choose from
    #[error("option set is empty")]
    EmptyOptionSet,

    /// A dynamic part was asked for a run longer than it will build
    #[error("dynamic length {length} exceeds maximum {max}")]
    LengthTooLarge { length: usize, max: usize },
}
