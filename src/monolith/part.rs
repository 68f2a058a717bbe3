//! Composite patterns and descriptions.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::monolith::{
    Args, Buffer, ByteType, Context, DynamicPart, GrammarError, Message, OptionalPart, Validity,
};

/// An ordered run of byte elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytesPart {
    pub items: Vec<ByteType>,
}

/// A run of byte elements sent after a delay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedPart {
    pub milliseconds: u64,
    pub items: Vec<ByteType>,
}

/// One step of a description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Bytes(BytesPart),
    Timed(TimedPart),
    Dynamic(DynamicPart),
    Optional(OptionalPart),
    Empty,
}

/// Ordered list of parts, one per handshake step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub parts: Vec<Part>,
}

pub(crate) fn generate_items(
    items: &[ByteType],
    args: &mut Args,
    context: &mut Context,
    strict: bool,
) -> Result<Vec<u8>, GrammarError> {
    let mut bytes = Vec::with_capacity(items.len());
    for item in items {
        match item.byte_from_args(args, context) {
            Ok(byte) => bytes.push(byte),
            Err(e) if strict => return Err(e),
            Err(e) => trace!("Skipping byte: {}", e),
        }
    }
    Ok(bytes)
}

fn parse_items(items: &[ByteType], buffer: &mut Buffer, args: &mut Args, context: &mut Context) {
    for item in items {
        item.parse(buffer, args, context);
    }
}

fn validate_items(items: &[ByteType], buffer: &mut Buffer, context: &mut Context) -> Validity {
    for item in items {
        match item.validate(buffer, context) {
            Validity::Valid => continue,
            other => return other,
        }
    }
    Validity::Valid
}

impl BytesPart {
    pub fn new(items: Vec<ByteType>) -> Self {
        Self { items }
    }

    /// Generate this part's bytes, skipping elements that fail.
    pub fn message_from_args(&self, args: &mut Args, context: &mut Context) -> Message {
        let bytes = generate_items(&self.items, args, context, false).unwrap_or_default();
        Message::Bytes(bytes)
    }

    pub fn parse(&self, buffer: &mut Buffer, args: &mut Args, context: &mut Context) {
        parse_items(&self.items, buffer, args, context);
    }

    pub fn validate(&self, buffer: &mut Buffer, context: &mut Context) -> Validity {
        validate_items(&self.items, buffer, context)
    }

    pub fn count(&self) -> usize {
        self.items.iter().map(ByteType::count).sum()
    }
}

impl TimedPart {
    pub fn new(milliseconds: u64, items: Vec<ByteType>) -> Self {
        Self {
            milliseconds,
            items,
        }
    }

    /// Delay before this part is written.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.milliseconds)
    }

    pub fn count(&self) -> usize {
        self.items.iter().map(ByteType::count).sum()
    }
}

impl Part {
    pub(crate) fn generate(
        &self,
        args: &mut Args,
        context: &mut Context,
        strict: bool,
    ) -> Result<Option<Message>, GrammarError> {
        match self {
            Part::Bytes(part) => Ok(Some(Message::Bytes(generate_items(
                &part.items,
                args,
                context,
                strict,
            )?))),
            Part::Timed(part) => Ok(Some(Message::Timed {
                milliseconds: part.milliseconds,
                bytes: generate_items(&part.items, args, context, strict)?,
            })),
            Part::Dynamic(part) => part.generate(args, context, strict),
            Part::Optional(part) => part.generate(args, context, strict),
            Part::Empty => Ok(None),
        }
    }

    /// Generate this part's message, skipping elements that fail.
    ///
    /// Returns nothing when the part produces no message at all (an empty
    /// part, an absent optional, or a dynamic part with no length).
    pub fn message_from_args(&self, args: &mut Args, context: &mut Context) -> Option<Message> {
        self.generate(args, context, false).ok().flatten()
    }

    /// Consume this part's bytes, recording arguments and semantic values.
    pub fn parse(&self, buffer: &mut Buffer, args: &mut Args, context: &mut Context) {
        match self {
            Part::Bytes(part) => parse_items(&part.items, buffer, args, context),
            Part::Timed(part) => parse_items(&part.items, buffer, args, context),
            Part::Dynamic(part) => part.parse(buffer, args, context),
            Part::Optional(part) => part.parse(buffer, args, context),
            Part::Empty => {}
        }
    }

    /// Check `buffer` against this part, consuming the bytes examined.
    pub fn validate(&self, buffer: &mut Buffer, context: &mut Context) -> Validity {
        match self {
            Part::Bytes(part) => validate_items(&part.items, buffer, context),
            Part::Timed(part) => validate_items(&part.items, buffer, context),
            Part::Dynamic(part) => part.validate(buffer, context),
            Part::Optional(part) => part.validate(buffer, context),
            Part::Empty => Validity::Valid,
        }
    }

    /// Wire length of this part.
    ///
    /// Dynamic and optional parts count 0 until they have been resolved in
    /// `context`.
    pub fn count(&self, context: &Context) -> usize {
        match self {
            Part::Bytes(part) => part.count(),
            Part::Timed(part) => part.count(),
            Part::Dynamic(part) => part.count(context),
            Part::Optional(part) => part.count(context),
            Part::Empty => 0,
        }
    }

    /// Resolve dynamic and optional parts whose driving variable is set,
    /// so that [`Part::count`] is known before any bytes arrive.
    pub fn resolve(&self, context: &mut Context) {
        match self {
            Part::Dynamic(part) => part.resolve(context),
            Part::Optional(part) => part.resolve(context),
            Part::Bytes(_) | Part::Timed(_) | Part::Empty => {}
        }
    }
}

impl From<BytesPart> for Part {
    fn from(part: BytesPart) -> Self {
        Part::Bytes(part)
    }
}

impl From<TimedPart> for Part {
    fn from(part: TimedPart) -> Self {
        Part::Timed(part)
    }
}

impl From<DynamicPart> for Part {
    fn from(part: DynamicPart) -> Self {
        Part::Dynamic(part)
    }
}

impl From<OptionalPart> for Part {
    fn from(part: OptionalPart) -> Self {
        Part::Optional(part)
    }
}

impl Description {
    pub fn new(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    /// Generate one entry per part, in order.
    pub fn messages_from_args(&self, args: &mut Args, context: &mut Context) -> Vec<Option<Message>> {
        self.parts
            .iter()
            .map(|part| part.message_from_args(args, context))
            .collect()
    }

    pub fn parse(&self, buffer: &mut Buffer, args: &mut Args, context: &mut Context) {
        for part in &self.parts {
            part.parse(buffer, args, context);
        }
    }

    pub fn validate(&self, buffer: &mut Buffer, context: &mut Context) -> Validity {
        for part in &self.parts {
            match part.validate(buffer, context) {
                Validity::Valid => continue,
                other => return other,
            }
        }
        Validity::Valid
    }

    pub fn count(&self, context: &Context) -> usize {
        self.parts.iter().map(|part| part.count(context)).sum()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monolith::Value;

    fn simple() -> Description {
        Description::new(vec![
            BytesPart::new(vec![ByteType::fixed(0x0a), ByteType::enumerated(vec![1, 2, 3])]).into(),
            TimedPart::new(25, vec![ByteType::random(), ByteType::random_enumerated(vec![9])]).into(),
            Part::Empty,
        ])
    }

    #[test]
    fn test_generate_parse_validate() {
        let description = simple();
        let mut args = Args::new([Value::Byte(3)]);
        let mut context = Context::new();
        let messages = description.messages_from_args(&mut args, &mut context);
        assert_eq!(messages.len(), 3);
        assert!(messages[2].is_none());

        let first = messages[0].as_ref().unwrap();
        assert_eq!(first.bytes(), &[0x0a, 3]);
        let second = messages[1].as_ref().unwrap();
        assert_eq!(second.delay(), Some(Duration::from_millis(25)));
        assert_eq!(second.bytes()[1], 9);

        let wire: Vec<u8> = messages.iter().flatten().flat_map(|m| m.bytes().to_vec()).collect();

        let mut parsed = Args::empty();
        let mut context = Context::new();
        description.parse(&mut Buffer::from(wire.clone()), &mut parsed, &mut context);
        assert_eq!(parsed, Args::new([Value::Byte(3), Value::Byte(9)]));

        let mut buffer = Buffer::from(wire);
        assert_eq!(description.validate(&mut buffer, &mut context), Validity::Valid);
        assert_eq!(description.count(&context), 4);
    }

    #[test]
    fn test_first_failure_wins() {
        let description = simple();
        let mut context = Context::new();

        let mut buffer = Buffer::from(vec![0x0b]);
        assert_eq!(description.validate(&mut buffer, &mut context), Validity::Invalid);

        let mut buffer = Buffer::from(vec![0x0a, 2, 0x55]);
        assert_eq!(description.validate(&mut buffer, &mut context), Validity::Incomplete);
    }

    #[test]
    fn test_lenient_generation_skips() {
        let part = BytesPart::new(vec![
            ByteType::fixed(1),
            ByteType::enumerated(vec![7]),
            ByteType::fixed(2),
        ]);
        let mut context = Context::new();
        let message = part.message_from_args(&mut Args::empty(), &mut context);
        assert_eq!(message.bytes(), &[1, 2]);

        let strict = Part::Bytes(part).generate(&mut Args::empty(), &mut context, true);
        assert_eq!(strict, Err(GrammarError::EmptyArgumentQueue));
    }

    #[test]
    fn test_serde_shape() {
        let part = Part::Timed(TimedPart::new(5, vec![ByteType::fixed(1)]));
        let json = serde_json::to_string(&part).unwrap();
        assert_eq!(
            json,
            r#"{"type":"timed","milliseconds":5,"items":[{"type":"fixed","byte":1}]}"#
        );
        let back: Part = serde_json::from_str(&json).unwrap();
        assert_eq!(back, part);

        let empty: Part = serde_json::from_str(r#"{"type":"empty"}"#).unwrap();
        assert_eq!(empty, Part::Empty);
    }
}
