//! Descriptions bound to arguments, and the messages they produce.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::monolith::{Args, Context, Description, GrammarError};

/// Concrete bytes produced by one part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Written immediately
    Bytes(Vec<u8>),
    /// Written after `milliseconds`
    Timed { milliseconds: u64, bytes: Vec<u8> },
}

impl Message {
    pub fn bytes(&self) -> &[u8] {
        match self {
            Message::Bytes(bytes) | Message::Timed { bytes, .. } => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Message::Bytes(bytes) | Message::Timed { bytes, .. } => bytes,
        }
    }

    /// Delay to wait before writing, if any.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Message::Bytes(_) => None,
            Message::Timed { milliseconds, .. } => Some(Duration::from_millis(*milliseconds)),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

/// A description paired with the argument queue that drives it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub description: Description,
    pub args: Args,
}

impl Instance {
    pub fn new(description: Description, args: Args) -> Self {
        Self { description, args }
    }

    /// Produce one message per part that yields output.
    ///
    /// Elements that cannot be produced are skipped. The instance itself is
    /// left untouched, so it can produce messages again for the next
    /// connection.
    pub fn messages(&self) -> Vec<Message> {
        let mut args = self.args.clone();
        let mut context = Context::new();
        self.description
            .messages_from_args(&mut args, &mut context)
            .into_iter()
            .flatten()
            .collect()
    }

    /// Like [`Instance::messages`] but fails on the first element error.
    pub fn try_messages(&self) -> Result<Vec<Message>, GrammarError> {
        let mut args = self.args.clone();
        let mut context = Context::new();
        let mut messages = Vec::with_capacity(self.description.len());
        for part in &self.description.parts {
            if let Some(message) = part.generate(&mut args, &mut context, true)? {
                messages.push(message);
            }
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monolith::{ByteType, BytesPart, Part, TimedPart, Value};

    #[test]
    fn test_messages_repeatable() {
        let instance = Instance::new(
            Description::new(vec![
                Part::Bytes(BytesPart::new(vec![ByteType::enumerated(vec![1, 2])])),
                Part::Empty,
                Part::Timed(TimedPart::new(10, vec![ByteType::fixed(3)])),
            ]),
            Args::new([Value::Byte(2)]),
        );

        let first = instance.messages();
        let second = instance.messages();
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                Message::Bytes(vec![2]),
                Message::Timed {
                    milliseconds: 10,
                    bytes: vec![3]
                },
            ]
        );
        assert_eq!(first[1].delay(), Some(Duration::from_millis(10)));
        assert_eq!(instance.args.len(), 1);
    }

    #[test]
    fn test_strict_messages() {
        let instance = Instance::new(
            Description::new(vec![Part::Bytes(BytesPart::new(vec![
                ByteType::fixed(0),
                ByteType::enumerated(vec![1]),
            ]))]),
            Args::empty(),
        );

        assert_eq!(instance.messages(), vec![Message::Bytes(vec![0])]);
        assert_eq!(instance.try_messages(), Err(GrammarError::EmptyArgumentQueue));
    }

    #[test]
    fn test_message_accessors() {
        let message = Message::Bytes(vec![]);
        assert!(message.is_empty());
        assert_eq!(message.delay(), None);
        assert_eq!(Message::Bytes(vec![4, 5]).into_bytes(), vec![4, 5]);
    }
}
