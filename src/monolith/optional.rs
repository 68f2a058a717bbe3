//! Parts present only when a context variable satisfies a condition.

use serde::{Deserialize, Serialize};

use crate::monolith::{
    Args, Buffer, Context, GrammarError, Message, Part, PartId, Validity, Value,
};

/// Predicate over a context value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Condition {
    /// Equal to the value; numeric values compare by integer value
    Equals(Value),
    /// Numerically greater than
    Greater(i64),
    /// Numerically less than
    Lesser(i64),
}

impl Condition {
    pub fn evaluate(&self, value: &Value) -> bool {
        match self {
            Condition::Equals(expected) => match (value.as_int(), expected.as_int()) {
                (Some(a), Some(b)) => a == b,
                _ => value == expected,
            },
            Condition::Greater(bound) => value.as_int().is_some_and(|n| n > *bound),
            Condition::Lesser(bound) => value.as_int().is_some_and(|n| n < *bound),
        }
    }
}

/// `item` when the variable `name` satisfies `condition`, otherwise nothing.
#[derive(Debug, Serialize, Deserialize)]
pub struct OptionalPart {
    #[serde(skip, default = "PartId::next")]
    id: PartId,
    pub name: String,
    pub condition: Condition,
    pub item: Box<Part>,
}

impl Clone for OptionalPart {
    fn clone(&self) -> Self {
        Self {
            id: PartId::next(),
            name: self.name.clone(),
            condition: self.condition,
            item: self.item.clone(),
        }
    }
}

impl PartialEq for OptionalPart {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.condition == other.condition && self.item == other.item
    }
}

impl Eq for OptionalPart {}

impl OptionalPart {
    pub fn new(name: impl Into<String>, condition: Condition, item: Part) -> Self {
        Self {
            id: PartId::next(),
            name: name.into(),
            condition,
            item: Box::new(item),
        }
    }

    pub fn id(&self) -> PartId {
        self.id
    }

    fn fix(&self, context: &Context) -> Option<Part> {
        let value = context.get(&self.name)?;
        if self.condition.evaluate(value) {
            Some((*self.item).clone())
        } else {
            Some(Part::Empty)
        }
    }

    pub(crate) fn generate(
        &self,
        args: &mut Args,
        context: &mut Context,
        strict: bool,
    ) -> Result<Option<Message>, GrammarError> {
        let Some(fixed) = self.fix(context) else {
            if strict {
                return Err(GrammarError::UndefinedContextVariable(self.name.clone()));
            }
            tracing::trace!("Skipping optional part: `{}` is not set", self.name);
            return Ok(None);
        };

        let message = fixed.generate(args, context, strict)?;
        context.fix(self.id, fixed);
        Ok(message)
    }

    pub fn parse(&self, buffer: &mut Buffer, args: &mut Args, context: &mut Context) {
        if buffer.is_empty() {
            return;
        }
        let Some(fixed) = self.fix(context) else {
            return;
        };
        fixed.parse(buffer, args, context);
        context.fix(self.id, fixed);
    }

    /// `Invalid` if the driving variable is absent.
    pub fn validate(&self, buffer: &mut Buffer, context: &mut Context) -> Validity {
        let Some(fixed) = self.fix(context) else {
            return Validity::Invalid;
        };
        let validity = fixed.validate(buffer, context);
        context.fix(self.id, fixed);
        validity
    }

    pub fn count(&self, context: &Context) -> usize {
        context
            .fixed(self.id)
            .map_or(0, |part| part.count(context))
    }

    pub fn resolve(&self, context: &mut Context) {
        if let Some(fixed) = self.fix(context) {
            fixed.resolve(context);
            context.fix(self.id, fixed);
        }
    }
}
