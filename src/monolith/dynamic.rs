//! Parts whose length is decided at evaluation time.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::monolith::part::generate_items;
use crate::monolith::{
    Args, Buffer, ByteType, BytesPart, Context, GrammarError, Message, Part, Validity,
};

/// Upper bound (exclusive) of a seed-derived length.
pub const MAX_SEEDED_LENGTH: usize = 256;

/// Longest run a dynamic part will expand to, whatever its length source.
pub const MAX_DYNAMIC_LENGTH: usize = 65_535;

static NEXT_PART_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a dynamic or optional part.
///
/// Used as the key under which a [`Context`] records what the part resolved
/// to. Every construction, clone and deserialization gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartId(u64);

impl PartId {
    pub(crate) fn next() -> Self {
        PartId(NEXT_PART_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Where a dynamic part gets its length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DynamicKind {
    /// Popped from the argument queue (generation only)
    Args,
    /// The integer stored under `name`
    Length { name: String },
    /// A length in `0..256` drawn from a PRNG seeded with `name`'s value
    Seed { name: String },
}

/// A run of `n` copies of `item`, with `n` computed at evaluation time.
#[derive(Debug, Serialize, Deserialize)]
pub struct DynamicPart {
    #[serde(skip, default = "PartId::next")]
    id: PartId,
    pub kind: DynamicKind,
    pub item: ByteType,
}

impl Clone for DynamicPart {
    fn clone(&self) -> Self {
        Self {
            id: PartId::next(),
            kind: self.kind.clone(),
            item: self.item.clone(),
        }
    }
}

impl PartialEq for DynamicPart {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.item == other.item
    }
}

impl Eq for DynamicPart {}

/// Length derived from a seed, stable across platforms.
pub fn seeded_length(seed: i64) -> usize {
    let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
    rng.gen_range(0..MAX_SEEDED_LENGTH)
}

impl DynamicPart {
    pub fn new(kind: DynamicKind, item: ByteType) -> Self {
        Self {
            id: PartId::next(),
            kind,
            item,
        }
    }

    /// Length popped from the argument queue at generation time.
    pub fn from_args(item: ByteType) -> Self {
        Self::new(DynamicKind::Args, item)
    }

    /// Length read from the context variable `name`.
    pub fn length(name: impl Into<String>, item: ByteType) -> Self {
        Self::new(DynamicKind::Length { name: name.into() }, item)
    }

    /// Length derived from a PRNG seeded with the context variable `name`.
    pub fn seeded(name: impl Into<String>, item: ByteType) -> Self {
        Self::new(DynamicKind::Seed { name: name.into() }, item)
    }

    pub fn id(&self) -> PartId {
        self.id
    }

    fn fix(&self, n: usize) -> BytesPart {
        BytesPart::new(vec![self.item.clone(); n])
    }

    fn length_from(&self, context: &Context) -> Option<usize> {
        match &self.kind {
            DynamicKind::Args => context.fixed(self.id).map(|part| part.count(context)),
            DynamicKind::Length { name } => context
                .get_int(name)
                .and_then(|n| usize::try_from(n).ok()),
            DynamicKind::Seed { name } => context.get_int(name).map(seeded_length),
        }
    }

    fn length_for_generation(
        &self,
        args: &mut Args,
        context: &Context,
    ) -> Result<usize, GrammarError> {
        let n = match &self.kind {
            DynamicKind::Args => {
                let n = args.pop_int()?;
                usize::try_from(n).map_err(|_| GrammarError::ArgumentTypeMismatch {
                    expected: "length",
                    found: "negative int",
                })?
            }
            DynamicKind::Length { name } | DynamicKind::Seed { name } => self
                .length_from(context)
                .ok_or_else(|| GrammarError::UndefinedContextVariable(name.clone()))?,
        };
        if n > MAX_DYNAMIC_LENGTH {
            return Err(GrammarError::LengthTooLarge {
                length: n,
                max: MAX_DYNAMIC_LENGTH,
            });
        }
        Ok(n)
    }

    /// Resolved length, or `None` when absent or past [`MAX_DYNAMIC_LENGTH`].
    fn bounded_length(&self, context: &Context) -> Option<usize> {
        self.length_from(context)
            .filter(|&n| n <= MAX_DYNAMIC_LENGTH)
    }

    pub(crate) fn generate(
        &self,
        args: &mut Args,
        context: &mut Context,
        strict: bool,
    ) -> Result<Option<Message>, GrammarError> {
        let n = match self.length_for_generation(args, context) {
            Ok(n) => n,
            Err(e) if strict => return Err(e),
            Err(e) => {
                tracing::trace!("Skipping dynamic part: {}", e);
                return Ok(None);
            }
        };

        let fixed = self.fix(n);
        let bytes = generate_items(&fixed.items, args, context, strict)?;
        context.fix(self.id, Part::Bytes(fixed));
        Ok(Some(Message::Bytes(bytes)))
    }

    pub fn parse(&self, buffer: &mut Buffer, args: &mut Args, context: &mut Context) {
        if buffer.is_empty() {
            return;
        }
        let Some(n) = self.bounded_length(context) else {
            return;
        };

        let fixed = self.fix(n);
        fixed.parse(buffer, args, context);
        context.fix(self.id, Part::Bytes(fixed));
    }

    /// Validate against the resolved run; `Invalid` if the driving
    /// variable is absent or names a length past [`MAX_DYNAMIC_LENGTH`].
    pub fn validate(&self, buffer: &mut Buffer, context: &mut Context) -> Validity {
        let Some(n) = self.bounded_length(context) else {
            return Validity::Invalid;
        };

        let fixed = self.fix(n);
        let validity = fixed.validate(buffer, context);
        context.fix(self.id, Part::Bytes(fixed));
        validity
    }

    pub fn count(&self, context: &Context) -> usize {
        context
            .fixed(self.id)
            .map_or(0, |part| part.count(context))
    }

    pub fn resolve(&self, context: &mut Context) {
        if let Some(n) = self.bounded_length(context) {
            context.fix(self.id, Part::Bytes(self.fix(n)));
        }
    }
}
