//! Per-evaluation variable store.

use std::collections::HashMap;

use crate::monolith::{Part, PartId, Value};

/// Named variables shared by every pattern evaluated in one pass.
///
/// Semantic producers write here and semantic consumers, dynamic parts and
/// optional parts read from here. The context also records what each
/// dynamic or optional part resolved to, keyed by [`PartId`], so pattern
/// trees stay immutable and shareable across connections.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: HashMap<String, Value>,
    fixed: HashMap<PartId, Part>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) a variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Read a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Read a numeric variable as an integer.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    /// True if the variable has been set.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of variables set.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no variable has been set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn fixed(&self, id: PartId) -> Option<&Part> {
        self.fixed.get(&id)
    }

    pub(crate) fn fix(&mut self, id: PartId, part: Part) {
        self.fixed.insert(id, part);
    }
}
