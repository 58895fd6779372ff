// attributes.rs — Attribute maps and per-attribute change pairs.
//
// Records are treated as flat maps of column name to JSON value. A change to
// one attribute is an (old, new) pair, stored on disk as a two-element array
// so a changeset reads naturally as `{"name": ["Bob", "Sam"]}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A record's attributes, keyed by column name.
///
/// `BTreeMap` keeps the keys sorted, so serialized snapshots are stable and
/// two snapshots of the same state compare byte-for-byte.
pub type AttributeMap = BTreeMap<String, Value>;

/// A drafted change set: attribute name to its old/new pair.
pub type Changes = BTreeMap<String, AttributeChange>;

/// The before and after value of a single attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Value, Value)", into = "(Value, Value)")]
pub struct AttributeChange {
    /// Value before the drafted change (the pre-draft baseline).
    pub old: Value,
    /// Value after the drafted change.
    pub new: Value,
}

impl AttributeChange {
    pub fn new(old: Value, new: Value) -> Self {
        Self { old, new }
    }

    /// True when applying this change would not alter anything.
    pub fn is_noop(&self) -> bool {
        self.old == self.new
    }
}

impl From<(Value, Value)> for AttributeChange {
    fn from((old, new): (Value, Value)) -> Self {
        Self { old, new }
    }
}

impl From<AttributeChange> for (Value, Value) {
    fn from(change: AttributeChange) -> Self {
        (change.old, change.new)
    }
}

/// Short name for a JSON value's type, used in error messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
