// codec.rs — Snapshot codecs and per-attribute coders.
//
// Draft columns (`object`, `object_changes`, `previous_draft`) are either
// native structured columns or text columns:
//   json column → NativeCodec stores the map as-is
//   text column → TextCodec serializes it with the process-wide Serializer
//
// In a text column some attributes may need their own encoding first (a list
// stored as "a,b,c", say). Those are registered in a CoderRegistry; an
// attribute registered without a custom coder falls back to the process-wide
// serializer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::{value_kind, AttributeMap, Changes};
use crate::error::ChangesetError;

/// Storage type of a draft column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Native structured column: maps are stored directly.
    Json,
    /// Opaque text column: maps are serialized to a string.
    #[default]
    Text,
}

impl ColumnType {
    pub fn is_json(self) -> bool {
        matches!(self, ColumnType::Json)
    }
}

/// Generic structured-text format used for text columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Serializer {
    Json,
    #[default]
    Yaml,
}

impl Serializer {
    pub fn to_text(self, value: &Value) -> Result<String, ChangesetError> {
        match self {
            Serializer::Json => Ok(serde_json::to_string(value)?),
            Serializer::Yaml => Ok(serde_yaml::to_string(value)?),
        }
    }

    pub fn from_text(self, text: &str) -> Result<Value, ChangesetError> {
        match self {
            Serializer::Json => Ok(serde_json::from_str(text)?),
            Serializer::Yaml => Ok(serde_yaml::from_str(text)?),
        }
    }
}

impl fmt::Display for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Serializer::Json => write!(f, "json"),
            Serializer::Yaml => write!(f, "yaml"),
        }
    }
}

/// Encodes values into a draft column and decodes them back.
///
/// Contract: `load(dump(x)) == x` for every value built from the supported
/// attribute types.
pub trait SnapshotCodec: Send + Sync + fmt::Debug {
    fn dump(&self, value: &Value) -> Result<Value, ChangesetError>;

    fn load(&self, stored: &Value) -> Result<Value, ChangesetError>;

    fn dump_attributes(&self, attributes: &AttributeMap) -> Result<Value, ChangesetError> {
        self.dump(&serde_json::to_value(attributes)?)
    }

    fn load_attributes(&self, stored: &Value) -> Result<AttributeMap, ChangesetError> {
        Ok(serde_json::from_value(self.load(stored)?)?)
    }

    fn dump_changes(&self, changes: &Changes) -> Result<Value, ChangesetError> {
        self.dump(&serde_json::to_value(changes)?)
    }

    fn load_changes(&self, stored: &Value) -> Result<Changes, ChangesetError> {
        Ok(serde_json::from_value(self.load(stored)?)?)
    }
}

/// Codec for native structured columns: values pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

impl SnapshotCodec for NativeCodec {
    fn dump(&self, value: &Value) -> Result<Value, ChangesetError> {
        Ok(value.clone())
    }

    fn load(&self, stored: &Value) -> Result<Value, ChangesetError> {
        Ok(stored.clone())
    }
}

/// Codec for text columns: values are stored as a serialized string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec {
    serializer: Serializer,
}

impl TextCodec {
    pub fn new(serializer: Serializer) -> Self {
        Self { serializer }
    }
}

impl SnapshotCodec for TextCodec {
    fn dump(&self, value: &Value) -> Result<Value, ChangesetError> {
        Ok(Value::String(self.serializer.to_text(value)?))
    }

    fn load(&self, stored: &Value) -> Result<Value, ChangesetError> {
        match stored {
            Value::String(text) => self.serializer.from_text(text),
            other => Err(ChangesetError::UnexpectedStoredValue {
                expected: "string",
                found: value_kind(other).to_string(),
            }),
        }
    }
}

/// Pick the codec for a column of the given type.
pub fn codec_for(column: ColumnType, serializer: Serializer) -> Box<dyn SnapshotCodec> {
    match column {
        ColumnType::Json => Box::new(NativeCodec),
        ColumnType::Text => Box::new(TextCodec::new(serializer)),
    }
}

/// Custom encoding for a single attribute stored in a text column.
pub trait AttributeCoder: Send + Sync {
    fn dump(&self, value: &Value) -> Result<Value, ChangesetError>;

    fn load(&self, stored: &Value) -> Result<Value, ChangesetError>;
}

/// Stores a list of strings as one delimited string.
///
/// Items may not contain any character of the separator. A list whose last
/// item is empty gets a trailing separator, so `[]` (stored as `""`) and
/// `[""]` (stored as the bare separator) stay distinct.
#[derive(Debug, Clone)]
pub struct DelimitedListCoder {
    separator: String,
}

impl DelimitedListCoder {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    fn check_separator(&self) -> Result<(), ChangesetError> {
        if self.separator.is_empty() {
            return Err(ChangesetError::InvalidData(
                "list separator must not be empty".into(),
            ));
        }
        Ok(())
    }

    fn check_item<'a>(&self, item: &'a Value) -> Result<&'a str, ChangesetError> {
        let Value::String(s) = item else {
            return Err(ChangesetError::UnexpectedStoredValue {
                expected: "string list item",
                found: value_kind(item).to_string(),
            });
        };
        if s.chars().any(|c| self.separator.contains(c)) {
            return Err(ChangesetError::InvalidData(format!(
                "list item {:?} contains the separator {:?}",
                s, self.separator
            )));
        }
        Ok(s)
    }
}

impl AttributeCoder for DelimitedListCoder {
    fn dump(&self, value: &Value) -> Result<Value, ChangesetError> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => {
                self.check_separator()?;
                let parts = items
                    .iter()
                    .map(|item| self.check_item(item))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut joined = parts.join(&self.separator);
                if parts.last().is_some_and(|last| last.is_empty()) {
                    joined.push_str(&self.separator);
                }
                Ok(Value::String(joined))
            }
            other => Err(ChangesetError::UnexpectedStoredValue {
                expected: "array",
                found: value_kind(other).to_string(),
            }),
        }
    }

    fn load(&self, stored: &Value) -> Result<Value, ChangesetError> {
        match stored {
            Value::Null => Ok(Value::Null),
            Value::String(s) if s.is_empty() => Ok(Value::Array(Vec::new())),
            Value::String(s) => {
                self.check_separator()?;
                let body = s.strip_suffix(self.separator.as_str()).unwrap_or(s);
                Ok(Value::Array(
                    body.split(self.separator.as_str())
                        .map(|part| Value::String(part.to_string()))
                        .collect(),
                ))
            }
            other => Err(ChangesetError::UnexpectedStoredValue {
                expected: "string",
                found: value_kind(other).to_string(),
            }),
        }
    }
}

/// Attributes of one item type that need their own encoding in text columns.
///
/// A registered attribute with no coder falls back to the serializer passed
/// to each call.
#[derive(Clone, Default)]
pub struct CoderRegistry {
    coders: BTreeMap<String, Option<Arc<dyn AttributeCoder>>>,
}

impl fmt::Debug for CoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.coders.keys()).finish()
    }
}

impl CoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `attribute` with a custom coder.
    pub fn with_coder(
        mut self,
        attribute: impl Into<String>,
        coder: impl AttributeCoder + 'static,
    ) -> Self {
        self.coders.insert(attribute.into(), Some(Arc::new(coder)));
        self
    }

    /// Register `attribute` as serialized with the fallback serializer.
    pub fn with_serialized(mut self, attribute: impl Into<String>) -> Self {
        self.coders.insert(attribute.into(), None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.coders.is_empty()
    }

    fn dump_value(
        &self,
        name: &str,
        value: &Value,
        fallback: Serializer,
    ) -> Result<Option<Value>, ChangesetError> {
        match self.coders.get(name) {
            None => Ok(None),
            Some(Some(coder)) => coder.dump(value).map(Some),
            Some(None) => Ok(Some(Value::String(fallback.to_text(value)?))),
        }
    }

    fn load_value(
        &self,
        name: &str,
        stored: &Value,
        fallback: Serializer,
    ) -> Result<Option<Value>, ChangesetError> {
        match self.coders.get(name) {
            None => Ok(None),
            Some(Some(coder)) => coder.load(stored).map(Some),
            Some(None) => match stored {
                Value::String(text) => fallback.from_text(text).map(Some),
                other => Ok(Some(other.clone())),
            },
        }
    }

    /// Encode registered attributes in place before a snapshot is stored.
    pub fn serialize_attributes(
        &self,
        attributes: &mut AttributeMap,
        fallback: Serializer,
    ) -> Result<(), ChangesetError> {
        for (name, value) in attributes.iter_mut() {
            if let Some(encoded) = self.dump_value(name, value, fallback)? {
                *value = encoded;
            }
        }
        Ok(())
    }

    /// Decode registered attributes in place after a snapshot is loaded.
    pub fn unserialize_attributes(
        &self,
        attributes: &mut AttributeMap,
        fallback: Serializer,
    ) -> Result<(), ChangesetError> {
        for (name, value) in attributes.iter_mut() {
            if let Some(decoded) = self.load_value(name, value, fallback)? {
                *value = decoded;
            }
        }
        Ok(())
    }

    /// Encode both sides of registered attributes' change pairs.
    pub fn serialize_changes(
        &self,
        changes: &mut Changes,
        fallback: Serializer,
    ) -> Result<(), ChangesetError> {
        for (name, change) in changes.iter_mut() {
            if let Some(old) = self.dump_value(name, &change.old, fallback)? {
                change.old = old;
            }
            if let Some(new) = self.dump_value(name, &change.new, fallback)? {
                change.new = new;
            }
        }
        Ok(())
    }

    pub fn unserialize_changes(
        &self,
        changes: &mut Changes,
        fallback: Serializer,
    ) -> Result<(), ChangesetError> {
        for (name, change) in changes.iter_mut() {
            if let Some(old) = self.load_value(name, &change.old, fallback)? {
                change.old = old;
            }
            if let Some(new) = self.load_value(name, &change.new, fallback)? {
                change.new = new;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeChange;
    use serde_json::json;

    fn sample() -> AttributeMap {
        let mut attrs = AttributeMap::new();
        attrs.insert("id".into(), json!(7));
        attrs.insert("name".into(), json!("Bob"));
        attrs.insert("score".into(), json!(1.5));
        attrs.insert("tags".into(), json!(["a", "b"]));
        attrs.insert("published_at".into(), Value::Null);
        attrs.insert("active".into(), json!(true));
        attrs
    }

    #[test]
    fn text_codecs_round_trip_attribute_maps() {
        for serializer in [Serializer::Json, Serializer::Yaml] {
            let codec = TextCodec::new(serializer);
            let stored = codec.dump_attributes(&sample()).unwrap();
            assert!(stored.is_string(), "{} should store text", serializer);
            assert_eq!(codec.load_attributes(&stored).unwrap(), sample());
        }
    }

    #[test]
    fn native_codec_stores_maps_directly() {
        let stored = NativeCodec.dump_attributes(&sample()).unwrap();
        assert!(stored.is_object());
        assert_eq!(NativeCodec.load_attributes(&stored).unwrap(), sample());
    }

    #[test]
    fn changes_round_trip_through_yaml() {
        let mut changes = Changes::new();
        changes.insert("name".into(), AttributeChange::new(Value::Null, json!("Bob")));
        let codec = codec_for(ColumnType::Text, Serializer::Yaml);
        let stored = codec.dump_changes(&changes).unwrap();
        assert_eq!(codec.load_changes(&stored).unwrap(), changes);
    }

    #[test]
    fn text_codec_rejects_structured_values() {
        let codec = TextCodec::new(Serializer::Json);
        let err = codec.load(&json!({"name": "Bob"})).unwrap_err();
        assert!(matches!(err, ChangesetError::UnexpectedStoredValue { .. }));
    }

    #[test]
    fn text_codec_rejects_garbage() {
        let codec = TextCodec::new(Serializer::Json);
        assert!(codec.load(&json!("{not json")).is_err());
    }

    #[test]
    fn custom_coder_encodes_registered_attribute() {
        let registry = CoderRegistry::new().with_coder("tags", DelimitedListCoder::new(","));
        let mut attrs = sample();
        registry.serialize_attributes(&mut attrs, Serializer::Yaml).unwrap();
        assert_eq!(attrs["tags"], json!("a,b"));
        assert_eq!(attrs["name"], json!("Bob"));

        registry.unserialize_attributes(&mut attrs, Serializer::Yaml).unwrap();
        assert_eq!(attrs, sample());
    }

    #[test]
    fn registered_attribute_without_coder_falls_back() {
        let registry = CoderRegistry::new().with_serialized("tags");
        let mut attrs = sample();
        registry.serialize_attributes(&mut attrs, Serializer::Json).unwrap();
        assert_eq!(attrs["tags"], json!(r#"["a","b"]"#));

        registry.unserialize_attributes(&mut attrs, Serializer::Json).unwrap();
        assert_eq!(attrs["tags"], json!(["a", "b"]));
    }

    #[test]
    fn coders_apply_to_both_sides_of_changes() {
        let registry = CoderRegistry::new().with_coder("tags", DelimitedListCoder::new("|"));
        let mut changes = Changes::new();
        changes.insert(
            "tags".into(),
            AttributeChange::new(json!(["x"]), json!(["x", "y"])),
        );
        registry.serialize_changes(&mut changes, Serializer::Yaml).unwrap();
        assert_eq!(changes["tags"], AttributeChange::new(json!("x"), json!("x|y")));

        registry.unserialize_changes(&mut changes, Serializer::Yaml).unwrap();
        assert_eq!(changes["tags"].new, json!(["x", "y"]));
    }

    #[test]
    fn delimited_list_keeps_empty_items_distinct() {
        let coder = DelimitedListCoder::new(",");
        for list in [json!([]), json!([""]), json!(["", ""]), json!(["x", ""]), json!(["a", "b"])] {
            let stored = coder.dump(&list).unwrap();
            assert_eq!(coder.load(&stored).unwrap(), list, "stored as {}", stored);
        }
        assert_eq!(coder.dump(&json!([])).unwrap(), json!(""));
        assert_eq!(coder.dump(&json!([""])).unwrap(), json!(","));
        assert_eq!(coder.dump(&json!(["a", "b"])).unwrap(), json!("a,b"));
    }

    #[test]
    fn delimited_list_rejects_items_containing_the_separator() {
        let coder = DelimitedListCoder::new(",");
        let err = coder.dump(&json!(["a,b"])).unwrap_err();
        assert!(matches!(err, ChangesetError::InvalidData(_)));

        let coder = DelimitedListCoder::new("||");
        assert!(coder.dump(&json!(["a|"])).is_err());
    }

    #[test]
    fn column_type_names() {
        let json: ColumnType = serde_json::from_str("\"json\"").unwrap();
        assert!(json.is_json());
        assert_eq!(ColumnType::default(), ColumnType::Text);
        assert_eq!(Serializer::default().to_string(), "yaml");
    }
}
