// format.rs — Reading and writing draft columns for one item type.
//
// Whether a column goes through the snapshot codec depends on the draft
// class's schema: json columns store maps natively, text columns serialize
// them with the process-wide serializer after applying the item type's
// per-attribute coders.
//
// A draft can also be flattened into an attribute map (and back). That map is
// what a destroy draft stores in `previous_draft` when it supersedes another
// draft.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use dw_changeset::{codec_for, AttributeMap, Changes, CoderRegistry, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::draft::{ChangesetRead, Draft, DraftEvent, ItemRef};
use crate::error::DraftError;
use crate::schema::DraftSchema;

/// Names of the configurable draft columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftFields {
    /// Column recording who caused the change.
    #[serde(default = "default_whodunnit_field")]
    pub whodunnit: String,

    /// Column recording when the draft was created.
    #[serde(default = "default_timestamp_field")]
    pub timestamp: String,
}

impl Default for DraftFields {
    fn default() -> Self {
        Self {
            whodunnit: default_whodunnit_field(),
            timestamp: default_timestamp_field(),
        }
    }
}

fn default_whodunnit_field() -> String {
    "whodunnit".to_string()
}

fn default_timestamp_field() -> String {
    "created_at".to_string()
}

/// Encodes and decodes the columns of one draft class for one item type.
#[derive(Debug, Clone, Copy)]
pub struct DraftFormat<'a> {
    pub schema: &'a DraftSchema,
    pub serializer: Serializer,
    pub coders: &'a CoderRegistry,
    pub fields: &'a DraftFields,
}

impl<'a> DraftFormat<'a> {
    pub fn new(
        schema: &'a DraftSchema,
        serializer: Serializer,
        coders: &'a CoderRegistry,
        fields: &'a DraftFields,
    ) -> Self {
        Self {
            schema,
            serializer,
            coders,
            fields,
        }
    }

    /// Encode an item snapshot for the `object` column.
    pub fn encode_object(&self, attributes: &AttributeMap) -> Result<Value, DraftError> {
        let mut attributes = attributes.clone();
        if !self.schema.object.is_json() {
            self.coders
                .serialize_attributes(&mut attributes, self.serializer)?;
        }
        Ok(codec_for(self.schema.object, self.serializer).dump_attributes(&attributes)?)
    }

    /// Decode the `object` column back into item attributes.
    pub fn decode_object(&self, stored: &Value) -> Result<AttributeMap, DraftError> {
        let mut attributes =
            codec_for(self.schema.object, self.serializer).load_attributes(stored)?;
        if !self.schema.object.is_json() {
            self.coders
                .unserialize_attributes(&mut attributes, self.serializer)?;
        }
        Ok(attributes)
    }

    /// Encode changes for the `object_changes` column. `None` when the draft
    /// table has no such column.
    pub fn encode_changes(&self, changes: &Changes) -> Result<Option<Value>, DraftError> {
        let Some(column) = self.schema.object_changes else {
            return Ok(None);
        };
        let mut changes = changes.clone();
        if !column.is_json() {
            self.coders.serialize_changes(&mut changes, self.serializer)?;
        }
        Ok(Some(codec_for(column, self.serializer).dump_changes(&changes)?))
    }

    /// Read a draft's changes.
    ///
    /// Decode failures are reported as [`ChangesetRead::Degraded`] rather than
    /// an error, so one corrupt draft never breaks unrelated reads.
    pub fn changeset(&self, draft: &Draft) -> ChangesetRead {
        let Some(column) = self.schema.object_changes else {
            return ChangesetRead::Untracked;
        };
        let Some(stored) = draft.object_changes.as_ref() else {
            return ChangesetRead::Loaded(Changes::new());
        };

        let decoded = codec_for(column, self.serializer)
            .load_changes(stored)
            .and_then(|mut changes| {
                if !column.is_json() {
                    self.coders
                        .unserialize_changes(&mut changes, self.serializer)?;
                }
                Ok(changes)
            });

        match decoded {
            Ok(changes) => ChangesetRead::Loaded(changes),
            Err(e) => {
                warn!(
                    draft_id = draft.id,
                    item = %draft.item,
                    "could not decode object_changes: {}",
                    e
                );
                ChangesetRead::Degraded {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Lenient changeset accessor: `None` without an `object_changes`
    /// column, an empty map when the stored changes are unreadable.
    pub fn changes(&self, draft: &Draft) -> Option<Changes> {
        self.changeset(draft).into_lenient()
    }

    /// Encode a whole draft for another draft's `previous_draft` column.
    pub fn encode_previous_draft(&self, draft: &Draft) -> Result<Value, DraftError> {
        let attributes = self.to_attributes(draft);
        Ok(codec_for(self.schema.previous_draft, self.serializer).dump_attributes(&attributes)?)
    }

    /// Rebuild the draft stashed in `draft.previous_draft`, if any. The
    /// result is unsaved: its `id` is the superseded draft's old id.
    pub fn decode_previous_draft(&self, draft: &Draft) -> Result<Option<Draft>, DraftError> {
        let Some(stored) = draft.previous_draft.as_ref() else {
            return Ok(None);
        };
        let attributes =
            codec_for(self.schema.previous_draft, self.serializer).load_attributes(stored)?;
        self.from_attributes(&attributes).map(Some)
    }

    /// Flatten a draft into column name → stored value.
    pub fn to_attributes(&self, draft: &Draft) -> AttributeMap {
        let mut attributes = AttributeMap::new();
        attributes.insert("id".into(), Value::from(draft.id));
        attributes.insert("item_type".into(), Value::from(draft.item.item_type.clone()));
        attributes.insert("item_id".into(), Value::from(draft.item.item_id));
        attributes.insert("event".into(), Value::from(draft.event.to_string()));
        attributes.insert(
            self.fields.whodunnit.clone(),
            draft.whodunnit.clone().map(Value::from).unwrap_or(Value::Null),
        );
        attributes.insert("object".into(), draft.object.clone().unwrap_or(Value::Null));
        if self.schema.has_object_changes() {
            attributes.insert(
                "object_changes".into(),
                draft.object_changes.clone().unwrap_or(Value::Null),
            );
        }
        attributes.insert(
            "previous_draft".into(),
            draft.previous_draft.clone().unwrap_or(Value::Null),
        );
        attributes.insert(self.fields.timestamp.clone(), timestamp_value(draft.created_at));
        attributes.insert("updated_at".into(), timestamp_value(draft.updated_at));
        for (column, value) in &draft.meta {
            attributes.insert(column.clone(), value.clone());
        }
        attributes
    }

    /// Inverse of [`DraftFormat::to_attributes`]. Keys the draft table does
    /// not know are logged and skipped.
    pub fn from_attributes(&self, attributes: &AttributeMap) -> Result<Draft, DraftError> {
        let item_type = attributes
            .get("item_type")
            .and_then(Value::as_str)
            .ok_or_else(|| DraftError::InvalidData("draft attributes lack item_type".into()))?;
        let item_id = attributes
            .get("item_id")
            .and_then(Value::as_u64)
            .ok_or_else(|| DraftError::InvalidData("draft attributes lack item_id".into()))?;
        let event: DraftEvent = attributes
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| DraftError::InvalidData("draft attributes lack event".into()))?
            .parse()
            .map_err(DraftError::InvalidData)?;

        let now = Utc::now();
        let mut draft = Draft {
            id: attributes.get("id").and_then(Value::as_u64).unwrap_or_default(),
            item: ItemRef::new(item_type, item_id),
            event,
            whodunnit: None,
            object: None,
            object_changes: None,
            previous_draft: None,
            meta: AttributeMap::new(),
            created_at: now,
            updated_at: now,
        };

        for (key, value) in attributes {
            match key.as_str() {
                "id" | "item_type" | "item_id" | "event" => {}
                "object" => draft.object = non_null(value),
                "object_changes" => draft.object_changes = non_null(value),
                "previous_draft" => draft.previous_draft = non_null(value),
                "updated_at" => draft.updated_at = parse_timestamp(value).unwrap_or(now),
                k if k == self.fields.whodunnit => {
                    draft.whodunnit = value.as_str().map(str::to_string)
                }
                k if k == self.fields.timestamp => {
                    draft.created_at = parse_timestamp(value).unwrap_or(now)
                }
                k if self.schema.has_meta_column(k) => {
                    draft.meta.insert(key.clone(), value.clone());
                }
                _ => warn!(
                    attribute = %key,
                    draft_class = %self.schema.name,
                    "attribute does not exist on draft; skipping"
                ),
            }
        }

        Ok(draft)
    }

    /// Reject a snapshot that contains skipped attributes.
    pub fn check_object(&self, object: &Value, skip: &BTreeSet<String>) -> Result<(), DraftError> {
        if skip.is_empty() {
            return Ok(());
        }
        let attributes = self.decode_object(object)?;
        let leaked: Vec<&String> = attributes.keys().filter(|k| skip.contains(*k)).collect();
        if leaked.is_empty() {
            Ok(())
        } else {
            Err(DraftError::Validation(format!(
                "object contains skipped attribute(s): {}",
                leaked
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }
}

fn non_null(value: &Value) -> Option<Value> {
    if value.is_null() {
        None
    } else {
        Some(value.clone())
    }
}

fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339())
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|at| at.with_timezone(&Utc))
}
