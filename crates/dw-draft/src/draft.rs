// draft.rs — The Draft record: one pending change to one item.
//
// A draft is created when an item's lifecycle decides a notable change
// happened, updated in place while it stays open, and destroyed once it is
// published, reverted, or made moot by the item changing back.
//
//   create  — the item was created as a draft; no prior state
//   update  — `object_changes` holds post-creation deltas
//   destroy — `object` holds the last known state; `previous_draft` holds
//             the draft this one superseded, if there was one

use std::fmt;

use chrono::{DateTime, Utc};
use dw_changeset::{AttributeMap, Changes};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a draft row within its draft table.
pub type DraftId = u64;

/// Identifier of an item row within its item table.
pub type ItemId = u64;

/// The kind of change a draft stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftEvent {
    Create,
    Update,
    Destroy,
}

impl fmt::Display for DraftEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftEvent::Create => write!(f, "create"),
            DraftEvent::Update => write!(f, "update"),
            DraftEvent::Destroy => write!(f, "destroy"),
        }
    }
}

impl std::str::FromStr for DraftEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(DraftEvent::Create),
            "update" => Ok(DraftEvent::Update),
            "destroy" => Ok(DraftEvent::Destroy),
            other => Err(format!("unknown draft event '{}'", other)),
        }
    }
}

/// Polymorphic reference to the item a draft belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemRef {
    pub item_type: String,
    pub item_id: ItemId,
}

impl ItemRef {
    pub fn new(item_type: impl Into<String>, item_id: ItemId) -> Self {
        Self {
            item_type: item_type.into(),
            item_id,
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.item_type, self.item_id)
    }
}

/// A persisted draft row.
///
/// The snapshot columns hold values exactly as stored: a json column holds
/// the structured map, a text column holds a `Value::String` with the
/// serialized form. Use [`crate::DraftFormat`] to read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: DraftId,

    /// The item this draft stages a change for.
    pub item: ItemRef,

    pub event: DraftEvent,

    /// Who caused the change, stored verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whodunnit: Option<String>,

    /// Full attribute snapshot of the item at draft time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,

    /// `attribute -> [old, new]` changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_changes: Option<Value>,

    /// Attributes of the draft this one superseded (destroy-over-draft).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_draft: Option<Value>,

    /// Host-defined meta columns.
    #[serde(default, skip_serializing_if = "AttributeMap::is_empty")]
    pub meta: AttributeMap,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Draft {
    pub fn is_create(&self) -> bool {
        self.event == DraftEvent::Create
    }

    pub fn is_update(&self) -> bool {
        self.event == DraftEvent::Update
    }

    pub fn is_destroy(&self) -> bool {
        self.event == DraftEvent::Destroy
    }

    /// The data needed to save this draft as a new row.
    pub fn to_data(&self) -> DraftData {
        DraftData {
            item: Some(self.item.clone()),
            event: Some(self.event),
            whodunnit: self.whodunnit.clone(),
            object: self.object.clone(),
            object_changes: self.object_changes.clone(),
            previous_draft: self.previous_draft.clone(),
            meta: self.meta.clone(),
        }
    }
}

/// Data for creating or updating a draft.
///
/// On update, `item`, `event`, and the snapshot columns are only written when
/// `Some`; `whodunnit` is always written; `meta` entries are merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftData {
    pub item: Option<ItemRef>,
    pub event: Option<DraftEvent>,
    pub whodunnit: Option<String>,
    pub object: Option<Value>,
    pub object_changes: Option<Value>,
    pub previous_draft: Option<Value>,
    pub meta: AttributeMap,
}

impl DraftData {
    pub fn new(item: ItemRef) -> Self {
        Self {
            item: Some(item),
            ..Self::default()
        }
    }

    pub fn with_event(mut self, event: DraftEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_whodunnit(mut self, whodunnit: Option<String>) -> Self {
        self.whodunnit = whodunnit;
        self
    }
}

/// Result of reading a draft's `object_changes` column.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangesetRead {
    /// The draft table has no `object_changes` column.
    Untracked,
    /// The changes were decoded (empty when the column is blank).
    Loaded(Changes),
    /// The stored changes could not be decoded.
    Degraded { reason: String },
}

impl ChangesetRead {
    /// Lenient view: degraded changes read as an empty map, untracked as
    /// `None`.
    pub fn into_lenient(self) -> Option<Changes> {
        match self {
            ChangesetRead::Untracked => None,
            ChangesetRead::Loaded(changes) => Some(changes),
            ChangesetRead::Degraded { .. } => Some(Changes::new()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ChangesetRead::Degraded { .. })
    }
}
