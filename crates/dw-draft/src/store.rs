// store.rs — DraftStore: validated persistence for draft rows.
//
// One DraftTable holds the rows of one draft class. Rows are kept in id order
// so listings are stable, and the whole table serializes as a single JSON
// value for file-backed datastores.
//
// Validation happens before anything is written: a draft without an event or
// item reference, or carrying meta keys its table does not declare, is
// rejected and the table is left untouched.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::draft::{Draft, DraftData, DraftEvent, DraftId, ItemId};
use crate::error::DraftError;
use crate::schema::DraftSchema;

/// Persistence operations for one draft class.
pub trait DraftStore {
    /// Insert a new draft. Fails with [`DraftError::Validation`] if `data`
    /// has no event or item reference.
    fn create(&mut self, data: DraftData) -> Result<Draft, DraftError>;

    /// Apply `data` to an existing draft.
    fn update(&mut self, id: DraftId, data: DraftData) -> Result<Draft, DraftError>;

    /// Remove a draft, returning it if it existed.
    fn destroy(&mut self, id: DraftId) -> Option<Draft>;

    fn find(&self, id: DraftId) -> Option<Draft>;

    /// All drafts in id order.
    fn all(&self) -> Vec<Draft>;

    fn by_event(&self, event: DraftEvent) -> Vec<Draft> {
        self.all().into_iter().filter(|d| d.event == event).collect()
    }

    fn creates(&self) -> Vec<Draft> {
        self.by_event(DraftEvent::Create)
    }

    fn updates(&self) -> Vec<Draft> {
        self.by_event(DraftEvent::Update)
    }

    fn destroys(&self) -> Vec<Draft> {
        self.by_event(DraftEvent::Destroy)
    }

    /// Drafts belonging to one item.
    fn with_item_keys(&self, item_type: &str, item_id: ItemId) -> Vec<Draft> {
        self.all()
            .into_iter()
            .filter(|d| d.item.item_type == item_type && d.item.item_id == item_id)
            .collect()
    }
}

/// In-memory draft table for one draft class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftTable {
    pub schema: DraftSchema,

    #[serde(default)]
    rows: BTreeMap<DraftId, Draft>,

    #[serde(default = "first_id")]
    next_id: DraftId,
}

fn first_id() -> DraftId {
    1
}

impl DraftTable {
    pub fn new(schema: DraftSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_id: first_id(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.schema.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn validate_meta(&self, data: &DraftData) -> Result<(), DraftError> {
        let unknown: Vec<&str> = data
            .meta
            .keys()
            .filter(|k| !self.schema.has_meta_column(k))
            .map(String::as_str)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(DraftError::Validation(format!(
                "{} has no column(s): {}",
                self.schema.name,
                unknown.join(", ")
            )))
        }
    }

    fn not_found(&self, id: DraftId) -> DraftError {
        DraftError::NotFound {
            class_name: self.schema.name.clone(),
            id,
        }
    }
}

impl DraftStore for DraftTable {
    fn create(&mut self, data: DraftData) -> Result<Draft, DraftError> {
        self.validate_meta(&data)?;
        let event = data
            .event
            .ok_or_else(|| DraftError::Validation("event can't be blank".into()))?;
        let item = data
            .item
            .ok_or_else(|| DraftError::Validation("item can't be blank".into()))?;

        let now = Utc::now();
        let draft = Draft {
            id: self.next_id,
            item,
            event,
            whodunnit: data.whodunnit,
            object: data.object,
            object_changes: data
                .object_changes
                .filter(|_| self.schema.has_object_changes()),
            previous_draft: data.previous_draft,
            meta: data.meta,
            created_at: now,
            updated_at: now,
        };
        self.next_id += 1;

        debug!(
            draft_class = %self.schema.name,
            draft_id = draft.id,
            item = %draft.item,
            event = %draft.event,
            "draft created"
        );
        self.rows.insert(draft.id, draft.clone());
        Ok(draft)
    }

    fn update(&mut self, id: DraftId, data: DraftData) -> Result<Draft, DraftError> {
        self.validate_meta(&data)?;
        let has_changes_column = self.schema.has_object_changes();
        let existing = self.rows.get(&id).ok_or_else(|| self.not_found(id))?;

        let mut draft = existing.clone();
        if let Some(item) = data.item {
            draft.item = item;
        }
        if let Some(event) = data.event {
            draft.event = event;
        }
        draft.whodunnit = data.whodunnit;
        if let Some(object) = data.object {
            draft.object = Some(object);
        }
        if let Some(changes) = data.object_changes.filter(|_| has_changes_column) {
            draft.object_changes = Some(changes);
        }
        if let Some(previous) = data.previous_draft {
            draft.previous_draft = Some(previous);
        }
        draft.meta.extend(data.meta);

        if &draft == existing {
            return Ok(draft);
        }

        draft.updated_at = Utc::now();
        debug!(
            draft_class = %self.schema.name,
            draft_id = id,
            event = %draft.event,
            "draft updated"
        );
        self.rows.insert(id, draft.clone());
        Ok(draft)
    }

    fn destroy(&mut self, id: DraftId) -> Option<Draft> {
        let removed = self.rows.remove(&id);
        if removed.is_some() {
            debug!(draft_class = %self.schema.name, draft_id = id, "draft destroyed");
        }
        removed
    }

    fn find(&self, id: DraftId) -> Option<Draft> {
        self.rows.get(&id).cloned()
    }

    fn all(&self) -> Vec<Draft> {
        self.rows.values().cloned().collect()
    }
}
