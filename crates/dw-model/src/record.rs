// record.rs — Item records with dirty tracking.
//
// A Record is one row of one item type as seen by the caller: the working
// attributes it has set in memory, and the persisted attributes the row held
// when it was last loaded or written. Their difference is what the lifecycle
// controller drafts.

use dw_changeset::{AttributeMap, Tracked};
use dw_draft::{ItemId, ItemRef};
use serde_json::Value;

/// Name of the primary key attribute every item row carries.
pub const ID_ATTRIBUTE: &str = "id";

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    id: Option<ItemId>,
    attributes: AttributeMap,
    persisted: AttributeMap,
    destroyed: bool,
}

impl Record {
    /// A new, unsaved record.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: None,
            attributes: AttributeMap::new(),
            persisted: AttributeMap::new(),
            destroyed: false,
        }
    }

    /// A record loaded from a stored row.
    pub fn from_row(type_name: impl Into<String>, id: ItemId, row: AttributeMap) -> Self {
        Self {
            type_name: type_name.into(),
            id: Some(id),
            attributes: row.clone(),
            persisted: row,
            destroyed: false,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn id(&self) -> Option<ItemId> {
        self.id
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some() && !self.destroyed
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// The polymorphic reference drafts use to point at this record.
    pub fn item_ref(&self) -> Option<ItemRef> {
        self.id.map(|id| ItemRef::new(self.type_name.clone(), id))
    }

    /// Working value of `name`; null if unset.
    pub fn get(&self, name: &str) -> &Value {
        self.attributes.get(name).unwrap_or(&Value::Null)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).as_str()
    }

    /// Set a working attribute and return self for chaining.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Replace every working attribute.
    pub fn assign(&mut self, attributes: AttributeMap) {
        self.attributes = attributes;
    }

    /// Whether `name` differs from its persisted value.
    pub fn is_changed(&self, name: &str) -> bool {
        self.get(name) != &self.attribute_was(name)
    }

    /// Discard unsaved changes.
    pub fn restore(&mut self) {
        self.attributes = self.persisted.clone();
    }

    /// Record that the row now holds exactly the working attributes.
    pub(crate) fn mark_persisted(&mut self, id: ItemId) {
        self.id = Some(id);
        self.attributes.insert(ID_ATTRIBUTE.into(), Value::from(id));
        self.persisted = self.attributes.clone();
    }

    /// Record that `name` was written straight to the row.
    pub(crate) fn mark_column_written(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value.clone());
        self.persisted.insert(name.to_string(), value);
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.destroyed = true;
        self.persisted.clear();
    }
}

impl Tracked for Record {
    fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    fn persisted_attributes(&self) -> &AttributeMap {
        &self.persisted
    }
}
