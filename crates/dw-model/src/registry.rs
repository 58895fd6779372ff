// registry.rs — Item types, their draft options, and relationship descriptors.
//
// The host registers each item type once at startup: its columns, the
// relationships it has to other types, an optional validator, per-attribute
// coders, and, if the type is draftable, its DraftableOptions. Relationship
// descriptors are plain data; dependency resolution walks them instead of
// introspecting types at runtime.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use dw_changeset::{AttributeFilter, CoderRegistry};
use dw_draft::DraftSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;
use crate::record::{Record, ID_ATTRIBUTE};

/// Item-level validation. `Err` carries the message reported to the caller.
pub type Validator = Arc<dyn Fn(&Record) -> Result<(), String> + Send + Sync>;

/// Computes a meta column value from the record being drafted.
pub type MetaFn = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// Source of one meta column's value.
#[derive(Clone)]
pub enum MetaValue {
    /// Stored as given.
    Static(Value),
    /// The value of a named attribute. If the attribute is changing, its
    /// persisted value is used.
    Attribute(String),
    /// Computed from the record.
    Callable(MetaFn),
}

impl MetaValue {
    pub fn callable(f: impl Fn(&Record) -> Value + Send + Sync + 'static) -> Self {
        MetaValue::Callable(Arc::new(f))
    }

    pub fn resolve(&self, record: &Record) -> Value {
        match self {
            MetaValue::Static(value) => value.clone(),
            MetaValue::Attribute(name) => {
                if record.is_changed(name) {
                    dw_changeset::Tracked::attribute_was(record, name)
                } else {
                    record.get(name).clone()
                }
            }
            MetaValue::Callable(f) => f(record),
        }
    }
}

impl fmt::Debug for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            MetaValue::Attribute(name) => f.debug_tuple("Attribute").field(name).finish(),
            MetaValue::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// Per-type drafting options.
#[derive(Debug, Clone)]
pub struct DraftableOptions {
    /// Draft class override; `None` uses the process-wide default.
    pub class_name: Option<String>,

    /// ignore / only / skip. The draft reference column is always ignored.
    pub filter: AttributeFilter,

    /// Meta column → value source.
    pub meta: BTreeMap<String, MetaValue>,

    pub draft_association_name: String,

    pub published_at_attribute_name: String,

    pub trashed_at_attribute_name: String,

    /// Many drafts per item instead of at most one.
    pub multiple: bool,
}

impl Default for DraftableOptions {
    fn default() -> Self {
        Self {
            class_name: None,
            filter: AttributeFilter::new(),
            meta: BTreeMap::new(),
            draft_association_name: "draft".into(),
            published_at_attribute_name: "published_at".into(),
            trashed_at_attribute_name: "trashed_at".into(),
            multiple: false,
        }
    }
}

impl DraftableOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_filter(mut self, filter: AttributeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_meta(mut self, column: impl Into<String>, value: MetaValue) -> Self {
        self.meta.insert(column.into(), value);
        self
    }

    pub fn with_draft_association_name(mut self, name: impl Into<String>) -> Self {
        self.draft_association_name = name.into();
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Column holding the item's draft id in single-draft mode.
    pub fn draft_foreign_key(&self) -> String {
        format!("{}_id", self.draft_association_name)
    }

    /// The filter as applied: configured sets plus the ignored draft
    /// reference column.
    pub fn effective_filter(&self) -> AttributeFilter {
        self.filter.clone().ignore([self.draft_foreign_key()])
    }
}

/// What a dependent relationship does when its owner is permanently
/// destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependent {
    Destroy,
    Nullify,
}

/// The type a belongs-to relationship points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Type(String),
    /// The type is named by a sibling column on the owning row.
    Polymorphic { type_column: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipKind {
    BelongsTo {
        foreign_key: String,
        target: Target,
    },
    HasOne {
        target_type: String,
        foreign_key: String,
    },
    HasMany {
        target_type: String,
        foreign_key: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub name: String,
    pub kind: RelationshipKind,
    pub dependent: Option<Dependent>,
}

impl Relationship {
    /// `name` points at one `target` through `<name>_id`.
    pub fn belongs_to(name: impl Into<String>, target: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: RelationshipKind::BelongsTo {
                foreign_key: format!("{}_id", name),
                target: Target::Type(target.into()),
            },
            name,
            dependent: None,
        }
    }

    /// `name` points at one row whose type is stored in `<name>_type`.
    pub fn belongs_to_polymorphic(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: RelationshipKind::BelongsTo {
                foreign_key: format!("{}_id", name),
                target: Target::Polymorphic {
                    type_column: format!("{}_type", name),
                },
            },
            name,
            dependent: None,
        }
    }

    pub fn has_one(
        name: impl Into<String>,
        target_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: RelationshipKind::HasOne {
                target_type: target_type.into(),
                foreign_key: foreign_key.into(),
            },
            dependent: None,
        }
    }

    pub fn has_many(
        name: impl Into<String>,
        target_type: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: RelationshipKind::HasMany {
                target_type: target_type.into(),
                foreign_key: foreign_key.into(),
            },
            dependent: None,
        }
    }

    pub fn dependent(mut self, dependent: Dependent) -> Self {
        self.dependent = Some(dependent);
        self
    }

    pub fn is_belongs_to(&self) -> bool {
        matches!(self.kind, RelationshipKind::BelongsTo { .. })
    }

    /// Whether this is a has-one or has-many relationship.
    pub fn is_dependent_side(&self) -> bool {
        !self.is_belongs_to()
    }
}

/// A registered item type.
#[derive(Clone)]
pub struct ItemType {
    pub name: String,
    pub columns: BTreeSet<String>,
    pub relationships: Vec<Relationship>,
    pub draftable: Option<DraftableOptions>,
    pub validator: Option<Validator>,
    pub coders: CoderRegistry,
}

impl fmt::Debug for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemType")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("relationships", &self.relationships)
            .field("draftable", &self.draftable)
            .field("validator", &self.validator.is_some())
            .field("coders", &self.coders)
            .finish()
    }
}

impl ItemType {
    /// A type with the given columns. `id` is always a column.
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns: BTreeSet<String> = columns.into_iter().map(Into::into).collect();
        columns.insert(ID_ATTRIBUTE.to_string());
        Self {
            name: name.into(),
            columns,
            relationships: Vec::new(),
            draftable: None,
            validator: None,
            coders: CoderRegistry::new(),
        }
    }

    /// Opt into drafting. In single-draft mode the draft reference column is
    /// added to the type's columns.
    pub fn draftable(mut self, options: DraftableOptions) -> Self {
        if !options.multiple {
            self.columns.insert(options.draft_foreign_key());
        }
        self.draftable = Some(options);
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn with_validator(
        mut self,
        validator: impl Fn(&Record) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn with_coders(mut self, coders: CoderRegistry) -> Self {
        self.coders = coders;
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    pub fn is_draftable(&self) -> bool {
        self.draftable.is_some()
    }

    /// Draftable and carrying its soft-delete column.
    pub fn is_trashable(&self) -> bool {
        self.draftable
            .as_ref()
            .is_some_and(|o| self.has_column(&o.trashed_at_attribute_name))
    }

    pub fn options(&self) -> Result<&DraftableOptions, ModelError> {
        self.draftable
            .as_ref()
            .ok_or_else(|| ModelError::NotDraftable(self.name.clone()))
    }
}

/// Every item type and draft class known to a datastore.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, ItemType>,
    draft_classes: BTreeMap<String, DraftSchema>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, item_type: ItemType) -> Self {
        self.types.insert(item_type.name.clone(), item_type);
        self
    }

    /// Declare a draft class. Classes referenced by types but never declared
    /// get the default layout.
    pub fn with_draft_class(mut self, schema: DraftSchema) -> Self {
        self.draft_classes.insert(schema.name.clone(), schema);
        self
    }

    pub fn get(&self, name: &str) -> Result<&ItemType, ModelError> {
        self.types
            .get(name)
            .ok_or_else(|| ModelError::UnknownType(name.to_string()))
    }

    pub fn types(&self) -> impl Iterator<Item = &ItemType> {
        self.types.values()
    }

    pub fn draft_class(&self, name: &str) -> Option<&DraftSchema> {
        self.draft_classes.get(name)
    }

    /// Draft class used by `item_type`, falling back to `default_class`.
    pub fn draft_class_name<'a>(&'a self, item_type: &'a ItemType, default_class: &'a str) -> &'a str {
        item_type
            .draftable
            .as_ref()
            .and_then(|o| o.class_name.as_deref())
            .unwrap_or(default_class)
    }

    /// Schemas of every draft class in use, declared or implied.
    pub fn draft_schemas(&self, default_class: &str) -> Vec<DraftSchema> {
        let mut schemas = self.draft_classes.clone();
        for item_type in self.types.values().filter(|t| t.is_draftable()) {
            let name = self.draft_class_name(item_type, default_class);
            schemas
                .entry(name.to_string())
                .or_insert_with(|| DraftSchema::new(name));
        }
        schemas.into_values().collect()
    }
}
