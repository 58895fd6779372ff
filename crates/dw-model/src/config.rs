// config.rs — Process-wide settings and the TOML schema document.
//
// A schema file describes everything a datastore needs to know up front:
//
//   [settings]              process-wide drafting settings
//   [[draft_classes]]       draft tables and their column layout
//   [[types]]               item types, columns, draft options, coders
//   [[types.relationships]] relationship descriptors
//
// Every field has a default, so a minimal file only lists its types.

use std::collections::BTreeMap;
use std::path::Path;

use dw_changeset::{AttributeFilter, CoderRegistry, DelimitedListCoder, Serializer};
use dw_draft::{DraftFields, DraftSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;
use crate::registry::{
    Dependent, DraftableOptions, ItemType, MetaValue, Relationship, RelationshipKind, Target,
    TypeRegistry,
};

/// Process-wide drafting settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Master switch. When false, drafting entry points save and destroy
    /// directly.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Serializer for text snapshot columns.
    #[serde(default)]
    pub serializer: Serializer,

    /// Draft column holding the creation timestamp.
    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,

    /// Draft column holding the actor.
    #[serde(default = "default_whodunnit_field")]
    pub whodunnit_field: String,

    /// Keep pending edits in the draft instead of the item's live row.
    #[serde(default = "default_true")]
    pub stash_drafted_changes: bool,

    /// Draft class used by types that do not name one.
    #[serde(default = "default_draft_class_name")]
    pub draft_class_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            serializer: Serializer::default(),
            timestamp_field: default_timestamp_field(),
            whodunnit_field: default_whodunnit_field(),
            stash_drafted_changes: true,
            draft_class_name: default_draft_class_name(),
        }
    }
}

impl Settings {
    /// Draft column names derived from these settings.
    pub fn fields(&self) -> DraftFields {
        DraftFields {
            whodunnit: self.whodunnit_field.clone(),
            timestamp: self.timestamp_field.clone(),
        }
    }

    pub fn with_stash_drafted_changes(mut self, stash: bool) -> Self {
        self.stash_drafted_changes = stash;
        self
    }

    pub fn with_serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = serializer;
        self
    }
}

// Serde default functions
fn default_true() -> bool {
    true
}

fn default_timestamp_field() -> String {
    "created_at".to_string()
}

fn default_whodunnit_field() -> String {
    "whodunnit".to_string()
}

fn default_draft_class_name() -> String {
    "Draft".to_string()
}

/// Top-level schema document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub draft_classes: Vec<DraftSchema>,

    #[serde(default)]
    pub types: Vec<ItemTypeConfig>,
}

/// One `[[types]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemTypeConfig {
    pub name: String,

    #[serde(default)]
    pub columns: Vec<String>,

    /// Present when the type is draftable.
    pub draftable: Option<DraftableConfig>,

    #[serde(default)]
    pub relationships: Vec<RelationshipConfig>,

    /// Attribute → coder for text snapshot columns.
    #[serde(default)]
    pub coders: BTreeMap<String, CoderConfig>,
}

/// `[types.draftable]` options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftableConfig {
    pub class_name: Option<String>,

    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub only: Vec<String>,

    #[serde(default)]
    pub skip: Vec<String>,

    #[serde(default)]
    pub meta: BTreeMap<String, MetaConfig>,

    /// Draft association name (default `draft`).
    pub draft: Option<String>,

    /// Published timestamp attribute (default `published_at`).
    pub published_at: Option<String>,

    /// Soft-delete timestamp attribute (default `trashed_at`).
    pub trashed_at: Option<String>,

    #[serde(default)]
    pub multiple: bool,
}

/// A meta value: `{ attribute = "name" }` or any static value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MetaConfig {
    Attribute { attribute: String },
    Static(Value),
}

/// A coder: `{ delimited = "," }` or `"serialized"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CoderConfig {
    Delimited { delimited: String },
    Named(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKindConfig {
    BelongsTo,
    HasOne,
    HasMany,
}

/// One `[[types.relationships]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipConfig {
    pub name: String,

    pub kind: RelationshipKindConfig,

    /// Target type. Omitted for polymorphic belongs-to relationships.
    pub target: Option<String>,

    /// Defaults to `<name>_id` for belongs-to, `<owner>_id` otherwise.
    pub foreign_key: Option<String>,

    #[serde(default)]
    pub polymorphic: bool,

    pub dependent: Option<Dependent>,
}

impl SchemaConfig {
    /// Load a schema document from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ModelError> {
        toml::from_str(content).map_err(|e| ModelError::ConfigError(e.to_string()))
    }

    /// Build the type registry this document describes.
    pub fn to_registry(&self) -> Result<TypeRegistry, ModelError> {
        let mut registry = TypeRegistry::new();
        for schema in &self.draft_classes {
            registry = registry.with_draft_class(schema.clone());
        }
        for config in &self.types {
            registry = registry.register(config.to_item_type()?);
        }
        Ok(registry)
    }
}

impl ItemTypeConfig {
    pub fn to_item_type(&self) -> Result<ItemType, ModelError> {
        let mut item_type = ItemType::new(self.name.clone(), self.columns.iter().cloned());

        for rel in &self.relationships {
            item_type = item_type.with_relationship(rel.to_relationship(&self.name)?);
        }

        let mut coders = CoderRegistry::new();
        for (attribute, coder) in &self.coders {
            coders = match coder {
                CoderConfig::Delimited { delimited } => {
                    coders.with_coder(attribute.clone(), DelimitedListCoder::new(delimited.clone()))
                }
                CoderConfig::Named(name) if name == "serialized" => {
                    coders.with_serialized(attribute.clone())
                }
                CoderConfig::Named(other) => {
                    return Err(ModelError::ConfigError(format!(
                        "{}.{}: unknown coder '{}'",
                        self.name, attribute, other
                    )))
                }
            };
        }
        item_type = item_type.with_coders(coders);

        if let Some(draftable) = &self.draftable {
            item_type = item_type.draftable(draftable.to_options());
        }
        Ok(item_type)
    }
}

impl DraftableConfig {
    pub fn to_options(&self) -> DraftableOptions {
        let defaults = DraftableOptions::default();
        DraftableOptions {
            class_name: self.class_name.clone(),
            filter: AttributeFilter::new()
                .ignore(self.ignore.iter().cloned())
                .only(self.only.iter().cloned())
                .skip(self.skip.iter().cloned()),
            meta: self
                .meta
                .iter()
                .map(|(column, value)| {
                    let value = match value {
                        MetaConfig::Attribute { attribute } => MetaValue::Attribute(attribute.clone()),
                        MetaConfig::Static(value) => MetaValue::Static(value.clone()),
                    };
                    (column.clone(), value)
                })
                .collect(),
            draft_association_name: self
                .draft
                .clone()
                .unwrap_or(defaults.draft_association_name),
            published_at_attribute_name: self
                .published_at
                .clone()
                .unwrap_or(defaults.published_at_attribute_name),
            trashed_at_attribute_name: self
                .trashed_at
                .clone()
                .unwrap_or(defaults.trashed_at_attribute_name),
            multiple: self.multiple,
        }
    }
}

impl RelationshipConfig {
    pub fn to_relationship(&self, owner: &str) -> Result<Relationship, ModelError> {
        let kind = match self.kind {
            RelationshipKindConfig::BelongsTo => {
                let foreign_key = self
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| format!("{}_id", self.name));
                let target = if self.polymorphic {
                    let base = foreign_key.strip_suffix("_id").unwrap_or(&foreign_key);
                    Target::Polymorphic {
                        type_column: format!("{}_type", base),
                    }
                } else {
                    Target::Type(self.required_target(owner)?)
                };
                RelationshipKind::BelongsTo {
                    foreign_key,
                    target,
                }
            }
            RelationshipKindConfig::HasOne => RelationshipKind::HasOne {
                target_type: self.required_target(owner)?,
                foreign_key: self.owner_foreign_key(owner),
            },
            RelationshipKindConfig::HasMany => RelationshipKind::HasMany {
                target_type: self.required_target(owner)?,
                foreign_key: self.owner_foreign_key(owner),
            },
        };
        Ok(Relationship {
            name: self.name.clone(),
            kind,
            dependent: self.dependent,
        })
    }

    fn required_target(&self, owner: &str) -> Result<String, ModelError> {
        self.target.clone().ok_or_else(|| {
            ModelError::ConfigError(format!("{}.{}: relationship needs a target", owner, self.name))
        })
    }

    fn owner_foreign_key(&self, owner: &str) -> String {
        self.foreign_key
            .clone()
            .unwrap_or_else(|| format!("{}_id", snake_case(owner)))
    }
}

/// `OnlyChild` → `only_child`.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
