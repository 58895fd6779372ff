// schema.rs — Column layout of a draft class.
//
// Every draft class is its own table. Tables differ in how their snapshot
// columns are stored (native json vs serialized text), whether they track
// `object_changes` at all, and which host-defined meta columns they carry.

use std::collections::BTreeSet;

use dw_changeset::ColumnType;
use serde::{de, Deserialize, Deserializer, Serialize};

/// Column names of the snapshot columns.
pub const OBJECT_COLUMN: &str = "object";
pub const OBJECT_CHANGES_COLUMN: &str = "object_changes";
pub const PREVIOUS_DRAFT_COLUMN: &str = "previous_draft";

/// Column layout for one draft class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSchema {
    /// Name of the draft class (the `class_name` item types refer to).
    pub name: String,

    /// Storage type of the `object` column.
    #[serde(default)]
    pub object: ColumnType,

    /// Storage type of the `object_changes` column, or `None` if the table
    /// has no such column (`"none"` in config files).
    #[serde(
        default = "default_object_changes",
        deserialize_with = "deserialize_changes_column"
    )]
    pub object_changes: Option<ColumnType>,

    /// Storage type of the `previous_draft` column.
    #[serde(default)]
    pub previous_draft: ColumnType,

    /// Host-defined extra columns populated from `meta` options.
    #[serde(default)]
    pub meta_columns: BTreeSet<String>,
}

fn default_object_changes() -> Option<ColumnType> {
    Some(ColumnType::Text)
}

fn deserialize_changes_column<'de, D>(deserializer: D) -> Result<Option<ColumnType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("none") => Ok(None),
        Some("json") => Ok(Some(ColumnType::Json)),
        Some("text") => Ok(Some(ColumnType::Text)),
        Some(other) => Err(de::Error::unknown_variant(other, &["json", "text", "none"])),
    }
}

impl DraftSchema {
    /// A table with text snapshot columns and an `object_changes` column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object: ColumnType::Text,
            object_changes: default_object_changes(),
            previous_draft: ColumnType::Text,
            meta_columns: BTreeSet::new(),
        }
    }

    /// Store all snapshot columns natively and return self.
    pub fn with_json_columns(mut self) -> Self {
        self.object = ColumnType::Json;
        self.previous_draft = ColumnType::Json;
        if self.object_changes.is_some() {
            self.object_changes = Some(ColumnType::Json);
        }
        self
    }

    /// Drop the `object_changes` column and return self.
    pub fn without_object_changes(mut self) -> Self {
        self.object_changes = None;
        self
    }

    /// Declare meta columns and return self.
    pub fn with_meta_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Whether the table has an `object_changes` column.
    pub fn has_object_changes(&self) -> bool {
        self.object_changes.is_some()
    }

    /// Whether `column` is a native structured column. Unknown columns and
    /// meta columns are never json.
    pub fn is_json_column(&self, column: &str) -> bool {
        self.column_type(column).is_some_and(ColumnType::is_json)
    }

    /// Storage type of a snapshot column, if the table has it.
    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        match column {
            OBJECT_COLUMN => Some(self.object),
            OBJECT_CHANGES_COLUMN => self.object_changes,
            PREVIOUS_DRAFT_COLUMN => Some(self.previous_draft),
            _ => None,
        }
    }

    pub fn has_meta_column(&self, column: &str) -> bool {
        self.meta_columns.contains(column)
    }
}
