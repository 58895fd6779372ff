// database.rs — Item tables, draft tables, and transactions.
//
// The Database owns every table in memory and commits them to a Backend at
// the end of each outermost transaction. Transactions nest: only the
// outermost one snapshots the tables on entry and restores them if any
// nested step fails, so a whole publish cascade is all-or-nothing.
//
// Backends:
//   MemoryBackend   — keeps the last committed copy; for tests and embedding
//   JsonFileBackend — one pretty-printed JSON document on disk

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use dw_changeset::AttributeMap;
use dw_draft::{DraftSchema, DraftTable, ItemId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ModelError;
use crate::record::ID_ATTRIBUTE;

/// Rows of one item type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTable {
    #[serde(default)]
    rows: BTreeMap<ItemId, AttributeMap>,

    #[serde(default = "first_id")]
    next_id: ItemId,
}

fn first_id() -> ItemId {
    1
}

impl Default for ItemTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemTable {
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: first_id(),
        }
    }

    /// Store a new row and return its id. The id is written into the row.
    pub fn insert(&mut self, mut row: AttributeMap) -> ItemId {
        let id = self.next_id;
        self.next_id += 1;
        row.insert(ID_ATTRIBUTE.into(), Value::from(id));
        self.rows.insert(id, row);
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&AttributeMap> {
        self.rows.get(&id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut AttributeMap> {
        self.rows.get_mut(&id)
    }

    pub fn replace(&mut self, id: ItemId, row: AttributeMap) {
        self.rows.insert(id, row);
    }

    pub fn remove(&mut self, id: ItemId) -> Option<AttributeMap> {
        self.rows.remove(&id)
    }

    pub fn rows(&self) -> impl Iterator<Item = (ItemId, &AttributeMap)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Everything a datastore holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    /// Item type name → rows.
    #[serde(default)]
    pub items: BTreeMap<String, ItemTable>,

    /// Draft class name → drafts.
    #[serde(default)]
    pub drafts: BTreeMap<String, DraftTable>,
}

/// Where committed tables are kept.
pub trait Backend: Send {
    /// The last committed tables, or `None` for an empty store.
    fn load(&self) -> Result<Option<Tables>, ModelError>;

    fn commit(&mut self, tables: &Tables) -> Result<(), ModelError>;
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    committed: Option<Tables>,
    commits: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commits so far.
    pub fn commits(&self) -> usize {
        self.commits
    }
}

impl Backend for MemoryBackend {
    fn load(&self) -> Result<Option<Tables>, ModelError> {
        Ok(self.committed.clone())
    }

    fn commit(&mut self, tables: &Tables) -> Result<(), ModelError> {
        self.committed = Some(tables.clone());
        self.commits += 1;
        Ok(())
    }
}

/// Stores all tables as one JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Back the store with `path`. Parent directories are created on first
    /// commit; a missing file reads as an empty store.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Backend for JsonFileBackend {
    fn load(&self) -> Result<Option<Tables>, ModelError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path).map_err(|source| ModelError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn commit(&mut self, tables: &Tables) -> Result<(), ModelError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ModelError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(tables)?;
        fs::write(&self.path, json).map_err(|source| ModelError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}

/// Tables plus the backend they commit to.
pub struct Database {
    tables: Tables,
    backend: Box<dyn Backend>,
    depth: usize,
}

/// Token returned by [`Database::begin`]; holds the pre-transaction tables
/// for the outermost transaction.
#[must_use]
pub struct Savepoint(Option<Tables>);

impl Database {
    /// Open a datastore, creating any missing item and draft tables.
    pub fn open<'a>(
        backend: Box<dyn Backend>,
        item_types: impl IntoIterator<Item = &'a str>,
        draft_schemas: impl IntoIterator<Item = DraftSchema>,
    ) -> Result<Self, ModelError> {
        let mut tables = backend.load()?.unwrap_or_default();
        for name in item_types {
            tables.items.entry(name.to_string()).or_insert_with(ItemTable::new);
        }
        for schema in draft_schemas {
            match tables.drafts.get_mut(&schema.name) {
                Some(table) => table.schema = schema,
                None => {
                    tables
                        .drafts
                        .insert(schema.name.clone(), DraftTable::new(schema));
                }
            }
        }
        Ok(Self {
            tables,
            backend,
            depth: 0,
        })
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn items(&self, type_name: &str) -> Result<&ItemTable, ModelError> {
        self.tables
            .items
            .get(type_name)
            .ok_or_else(|| ModelError::UnknownType(type_name.to_string()))
    }

    pub fn items_mut(&mut self, type_name: &str) -> Result<&mut ItemTable, ModelError> {
        self.tables
            .items
            .get_mut(type_name)
            .ok_or_else(|| ModelError::UnknownType(type_name.to_string()))
    }

    pub fn drafts(&self, class_name: &str) -> Result<&DraftTable, ModelError> {
        self.tables
            .drafts
            .get(class_name)
            .ok_or_else(|| ModelError::ConfigError(format!("unknown draft class: {}", class_name)))
    }

    pub fn drafts_mut(&mut self, class_name: &str) -> Result<&mut DraftTable, ModelError> {
        self.tables
            .drafts
            .get_mut(class_name)
            .ok_or_else(|| ModelError::ConfigError(format!("unknown draft class: {}", class_name)))
    }

    /// Enter a transaction.
    pub fn begin(&mut self) -> Savepoint {
        self.depth += 1;
        if self.depth == 1 {
            Savepoint(Some(self.tables.clone()))
        } else {
            Savepoint(None)
        }
    }

    /// Leave a transaction successfully. The outermost commit writes the
    /// tables to the backend; if that fails the tables are rolled back.
    pub fn commit(&mut self, savepoint: Savepoint) -> Result<(), ModelError> {
        self.depth = self.depth.saturating_sub(1);
        let Savepoint(Some(before)) = savepoint else {
            return Ok(());
        };
        if let Err(e) = self.backend.commit(&self.tables) {
            self.tables = before;
            return Err(e);
        }
        debug!("transaction committed");
        Ok(())
    }

    /// Leave a transaction unsuccessfully. The outermost rollback restores
    /// the tables as they were on entry.
    pub fn rollback(&mut self, savepoint: Savepoint) {
        self.depth = self.depth.saturating_sub(1);
        if let Savepoint(Some(before)) = savepoint {
            self.tables = before;
            debug!("transaction rolled back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn row(name: &str) -> AttributeMap {
        let mut row = AttributeMap::new();
        row.insert("name".into(), json!(name));
        row
    }

    fn open(backend: Box<dyn Backend>) -> Database {
        Database::open(backend, ["Vanilla"], [DraftSchema::new("Draft")]).unwrap()
    }

    #[test]
    fn item_table_assigns_ids() {
        let mut table = ItemTable::new();
        let id = table.insert(row("Bob"));
        assert_eq!(id, 1);
        assert_eq!(table.get(id).unwrap()["id"], json!(1));
        assert_eq!(table.insert(row("Sam")), 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn opened_tables_number_rows_from_one() {
        let mut db = open(Box::new(MemoryBackend::new()));
        assert_eq!(db.items_mut("Vanilla").unwrap().insert(row("Bob")), 1);
        assert_eq!(ItemTable::default().insert(row("Sam")), 1);
    }

    #[test]
    fn rollback_restores_outermost_snapshot() {
        let mut db = open(Box::new(MemoryBackend::new()));
        let outer = db.begin();
        db.items_mut("Vanilla").unwrap().insert(row("Bob"));
        let inner = db.begin();
        db.items_mut("Vanilla").unwrap().insert(row("Sam"));
        db.commit(inner).unwrap();
        assert_eq!(db.items("Vanilla").unwrap().len(), 2);

        db.rollback(outer);
        assert!(db.items("Vanilla").unwrap().is_empty());
    }

    #[test]
    fn only_outermost_commit_reaches_backend() {
        struct Counting(Arc<Mutex<usize>>);
        impl Backend for Counting {
            fn load(&self) -> Result<Option<Tables>, ModelError> {
                Ok(None)
            }
            fn commit(&mut self, _tables: &Tables) -> Result<(), ModelError> {
                *self.0.lock().unwrap() += 1;
                Ok(())
            }
        }

        let count = Arc::new(Mutex::new(0));
        let mut db = open(Box::new(Counting(count.clone())));
        let outer = db.begin();
        let inner = db.begin();
        db.commit(inner).unwrap();
        assert_eq!(*count.lock().unwrap(), 0);
        db.commit(outer).unwrap();
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn json_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut db = open(Box::new(JsonFileBackend::new(&path)));
        let tx = db.begin();
        db.items_mut("Vanilla").unwrap().insert(row("Bob"));
        db.commit(tx).unwrap();
        assert!(path.exists());

        let reopened = open(Box::new(JsonFileBackend::new(&path)));
        let table = reopened.items("Vanilla").unwrap();
        assert_eq!(table.get(1).unwrap()["name"], json!("Bob"));
        assert!(reopened.drafts("Draft").is_ok());
    }

    #[test]
    fn unknown_tables_are_errors() {
        let db = open(Box::new(MemoryBackend::new()));
        assert!(matches!(db.items("Missing"), Err(ModelError::UnknownType(_))));
        assert!(db.drafts("Missing").is_err());
    }
}
