// engine.rs — DraftEngine: the datastore plus the types registered on it.
//
// Plain item operations live here: loading records, saving them with
// validation and timestamps, permanent destroy with the registered dependent
// rules, and draft lookups. Drafting itself is split across lifecycle.rs
// (save_draft / draft_destruction), dependencies.rs, and orchestrator.rs
// (publish / revert / reify).

use chrono::Utc;
use dw_changeset::{AttributeFilter, AttributeMap, Changes, Tracked};
use dw_draft::{ChangesetRead, Draft, DraftEvent, DraftFormat, DraftId, DraftStore, ItemId};
use serde_json::Value;
use tracing::debug;

use crate::config::{SchemaConfig, Settings};
use crate::context::DraftContext;
use crate::database::{Backend, Database, MemoryBackend};
use crate::error::ModelError;
use crate::record::Record;
use crate::registry::{Dependent, DraftableOptions, ItemType, Relationship, RelationshipKind, Target, TypeRegistry};

/// Item column stamped when a row is inserted.
pub const CREATED_AT: &str = "created_at";

/// Item column stamped whenever a row is written.
pub const UPDATED_AT: &str = "updated_at";

/// Current time as stored in timestamp columns.
pub(crate) fn now_value() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

/// Drafting setup of one item type, resolved once per operation.
#[derive(Debug, Clone)]
pub(crate) struct Drafting {
    pub class: String,
    pub options: DraftableOptions,
    pub filter: AttributeFilter,
}

impl Drafting {
    pub fn foreign_key(&self) -> String {
        self.options.draft_foreign_key()
    }

    pub fn is_multiple(&self) -> bool {
        self.options.multiple
    }
}

pub struct DraftEngine {
    pub(crate) registry: TypeRegistry,
    pub(crate) settings: Settings,
    pub(crate) db: Database,
}

impl DraftEngine {
    /// Open a datastore on `backend` for the registered types.
    pub fn new(
        registry: TypeRegistry,
        settings: Settings,
        backend: impl Backend + 'static,
    ) -> Result<Self, ModelError> {
        let schemas = registry.draft_schemas(&settings.draft_class_name);
        let db = Database::open(
            Box::new(backend),
            registry.types().map(|t| t.name.as_str()),
            schemas,
        )?;
        Ok(Self {
            registry,
            settings,
            db,
        })
    }

    /// An engine whose commits stay in memory.
    pub fn in_memory(registry: TypeRegistry, settings: Settings) -> Result<Self, ModelError> {
        Self::new(registry, settings, MemoryBackend::new())
    }

    /// Open a datastore described by a schema document.
    pub fn from_config(
        config: &SchemaConfig,
        backend: impl Backend + 'static,
    ) -> Result<Self, ModelError> {
        Self::new(config.to_registry()?, config.settings.clone(), backend)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // ── Transactions ─────────────────────────────────────────────

    /// Run `f` in a transaction. Any error rolls every table back to its
    /// state before the outermost transaction began.
    pub(crate) fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ModelError>,
    ) -> Result<T, ModelError> {
        let savepoint = self.db.begin();
        match f(self) {
            Ok(value) => {
                self.db.commit(savepoint)?;
                Ok(value)
            }
            Err(e) => {
                self.db.rollback(savepoint);
                Err(e)
            }
        }
    }

    /// Turn a transaction result into the boolean outcome of a save-like
    /// operation. On any failure the caller's record is restored.
    pub(crate) fn settle(
        record: &mut Record,
        before: Record,
        result: Result<(), ModelError>,
    ) -> Result<bool, ModelError> {
        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                *record = before;
                if let ModelError::Validation(reason) = &e {
                    debug!(item_type = record.type_name(), %reason, "save rejected");
                    Ok(false)
                } else {
                    Err(e)
                }
            }
        }
    }

    pub(crate) fn drafting_enabled(&self, ctx: &DraftContext) -> bool {
        self.settings.enabled && ctx.enabled
    }

    // ── Types and formats ────────────────────────────────────────

    pub(crate) fn item_type(&self, name: &str) -> Result<&ItemType, ModelError> {
        self.registry.get(name)
    }

    pub(crate) fn drafting(&self, type_name: &str) -> Result<Drafting, ModelError> {
        let item_type = self.item_type(type_name)?;
        let options = item_type.options()?;
        Ok(Drafting {
            class: self
                .registry
                .draft_class_name(item_type, &self.settings.draft_class_name)
                .to_string(),
            filter: options.effective_filter(),
            options: options.clone(),
        })
    }

    /// Draft class holding drafts of `type_name`.
    pub fn draft_class_of(&self, type_name: &str) -> Result<String, ModelError> {
        Ok(self.drafting(type_name)?.class)
    }

    /// Run `f` with the draft column format of `type_name`.
    pub(crate) fn with_format<T>(
        &self,
        type_name: &str,
        f: impl FnOnce(&DraftFormat<'_>) -> Result<T, ModelError>,
    ) -> Result<T, ModelError> {
        let item_type = self.item_type(type_name)?;
        let class = self
            .registry
            .draft_class_name(item_type, &self.settings.draft_class_name);
        let schema = &self.db.drafts(class)?.schema;
        let fields = self.settings.fields();
        let format = DraftFormat::new(schema, self.settings.serializer, &item_type.coders, &fields);
        f(&format)
    }

    // ── Records ──────────────────────────────────────────────────

    /// A new record with every column of its type set to null.
    pub fn new_record(&self, type_name: &str) -> Result<Record, ModelError> {
        let item_type = self.item_type(type_name)?;
        let mut record = Record::new(type_name);
        for column in item_type.columns.iter().filter(|c| c.as_str() != "id") {
            record.set(column.clone(), Value::Null);
        }
        Ok(record)
    }

    pub fn find(&self, type_name: &str, id: ItemId) -> Result<Record, ModelError> {
        self.find_optional(type_name, id)?
            .ok_or_else(|| ModelError::NotFound {
                item_type: type_name.to_string(),
                id,
            })
    }

    pub fn find_optional(&self, type_name: &str, id: ItemId) -> Result<Option<Record>, ModelError> {
        Ok(self
            .db
            .items(type_name)?
            .get(id)
            .map(|row| Record::from_row(type_name, id, row.clone())))
    }

    /// Every record of a type, in id order.
    pub fn all(&self, type_name: &str) -> Result<Vec<Record>, ModelError> {
        Ok(self
            .db
            .items(type_name)?
            .rows()
            .map(|(id, row)| Record::from_row(type_name, id, row.clone()))
            .collect())
    }

    /// Discard unsaved changes and re-read the row.
    pub fn reload(&self, record: &mut Record) -> Result<(), ModelError> {
        let id = record
            .id()
            .ok_or_else(|| ModelError::NotPersisted(record.type_name().to_string()))?;
        *record = self.find(record.type_name(), id)?;
        Ok(())
    }

    /// Validate and persist a record without drafting. Returns `Ok(false)`
    /// if validation fails.
    pub fn save(&mut self, record: &mut Record) -> Result<bool, ModelError> {
        if record.is_destroyed() {
            return Err(ModelError::NotPersisted(record.type_name().to_string()));
        }
        let before = record.clone();
        let result = self.transaction(|engine| {
            engine.validate(record)?;
            engine.write(record)
        });
        Self::settle(record, before, result)
    }

    /// Permanently destroy a record, applying its dependent rules and
    /// removing its drafts.
    pub fn destroy(&mut self, record: &mut Record) -> Result<(), ModelError> {
        self.transaction(|engine| engine.destroy_in(record))
    }

    pub(crate) fn validate(&self, record: &Record) -> Result<(), ModelError> {
        let item_type = self.item_type(record.type_name())?;
        if let Some(unknown) = record.attributes().keys().find(|k| !item_type.has_column(k)) {
            return Err(ModelError::UnknownAttribute {
                item_type: item_type.name.clone(),
                attribute: unknown.clone(),
            });
        }
        if let Some(validator) = &item_type.validator {
            validator(record).map_err(ModelError::Validation)?;
        }
        Ok(())
    }

    /// Write the working attributes to the row: insert if new, otherwise
    /// update when something changed.
    pub(crate) fn write(&mut self, record: &mut Record) -> Result<(), ModelError> {
        let item_type = self.item_type(record.type_name())?;
        let has_created = item_type.has_column(CREATED_AT);
        let has_updated = item_type.has_column(UPDATED_AT);
        let missing: Vec<String> = item_type
            .columns
            .iter()
            .filter(|c| !record.attributes().contains_key(*c) && c.as_str() != "id")
            .cloned()
            .collect();

        match record.id() {
            None => {
                for column in missing {
                    record.set(column, Value::Null);
                }
                let now = now_value();
                if has_created && record.get(CREATED_AT).is_null() {
                    record.set(CREATED_AT, now.clone());
                }
                if has_updated {
                    record.set(UPDATED_AT, now);
                }
                let id = self
                    .db
                    .items_mut(record.type_name())?
                    .insert(record.attributes().clone());
                record.mark_persisted(id);
                debug!(item = %record.type_name(), id, "item inserted");
            }
            Some(id) => {
                if !record.has_changes() {
                    return Ok(());
                }
                if has_updated {
                    record.set(UPDATED_AT, now_value());
                }
                let table = self.db.items_mut(record.type_name())?;
                if table.get(id).is_none() {
                    return Err(ModelError::NotFound {
                        item_type: record.type_name().to_string(),
                        id,
                    });
                }
                table.replace(id, record.attributes().clone());
                record.mark_persisted(id);
                debug!(item = %record.type_name(), id, "item updated");
            }
        }
        Ok(())
    }

    /// Write `values` straight to the row, skipping validation and
    /// timestamps.
    pub(crate) fn update_columns(
        &mut self,
        record: &mut Record,
        values: AttributeMap,
    ) -> Result<(), ModelError> {
        if values.is_empty() {
            return Ok(());
        }
        let id = record
            .id()
            .ok_or_else(|| ModelError::NotPersisted(record.type_name().to_string()))?;
        let row = self
            .db
            .items_mut(record.type_name())?
            .get_mut(id)
            .ok_or_else(|| ModelError::NotFound {
                item_type: record.type_name().to_string(),
                id,
            })?;
        for (name, value) in values {
            row.insert(name.clone(), value.clone());
            record.mark_column_written(&name, value);
        }
        Ok(())
    }

    pub(crate) fn destroy_in(&mut self, record: &mut Record) -> Result<(), ModelError> {
        let id = record
            .id()
            .filter(|_| !record.is_destroyed())
            .ok_or_else(|| ModelError::NotPersisted(record.type_name().to_string()))?;
        let item_type = self.item_type(record.type_name())?.clone();

        // The row goes first so cyclic dependent rules terminate.
        if self.db.items_mut(&item_type.name)?.remove(id).is_none() {
            return Err(ModelError::NotFound {
                item_type: item_type.name.clone(),
                id,
            });
        }

        for rel in item_type.relationships.iter().filter(|r| r.is_dependent_side()) {
            match rel.dependent {
                Some(Dependent::Destroy) => {
                    for mut dependent in self.related(record, rel)? {
                        self.destroy_in(&mut dependent)?;
                    }
                }
                Some(Dependent::Nullify) => {
                    let foreign_key = match &rel.kind {
                        RelationshipKind::HasOne { foreign_key, .. }
                        | RelationshipKind::HasMany { foreign_key, .. } => foreign_key.clone(),
                        RelationshipKind::BelongsTo { .. } => continue,
                    };
                    for mut dependent in self.related(record, rel)? {
                        let mut values = AttributeMap::new();
                        values.insert(foreign_key.clone(), Value::Null);
                        self.update_columns(&mut dependent, values)?;
                    }
                }
                None => {}
            }
        }

        if item_type.is_draftable() {
            let class = self.draft_class_of(&item_type.name)?;
            let table = self.db.drafts_mut(&class)?;
            for draft in table.with_item_keys(&item_type.name, id) {
                table.destroy(draft.id);
            }
        }

        record.mark_destroyed();
        debug!(item = %item_type.name, id, "item destroyed");
        Ok(())
    }

    // ── Relationships ────────────────────────────────────────────

    /// Concrete type a belongs-to relationship points at for this record.
    pub(crate) fn belongs_to_target(&self, record: &Record, rel: &Relationship) -> Option<String> {
        match &rel.kind {
            RelationshipKind::BelongsTo {
                target: Target::Type(name),
                ..
            } => Some(name.clone()),
            RelationshipKind::BelongsTo {
                target: Target::Polymorphic { type_column },
                ..
            } => record.get_str(type_column).map(str::to_string),
            _ => None,
        }
    }

    /// Type name on the far side of a relationship, if it can be resolved.
    pub(crate) fn target_type_name(&self, record: &Record, rel: &Relationship) -> Option<String> {
        match &rel.kind {
            RelationshipKind::BelongsTo { .. } => self.belongs_to_target(record, rel),
            RelationshipKind::HasOne { target_type, .. }
            | RelationshipKind::HasMany { target_type, .. } => Some(target_type.clone()),
        }
    }

    /// Records on the far side of a relationship.
    pub(crate) fn related(&self, record: &Record, rel: &Relationship) -> Result<Vec<Record>, ModelError> {
        match &rel.kind {
            RelationshipKind::BelongsTo { foreign_key, .. } => {
                let Some(target) = self.belongs_to_target(record, rel) else {
                    return Ok(Vec::new());
                };
                let Some(id) = record.get(foreign_key).as_u64() else {
                    return Ok(Vec::new());
                };
                Ok(self.find_optional(&target, id)?.into_iter().collect())
            }
            RelationshipKind::HasOne {
                target_type,
                foreign_key,
            }
            | RelationshipKind::HasMany {
                target_type,
                foreign_key,
            } => {
                let Some(id) = record.id() else {
                    return Ok(Vec::new());
                };
                let mut found: Vec<Record> = self
                    .db
                    .items(target_type)?
                    .rows()
                    .filter(|(_, row)| row.get(foreign_key).and_then(Value::as_u64) == Some(id))
                    .map(|(dep_id, row)| Record::from_row(target_type.as_str(), dep_id, row.clone()))
                    .collect();
                if matches!(rel.kind, RelationshipKind::HasOne { .. }) {
                    found.truncate(1);
                }
                Ok(found)
            }
        }
    }

    // ── Drafts ───────────────────────────────────────────────────

    /// The record's current draft: the referenced draft in single-draft
    /// mode, the newest draft in multiple-draft mode.
    pub fn draft_of(&self, record: &Record) -> Result<Option<Draft>, ModelError> {
        let drafting = self.drafting(record.type_name())?;
        let table = self.db.drafts(&drafting.class)?;
        if drafting.is_multiple() {
            let Some(id) = record.id() else {
                return Ok(None);
            };
            return Ok(table.with_item_keys(record.type_name(), id).pop());
        }
        Ok(record
            .get(&drafting.foreign_key())
            .as_u64()
            .and_then(|draft_id| table.find(draft_id)))
    }

    /// Every draft of the record, oldest first.
    pub fn drafts_of(&self, record: &Record) -> Result<Vec<Draft>, ModelError> {
        let Some(id) = record.id() else {
            return Ok(Vec::new());
        };
        let class = self.draft_class_of(record.type_name())?;
        Ok(self.db.drafts(&class)?.with_item_keys(record.type_name(), id))
    }

    pub fn find_draft(&self, class_name: &str, id: DraftId) -> Result<Draft, ModelError> {
        self.db.drafts(class_name)?.find(id).ok_or_else(|| {
            ModelError::Draft(dw_draft::DraftError::NotFound {
                class_name: class_name.to_string(),
                id,
            })
        })
    }

    /// Drafts of one class, optionally limited to one event.
    pub fn drafts(&self, class_name: &str, event: Option<DraftEvent>) -> Result<Vec<Draft>, ModelError> {
        let table = self.db.drafts(class_name)?;
        Ok(match event {
            Some(event) => table.by_event(event),
            None => table.all(),
        })
    }

    /// Names of every draft class.
    pub fn draft_classes(&self) -> Vec<String> {
        self.db.tables().drafts.keys().cloned().collect()
    }

    /// Decoded changes of a draft.
    pub fn changeset(&self, draft: &Draft) -> Result<ChangesetRead, ModelError> {
        self.with_format(&draft.item.item_type, |format| Ok(format.changeset(draft)))
    }

    /// Lenient changes: `None` without an `object_changes` column.
    pub(crate) fn changes_of(&self, draft: &Draft) -> Result<Option<Changes>, ModelError> {
        Ok(self.changeset(draft)?.into_lenient())
    }

    /// Decoded `object` snapshot of a draft.
    pub fn snapshot(&self, draft: &Draft) -> Result<Option<AttributeMap>, ModelError> {
        let Some(stored) = draft.object.as_ref() else {
            return Ok(None);
        };
        self.with_format(&draft.item.item_type, |format| {
            Ok(Some(format.decode_object(stored)?))
        })
    }
}
