// lifecycle.rs — save_draft and draft_destruction.
//
// States of one item, derived from whether it is persisted and what its
// current draft is:
//
//   Unpersisted ──save_draft──▶ PersistedCreateDraft ◀─┐ save_draft
//                                                      └──────────
//   PersistedNoDraft ──notable change──▶ PersistedUpdateDraft
//   PersistedUpdateDraft ──changed back to baseline──▶ PersistedNoDraft
//   any persisted state ──draft_destruction──▶ Trashed
//
// In multiple-draft mode every notable change adds a new draft instead of
// updating the current one.
//
// Every entry point runs in one transaction. Validation failures roll it
// back, restore the caller's record, and report `Ok(false)`.

use dw_changeset::{compute_changes, AttributeMap, ChangeBasis, Changes, Tracked};
use dw_draft::{DraftData, DraftEvent, DraftStore};
use serde_json::Value;
use tracing::debug;

use crate::context::DraftContext;
use crate::engine::{now_value, DraftEngine, Drafting, UPDATED_AT};
use crate::error::ModelError;
use crate::record::Record;
use crate::registry::Dependent;

impl DraftEngine {
    /// Save a record through drafting.
    ///
    /// - new record: persisted, with a `create` draft
    /// - record with a `create` draft: row and draft updated together
    /// - record changed notably: `update` draft created or updated
    /// - record changed back to its pre-draft state: draft destroyed
    ///
    /// With drafting disabled this is [`DraftEngine::save`].
    pub fn save_draft(&mut self, record: &mut Record, ctx: &DraftContext) -> Result<bool, ModelError> {
        self.drafting(record.type_name())?;
        if !self.drafting_enabled(ctx) {
            return self.save(record);
        }
        if record.is_destroyed() {
            return Err(ModelError::NotPersisted(record.type_name().to_string()));
        }

        let before = record.clone();
        let result = self.transaction(|engine| {
            if record.is_new() {
                engine.draft_creation(record, ctx)
            } else {
                engine.draft_update(record, ctx)
            }
        });
        Self::settle(record, before, result)
    }

    /// Trash a record: record a `destroy` draft, stamp its soft-delete
    /// column, and cascade to dependents whose relationship destroys them.
    ///
    /// With drafting disabled this permanently destroys the record.
    pub fn draft_destruction(
        &mut self,
        record: &mut Record,
        ctx: &DraftContext,
    ) -> Result<bool, ModelError> {
        self.drafting(record.type_name())?;
        if !self.drafting_enabled(ctx) {
            self.destroy(record)?;
            return Ok(true);
        }
        if !record.is_persisted() {
            return Err(ModelError::NotPersisted(record.type_name().to_string()));
        }

        let before = record.clone();
        let result = self.transaction(|engine| engine.trash(record, ctx));
        Self::settle(record, before, result)
    }

    fn draft_creation(&mut self, record: &mut Record, ctx: &DraftContext) -> Result<(), ModelError> {
        self.validate(record)?;
        self.write(record)?;

        let drafting = self.drafting(record.type_name())?;
        let changes = compute_changes(&*record, ChangeBasis::Creation, &drafting.filter);
        let data = self.draft_data(record, Some(DraftEvent::Create), Some(&changes), ctx, &drafting)?;
        let draft = self.db.drafts_mut(&drafting.class)?.create(data)?;

        if !drafting.is_multiple() {
            self.update_columns(record, single(drafting.foreign_key(), Value::from(draft.id)))?;
        }
        debug!(item = %draft.item, draft_id = draft.id, "create draft recorded");
        Ok(())
    }

    fn draft_update(&mut self, record: &mut Record, ctx: &DraftContext) -> Result<(), ModelError> {
        self.validate(record)?;
        let drafting = self.drafting(record.type_name())?;
        let current = if drafting.is_multiple() {
            None
        } else {
            self.draft_of(record)?
        };

        if let Some(draft) = current.as_ref().filter(|d| d.is_create()) {
            let changes = compute_changes(&*record, ChangeBasis::Creation, &drafting.filter);
            let data = self.draft_data(record, None, Some(&changes), ctx, &drafting)?;
            self.db.drafts_mut(&drafting.class)?.update(draft.id, data)?;
            self.write(record)?;
            debug!(item = %draft.item, draft_id = draft.id, "create draft updated");
            return Ok(());
        }

        let prior = match current.as_ref() {
            Some(draft) => self.changes_of(draft)?,
            None => None,
        };
        let changes = compute_changes(
            &*record,
            ChangeBasis::Update {
                prior: prior.as_ref(),
            },
            &drafting.filter,
        );
        let stash = self.settings.stash_drafted_changes;
        if stash {
            self.save_only_columns(record, &drafting)?;
        }

        match current {
            Some(draft) if changes.is_empty() => {
                record.set(drafting.foreign_key(), Value::Null);
                self.write(record)?;
                self.db.drafts_mut(&drafting.class)?.destroy(draft.id);
                debug!(item = %draft.item, draft_id = draft.id, "changes reverted; draft destroyed");
            }
            current if !changes.is_empty() => {
                self.record_update_draft(record, current.map(|d| d.id), &changes, ctx, &drafting)?;
                if stash {
                    self.update_skipped_attributes(record, &drafting)?;
                } else {
                    self.write(record)?;
                }
            }
            _ => self.write(record)?,
        }
        Ok(())
    }

    fn record_update_draft(
        &mut self,
        record: &mut Record,
        current: Option<dw_draft::DraftId>,
        changes: &Changes,
        ctx: &DraftContext,
        drafting: &Drafting,
    ) -> Result<(), ModelError> {
        let data = self.draft_data(record, Some(DraftEvent::Update), Some(changes), ctx, drafting)?;
        let table = self.db.drafts_mut(&drafting.class)?;
        match current {
            Some(id) => {
                table.update(id, data)?;
                debug!(item_type = record.type_name(), draft_id = id, "update draft refreshed");
            }
            None => {
                let draft = table.create(data)?;
                debug!(item = %draft.item, draft_id = draft.id, "update draft recorded");
                if !drafting.is_multiple() {
                    self.update_columns(record, single(drafting.foreign_key(), Value::from(draft.id)))?;
                }
            }
        }
        Ok(())
    }

    /// The body of `draft_destruction`, reused for cascades.
    fn trash(&mut self, record: &mut Record, ctx: &DraftContext) -> Result<(), ModelError> {
        let drafting = self.drafting(record.type_name())?;
        let mut data = self.draft_data(record, Some(DraftEvent::Destroy), None, ctx, &drafting)?;

        if drafting.is_multiple() {
            let draft = self.db.drafts_mut(&drafting.class)?.create(data)?;
            debug!(item = %draft.item, draft_id = draft.id, "destroy draft recorded");
        } else {
            match self.draft_of(record)? {
                Some(previous) => {
                    data.previous_draft = Some(self.with_format(record.type_name(), |format| {
                        Ok(format.encode_previous_draft(&previous)?)
                    })?);
                    self.db.drafts_mut(&drafting.class)?.update(previous.id, data)?;
                    debug!(item = %previous.item, draft_id = previous.id, superseded = %previous.event, "draft turned into destroy draft");
                }
                None => {
                    let draft = self.db.drafts_mut(&drafting.class)?.create(data)?;
                    self.update_columns(record, single(drafting.foreign_key(), Value::from(draft.id)))?;
                    debug!(item = %draft.item, draft_id = draft.id, "destroy draft recorded");
                }
            }
        }

        let item_type = self.item_type(record.type_name())?.clone();
        if item_type.is_trashable() {
            self.update_columns(
                record,
                single(drafting.options.trashed_at_attribute_name.clone(), now_value()),
            )?;
        }

        for rel in item_type
            .relationships
            .iter()
            .filter(|r| r.is_dependent_side() && r.dependent == Some(Dependent::Destroy))
        {
            let Some(target) = self.target_type_name(record, rel) else {
                continue;
            };
            if !self.item_type(&target)?.is_draftable() {
                continue;
            }
            for mut dependent in self.related(record, rel)? {
                let already_trashed = self.draft_of(&dependent)?.is_some_and(|d| d.is_destroy());
                if !already_trashed {
                    self.trash(&mut dependent, ctx)?;
                }
            }
        }
        Ok(())
    }

    /// Build the draft data for `record`: actor, snapshot (when stashing),
    /// changeset (when the draft class tracks it), and meta columns. The
    /// draft reference column is bookkeeping and stays out of the snapshot.
    fn draft_data(
        &self,
        record: &Record,
        event: Option<DraftEvent>,
        changes: Option<&Changes>,
        ctx: &DraftContext,
        drafting: &Drafting,
    ) -> Result<DraftData, ModelError> {
        let item = record
            .item_ref()
            .ok_or_else(|| ModelError::NotPersisted(record.type_name().to_string()))?;
        let mut data = DraftData::new(item).with_whodunnit(ctx.whodunnit.clone());
        data.event = event;

        let stash = self.settings.stash_drafted_changes;
        let (object, object_changes) = self.with_format(record.type_name(), |format| {
            let object = if stash {
                let mut snapshot = drafting.filter.without_skipped(record.attributes());
                snapshot.remove(&drafting.foreign_key());
                let object = format.encode_object(&snapshot)?;
                format.check_object(&object, &drafting.filter.skip)?;
                Some(object)
            } else {
                None
            };
            let object_changes = match changes {
                Some(changes) => format.encode_changes(changes)?,
                None => None,
            };
            Ok((object, object_changes))
        })?;
        data.object = object;
        data.object_changes = object_changes;

        for (column, value) in &drafting.options.meta {
            data.meta.insert(column.clone(), value.resolve(record));
        }
        data.meta
            .extend(ctx.controller_info.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(data)
    }

    /// Write attributes outside a configured `only` set straight to the row.
    fn save_only_columns(&mut self, record: &mut Record, drafting: &Drafting) -> Result<(), ModelError> {
        if drafting.options.filter.only.is_empty() {
            return Ok(());
        }
        let values: AttributeMap = record
            .changed()
            .into_iter()
            .filter(|name| drafting.options.filter.is_outside_only(name))
            .map(|name| {
                let value = record.get(&name).clone();
                (name, value)
            })
            .collect();
        self.update_columns(record, values)
    }

    /// Re-apply changed skip attributes to the row; they are never part of
    /// a draft.
    fn update_skipped_attributes(
        &mut self,
        record: &mut Record,
        drafting: &Drafting,
    ) -> Result<(), ModelError> {
        let mut values: AttributeMap = record
            .changed()
            .into_iter()
            .filter(|name| drafting.filter.is_skipped(name))
            .map(|name| {
                let value = record.get(&name).clone();
                (name, value)
            })
            .collect();
        if values.is_empty() {
            return Ok(());
        }
        if self.item_type(record.type_name())?.has_column(UPDATED_AT) {
            values.insert(UPDATED_AT.to_string(), now_value());
        }
        self.update_columns(record, values)
    }
}

fn single(name: String, value: Value) -> AttributeMap {
    let mut values = AttributeMap::new();
    values.insert(name, value);
    values
}
