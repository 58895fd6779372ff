// orchestrator.rs — Publishing, reverting, and reifying drafts.
//
// publish and revert each run in one transaction together with every
// dependency draft they cascade to: if any step fails, no draft and no item
// is changed. Dependencies are handled first. A visited set cuts cycles, and
// a draft already consumed by an earlier step of the cascade is skipped.

use std::collections::BTreeSet;

use dw_changeset::{AttributeMap, Tracked};
use dw_draft::{reify_previous_draft, Draft, DraftEvent, DraftId, DraftStore};
use serde_json::Value;
use tracing::{debug, info};

use crate::engine::{now_value, DraftEngine, UPDATED_AT};
use crate::error::ModelError;
use crate::record::Record;

type Visited = BTreeSet<(String, DraftId)>;

impl DraftEngine {
    /// Apply a draft to its item and remove the draft.
    ///
    /// - `create` / `update`: the drafted attributes are written to the row
    ///   without validation, `published_at` is stamped, the draft reference
    ///   is cleared
    /// - `destroy`: the item is permanently destroyed
    pub fn publish(&mut self, draft: &Draft) -> Result<(), ModelError> {
        let mut visited = Visited::new();
        self.transaction(|engine| engine.publish_in(draft, &mut visited))
    }

    /// Discard a draft.
    ///
    /// - `create`: the item is destroyed
    /// - `update`: without stashing, the changeset's old values are restored
    ///   to the row; the draft reference is cleared
    /// - `destroy`: the item leaves the trash; a superseded draft stashed in
    ///   `previous_draft` is restored as the item's draft
    pub fn revert(&mut self, draft: &Draft) -> Result<(), ModelError> {
        let mut visited = Visited::new();
        self.transaction(|engine| engine.revert_in(draft, &mut visited))
    }

    /// The item as of `draft`: working attributes hold the drafted state,
    /// the persisted baseline is the live row. `None` if the item is gone or
    /// the draft holds nothing to rebuild from.
    pub fn reify(&self, draft: &Draft) -> Result<Option<Record>, ModelError> {
        let Some(item) = self.find_optional(&draft.item.item_type, draft.item.item_id)? else {
            return Ok(None);
        };
        Ok(self.reify_attributes(draft, &item)?.map(|attributes| {
            let mut record = item;
            record.assign(attributes);
            record
        }))
    }

    fn reify_attributes(&self, draft: &Draft, item: &Record) -> Result<Option<AttributeMap>, ModelError> {
        let columns = &self.item_type(item.type_name())?.columns;
        self.with_format(item.type_name(), |format| {
            Ok(dw_draft::reify(draft, item.attributes(), columns, format)?)
        })
    }

    /// Re-read `draft` unless it was visited or consumed already.
    fn claim(&self, draft: &Draft, visited: &mut Visited) -> Result<Option<(String, Draft)>, ModelError> {
        let class = self.draft_class_of(&draft.item.item_type)?;
        if !visited.insert((class.clone(), draft.id)) {
            return Ok(None);
        }
        Ok(self.db.drafts(&class)?.find(draft.id).map(|d| (class, d)))
    }

    fn still_exists(&self, class: &str, id: DraftId) -> Result<bool, ModelError> {
        Ok(self.db.drafts(class)?.find(id).is_some())
    }

    fn publish_in(&mut self, draft: &Draft, visited: &mut Visited) -> Result<(), ModelError> {
        let Some((class, draft)) = self.claim(draft, visited)? else {
            return Ok(());
        };
        for dependency in self.publication_dependencies(&draft)? {
            debug!(draft_id = draft.id, dependency = dependency.id, "publishing dependency first");
            self.publish_in(&dependency, visited)?;
        }
        if !self.still_exists(&class, draft.id)? {
            return Ok(());
        }

        let type_name = draft.item.item_type.clone();
        let Some(mut item) = self.find_optional(&type_name, draft.item.item_id)? else {
            self.db.drafts_mut(&class)?.destroy(draft.id);
            return Ok(());
        };

        match draft.event {
            DraftEvent::Create | DraftEvent::Update => {
                let drafting = self.drafting(&type_name)?;
                let item_type = self.item_type(&type_name)?.clone();

                if self.settings.stash_drafted_changes && draft.is_update() {
                    if let Some(attributes) = self.reify_attributes(&draft, &item)? {
                        item.assign(attributes);
                    }
                }

                let published_at = drafting.options.published_at_attribute_name.clone();
                let foreign_key = drafting.foreign_key();
                let now = now_value();
                item.set(published_at.clone(), now.clone());
                if !drafting.is_multiple() {
                    item.set(foreign_key.clone(), Value::Null);
                }

                let publishable = drafting.filter.publishable(
                    item_type.columns.iter(),
                    &[published_at.as_str(), foreign_key.as_str()],
                );
                let mut row = item.persisted_attributes().clone();
                for name in publishable.iter().filter(|n| item_type.has_column(n)) {
                    row.insert(name.clone(), item.get(name).clone());
                }
                if item_type.has_column(UPDATED_AT) {
                    row.insert(UPDATED_AT.to_string(), now);
                }
                self.db.items_mut(&type_name)?.replace(draft.item.item_id, row);
                self.db.drafts_mut(&class)?.destroy(draft.id);
            }
            DraftEvent::Destroy => {
                self.destroy_in(&mut item)?;
                self.db.drafts_mut(&class)?.destroy(draft.id);
            }
        }

        info!(item = %draft.item, draft_id = draft.id, event = %draft.event, "draft published");
        Ok(())
    }

    fn revert_in(&mut self, draft: &Draft, visited: &mut Visited) -> Result<(), ModelError> {
        let Some((class, draft)) = self.claim(draft, visited)? else {
            return Ok(());
        };
        for dependency in self.reversion_dependencies(&draft)? {
            debug!(draft_id = draft.id, dependency = dependency.id, "reverting dependency first");
            self.revert_in(&dependency, visited)?;
        }
        if !self.still_exists(&class, draft.id)? {
            return Ok(());
        }

        let type_name = draft.item.item_type.clone();
        let drafting = self.drafting(&type_name)?;
        let item = self.find_optional(&type_name, draft.item.item_id)?;

        match draft.event {
            DraftEvent::Create => {
                if let Some(mut item) = item {
                    self.destroy_in(&mut item)?;
                }
            }
            DraftEvent::Update => {
                if let Some(mut item) = item {
                    let mut values = AttributeMap::new();
                    if !self.settings.stash_drafted_changes {
                        let item_type = self.item_type(&type_name)?;
                        for (name, change) in self.changes_of(&draft)?.unwrap_or_default() {
                            if item_type.has_column(&name) {
                                values.insert(name, change.old);
                            }
                        }
                    }
                    if !drafting.is_multiple() {
                        values.insert(drafting.foreign_key(), Value::Null);
                    }
                    self.update_columns(&mut item, values)?;
                }
            }
            DraftEvent::Destroy => {
                let mut values = AttributeMap::new();
                if self.item_type(&type_name)?.is_trashable() {
                    values.insert(drafting.options.trashed_at_attribute_name.clone(), Value::Null);
                }

                let previous = self.with_format(&type_name, |format| {
                    Ok(reify_previous_draft(&draft, format)?)
                })?;
                let restored = match previous {
                    Some(previous) => {
                        let restored = self.db.drafts_mut(&class)?.create(previous.to_data())?;
                        debug!(item = %draft.item, draft_id = restored.id, event = %restored.event, "superseded draft restored");
                        Some(restored.id)
                    }
                    None => None,
                };
                if !drafting.is_multiple() {
                    values.insert(
                        drafting.foreign_key(),
                        restored.map(Value::from).unwrap_or(Value::Null),
                    );
                }
                if let Some(mut item) = item {
                    self.update_columns(&mut item, values)?;
                }
            }
        }

        self.db.drafts_mut(&class)?.destroy(draft.id);
        info!(item = %draft.item, draft_id = draft.id, event = %draft.event, "draft reverted");
        Ok(())
    }
}
