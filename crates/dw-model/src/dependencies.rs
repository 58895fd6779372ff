// dependencies.rs — Drafts that must be published or reverted along with
// another draft.
//
//   publish create/update → belongs-to targets with a `create` draft
//                           (the parent needs to exist first)
//   publish destroy       → drafted has-one/has-many dependents
//   revert create         → drafted has-one/has-many dependents
//   revert destroy        → trashable belongs-to targets with a `destroy`
//                           draft (the parent comes back out of the trash)
//
// Only relationships whose target type is draftable count, and a
// relationship named like the target's own draft association is skipped.

use dw_draft::{Draft, DraftEvent};

use crate::engine::DraftEngine;
use crate::error::ModelError;
use crate::record::Record;
use crate::registry::Relationship;

/// Which belongs-to targets qualify.
struct ParentRule {
    event: DraftEvent,
    trashable_only: bool,
}

impl DraftEngine {
    /// Drafts to publish before `draft`.
    pub fn publication_dependencies(&self, draft: &Draft) -> Result<Vec<Draft>, ModelError> {
        let Some(item) = self.find_optional(&draft.item.item_type, draft.item.item_id)? else {
            return Ok(Vec::new());
        };
        match draft.event {
            DraftEvent::Create | DraftEvent::Update => self.parent_drafts(
                &item,
                ParentRule {
                    event: DraftEvent::Create,
                    trashable_only: false,
                },
            ),
            DraftEvent::Destroy => self.dependent_drafts(&item),
        }
    }

    /// Drafts to revert before `draft`.
    pub fn reversion_dependencies(&self, draft: &Draft) -> Result<Vec<Draft>, ModelError> {
        let Some(item) = self.find_optional(&draft.item.item_type, draft.item.item_id)? else {
            return Ok(Vec::new());
        };
        match draft.event {
            DraftEvent::Create => self.dependent_drafts(&item),
            DraftEvent::Destroy => self.parent_drafts(
                &item,
                ParentRule {
                    event: DraftEvent::Destroy,
                    trashable_only: true,
                },
            ),
            DraftEvent::Update => Ok(Vec::new()),
        }
    }

    fn parent_drafts(&self, item: &Record, rule: ParentRule) -> Result<Vec<Draft>, ModelError> {
        let item_type = self.item_type(item.type_name())?;
        let mut drafts = Vec::new();
        for rel in item_type.relationships.iter().filter(|r| r.is_belongs_to()) {
            if !self.traversable(item, rel, rule.trashable_only)? {
                continue;
            }
            for parent in self.related(item, rel)? {
                if let Some(draft) = self.draft_of(&parent)? {
                    if draft.event == rule.event {
                        drafts.push(draft);
                    }
                }
            }
        }
        Ok(drafts)
    }

    fn dependent_drafts(&self, item: &Record) -> Result<Vec<Draft>, ModelError> {
        let item_type = self.item_type(item.type_name())?;
        let mut drafts = Vec::new();
        for rel in item_type.relationships.iter().filter(|r| r.is_dependent_side()) {
            if !self.traversable(item, rel, false)? {
                continue;
            }
            for dependent in self.related(item, rel)? {
                if let Some(draft) = self.draft_of(&dependent)? {
                    drafts.push(draft);
                }
            }
        }
        Ok(drafts)
    }

    fn traversable(&self, item: &Record, rel: &Relationship, trashable_only: bool) -> Result<bool, ModelError> {
        let Some(target) = self.target_type_name(item, rel) else {
            return Ok(false);
        };
        let target = self.item_type(&target)?;
        let Some(options) = target.draftable.as_ref() else {
            return Ok(false);
        };
        if trashable_only && !target.is_trashable() {
            return Ok(false);
        }
        Ok(rel.name != options.draft_association_name)
    }
}
