// scopes.rs — Item scopes and predicates.

use std::fmt;

use dw_draft::DraftStore;

use crate::engine::DraftEngine;
use crate::error::ModelError;
use crate::record::Record;

/// A named filter over the records of one item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    /// Records with a pending draft.
    Drafted,
    /// Records published at least once.
    Published,
    /// Soft-deleted records.
    Trashed,
    /// Records not in the trash.
    Live,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => write!(f, "all"),
            Scope::Drafted => write!(f, "drafted"),
            Scope::Published => write!(f, "published"),
            Scope::Trashed => write!(f, "trashed"),
            Scope::Live => write!(f, "live"),
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Scope::All),
            "drafted" => Ok(Scope::Drafted),
            "published" => Ok(Scope::Published),
            "trashed" => Ok(Scope::Trashed),
            "live" => Ok(Scope::Live),
            other => Err(format!(
                "unknown scope '{}' (expected all, drafted, published, trashed, live)",
                other
            )),
        }
    }
}

impl DraftEngine {
    /// Records of `type_name` matching `scope`, in id order.
    pub fn scope(&self, type_name: &str, scope: Scope) -> Result<Vec<Record>, ModelError> {
        let records = self.all(type_name)?;
        if scope == Scope::All {
            return Ok(records);
        }
        let mut matching = Vec::new();
        for record in records {
            let keep = match scope {
                Scope::All => true,
                Scope::Drafted => self.is_drafted(&record)?,
                Scope::Published => self.is_published(&record)?,
                Scope::Trashed => self.is_trashed(&record)?,
                Scope::Live => !self.is_trashed(&record)?,
            };
            if keep {
                matching.push(record);
            }
        }
        Ok(matching)
    }

    /// Whether the record has a pending draft: a set draft reference in
    /// single-draft mode, any draft in multiple-draft mode.
    pub fn is_drafted(&self, record: &Record) -> Result<bool, ModelError> {
        let drafting = self.drafting(record.type_name())?;
        if drafting.is_multiple() {
            self.has_drafts(record)
        } else {
            Ok(!record.get(&drafting.foreign_key()).is_null())
        }
    }

    pub fn has_drafts(&self, record: &Record) -> Result<bool, ModelError> {
        let Some(id) = record.id() else {
            return Ok(false);
        };
        let class = self.draft_class_of(record.type_name())?;
        Ok(!self
            .db
            .drafts(&class)?
            .with_item_keys(record.type_name(), id)
            .is_empty())
    }

    pub fn is_published(&self, record: &Record) -> Result<bool, ModelError> {
        let drafting = self.drafting(record.type_name())?;
        Ok(!record
            .get(&drafting.options.published_at_attribute_name)
            .is_null())
    }

    pub fn is_trashed(&self, record: &Record) -> Result<bool, ModelError> {
        let drafting = self.drafting(record.type_name())?;
        Ok(!record
            .get(&drafting.options.trashed_at_attribute_name)
            .is_null())
    }

    pub fn is_draftable(&self, type_name: &str) -> Result<bool, ModelError> {
        Ok(self.item_type(type_name)?.is_draftable())
    }

    pub fn is_trashable(&self, type_name: &str) -> Result<bool, ModelError> {
        Ok(self.item_type(type_name)?.is_trashable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_names_round_trip() {
        for scope in [
            Scope::All,
            Scope::Drafted,
            Scope::Published,
            Scope::Trashed,
            Scope::Live,
        ] {
            assert_eq!(scope.to_string().parse::<Scope>().unwrap(), scope);
        }
        assert!("deleted".parse::<Scope>().is_err());
    }
}
