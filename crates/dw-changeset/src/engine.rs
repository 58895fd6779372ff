// engine.rs — The changeset engine.
//
// Computes `attribute -> [old, new]` pairs between a record's persisted state
// and its working state. Two bases:
//   Creation — every candidate attribute is new: old is null
//   Update   — old is the pre-draft baseline: taken from an open draft's
//              prior changeset when it has the attribute, else the persisted
//              value
//
// Pairs whose old and new values are equal are dropped, so the result is
// always minimal and recomputing it with the same inputs yields the same map.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::attributes::{AttributeChange, AttributeMap, Changes};
use crate::filter::AttributeFilter;

/// Dirty tracking for anything that can be drafted.
///
/// The working attributes are what the caller has set in memory; the
/// persisted attributes are what the live row held when it was last loaded
/// or saved.
pub trait Tracked {
    fn attributes(&self) -> &AttributeMap;

    fn persisted_attributes(&self) -> &AttributeMap;

    /// Persisted value of `name`, or null if it was never persisted.
    fn attribute_was(&self, name: &str) -> Value {
        self.persisted_attributes()
            .get(name)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Names of attributes whose working value differs from the persisted one.
    fn changed(&self) -> Vec<String> {
        attribute_names(self)
            .into_iter()
            .filter(|name| {
                let current = self.attributes().get(name).unwrap_or(&Value::Null);
                let was = self.persisted_attributes().get(name).unwrap_or(&Value::Null);
                current != was
            })
            .collect()
    }

    fn has_changes(&self) -> bool {
        !self.changed().is_empty()
    }
}

/// What the "old" side of each pair is measured against.
#[derive(Debug, Clone, Copy)]
pub enum ChangeBasis<'a> {
    /// The record is being created; every old value is null.
    Creation,
    /// The record already exists. `prior` is the changeset of an open update
    /// draft, whose old values are the true baseline across repeated edits.
    Update { prior: Option<&'a Changes> },
}

/// Compute the drafted changes of `item`.
///
/// The result never holds a key outside the filter's draftable set and never
/// holds a no-op pair.
pub fn compute_changes<T>(item: &T, basis: ChangeBasis<'_>, filter: &AttributeFilter) -> Changes
where
    T: Tracked + ?Sized,
{
    let names = attribute_names(item);
    let mut changes = Changes::new();

    for name in filter.draftable(&names) {
        let new = item.attributes().get(&name).cloned().unwrap_or(Value::Null);
        let old = match basis {
            ChangeBasis::Creation => Value::Null,
            ChangeBasis::Update { prior } => match prior.and_then(|p| p.get(&name)) {
                Some(change) => change.old.clone(),
                None => item.attribute_was(&name),
            },
        };

        let change = AttributeChange::new(old, new);
        if !change.is_noop() {
            changes.insert(name, change);
        }
    }

    changes
}

/// Union of working and persisted attribute names.
fn attribute_names<T: Tracked + ?Sized>(item: &T) -> Vec<String> {
    let names: BTreeSet<&String> = item
        .attributes()
        .keys()
        .chain(item.persisted_attributes().keys())
        .collect();
    names.into_iter().cloned().collect()
}
