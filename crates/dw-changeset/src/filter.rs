// filter.rs — ignore / only / skip attribute filters.
//
// Each draftable type declares which of its attributes take part in drafting:
//   ignore — changes alone never trigger a draft
//   only   — if non-empty, the only attributes that can trigger a draft
//   skip   — excluded entirely: never drafted, never stored in snapshots
//
// Draftable attributes are `(all - ignore - skip) ∩ only` (when `only` is set).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeMap;

/// Attribute filter configured per draftable type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeFilter {
    /// Attributes whose changes alone never produce a draft.
    #[serde(default)]
    pub ignore: BTreeSet<String>,

    /// When non-empty, restricts drafting to exactly these attributes.
    #[serde(default)]
    pub only: BTreeSet<String>,

    /// Attributes fully excluded from drafting and from draft snapshots.
    #[serde(default)]
    pub skip: BTreeSet<String>,
}

impl AttributeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add ignored attributes and return self (builder pattern).
    pub fn ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add attributes to the `only` set and return self.
    pub fn only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add skipped attributes and return self.
    pub fn skip<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip.extend(names.into_iter().map(Into::into));
        self
    }

    /// Whether a change to `name` can take part in a draft.
    pub fn is_draftable(&self, name: &str) -> bool {
        if self.ignore.contains(name) || self.skip.contains(name) {
            return false;
        }
        self.only.is_empty() || self.only.contains(name)
    }

    pub fn is_skipped(&self, name: &str) -> bool {
        self.skip.contains(name)
    }

    /// Whether `name` falls outside a configured `only` set. Such attributes
    /// are written straight to the live row instead of being drafted.
    pub fn is_outside_only(&self, name: &str) -> bool {
        !self.only.is_empty() && !self.only.contains(name)
    }

    /// The draftable subset of `names`, in iteration order.
    pub fn draftable<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .filter(|name| self.is_draftable(name))
            .cloned()
            .collect()
    }

    /// Attributes written to the live row when a draft is published:
    /// `only` (or every attribute) minus `ignore`, plus `always`, minus `skip`.
    pub fn publishable<'a, I>(&self, all: I, always: &[&str]) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut names: BTreeSet<String> = if self.only.is_empty() {
            all.into_iter().cloned().collect()
        } else {
            self.only.clone()
        };
        names.retain(|name| !self.ignore.contains(name));
        names.extend(always.iter().map(|name| name.to_string()));
        names.retain(|name| !self.skip.contains(name));
        names
    }

    /// A copy of `attributes` with skipped keys removed, as stored in a
    /// draft's snapshot.
    pub fn without_skipped(&self, attributes: &AttributeMap) -> AttributeMap {
        attributes
            .iter()
            .filter(|(name, _)| !self.skip.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}
