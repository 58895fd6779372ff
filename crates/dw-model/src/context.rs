// context.rs — Per-operation drafting context.
//
// Who is responsible for a change, whether drafting is enabled for this
// request, and any extra request data to store on drafts. Callers build one
// per request and pass it to every lifecycle operation; nothing is kept
// between calls.

use dw_changeset::AttributeMap;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct DraftContext {
    /// Stored verbatim in the draft's actor column.
    pub whodunnit: Option<String>,

    /// Per-request switch, combined with `Settings::enabled`.
    pub enabled: bool,

    /// Extra meta column values, merged after the type's `meta` options.
    pub controller_info: AttributeMap,
}

impl Default for DraftContext {
    fn default() -> Self {
        Self {
            whodunnit: None,
            enabled: true,
            controller_info: AttributeMap::new(),
        }
    }
}

impl DraftContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_whodunnit(mut self, whodunnit: impl Into<String>) -> Self {
        self.whodunnit = Some(whodunnit.into());
        self
    }

    pub fn with_info(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.controller_info.insert(column.into(), value.into());
        self
    }

    /// A context with drafting switched off for this request.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
