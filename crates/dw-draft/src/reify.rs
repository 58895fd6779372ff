// reify.rs — Rebuild an item's attributes as of a draft.
//
// Resolution order, first match wins:
//   1. create draft       → the live item is already the drafted state
//   2. previous_draft     → reify the superseded draft instead
//   3. non-empty changes  → live attributes overlaid with each change's new side
//   4. object snapshot    → live attributes overlaid with the snapshot
//   5. nothing stored     → None

use std::collections::BTreeSet;

use dw_changeset::AttributeMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::draft::Draft;
use crate::error::DraftError;
use crate::format::DraftFormat;

/// Counter-cache columns are maintained by the datastore, never by drafts.
const COUNTER_CACHE_SUFFIX: &str = "_count";

/// Reconstruct the attributes of the item `draft` belongs to.
///
/// `live` is the item's current row and `columns` the columns its type
/// declares. Stored attributes the type no longer has are logged and skipped.
pub fn reify(
    draft: &Draft,
    live: &AttributeMap,
    columns: &BTreeSet<String>,
    format: &DraftFormat<'_>,
) -> Result<Option<AttributeMap>, DraftError> {
    if draft.is_create() {
        return Ok(Some(live.clone()));
    }

    if let Some(previous) = reify_previous_draft(draft, format)? {
        debug!(draft_id = draft.id, item = %draft.item, "reifying superseded draft");
        return reify(&previous, live, columns, format);
    }

    if let Some(changes) = format.changes(draft).filter(|c| !c.is_empty()) {
        let mut attributes = live.clone();
        for (name, change) in changes {
            if name.ends_with(COUNTER_CACHE_SUFFIX) {
                continue;
            }
            assign(&mut attributes, columns, draft, name, change.new);
        }
        return Ok(Some(attributes));
    }

    if let Some(stored) = draft.object.as_ref() {
        let mut attributes = live.clone();
        for (name, value) in format.decode_object(stored)? {
            assign(&mut attributes, columns, draft, name, value);
        }
        return Ok(Some(attributes));
    }

    Ok(None)
}

/// The unsaved draft stashed in `draft`'s `previous_draft` column, if any.
pub fn reify_previous_draft(
    draft: &Draft,
    format: &DraftFormat<'_>,
) -> Result<Option<Draft>, DraftError> {
    format.decode_previous_draft(draft)
}

fn assign(
    attributes: &mut AttributeMap,
    columns: &BTreeSet<String>,
    draft: &Draft,
    name: String,
    value: Value,
) {
    if columns.contains(&name) {
        attributes.insert(name, value);
    } else {
        warn!(
            attribute = %name,
            item = %draft.item,
            draft_id = draft.id,
            "attribute does not exist on item; skipping"
        );
    }
}
