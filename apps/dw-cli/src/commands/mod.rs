// mod.rs — Subcommands and the output helpers they share.

pub mod draft;
pub mod item;

use anyhow::Context;
use dw_changeset::AttributeMap;
use serde_json::Value;

/// Parse `attr=value` assignments. Values that read as JSON (numbers,
/// booleans, null, arrays, objects, quoted strings) are taken as such;
/// anything else is a plain string.
pub fn parse_assignments(assignments: &[String]) -> anyhow::Result<AttributeMap> {
    let mut values = AttributeMap::new();
    for assignment in assignments {
        let (name, raw) = assignment
            .split_once('=')
            .with_context(|| format!("expected ATTR=VALUE, got '{}'", assignment))?;
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("missing attribute name in '{}'", assignment);
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        values.insert(name.to_string(), value);
    }
    Ok(values)
}

/// A value as shown in tables: strings bare, everything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}
