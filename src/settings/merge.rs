//! Merging of settings documents.
//!
//! Four list keys accumulate entries across documents; every other key is a
//! scalar. Objects are merged key by key.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::MergeError;

/// Keys whose arrays are concatenated instead of replaced.
pub const LIST_KEYS: &[&str] = &[
    "hooks.PreToolUse",
    "hooks.PermissionRequest",
    "permissions.deny",
    "permissions.ask",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    Merge,
    Overwrite,
}

/// A scalar that differs between the documents. The existing value is kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeConflict {
    pub key: String,
    pub existing: Value,
    pub template: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub merged: Value,
    pub conflicts: Vec<MergeConflict>,
}

/// What happens to a scalar present in both documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalars {
    KeepExisting,
    TakeIncoming,
}

/// Merge `template` into `existing`.
///
/// With [`Strategy::Merge`], list keys are concatenated without duplicates
/// and scalars from `template` are only added where `existing` has none.
/// With [`Strategy::Overwrite`], the result is `template` verbatim.
pub fn merge(existing: &Value, template: &Value, strategy: Strategy) -> Result<MergeOutcome, MergeError> {
    let existing_map = as_object(existing, "existing settings")?;
    let template_map = as_object(template, "template settings")?;
    if strategy == Strategy::Overwrite {
        return Ok(MergeOutcome {
            merged: template.clone(),
            conflicts: Vec::new(),
        });
    }
    let mut merged = existing_map.clone();
    let mut conflicts = Vec::new();
    merge_object(&mut merged, template_map, "", Scalars::KeepExisting, &mut conflicts);
    Ok(MergeOutcome {
        merged: Value::Object(merged),
        conflicts,
    })
}

/// Fold settings layers, lowest precedence first. Later layers override
/// scalars and extend list keys.
pub fn resolve(layers: &[Value]) -> Result<Value, MergeError> {
    let mut resolved = Map::new();
    let mut ignored = Vec::new();
    for (i, layer) in layers.iter().enumerate() {
        let map = as_object(layer, &format!("settings layer {i}"))?;
        merge_object(&mut resolved, map, "", Scalars::TakeIncoming, &mut ignored);
    }
    Ok(Value::Object(resolved))
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, MergeError> {
    value.as_object().ok_or_else(|| MergeError::NotAnObject { what: what.to_string() })
}

fn merge_object(
    target: &mut Map<String, Value>,
    incoming: &Map<String, Value>,
    prefix: &str,
    scalars: Scalars,
    conflicts: &mut Vec<MergeConflict>,
) {
    for (key, value) in incoming {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        let Some(current) = target.get_mut(key) else {
            target.insert(key.clone(), value.clone());
            continue;
        };
        match (current, value) {
            (Value::Array(items), Value::Array(additions)) if LIST_KEYS.contains(&path.as_str()) => {
                for entry in additions {
                    if !items.iter().any(|existing| same_entry(existing, entry)) {
                        items.push(entry.clone());
                    }
                }
            }
            (Value::Object(inner), Value::Object(additions)) => {
                merge_object(inner, additions, &path, scalars, conflicts);
            }
            (current, value) if current == value => {}
            (current, value) => match scalars {
                Scalars::KeepExisting => conflicts.push(MergeConflict {
                    key: path,
                    existing: current.clone(),
                    template: value.clone(),
                }),
                Scalars::TakeIncoming => *current = value.clone(),
            },
        }
    }
}

/// Exact-string identity: strings compare as themselves, anything else by
/// its serialized form. Two hook entries for the same matcher with
/// different commands stay distinct.
fn same_entry(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a == b,
        (Value::String(_), _) | (_, Value::String(_)) => false,
        _ => serde_json::to_string(a).ok() == serde_json::to_string(b).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hook(matcher: &str, command: &str) -> Value {
        json!({"matcher": matcher, "hooks": [{"type": "command", "command": command}]})
    }

    #[test]
    fn lists_concatenate_without_duplicates() {
        let existing = json!({"permissions": {"deny": ["Read(.env)", "Bash(sudo:*)"]}});
        let template = json!({"permissions": {"deny": ["Bash(sudo:*)", "Read(~/.ssh/**)"], "ask": ["Bash(git push:*)"]}});
        let out = merge(&existing, &template, Strategy::Merge).unwrap();
        assert_eq!(
            out.merged,
            json!({"permissions": {
                "deny": ["Read(.env)", "Bash(sudo:*)", "Read(~/.ssh/**)"],
                "ask": ["Bash(git push:*)"]
            }})
        );
        assert!(out.conflicts.is_empty());
    }

    #[test]
    fn custom_hook_and_template_hook_both_kept_once() {
        let existing = json!({"hooks": {"PreToolUse": [hook("Bash", "my-linter")]}});
        let template = json!({"hooks": {"PreToolUse": [hook("Bash", "damage-control")]}});
        let once = merge(&existing, &template, Strategy::Merge).unwrap().merged;
        let entries = once["hooks"]["PreToolUse"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], hook("Bash", "my-linter"));
        assert_eq!(entries[1], hook("Bash", "damage-control"));

        let twice = merge(&once, &template, Strategy::Merge).unwrap().merged;
        assert_eq!(once, twice);
    }

    #[test]
    fn scalars_keep_existing_and_report_conflict() {
        let existing = json!({"model": "a", "permissions": {"defaultMode": "plan"}});
        let template = json!({"model": "b", "theme": "dark", "permissions": {"defaultMode": "plan"}});
        let out = merge(&existing, &template, Strategy::Merge).unwrap();
        assert_eq!(out.merged["model"], "a");
        assert_eq!(out.merged["theme"], "dark");
        assert_eq!(
            out.conflicts,
            vec![MergeConflict {
                key: "model".into(),
                existing: json!("a"),
                template: json!("b"),
            }]
        );
    }

    #[test]
    fn unlisted_arrays_are_scalars() {
        let existing = json!({"permissions": {"allow": ["Bash(ls)"]}});
        let template = json!({"permissions": {"allow": ["Bash(cat)"]}});
        let out = merge(&existing, &template, Strategy::Merge).unwrap();
        assert_eq!(out.merged["permissions"]["allow"], json!(["Bash(ls)"]));
        assert_eq!(out.conflicts[0].key, "permissions.allow");
    }

    #[test]
    fn overwrite_returns_template() {
        let existing = json!({"model": "a"});
        let template = json!({"hooks": {}});
        let out = merge(&existing, &template, Strategy::Overwrite).unwrap();
        assert_eq!(out.merged, template);
    }

    #[test]
    fn non_object_rejected() {
        assert!(matches!(
            merge(&json!([]), &json!({}), Strategy::Merge),
            Err(MergeError::NotAnObject { .. })
        ));
        assert!(matches!(
            merge(&json!({}), &json!("x"), Strategy::Overwrite),
            Err(MergeError::NotAnObject { .. })
        ));
    }

    #[test]
    fn merge_is_idempotent() {
        let existing = json!({
            "model": "x",
            "hooks": {"PreToolUse": [hook("Write", "fmt")]},
            "permissions": {"ask": ["a"]}
        });
        let template = json!({
            "model": "y",
            "hooks": {"PreToolUse": [hook("Write", "damage-control")], "PermissionRequest": [hook("*", "n")]},
            "permissions": {"ask": ["a", "b"], "deny": ["c"]}
        });
        let once = merge(&existing, &template, Strategy::Merge).unwrap();
        let twice = merge(&once.merged, &template, Strategy::Merge).unwrap();
        assert_eq!(once.merged, twice.merged);
        assert_eq!(once.conflicts, twice.conflicts);
    }

    #[test]
    fn string_and_number_entries_distinct() {
        let out = merge(
            &json!({"permissions": {"deny": ["1"]}}),
            &json!({"permissions": {"deny": [1]}}),
            Strategy::Merge,
        )
        .unwrap();
        assert_eq!(out.merged["permissions"]["deny"], json!(["1", 1]));
    }

    #[test]
    fn resolve_later_layers_win() {
        let global = json!({"model": "g", "permissions": {"deny": ["a"]}});
        let project = json!({"model": "p", "permissions": {"deny": ["b"]}});
        let local = json!({"permissions": {"deny": ["a", "c"], "ask": ["d"]}});
        let resolved = resolve(&[global, project, local]).unwrap();
        assert_eq!(resolved["model"], "p");
        assert_eq!(resolved["permissions"]["deny"], json!(["a", "b", "c"]));
        assert_eq!(resolved["permissions"]["ask"], json!(["d"]));
    }
}
