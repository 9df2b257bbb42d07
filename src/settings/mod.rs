//! Config Merger: layered settings documents.
//!
//! Layers, lowest precedence first:
//! 1. Global: `~/.claude/settings.json`
//! 2. Project: `<project>/.claude/settings.json`
//! 3. Local: `<project>/.claude/settings.local.json`

pub mod merge;

pub use merge::{LIST_KEYS, MergeConflict, MergeOutcome, Strategy, merge, resolve};

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::MergeError;

/// Embedded settings template registering the hook.
const TEMPLATE: &str = include_str!("../../settings.template.json");

const SETTINGS_DIR: &str = ".claude";
const SETTINGS_FILE: &str = "settings.json";
const LOCAL_SETTINGS_FILE: &str = "settings.local.json";

/// The embedded template document.
pub fn template() -> Value {
    serde_json::from_str(TEMPLATE).expect("embedded settings template must parse")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsScope {
    Global,
    Project,
    Local,
}

impl SettingsScope {
    pub const ALL: [SettingsScope; 3] = [SettingsScope::Global, SettingsScope::Project, SettingsScope::Local];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "global" | "user" => Some(SettingsScope::Global),
            "project" => Some(SettingsScope::Project),
            "local" | "personal" => Some(SettingsScope::Local),
            _ => None,
        }
    }

    /// Location of this layer's file. Global needs a home directory.
    pub fn path(self, home: Option<&Path>, project: &Path) -> Option<PathBuf> {
        match self {
            SettingsScope::Global => home.map(|h| h.join(SETTINGS_DIR).join(SETTINGS_FILE)),
            SettingsScope::Project => Some(project.join(SETTINGS_DIR).join(SETTINGS_FILE)),
            SettingsScope::Local => Some(project.join(SETTINGS_DIR).join(LOCAL_SETTINGS_FILE)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    Deny,
    Ask,
}

impl PermissionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionKind::Deny => "deny",
            PermissionKind::Ask => "ask",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "deny" => Some(PermissionKind::Deny),
            "ask" => Some(PermissionKind::Ask),
            _ => None,
        }
    }
}

/// Read a settings document. A missing file is `None`.
pub fn read_document(path: &Path) -> Result<Option<Value>, MergeError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(MergeError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let value: Value = serde_json::from_str(&content).map_err(|source| MergeError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if !value.is_object() {
        return Err(MergeError::NotAnObject {
            what: path.display().to_string(),
        });
    }
    Ok(Some(value))
}

/// Write a settings document as pretty JSON, creating parent directories.
pub fn write_document(path: &Path, value: &Value) -> Result<(), MergeError> {
    let io_err = |source| MergeError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut text = serde_json::to_string_pretty(value).map_err(|source| MergeError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    text.push('\n');
    std::fs::write(path, text).map_err(io_err)
}

/// The resolved settings of one project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveSettings {
    pub document: Value,
    pub sources: Vec<PathBuf>,
}

impl EffectiveSettings {
    /// Read and resolve every layer that exists.
    pub fn load(home: Option<&Path>, project: &Path) -> Result<Self, MergeError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();
        for scope in SettingsScope::ALL {
            let Some(path) = scope.path(home, project) else {
                continue;
            };
            if let Some(document) = read_document(&path)? {
                log::debug!("settings layer {scope:?} from {}", path.display());
                layers.push(document);
                sources.push(path);
            }
        }
        Ok(Self {
            document: resolve(&layers)?,
            sources,
        })
    }

    /// Hook entries registered for an event such as `PreToolUse`.
    pub fn hooks(&self, event: &str) -> &[Value] {
        self.document
            .pointer(&format!("/hooks/{event}"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn permissions(&self, kind: PermissionKind) -> Vec<&str> {
        self.document
            .pointer(&format!("/permissions/{}", kind.as_str()))
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Add one permission entry to a settings file with merge semantics.
///
/// Returns whether the entry was new. The file is only rewritten when it
/// changes.
pub fn record_permission(path: &Path, kind: PermissionKind, pattern: &str) -> Result<bool, MergeError> {
    let existing = read_document(path)?.unwrap_or_else(|| json!({}));
    let mut permissions = serde_json::Map::new();
    permissions.insert(kind.as_str().to_string(), json!([pattern]));
    let addition = json!({ "permissions": permissions });
    let outcome = merge(&existing, &addition, Strategy::Merge)?;
    if outcome.merged == existing {
        return Ok(false);
    }
    for conflict in &outcome.conflicts {
        log::warn!("{}: keeping existing value of {}", path.display(), conflict.key);
    }
    write_document(path, &outcome.merged)?;
    log::info!("recorded {} permission {pattern:?} in {}", kind.as_str(), path.display());
    Ok(true)
}
