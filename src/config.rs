use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::eval::Engine;
use crate::normalize::{Environment, Normalizer};
use crate::patterns::PolicySource;
use crate::platform::Platform;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// User overlay location, relative to the home directory.
const OVERLAY_PATH: &str = ".config/damage-control/config.toml";

// ── Final (merged) config types ──

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub patterns: PatternsConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_timeout")]
    pub confirm_timeout_secs: u64,
    #[serde(default = "default_platform")]
    pub platform: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confirm_timeout_secs: default_timeout(),
            platform: default_platform(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}

fn default_platform() -> String {
    "auto".into()
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct PatternsConfig {
    /// Pattern directory. Empty means discover it.
    #[serde(default)]
    pub dir: String,
    #[serde(default)]
    pub extra_files: Vec<String>,
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    patterns: PatternsOverlay,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SettingsOverlay {
    confirm_timeout_secs: Option<u64>,
    platform: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PatternsOverlay {
    #[serde(default)]
    replace: bool,
    dir: Option<String>,
    #[serde(default)]
    extra_files: Vec<String>,
    #[serde(default)]
    remove_extra_files: Vec<String>,
}

// ── Merge logic ──

/// Merge a user list into a default list.
/// In replace mode: user list replaces default entirely.
/// In merge mode: remove items first, then extend with additions (deduped).
fn merge_list(base: &mut Vec<String>, add: Vec<String>, remove: &[String], replace: bool) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.contains(item));
        for item in add {
            if !base.contains(&item) {
                base.push(item);
            }
        }
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Embedded defaults merged with the user overlay at
    /// `~/.config/damage-control/config.toml`, when it exists.
    ///
    /// Lists extend, scalars override. `replace = true` in a section replaces
    /// its default lists; `remove_<field>` subtracts items.
    pub fn load(home: Option<&Path>) -> Self {
        let mut config = Self::default_config();
        if let Some(overlay) = home.and_then(|h| Self::load_overlay(&h.join(OVERLAY_PATH))) {
            config.apply_overlay(overlay);
        }
        config
    }

    fn load_overlay(path: &Path) -> Option<ConfigOverlay> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                log::error!("{}: config parse error: {e}", path.display());
                eprintln!("damage-control: config parse error: {e}");
                None
            }
        }
    }

    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let s = overlay.settings;
        if let Some(v) = s.confirm_timeout_secs {
            self.settings.confirm_timeout_secs = v;
        }
        if let Some(v) = s.platform {
            self.settings.platform = v;
        }

        let p = overlay.patterns;
        if let Some(v) = p.dir {
            self.patterns.dir = v;
        }
        merge_list(
            &mut self.patterns.extra_files,
            p.extra_files,
            &p.remove_extra_files,
            p.replace,
        );
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.confirm_timeout_secs)
    }

    /// The configured platform. An unknown name falls back to the current one.
    pub fn platform(&self) -> Platform {
        Platform::parse(&self.settings.platform).unwrap_or_else(|| {
            log::warn!(
                "unknown platform {:?}, using {}",
                self.settings.platform,
                Platform::current()
            );
            Platform::current()
        })
    }

    /// Where to load patterns from, with `~` and variables expanded.
    pub fn policy_source(&self, normalizer: &Normalizer) -> PolicySource {
        let expand = |p: &str| PathBuf::from(normalizer.expand(p));
        let explicit = (!self.patterns.dir.trim().is_empty()).then(|| expand(&self.patterns.dir));
        let extra_files = self.patterns.extra_files.iter().map(|f| expand(f)).collect();
        PolicySource::discover(explicit.as_deref(), normalizer.env(), normalizer.platform())
            .with_extra_files(extra_files)
    }

    /// Build an engine from this configuration.
    pub fn engine(&self, env: Environment, platform: Option<Platform>) -> Engine {
        let normalizer = Normalizer::new(platform.unwrap_or_else(|| self.platform()), env);
        let source = self.policy_source(&normalizer);
        Engine::new(source, normalizer).with_timeout(self.confirm_timeout())
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}
