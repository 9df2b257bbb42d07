//! Path normalization for comparison against protected-path templates.
//!
//! Normalization is an ordered chain of independent passes. Every pass is
//! total: an unknown variable is left verbatim and reported as a
//! [`NormalizationWarning`], so matching degrades to a literal comparison.
//!
//! 1. `%VAR%` (cmd.exe)
//! 2. `$env:VAR` (PowerShell), then `$VAR` / `${VAR}` (POSIX)
//! 3. leading `~`
//! 4. `.` / `..` against the working directory
//! 5. canonical separator
//! 6. lower-case on case-insensitive platforms

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::platform::Platform;

static PERCENT_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%([A-Za-z_][A-Za-z0-9_()]*)%").expect("percent variable regex")
});

static POWERSHELL_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$env:([A-Za-z_][A-Za-z0-9_]*)").expect("powershell variable regex")
});

/// A variable or home reference that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizationWarning {
    pub token: String,
}

impl std::fmt::Display for NormalizationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unresolved reference {} left verbatim", self.token)
    }
}

/// Variables and home directory used for expansion.
///
/// Built from the process environment in production; tests build one by hand.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
    home: Option<String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the process environment. Home is `HOME`, falling back to
    /// `USERPROFILE`.
    pub fn from_process() -> Self {
        let vars: HashMap<String, String> = std::env::vars().collect();
        let home = vars
            .get("HOME")
            .or_else(|| vars.get("USERPROFILE"))
            .filter(|h| !h.is_empty())
            .cloned();
        Self { vars, home }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_home(mut self, home: impl Into<String>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn home(&self) -> Option<&str> {
        self.home.as_deref()
    }

    /// Look up a variable. Windows variable names are case-insensitive.
    pub fn lookup(&self, name: &str, platform: Platform) -> Option<&str> {
        if let Some(v) = self.vars.get(name) {
            return Some(v.as_str());
        }
        if platform.case_insensitive() {
            return self
                .vars
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str());
        }
        None
    }
}

/// Pass 1: expand `%VAR%`.
pub fn expand_percent_vars(
    input: &str,
    env: &Environment,
    platform: Platform,
    warnings: &mut Vec<NormalizationWarning>,
) -> String {
    PERCENT_VAR
        .replace_all(input, |caps: &Captures| match env.lookup(&caps[1], platform) {
            Some(value) => value.to_string(),
            None => {
                warnings.push(NormalizationWarning {
                    token: caps[0].to_string(),
                });
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Pass 2: expand `$env:VAR`, then POSIX `$VAR` and `${VAR}`.
pub fn expand_dollar_vars(
    input: &str,
    env: &Environment,
    platform: Platform,
    warnings: &mut Vec<NormalizationWarning>,
) -> String {
    let powershell = POWERSHELL_VAR
        .replace_all(input, |caps: &Captures| match env.lookup(&caps[1], platform) {
            Some(value) => value.to_string(),
            None => {
                warnings.push(NormalizationWarning {
                    token: caps[0].to_string(),
                });
                caps[0].to_string()
            }
        })
        .into_owned();

    if !powershell.contains('$') {
        return powershell;
    }
    shellexpand::env_with_context_no_errors(&powershell, |name: &str| {
        let value = env.lookup(name, platform).map(str::to_string);
        if value.is_none() {
            warnings.push(NormalizationWarning {
                token: format!("${name}"),
            });
        }
        value
    })
    .into_owned()
}

/// Pass 3: expand a leading `~` (`~`, `~/...`, and `~\...` on Windows).
pub fn expand_home(
    input: &str,
    env: &Environment,
    platform: Platform,
    warnings: &mut Vec<NormalizationWarning>,
) -> String {
    if !input.starts_with('~') {
        return input.to_string();
    }
    let Some(home) = env.home() else {
        warnings.push(NormalizationWarning { token: "~".into() });
        return input.to_string();
    };
    if platform == Platform::Windows
        && let Some(rest) = input.strip_prefix("~\\")
    {
        return format!("{home}\\{rest}");
    }
    shellexpand::tilde_with_context(input, || Some(home)).into_owned()
}

/// Pass 4: collapse `.`, `..` and repeated separators, anchoring a relative
/// path at `working_dir` when one is given.
///
/// `..` never climbs above the root of an absolute path. A relative path
/// without an absolute working directory stays relative.
pub fn resolve_dots(input: &str, working_dir: Option<&str>, platform: Platform) -> String {
    if input.is_empty() {
        return String::new();
    }
    let sep = platform.separator();
    let joined;
    let path = match working_dir {
        Some(cwd) if !platform.is_absolute(input) && platform.is_absolute(cwd) => {
            joined = format!("{cwd}{sep}{input}");
            joined.as_str()
        }
        _ => input,
    };

    let (prefix, rest) = split_root(path, platform);
    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split(|c| platform.is_separator(c)) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if prefix.is_empty() {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let body = segments.join(&sep.to_string());
    if prefix.is_empty() && body.is_empty() {
        ".".to_string()
    } else {
        format!("{prefix}{body}")
    }
}

/// Split off the root of an absolute path, already in canonical form.
fn split_root(path: &str, platform: Platform) -> (String, &str) {
    match platform {
        Platform::Unix => match path.strip_prefix('/') {
            Some(rest) => ("/".to_string(), rest),
            None => (String::new(), path),
        },
        Platform::Windows => {
            let mut chars = path.chars();
            let first = chars.next();
            let second = chars.next();
            match (first, second) {
                (Some(a), Some(b)) if platform.is_separator(a) && platform.is_separator(b) => {
                    ("\\\\".to_string(), &path[2..])
                }
                (Some(a), _) if platform.is_separator(a) => ("\\".to_string(), &path[1..]),
                (Some(drive), Some(':')) if drive.is_ascii_alphabetic() => {
                    (format!("{drive}:\\"), &path[2..])
                }
                _ => (String::new(), path),
            }
        }
    }
}

/// Pass 5: every separator becomes the platform's canonical one.
pub fn unify_separators(input: &str, platform: Platform) -> String {
    let sep = platform.separator();
    input
        .chars()
        .map(|c| if platform.is_separator(c) { sep } else { c })
        .collect()
}

/// Pass 6: fold case on case-insensitive platforms.
pub fn fold_case(input: &str, platform: Platform) -> String {
    if platform.case_insensitive() {
        input.to_lowercase()
    } else {
        input.to_string()
    }
}

/// Runs the normalization chain for one platform and environment.
#[derive(Debug, Clone)]
pub struct Normalizer {
    platform: Platform,
    env: Environment,
}

impl Normalizer {
    pub fn new(platform: Platform, env: Environment) -> Self {
        Self { platform, env }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Passes 1–3 only: variable and home expansion, nothing else.
    pub fn expand(&self, raw: &str) -> String {
        let mut warnings = Vec::new();
        self.expand_into(raw, &mut warnings)
    }

    fn expand_into(&self, raw: &str, warnings: &mut Vec<NormalizationWarning>) -> String {
        let s = expand_percent_vars(raw, &self.env, self.platform, warnings);
        let s = expand_dollar_vars(&s, &self.env, self.platform, warnings);
        expand_home(&s, &self.env, self.platform, warnings)
    }

    /// Full chain, returning the warnings instead of logging them.
    pub fn normalize_reporting(
        &self,
        raw: &str,
        working_dir: Option<&str>,
    ) -> (String, Vec<NormalizationWarning>) {
        let mut warnings = Vec::new();
        let cwd = working_dir
            .filter(|d| !d.is_empty())
            .map(|d| self.run_chain(d, None, &mut warnings));
        let normalized = self.run_chain(raw, cwd.as_deref(), &mut warnings);
        (normalized, warnings)
    }

    fn run_chain(
        &self,
        raw: &str,
        working_dir: Option<&str>,
        warnings: &mut Vec<NormalizationWarning>,
    ) -> String {
        let expanded = self.expand_into(raw, warnings);
        let resolved = resolve_dots(&expanded, working_dir, self.platform);
        let unified = unify_separators(&resolved, self.platform);
        fold_case(&unified, self.platform)
    }

    /// Full chain. Unresolved references are logged and left verbatim.
    pub fn normalize(&self, raw: &str, working_dir: Option<&str>) -> String {
        let (normalized, warnings) = self.normalize_reporting(raw, working_dir);
        for w in &warnings {
            log::warn!("normalizing {raw:?}: {w}");
        }
        normalized
    }
}
