//! Pattern Store: typed, validated rule tables and protected-path classes.
//!
//! Pattern files are ordered programs, not bags of data: the first matching
//! rule decides, so every rule keeps its file position and its scope tag.

pub mod cache;
pub mod store;

pub use cache::PolicyCache;
pub use store::{PatternFile, PolicySource, RuleEntry, Source};

use regex::Regex;
use serde::Serialize;

use crate::error::ConfigError;
use crate::matcher::CompiledTemplate;
use crate::platform::Platform;

/// Which file a rule or template came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Base,
    Unix,
    Windows,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Base => "base",
            Scope::Unix => "unix",
            Scope::Windows => "windows",
        }
    }
}

impl From<Platform> for Scope {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Unix => Scope::Unix,
            Platform::Windows => Scope::Windows,
        }
    }
}

/// One validated command rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub regex: Regex,
    pub reason: String,
    pub ask: bool,
    pub scope: Scope,
}

impl PatternRule {
    /// The rule's source pattern, as written in the file.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

/// Base rules followed by platform rules, each in file order.
#[derive(Debug, Clone, Default)]
pub struct PatternTable {
    rules: Vec<PatternRule>,
}

impl PatternTable {
    pub fn new(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Protected-path class. Declaration order is precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PathClass {
    ZeroAccess,
    ReadOnly,
    NoDelete,
}

impl PathClass {
    pub const ALL: [PathClass; 3] = [PathClass::ZeroAccess, PathClass::ReadOnly, PathClass::NoDelete];

    pub fn label(self) -> &'static str {
        match self {
            PathClass::ZeroAccess => "zero-access path",
            PathClass::ReadOnly => "read-only path",
            PathClass::NoDelete => "no-delete path",
        }
    }
}

/// A protected-path template as written in a pattern file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathTemplate {
    pub template: String,
    pub scope: Scope,
}

/// The three compiled path classes.
#[derive(Debug, Clone, Default)]
pub struct PathClasses {
    pub zero_access: Vec<CompiledTemplate>,
    pub read_only: Vec<CompiledTemplate>,
    pub no_delete: Vec<CompiledTemplate>,
}

impl PathClasses {
    pub fn get(&self, class: PathClass) -> &[CompiledTemplate] {
        match class {
            PathClass::ZeroAccess => &self.zero_access,
            PathClass::ReadOnly => &self.read_only,
            PathClass::NoDelete => &self.no_delete,
        }
    }
}

/// Everything one evaluation needs. Immutable once built.
///
/// A rule-table failure is kept inside the policy rather than failing the
/// whole build, so Edit and Write can still be checked against the path
/// classes while Bash is denied.
#[derive(Debug, Clone)]
pub struct MergedPolicy {
    pub platform: Platform,
    pub patterns: Result<PatternTable, ConfigError>,
    pub paths: PathClasses,
    pub sources: Vec<String>,
}
