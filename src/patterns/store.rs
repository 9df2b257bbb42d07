//! Loading pattern files into a [`MergedPolicy`].
//!
//! Files are TOML. A base file is always loaded first, followed by the
//! platform file and any extra files, and nothing is de-duplicated. Any
//! missing file, schema error or invalid regex is a [`ConfigError`].

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use super::{MergedPolicy, PathClass, PathClasses, PathTemplate, PatternRule, PatternTable, Scope};
use crate::error::ConfigError;
use crate::matcher::CompiledTemplate;
use crate::normalize::{Environment, Normalizer};
use crate::platform::Platform;

/// Embedded default pattern files.
const BASE_PATTERNS: &str = include_str!("../../patterns-base.toml");
const UNIX_PATTERNS: &str = include_str!("../../patterns-unix.toml");
const WINDOWS_PATTERNS: &str = include_str!("../../patterns-windows.toml");

/// File name of the base pattern file.
pub const BASE_FILE: &str = "patterns-base.toml";

/// Install location of pattern files, relative to a project root or home.
pub const INSTALL_DIR: &str = ".claude/hooks/damage-control";

/// On-disk schema of one pattern file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PatternFile {
    #[serde(default)]
    pub bash_tool_patterns: Vec<RuleEntry>,
    #[serde(default)]
    pub zero_access_paths: Vec<String>,
    #[serde(default)]
    pub read_only_paths: Vec<String>,
    #[serde(default)]
    pub no_delete_paths: Vec<String>,
}

impl PatternFile {
    fn templates(&self, class: PathClass) -> &[String] {
        match class {
            PathClass::ZeroAccess => &self.zero_access_paths,
            PathClass::ReadOnly => &self.read_only_paths,
            PathClass::NoDelete => &self.no_delete_paths,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuleEntry {
    pub pattern: String,
    pub reason: String,
    #[serde(default)]
    pub ask: bool,
}

/// The text of one pattern file, tagged with its scope.
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub scope: Scope,
    pub text: String,
}

impl Source {
    /// The embedded base and platform files.
    pub fn embedded(platform: Platform) -> Vec<Source> {
        let platform_text = match platform {
            Platform::Unix => UNIX_PATTERNS,
            Platform::Windows => WINDOWS_PATTERNS,
        };
        vec![
            Source {
                name: format!("embedded:{BASE_FILE}"),
                scope: Scope::Base,
                text: BASE_PATTERNS.to_string(),
            },
            Source {
                name: format!("embedded:{}", platform.pattern_file()),
                scope: Scope::from(platform),
                text: platform_text.to_string(),
            },
        ]
    }

    pub fn read(path: &Path, scope: Scope) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Source {
                name: path.display().to_string(),
                scope,
                text,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::Missing {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    pub fn parse(&self) -> Result<PatternFile, ConfigError> {
        toml::from_str(&self.text).map_err(|e| ConfigError::Schema {
            source_name: self.name.clone(),
            message: e.to_string(),
        })
    }
}

/// Validate and compile the command rules of one file, in file order.
pub fn compile_rules(
    file: &PatternFile,
    scope: Scope,
    source_name: &str,
) -> Result<Vec<PatternRule>, ConfigError> {
    file.bash_tool_patterns
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            if entry.reason.trim().is_empty() {
                return Err(ConfigError::EmptyReason {
                    source_name: source_name.to_string(),
                    index,
                    pattern: entry.pattern.clone(),
                });
            }
            let regex = RegexBuilder::new(&entry.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| ConfigError::InvalidPattern {
                    source_name: source_name.to_string(),
                    index,
                    pattern: entry.pattern.clone(),
                    message: e.to_string(),
                })?;
            Ok(PatternRule {
                regex,
                reason: entry.reason.clone(),
                ask: entry.ask,
                scope,
            })
        })
        .collect()
}

/// Build the rule table from already-read sources.
pub fn table_from_sources(sources: &[Source]) -> Result<PatternTable, ConfigError> {
    let mut rules = Vec::new();
    for source in sources {
        let file = source.parse()?;
        rules.extend(compile_rules(&file, source.scope, &source.name)?);
    }
    Ok(PatternTable::new(rules))
}

/// Load the rule table from a base file followed by platform files.
pub fn load(
    base: &Path,
    platform_files: &[PathBuf],
    platform: Platform,
) -> Result<PatternTable, ConfigError> {
    let mut sources = vec![Source::read(base, Scope::Base)?];
    for path in platform_files {
        sources.push(Source::read(path, Scope::from(platform))?);
    }
    table_from_sources(&sources)
}

/// Build a complete policy. File and schema errors fail the whole build;
/// rule errors are kept inside [`MergedPolicy::patterns`].
pub fn build_policy(sources: &[Source], normalizer: &Normalizer) -> Result<MergedPolicy, ConfigError> {
    let files = sources
        .iter()
        .map(|s| s.parse().map(|f| (s, f)))
        .collect::<Result<Vec<_>, _>>()?;

    let patterns = files
        .iter()
        .try_fold(Vec::new(), |mut rules, (source, file)| {
            rules.extend(compile_rules(file, source.scope, &source.name)?);
            Ok(rules)
        })
        .map(PatternTable::new);

    let mut paths = PathClasses::default();
    for (source, file) in &files {
        for class in PathClass::ALL {
            for template in file.templates(class) {
                if template.trim().is_empty() {
                    return Err(ConfigError::InvalidTemplate {
                        source_name: source.name.clone(),
                        template: template.clone(),
                        message: "empty template".into(),
                    });
                }
                let path_template = PathTemplate {
                    template: template.clone(),
                    scope: source.scope,
                };
                let compiled = CompiledTemplate::compile(path_template, class, normalizer)
                    .map_err(|e| ConfigError::InvalidTemplate {
                        source_name: source.name.clone(),
                        template: template.clone(),
                        message: e.to_string(),
                    })?;
                match class {
                    PathClass::ZeroAccess => paths.zero_access.push(compiled),
                    PathClass::ReadOnly => paths.read_only.push(compiled),
                    PathClass::NoDelete => paths.no_delete.push(compiled),
                }
            }
        }
    }

    Ok(MergedPolicy {
        platform: normalizer.platform(),
        patterns,
        paths,
        sources: sources.iter().map(|s| s.name.clone()).collect(),
    })
}

/// Where the pattern files of a policy come from.
///
/// Without a directory the embedded defaults are used. Extra files are
/// appended after the platform file in the given order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySource {
    pub dir: Option<PathBuf>,
    pub extra_files: Vec<PathBuf>,
}

impl PolicySource {
    pub fn embedded() -> Self {
        Self::default()
    }

    pub fn directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            extra_files: Vec::new(),
        }
    }

    pub fn with_extra_files(mut self, files: Vec<PathBuf>) -> Self {
        self.extra_files = files;
        self
    }

    /// Pick the pattern directory: an explicit directory, then the project
    /// install location, then the user install location, then the embedded
    /// defaults. A candidate only counts if it holds a base file.
    pub fn discover(explicit: Option<&Path>, env: &Environment, platform: Platform) -> Self {
        if let Some(dir) = explicit {
            return Self::directory(dir);
        }
        let project = env
            .lookup("CLAUDE_PROJECT_DIR", platform)
            .filter(|p| !p.is_empty())
            .map(|p| Path::new(p).join(INSTALL_DIR));
        let user = env.home().map(|h| Path::new(h).join(INSTALL_DIR));
        for candidate in [project, user].into_iter().flatten() {
            if candidate.join(BASE_FILE).is_file() {
                log::debug!("using pattern directory {}", candidate.display());
                return Self::directory(candidate);
            }
        }
        Self::embedded()
    }

    /// On-disk files this source depends on, in load order.
    pub fn files(&self, platform: Platform) -> Vec<PathBuf> {
        let mut files = Vec::new();
        if let Some(dir) = &self.dir {
            files.push(dir.join(BASE_FILE));
            files.push(dir.join(platform.pattern_file()));
        }
        files.extend(self.extra_files.iter().cloned());
        files
    }

    /// Modification time of every file, `None` when it cannot be read.
    pub fn stamps(&self, platform: Platform) -> Vec<(PathBuf, Option<SystemTime>)> {
        self.files(platform)
            .into_iter()
            .map(|path| {
                let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
                (path, modified)
            })
            .collect()
    }

    pub fn read(&self, platform: Platform) -> Result<Vec<Source>, ConfigError> {
        let mut sources = match &self.dir {
            None => Source::embedded(platform),
            Some(dir) => vec![
                Source::read(&dir.join(BASE_FILE), Scope::Base)?,
                Source::read(&dir.join(platform.pattern_file()), Scope::from(platform))?,
            ],
        };
        for path in &self.extra_files {
            sources.push(Source::read(path, Scope::from(platform))?);
        }
        Ok(sources)
    }

    pub fn load(&self, normalizer: &Normalizer) -> Result<MergedPolicy, ConfigError> {
        let sources = self.read(normalizer.platform())?;
        build_policy(&sources, normalizer)
    }

    pub fn describe(&self) -> String {
        match &self.dir {
            Some(dir) => dir.display().to_string(),
            None => "embedded defaults".to_string(),
        }
    }
}
