//! Rule Matcher: first-match-wins lookup in the rule table, and compiled
//! protected-path templates.
//!
//! A template is compiled twice. Once for a normalized target path (Edit and
//! Write), and once as a fragment searched inside command text, where it may
//! appear in its raw, expanded or normalized spelling.

pub mod operations;

use regex::Regex;

use crate::normalize::Normalizer;
use crate::patterns::{PathClass, PathTemplate, PatternRule, PatternTable};
use crate::platform::Platform;
use operations::Operation;

/// Characters that may precede a path inside command text.
const BOUNDARY: &str = r#"[\s'"=:(<>|;&,`/\\]"#;

/// What may follow a path mention: end of text or a non-name character.
const TRAIL: &str = r"(?:$|[^A-Za-z0-9_.\-])";

/// The lowest-index rule that matched.
#[derive(Debug, Clone, Copy)]
pub struct MatchResult<'a> {
    pub index: usize,
    pub rule: &'a PatternRule,
}

/// First rule in table order that matches `input`.
pub fn match_rule<'a>(input: &str, table: &'a PatternTable) -> Option<MatchResult<'a>> {
    match_rule_any(&[input], table)
}

/// First rule in table order that matches any of `inputs`.
///
/// Rule order decides, not input order: a later input matching an earlier
/// rule wins over an earlier input matching a later rule.
pub fn match_rule_any<'a, S: AsRef<str>>(
    inputs: &[S],
    table: &'a PatternTable,
) -> Option<MatchResult<'a>> {
    table
        .rules()
        .iter()
        .enumerate()
        .find(|(_, rule)| inputs.iter().any(|i| rule.regex.is_match(i.as_ref())))
        .map(|(index, rule)| MatchResult { index, rule })
}

pub fn is_glob(template: &str) -> bool {
    template.contains(['*', '?'])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Path,
    Command,
}

/// Translate a template into a regex body.
///
/// `*` and `?` stay within one segment, `**` crosses segments and `**/`
/// may match nothing. Everything else is literal.
fn translate(text: &str, platform: Platform, context: Context) -> String {
    let (sep, segment_char, any) = match (context, platform) {
        (Context::Path, Platform::Unix) => ("/", "[^/]", "."),
        (Context::Path, Platform::Windows) => (r"\\", r"[^\\]", "."),
        (Context::Command, Platform::Unix) => ("/", r"[^\s/]", r"\S"),
        (Context::Command, Platform::Windows) => (r"[\\/]", r"[^\s\\/]", r"\S"),
    };
    let mut out = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek().is_some_and(|n| platform.is_separator(*n)) {
                    chars.next();
                    out.push_str(&format!("(?:{any}*{sep})?"));
                } else {
                    out.push_str(any);
                    out.push('*');
                }
            }
            '*' => {
                out.push_str(segment_char);
                out.push('*');
            }
            '?' => out.push_str(segment_char),
            c if platform.is_separator(c) => out.push_str(sep),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out
}

fn glob_path_regex(normalized: &str, platform: Platform) -> String {
    let sep = regex::escape(&platform.separator().to_string());
    let body = translate(normalized, platform, Context::Path);
    let anchor = if platform.is_absolute(normalized) {
        "^".to_string()
    } else {
        format!("(?:^|{sep})")
    };
    format!("(?i){anchor}{body}(?:{sep}.*)?$")
}

fn trim_trailing_separators(text: &str, platform: Platform) -> &str {
    let trimmed = text.trim_end_matches(|c| platform.is_separator(c));
    if trimmed.is_empty() { text } else { trimmed }
}

/// Alternation of every spelling of the template in command text.
fn command_fragment(raw: &str, normalizer: &Normalizer) -> String {
    let platform = normalizer.platform();
    let forms = [
        raw.to_string(),
        normalizer.expand(raw),
        normalizer.normalize(raw, None),
    ];
    let mut alternatives: Vec<String> = Vec::new();
    for form in &forms {
        let translated = translate(
            trim_trailing_separators(form, platform),
            platform,
            Context::Command,
        );
        if !translated.is_empty() && !alternatives.contains(&translated) {
            alternatives.push(translated);
        }
    }
    alternatives.join("|")
}

/// A protected-path template ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    template: PathTemplate,
    class: PathClass,
    platform: Platform,
    normalized: String,
    path_regex: Option<Regex>,
    mention: Regex,
    /// Forbidden operations applied to the template, in table order.
    operations: Vec<(&'static str, Regex)>,
}

impl CompiledTemplate {
    pub fn compile(
        template: PathTemplate,
        class: PathClass,
        normalizer: &Normalizer,
    ) -> Result<Self, regex::Error> {
        let platform = normalizer.platform();
        let normalized = normalizer.normalize(&template.template, None);
        let glob = is_glob(&template.template);
        let path_regex = if glob {
            Some(Regex::new(&glob_path_regex(&normalized, platform))?)
        } else {
            None
        };

        let case_flag = if glob || platform.case_insensitive() {
            "(?i)"
        } else {
            ""
        };
        let fragment = command_fragment(&template.template, normalizer);
        let mention = Regex::new(&format!("{case_flag}(?:^|{BOUNDARY})(?:{fragment}){TRAIL}"))?;

        let operations = operations::for_class(platform, class)
            .into_iter()
            .map(|op| Ok((op.label, Regex::new(&operation_regex(case_flag, op, &fragment))?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            template,
            class,
            platform,
            normalized,
            path_regex,
            mention,
            operations,
        })
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    pub fn class(&self) -> PathClass {
        self.class
    }

    /// Whether a normalized target path falls under this template.
    pub fn matches_path(&self, path: &str) -> bool {
        if let Some(re) = &self.path_regex {
            return re.is_match(path);
        }
        let sep = self.platform.separator();
        let template = self.normalized.as_str();
        if self.platform.is_absolute(template) {
            path == template
                || (path.starts_with(template)
                    && (template.ends_with(sep) || path[template.len()..].starts_with(sep)))
        } else {
            let needle: Vec<&str> = template.split(sep).filter(|s| !s.is_empty()).collect();
            if needle.is_empty() {
                return false;
            }
            let segments: Vec<&str> = path.split(sep).collect();
            segments.windows(needle.len()).any(|w| w == needle.as_slice())
        }
    }

    /// Whether the template is mentioned anywhere in command text.
    pub fn mentioned_in(&self, text: &str) -> bool {
        self.mention.is_match(text)
    }

    /// The label of a forbidden operation applied to the template in
    /// command text, if any.
    pub fn find_operation(&self, text: &str) -> Option<&'static str> {
        self.operations
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(label, _)| *label)
    }
}

fn operation_regex(case_flag: &str, op: &Operation, fragment: &str) -> String {
    let gap = if op.immediate {
        String::new()
    } else {
        format!("(?:.*{BOUNDARY})?")
    };
    format!("{case_flag}(?:{}){gap}(?:{fragment}){TRAIL}", op.pattern)
}
