use serde::Serialize;

use crate::patterns::{PathClass, Scope};

/// Closed set of verdict outcomes. Ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Ask,
    Deny,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Ask => "ask",
            Decision::Deny => "deny",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Ask => "ASK",
            Decision::Deny => "DENY",
        }
    }
}

/// The rule or protected-path template behind a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RuleRef {
    /// A command rule, by its position in the merged table.
    #[serde(rename_all = "camelCase")]
    Pattern {
        index: usize,
        pattern: String,
        scope: Scope,
    },
    /// A protected-path template.
    #[serde(rename_all = "camelCase")]
    Path {
        class: PathClass,
        template: String,
        scope: Scope,
        #[serde(skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
    },
}

impl RuleRef {
    /// The pattern or template text as written in the pattern file.
    pub fn pattern(&self) -> &str {
        match self {
            RuleRef::Pattern { pattern, .. } => pattern,
            RuleRef::Path { template, .. } => template,
        }
    }
}

/// The result of one evaluation. Built fresh per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub outcome: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<RuleRef>,
    pub reason: String,
}

impl Verdict {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            outcome: Decision::Allow,
            matched_rule: None,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            outcome: Decision::Deny,
            matched_rule: None,
            reason: reason.into(),
        }
    }

    pub fn matched(outcome: Decision, rule: RuleRef, reason: impl Into<String>) -> Self {
        Self {
            outcome,
            matched_rule: Some(rule),
            reason: reason.into(),
        }
    }

    pub fn matched_pattern(&self) -> Option<&str> {
        self.matched_rule.as_ref().map(RuleRef::pattern)
    }

    /// The flat `{outcome, reason, matchedPattern?}` form of the verdict.
    pub fn report(&self) -> VerdictReport<'_> {
        VerdictReport {
            outcome: self.outcome,
            reason: &self.reason,
            matched_pattern: self.matched_pattern(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictReport<'a> {
    pub outcome: Decision,
    pub reason: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<&'a str>,
}
