pub mod decision;
pub mod invocation;
pub mod state;

pub use decision::{Decision, RuleRef, Verdict, VerdictReport};
pub use invocation::{Invocation, ToolKind};
pub use state::{Evaluation, State};

use std::time::Duration;

use crate::confirm::{ConfirmationOutcome, ConfirmationRequest, Confirmer};
use crate::matcher::{self, CompiledTemplate};
use crate::normalize::{Environment, Normalizer};
use crate::parse;
use crate::patterns::{MergedPolicy, PathClass, PolicyCache, PolicySource};
use crate::platform::Platform;

/// Default bound on a confirmation request.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

/// Decision Engine: turns an [`Invocation`] into a [`Verdict`].
///
/// Evaluation is a read-only pass over the cached policy. Every internal
/// failure is reported as a deny verdict.
#[derive(Debug)]
pub struct Engine {
    cache: PolicyCache,
    confirm_timeout: Duration,
}

impl Engine {
    pub fn new(source: PolicySource, normalizer: Normalizer) -> Self {
        Self {
            cache: PolicyCache::new(source, normalizer),
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }

    /// Engine over the embedded default patterns.
    pub fn embedded(platform: Platform, env: Environment) -> Self {
        Self::new(PolicySource::embedded(), Normalizer::new(platform, env))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn confirm_timeout(&self) -> Duration {
        self.confirm_timeout
    }

    pub fn platform(&self) -> Platform {
        self.cache.normalizer().platform()
    }

    pub fn cache(&self) -> &PolicyCache {
        &self.cache
    }

    /// Evaluate without resolving an ask verdict.
    pub fn evaluate(&self, invocation: &Invocation) -> Verdict {
        self.trace(invocation).verdict
    }

    /// Evaluate, recording the state transitions. An ask verdict stops in
    /// `NeedsConfirmation`.
    pub fn trace(&self, invocation: &Invocation) -> Evaluation {
        let mut states = Evaluation::start();
        states.advance(State::Evaluating);
        let verdict = self.verdict_for(invocation);
        states.advance(match verdict.outcome {
            Decision::Allow => State::Allowed,
            Decision::Ask => State::NeedsConfirmation,
            Decision::Deny => State::Denied,
        });
        crate::logging::log_verdict(invocation, &verdict);
        states.finish(verdict)
    }

    /// Evaluate and resolve an ask verdict through `confirmer`.
    ///
    /// Approval allows; rejection or timeout denies.
    pub fn decide(&self, invocation: &Invocation, confirmer: &dyn Confirmer) -> Evaluation {
        let evaluation = self.trace(invocation);
        if evaluation.state().is_terminal() {
            return evaluation;
        }

        let Evaluation {
            verdict,
            transitions,
        } = evaluation;
        let request = ConfirmationRequest {
            summary: invocation.summary(),
            reason: verdict.reason.clone(),
        };
        let outcome = confirmer.confirm(&request, self.confirm_timeout);
        log::info!("confirmation for {}: {outcome:?}", request.summary);

        let (state, resolved) = match outcome {
            ConfirmationOutcome::Approved => (
                State::Allowed,
                Verdict {
                    outcome: Decision::Allow,
                    reason: format!("{} (approved)", verdict.reason),
                    ..verdict
                },
            ),
            ConfirmationOutcome::Rejected => (
                State::Denied,
                Verdict {
                    outcome: Decision::Deny,
                    reason: format!("{} (rejected)", verdict.reason),
                    ..verdict
                },
            ),
            ConfirmationOutcome::TimedOut => (
                State::Denied,
                Verdict {
                    outcome: Decision::Deny,
                    reason: format!(
                        "{} (confirmation timed out after {}s)",
                        verdict.reason,
                        self.confirm_timeout.as_secs_f32()
                    ),
                    ..verdict
                },
            ),
        };
        let mut states = state::Transitions::resume(transitions);
        states.advance(state);
        states.finish(resolved)
    }

    fn verdict_for(&self, invocation: &Invocation) -> Verdict {
        let policy = match self.cache.get() {
            Ok(policy) => policy,
            Err(e) => return Verdict::deny(format!("policy unavailable: {e}")),
        };
        let working_dir = invocation.working_dir.as_deref();
        match invocation.tool_kind {
            ToolKind::Bash => match invocation.raw_command.as_deref() {
                Some(command) => self.check_command(command, working_dir, &policy),
                None => Verdict::deny("malformed invocation: bash without a command"),
            },
            ToolKind::Edit | ToolKind::Write => match invocation.target_path.as_deref() {
                Some(path) if !path.trim().is_empty() => {
                    self.check_path(invocation.tool_kind, path, working_dir, &policy)
                }
                _ => Verdict::deny(format!(
                    "malformed invocation: {} without a target path",
                    invocation.tool_kind.as_str()
                )),
            },
        }
    }

    fn check_path(
        &self,
        kind: ToolKind,
        path: &str,
        working_dir: Option<&str>,
        policy: &MergedPolicy,
    ) -> Verdict {
        let normalized = self.cache.normalizer().normalize(path, working_dir);
        for class in [PathClass::ZeroAccess, PathClass::ReadOnly] {
            if let Some(template) = policy
                .paths
                .get(class)
                .iter()
                .find(|t| t.matches_path(&normalized))
            {
                return path_verdict(
                    template,
                    None,
                    format!(
                        "{} of {} blocked: {} {}",
                        kind.as_str(),
                        path,
                        class.label(),
                        template.template().template
                    ),
                );
            }
        }
        if working_dir.is_none() && !policy.platform.is_absolute(&normalized) {
            return Verdict::deny(format!(
                "{} of {path} blocked: relative target path without a working directory",
                kind.as_str()
            ));
        }
        Verdict::allow("no rule matched")
    }

    fn check_command(
        &self,
        command: &str,
        working_dir: Option<&str>,
        policy: &MergedPolicy,
    ) -> Verdict {
        if command.trim().is_empty() {
            return Verdict::allow("empty command");
        }
        let table = match &policy.patterns {
            Ok(table) => table,
            Err(e) => return Verdict::deny(format!("command rules unavailable: {e}")),
        };

        let platform = policy.platform;
        let statements = match platform {
            Platform::Unix => parse::statements(command),
            Platform::Windows => None,
        };
        let units: Vec<&str> = match &statements {
            Some(found) => found.iter().map(String::as_str).collect(),
            None => vec![command],
        };
        let normalized_whole = self.normalize_command(command, working_dir);
        let mut unit_texts: Vec<String> = Vec::with_capacity(units.len() * 2);
        for unit in &units {
            unit_texts.push(unit.to_string());
            unit_texts.push(self.normalize_command(unit, working_dir));
        }

        if let Some(template) = policy
            .paths
            .zero_access
            .iter()
            .find(|t| t.mentioned_in(command) || t.mentioned_in(&normalized_whole))
        {
            return path_verdict(
                template,
                None,
                format!(
                    "command references {} {}",
                    PathClass::ZeroAccess.label(),
                    template.template().template
                ),
            );
        }

        for class in [PathClass::ReadOnly, PathClass::NoDelete] {
            for template in policy.paths.get(class) {
                if let Some(operation) = unit_texts.iter().find_map(|t| template.find_operation(t)) {
                    return path_verdict(
                        template,
                        Some(operation),
                        format!(
                            "{operation} on {} {} blocked",
                            class.label(),
                            template.template().template
                        ),
                    );
                }
            }
        }

        let mut rule_inputs: Vec<&str> = vec![command];
        rule_inputs.extend(units.iter().filter(|u| **u != command));
        match matcher::match_rule_any(&rule_inputs, table) {
            Some(hit) => Verdict::matched(
                if hit.rule.ask { Decision::Ask } else { Decision::Deny },
                RuleRef::Pattern {
                    index: hit.index,
                    pattern: hit.rule.pattern().to_string(),
                    scope: hit.rule.scope,
                },
                hit.rule.reason.clone(),
            ),
            None => Verdict::allow("no rule matched"),
        }
    }

    /// Rewrite every path-like word of a command in normalized form, so
    /// that `$HOME/.ssh` and `../../etc` are compared as the paths they name.
    pub fn normalize_command(&self, command: &str, working_dir: Option<&str>) -> String {
        let normalizer = self.cache.normalizer();
        let platform = normalizer.platform();
        parse::tokenize(command, platform)
            .iter()
            .map(|word| {
                let (redirect, rest) = parse::split_redirect(word);
                if let Some((name, value)) = parse::split_assignment(rest)
                    && parse::path_like(value, platform)
                {
                    return format!("{redirect}{name}={}", normalizer.normalize(value, working_dir));
                }
                if parse::path_like(rest, platform) {
                    format!("{redirect}{}", normalizer.normalize(rest, working_dir))
                } else {
                    word.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn path_verdict(template: &CompiledTemplate, operation: Option<&str>, reason: String) -> Verdict {
    let path_template = template.template();
    Verdict::matched(
        Decision::Deny,
        RuleRef::Path {
            class: template.class(),
            template: path_template.template.clone(),
            scope: path_template.scope,
            operation: operation.map(str::to_string),
        },
        reason,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm;

    fn unix() -> Engine {
        Engine::embedded(
            Platform::Unix,
            Environment::new()
                .with_home("/home/tester")
                .with_var("HOME", "/home/tester"),
        )
    }

    fn windows() -> Engine {
        Engine::embedded(
            Platform::Windows,
            Environment::new()
                .with_home("C:\\Users\\Tester")
                .with_var("USERPROFILE", "C:\\Users\\Tester"),
        )
    }

    fn outcome(engine: &Engine, invocation: Invocation) -> Decision {
        engine.evaluate(&invocation).outcome
    }

    #[test]
    fn empty_command_allowed() {
        let v = unix().evaluate(&Invocation::bash("   "));
        assert_eq!(v.outcome, Decision::Allow);
        assert_eq!(v.reason, "empty command");
    }

    #[test]
    fn missing_fields_denied() {
        let engine = unix();
        let mut bash = Invocation::bash("ls");
        bash.raw_command = None;
        assert_eq!(outcome(&engine, bash), Decision::Deny);
        assert_eq!(outcome(&engine, Invocation::write("")), Decision::Deny);
    }

    #[test]
    fn harmless_command_allowed() {
        let engine = unix();
        assert_eq!(outcome(&engine, Invocation::bash("ls -la")), Decision::Allow);
        assert_eq!(outcome(&engine, Invocation::bash("cargo build --release")), Decision::Allow);
    }

    #[test]
    fn normalize_command_rewrites_paths() {
        let engine = unix();
        assert_eq!(
            engine.normalize_command("cat $HOME/.ssh/id_rsa > ./out", Some("/work")),
            "cat /home/tester/.ssh/id_rsa > /work/out"
        );
        assert_eq!(
            engine.normalize_command("echo x >../etc/hosts", Some("/work")),
            "echo x >/etc/hosts"
        );
        assert_eq!(
            engine.normalize_command("KUBECONFIG=~/.kube/config kubectl get pods", None),
            "KUBECONFIG=/home/tester/.kube/config kubectl get pods"
        );
    }

    #[test]
    fn zero_access_via_variable() {
        let v = unix().evaluate(&Invocation::bash("cat \"$HOME/.ssh/id_rsa\""));
        assert_eq!(v.outcome, Decision::Deny);
        assert!(matches!(
            v.matched_rule,
            Some(RuleRef::Path { class: PathClass::ZeroAccess, .. })
        ));
    }

    #[test]
    fn zero_access_via_relative_path() {
        let engine = unix();
        let inv = Invocation::bash("cat ../.ssh/id_rsa").with_working_dir("/home/tester/proj");
        assert_eq!(outcome(&engine, inv), Decision::Deny);
    }

    #[test]
    fn read_only_write_denied_read_allowed() {
        let engine = unix();
        let v = engine.evaluate(&Invocation::bash("echo nameserver 1.1.1.1 > /etc/resolv.conf"));
        assert_eq!(v.outcome, Decision::Deny);
        assert!(matches!(
            &v.matched_rule,
            Some(RuleRef::Path { class: PathClass::ReadOnly, operation: Some(op), .. }) if op == "write"
        ));
        assert_eq!(outcome(&engine, Invocation::bash("cat /etc/resolv.conf")), Decision::Allow);
    }

    #[test]
    fn chained_read_then_unrelated_write_allowed() {
        let engine = unix();
        let inv = Invocation::bash("cat /etc/hosts && echo done > /tmp/log");
        assert_eq!(outcome(&engine, inv), Decision::Allow);
    }

    #[test]
    fn no_delete_blocks_only_deletion() {
        let engine = unix();
        let v = engine.evaluate(&Invocation::bash("rm CLAUDE.md"));
        assert_eq!(v.outcome, Decision::Deny);
        assert!(matches!(
            v.matched_rule,
            Some(RuleRef::Path { class: PathClass::NoDelete, .. })
        ));
        assert_eq!(outcome(&engine, Invocation::bash("echo note >> CLAUDE.md")), Decision::Allow);
        assert_eq!(
            outcome(&engine, Invocation::edit("CLAUDE.md").with_working_dir("/work")),
            Decision::Allow
        );
    }

    #[test]
    fn relative_target_needs_working_dir() {
        let engine = unix();
        let v = engine.evaluate(&Invocation::write("../../etc/hosts"));
        assert_eq!(v.outcome, Decision::Deny);
        assert!(v.reason.contains("without a working directory"), "reason: {}", v.reason);
        assert_eq!(outcome(&engine, Invocation::edit("notes.txt")), Decision::Deny);
        assert_eq!(
            outcome(&engine, Invocation::edit("notes.txt").with_working_dir("/work")),
            Decision::Allow
        );
        // A class rule still reports its own reason.
        let v = engine.evaluate(&Invocation::edit(".env"));
        assert!(matches!(
            v.matched_rule,
            Some(RuleRef::Path { class: PathClass::ZeroAccess, .. })
        ));
    }

    #[test]
    fn edit_and_write_respect_path_classes() {
        let engine = unix();
        assert_eq!(outcome(&engine, Invocation::write("~/.ssh/id_rsa")), Decision::Deny);
        assert_eq!(outcome(&engine, Invocation::edit("/etc/hosts")), Decision::Deny);
        assert_eq!(
            outcome(&engine, Invocation::edit(".env").with_working_dir("/work")),
            Decision::Deny
        );
        assert_eq!(
            outcome(&engine, Invocation::write("src/main.rs").with_working_dir("/work")),
            Decision::Allow
        );
    }

    #[test]
    fn pattern_rule_reaches_chained_statement() {
        let engine = unix();
        let v = engine.evaluate(&Invocation::bash("cd /repo && git reset --hard HEAD~1"));
        assert_eq!(v.outcome, Decision::Deny);
        assert!(matches!(v.matched_rule, Some(RuleRef::Pattern { .. })));
    }

    #[test]
    fn relative_recursive_delete_uses_pattern_table() {
        let engine = unix();
        let v = engine.evaluate(&Invocation::bash("rm -rf ./build").with_working_dir("/work"));
        assert_eq!(v.outcome, Decision::Deny);
        assert!(v.reason.contains("recursive"));
    }

    #[test]
    fn windows_paths() {
        let engine = windows();
        assert_eq!(
            outcome(&engine, Invocation::bash("type %USERPROFILE%\\.ssh\\id_rsa")),
            Decision::Deny
        );
        assert_eq!(
            outcome(&engine, Invocation::write("c:/windows/system32/drivers/etc/hosts")),
            Decision::Deny
        );
        assert_eq!(outcome(&engine, Invocation::bash("Get-ChildItem C:\\Work")), Decision::Allow);
    }

    #[test]
    fn trace_records_transitions() {
        let engine = unix();
        let e = engine.trace(&Invocation::bash("ls"));
        assert_eq!(e.transitions, vec![State::Pending, State::Evaluating, State::Allowed]);
        let e = engine.trace(&Invocation::bash("git push --force"));
        assert_eq!(e.state(), State::NeedsConfirmation);
        assert_eq!(e.verdict.outcome, Decision::Ask);
    }

    #[test]
    fn decide_approved() {
        let engine = unix();
        let (confirmer, port) = confirm::channel();
        let handle = std::thread::spawn(move || {
            let request = port.next_request(Duration::from_secs(5)).unwrap();
            assert!(request.summary.contains("git push"));
            port.answer(true);
            port
        });
        let e = engine.decide(&Invocation::bash("git push --force origin main"), &confirmer);
        handle.join().unwrap();
        assert_eq!(e.verdict.outcome, Decision::Allow);
        assert_eq!(
            e.transitions,
            vec![State::Pending, State::Evaluating, State::NeedsConfirmation, State::Allowed]
        );
    }

    #[test]
    fn decide_timeout_denies() {
        let engine = unix().with_timeout(Duration::from_millis(20));
        let (confirmer, _port) = confirm::channel();
        let e = engine.decide(&Invocation::bash("git push --force"), &confirmer);
        assert_eq!(e.verdict.outcome, Decision::Deny);
        assert!(e.verdict.reason.contains("timed out"));
        assert_eq!(e.state(), State::Denied);
    }

    #[test]
    fn decide_does_not_prompt_for_deny() {
        let engine = unix();
        let (confirmer, port) = confirm::channel();
        let e = engine.decide(&Invocation::bash("git reset --hard"), &confirmer);
        assert_eq!(e.verdict.outcome, Decision::Deny);
        assert!(port.next_request(Duration::from_millis(10)).is_none());
    }
}
