//! PreToolUse hook protocol.
//!
//! Input is the host's tool-call JSON on stdin; output is a single
//! `hookSpecificOutput` object on stdout. Tools that are not gated produce
//! no output at all.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::eval::{Engine, Invocation, ToolKind, Verdict};

#[derive(Debug, Default, Deserialize)]
pub struct HookInput {
    pub tool_name: Option<String>,
    pub tool_input: Option<ToolInput>,
    pub cwd: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolInput {
    pub command: Option<String>,
    pub file_path: Option<String>,
}

/// What the hook was asked to do.
#[derive(Debug, PartialEq, Eq)]
pub enum HookRequest {
    /// A tool this hook does not gate.
    Skip,
    Gate(Invocation),
    /// Input that could not be understood. Always denied.
    Malformed(String),
}

impl HookInput {
    pub fn into_request(self) -> HookRequest {
        let Some(tool_name) = self.tool_name else {
            return HookRequest::Malformed("missing tool_name".into());
        };
        let Some(kind) = ToolKind::from_tool_name(&tool_name) else {
            return HookRequest::Skip;
        };
        let tool_input = self.tool_input.unwrap_or_default();
        let invocation = Invocation {
            tool_kind: kind,
            raw_command: match kind {
                ToolKind::Bash => tool_input.command,
                ToolKind::Edit | ToolKind::Write => None,
            },
            target_path: match kind {
                ToolKind::Bash => None,
                ToolKind::Edit | ToolKind::Write => tool_input.file_path,
            },
            working_dir: self.cwd.filter(|c| !c.is_empty()),
        };
        HookRequest::Gate(invocation)
    }
}

pub fn parse_request(input: &str) -> HookRequest {
    match serde_json::from_str::<HookInput>(input) {
        Ok(hook_input) => hook_input.into_request(),
        Err(e) => HookRequest::Malformed(format!("unreadable hook input: {e}")),
    }
}

/// The hook response for a verdict.
pub fn response(verdict: &Verdict) -> Value {
    json!({
        "hookSpecificOutput": {
            "hookEventName": "PreToolUse",
            "permissionDecision": verdict.outcome.as_str(),
            "permissionDecisionReason": verdict.reason,
        }
    })
}

/// Handle one hook call. `None` means the tool is not gated.
///
/// Input without a `cwd` runs in the hook process's own working directory,
/// which the host starts in the session directory.
pub fn handle(input: &str, engine: &Engine) -> Option<Value> {
    match parse_request(input) {
        HookRequest::Skip => None,
        HookRequest::Gate(mut invocation) => {
            if invocation.working_dir.is_none() {
                invocation.working_dir = process_dir();
            }
            Some(response(&engine.evaluate(&invocation)))
        }
        HookRequest::Malformed(reason) => {
            log::warn!("{reason}");
            Some(response(&Verdict::deny(format!("malformed invocation: {reason}"))))
        }
    }
}

fn process_dir() -> Option<String> {
    match std::env::current_dir() {
        Ok(dir) => Some(dir.to_string_lossy().into_owned()),
        Err(e) => {
            log::warn!("no working directory: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Environment;
    use crate::platform::Platform;

    fn engine() -> Engine {
        Engine::embedded(Platform::Unix, Environment::new().with_home("/home/tester"))
    }

    fn decision(output: &Value) -> &str {
        output["hookSpecificOutput"]["permissionDecision"].as_str().unwrap()
    }

    #[test]
    fn bash_input_mapped() {
        let req = parse_request(r#"{"tool_name":"Bash","tool_input":{"command":"ls"},"cwd":"/w"}"#);
        assert_eq!(req, HookRequest::Gate(Invocation::bash("ls").with_working_dir("/w")));
    }

    #[test]
    fn multi_edit_maps_to_edit() {
        let req = parse_request(r#"{"tool_name":"MultiEdit","tool_input":{"file_path":"/etc/hosts"}}"#);
        assert_eq!(req, HookRequest::Gate(Invocation::edit("/etc/hosts")));
    }

    #[test]
    fn other_tools_skipped() {
        assert!(handle(r#"{"tool_name":"Read","tool_input":{"file_path":"/x"}}"#, &engine()).is_none());
    }

    #[test]
    fn malformed_json_denied() {
        let out = handle("{not json", &engine()).unwrap();
        assert_eq!(decision(&out), "deny");
        assert_eq!(out["hookSpecificOutput"]["hookEventName"], "PreToolUse");
    }

    #[test]
    fn missing_command_denied() {
        let out = handle(r#"{"tool_name":"Bash","tool_input":{}}"#, &engine()).unwrap();
        assert_eq!(decision(&out), "deny");
        let reason = out["hookSpecificOutput"]["permissionDecisionReason"].as_str().unwrap();
        assert!(reason.contains("malformed invocation"));
    }

    #[test]
    fn write_to_ssh_denied() {
        let out = handle(
            r#"{"tool_name":"Write","tool_input":{"file_path":"~/.ssh/id_rsa","content":"x"}}"#,
            &engine(),
        )
        .unwrap();
        assert_eq!(decision(&out), "deny");
    }

    #[test]
    fn ask_passes_through_to_host() {
        let out = handle(
            r#"{"tool_name":"Bash","tool_input":{"command":"git push --force origin main"}}"#,
            &engine(),
        )
        .unwrap();
        assert_eq!(decision(&out), "ask");
    }

    #[test]
    fn relative_write_without_cwd_resolved() {
        let out = handle(
            r#"{"tool_name":"Write","tool_input":{"file_path":"../../../../../../../../../../etc/hosts"}}"#,
            &engine(),
        )
        .unwrap();
        assert_eq!(decision(&out), "deny");
    }
}
