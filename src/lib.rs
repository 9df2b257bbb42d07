//! damage-control: a PreToolUse hook for Claude Code that blocks destructive
//! tool calls.
//!
//! Every Bash, Edit and Write call is reduced to an [`eval::Invocation`] and
//! evaluated against layered pattern files, producing one of three decisions:
//! [`eval::Decision::Allow`], [`eval::Decision::Ask`], or
//! [`eval::Decision::Deny`]. Anything that cannot be evaluated is denied.
//!
//! # Architecture
//!
//! - **[`patterns`]**: pattern files (base + platform + extras), merged into a
//!   cached, hot-reloadable policy.
//! - **[`normalize`]**: path normalization: variables, `~`, dot segments,
//!   separators and case.
//! - **[`matcher`]**: regex rule matching and path template matching.
//! - **[`parse`]**: tree-sitter statement splitting and shlex tokenizing.
//! - **[`eval`]**: the decision engine and its state machine.
//! - **[`confirm`]**: resolving ask verdicts within a timeout.
//! - **[`settings`]**: layered host settings and template merging.
//! - **[`hook`]**: the stdin/stdout hook protocol.
//! - **[`config`]**: embedded defaults + user overlay.
//! - **[`logging`]**: decision log at `~/.local/share/damage-control/`.

/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Confirmation of ask verdicts.
pub mod confirm;
pub mod error;
/// Decision engine: invocations, verdicts, evaluation states.
pub mod eval;
pub mod hook;
/// File-based decision logging.
pub mod logging;
pub mod matcher;
pub mod normalize;
/// Shell command parsing: tree-sitter statements, shlex tokenizer.
pub mod parse;
pub mod patterns;
pub mod platform;
pub mod settings;

use eval::{Engine, Invocation, Verdict};
use normalize::Environment;
use platform::Platform;

/// Evaluate one invocation against the built-in patterns for the current
/// platform and process environment.
///
/// This is the main entry point for tests and simple usage. The hook binary
/// builds its engine from [`config::Config`] instead.
pub fn evaluate(invocation: &Invocation) -> Verdict {
    Engine::embedded(Platform::current(), Environment::from_process()).evaluate(invocation)
}
