//! Command-line interface definitions.
//!
//! With no subcommand the binary runs as the hook: JSON in on stdin, a
//! permission decision out on stdout.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use damage_control::platform::Platform;
use damage_control::settings::{PermissionKind, SettingsScope};

/// Gate Bash, Edit and Write tool calls against destructive-command rules
#[derive(Parser, Debug)]
#[command(name = "damage-control")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read a PreToolUse event from stdin and print the decision (default)
    Hook,

    /// Evaluate one invocation and print the verdict.
    /// Exits 0 on allow, 1 on ask, 2 on deny
    Check(CheckArgs),

    /// Merge a settings template into an existing settings file
    MergeSettings {
        /// Settings file to merge into; a missing file counts as empty
        existing: PathBuf,

        /// Template to merge from [default: the embedded template]
        template: Option<PathBuf>,

        /// Replace the existing document instead of merging
        #[arg(long)]
        overwrite: bool,

        /// Write the result back to EXISTING instead of stdout
        #[arg(long)]
        in_place: bool,
    },

    /// Print the effective settings of a project
    Settings {
        /// Project directory [default: current directory]
        #[arg(long, value_name = "DIR")]
        project: Option<PathBuf>,
    },

    /// Persist a deny or ask permission entry into one settings layer
    RecordPermission {
        /// deny or ask
        #[arg(value_parser = parse_kind)]
        kind: PermissionKind,

        pattern: String,

        /// global, project or local
        #[arg(long, default_value = "local", value_parser = parse_scope)]
        scope: SettingsScope,

        /// Project directory [default: current directory]
        #[arg(long, value_name = "DIR")]
        project: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    DumpConfig,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub target: Target,

    /// Working directory the call runs in
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<String>,

    /// Evaluate with another platform's rules (unix or windows)
    #[arg(long, value_parser = parse_platform)]
    pub platform: Option<Platform>,

    /// Resolve an ask verdict on the terminal
    #[arg(long)]
    pub confirm: bool,
}

/// The tool call to evaluate. Exactly one is required.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct Target {
    /// Shell command to evaluate as a Bash call
    #[arg(long, value_name = "CMD")]
    pub bash: Option<String>,

    /// Target path of an Edit call
    #[arg(long, value_name = "PATH")]
    pub edit: Option<String>,

    /// Target path of a Write call
    #[arg(long, value_name = "PATH")]
    pub write: Option<String>,
}

fn parse_platform(name: &str) -> Result<Platform, String> {
    Platform::parse(name).ok_or_else(|| format!("unknown platform: {name}"))
}

fn parse_scope(name: &str) -> Result<SettingsScope, String> {
    SettingsScope::parse(name).ok_or_else(|| format!("unknown scope: {name}"))
}

fn parse_kind(name: &str) -> Result<PermissionKind, String> {
    PermissionKind::parse(name).ok_or_else(|| format!("unknown permission kind: {name}"))
}
