//! damage-control: PreToolUse hook for Claude Code.
//!
//! With no subcommand, reads hook JSON from stdin and writes a permission
//! decision to stdout. See `damage-control --help` for the rest.

mod cli;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use cli::{CheckArgs, Cli, Command};
use damage_control::config::Config;
use damage_control::confirm::TerminalConfirmer;
use damage_control::eval::{Decision, Invocation};
use damage_control::normalize::Environment;
use damage_control::settings::{self, EffectiveSettings, PermissionKind, SettingsScope, Strategy};
use damage_control::{hook, logging};

/// Entry in `hooks.PreToolUse` that marks this hook as registered.
const HOOK_COMMAND: &str = "damage-control";

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();
    let env = Environment::from_process();
    let home = env.home().map(PathBuf::from);
    let config = Config::load(home.as_deref());

    let result = match cli.command {
        None | Some(Command::Hook) => {
            run_hook(&config, env);
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Check(args)) => run_check(args, &config, env),
        Some(Command::MergeSettings {
            existing,
            template,
            overwrite,
            in_place,
        }) => run_merge(&existing, template.as_deref(), overwrite, in_place),
        Some(Command::Settings { project }) => run_settings(project, home.as_deref()),
        Some(Command::RecordPermission {
            kind,
            pattern,
            scope,
            project,
        }) => run_record(kind, &pattern, scope, project, home.as_deref()),
        Some(Command::DumpConfig) => toml::to_string_pretty(&config)
            .map(|text| {
                print!("{text}");
                ExitCode::SUCCESS
            })
            .map_err(|e| e.to_string()),
    };

    result.unwrap_or_else(|e| {
        eprintln!("damage-control: {e}");
        ExitCode::from(2)
    })
}

/// Hook mode. Always exits 0; failures are reported as deny decisions.
fn run_hook(config: &Config, env: Environment) {
    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
        log::error!("failed to read stdin: {e}");
        input.clear();
    }

    let engine = config.engine(env, None);
    if let Some(output) = hook::handle(&input, &engine) {
        println!("{output}");
    }
}

/// Evaluate one invocation from the command line and print the verdict.
/// Exit status: 0 allow, 1 ask, 2 deny.
fn run_check(args: CheckArgs, config: &Config, env: Environment) -> Result<ExitCode, String> {
    let target = args.target;
    let invocation = match (target.bash, target.edit, target.write) {
        (Some(command), _, _) => Invocation::bash(command),
        (_, Some(path), _) => Invocation::edit(path),
        (_, _, Some(path)) => Invocation::write(path),
        (None, None, None) => return Err("check needs --bash, --edit or --write".into()),
    };
    let invocation = match args.cwd {
        Some(dir) => invocation.with_working_dir(dir),
        None => invocation,
    };

    let engine = config.engine(env, args.platform);
    let evaluation = if args.confirm {
        engine.decide(&invocation, &TerminalConfirmer)
    } else {
        engine.trace(&invocation)
    };
    let report = serde_json::to_string_pretty(&evaluation.verdict.report()).map_err(|e| e.to_string())?;
    println!("{report}");

    Ok(match evaluation.verdict.outcome {
        Decision::Allow => ExitCode::SUCCESS,
        Decision::Ask => ExitCode::from(1),
        Decision::Deny => ExitCode::from(2),
    })
}

/// Merge the settings template into an existing settings file.
fn run_merge(
    existing_path: &Path,
    template_path: Option<&Path>,
    overwrite: bool,
    in_place: bool,
) -> Result<ExitCode, String> {
    let strategy = if overwrite {
        Strategy::Overwrite
    } else {
        Strategy::Merge
    };
    let existing = settings::read_document(existing_path)
        .map_err(|e| e.to_string())?
        .unwrap_or_else(|| serde_json::json!({}));
    let template = match template_path {
        Some(path) => settings::read_document(path)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("{}: not found", path.display()))?,
        None => settings::template(),
    };

    let outcome = settings::merge(&existing, &template, strategy).map_err(|e| e.to_string())?;
    for conflict in &outcome.conflicts {
        eprintln!(
            "conflict at {}: keeping {} (template has {})",
            conflict.key, conflict.existing, conflict.template
        );
    }
    if in_place {
        settings::write_document(existing_path, &outcome.merged).map_err(|e| e.to_string())?;
    } else {
        let text = serde_json::to_string_pretty(&outcome.merged).map_err(|e| e.to_string())?;
        println!("{text}");
    }
    Ok(ExitCode::SUCCESS)
}

fn project_dir(project: Option<PathBuf>) -> Result<PathBuf, String> {
    match project {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().map_err(|e| format!("no working directory: {e}")),
    }
}

/// Print the effective settings of a project, warning when the hook is
/// not registered in any layer.
fn run_settings(project: Option<PathBuf>, home: Option<&Path>) -> Result<ExitCode, String> {
    let project = project_dir(project)?;
    let effective = EffectiveSettings::load(home, &project).map_err(|e| e.to_string())?;
    let text = serde_json::to_string_pretty(&effective).map_err(|e| e.to_string())?;
    println!("{text}");
    let registered = effective
        .hooks("PreToolUse")
        .iter()
        .any(|entry| entry.to_string().contains(HOOK_COMMAND));
    if !registered {
        eprintln!("{HOOK_COMMAND} is not registered as a PreToolUse hook; see merge-settings");
    }
    Ok(ExitCode::SUCCESS)
}

/// Persist a permission entry into one settings layer.
fn run_record(
    kind: PermissionKind,
    pattern: &str,
    scope: SettingsScope,
    project: Option<PathBuf>,
    home: Option<&Path>,
) -> Result<ExitCode, String> {
    let project = project_dir(project)?;
    let path = scope
        .path(home, &project)
        .ok_or("no home directory for global settings")?;
    let added = settings::record_permission(&path, kind, pattern).map_err(|e| e.to_string())?;
    if added {
        eprintln!("added {} {pattern:?} to {}", kind.as_str(), path.display());
    } else {
        eprintln!("{pattern:?} already present in {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}
