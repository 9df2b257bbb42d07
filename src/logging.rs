use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};

use crate::eval::{Invocation, Verdict};

/// Environment variable holding the log level.
pub const LEVEL_VAR: &str = "DAMAGE_CONTROL_LOG";

/// Directory holding the log file: ~/.local/share/damage-control.
pub fn log_dir() -> Option<PathBuf> {
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?;
    Some(PathBuf::from(home).join(".local/share/damage-control"))
}

fn level_from(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the file logger. Best-effort: failures are silently ignored
/// (logging must never block the hook).
pub fn init() {
    let Some(dir) = log_dir() else {
        return;
    };
    let _ = std::fs::create_dir_all(&dir);
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("damage-control.log"))
    else {
        return;
    };
    let level = level_from(std::env::var(LEVEL_VAR).ok().as_deref());
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    let _ = WriteLogger::init(level, config, file);
}

/// Log one verdict as a single line.
pub fn log_verdict(invocation: &Invocation, verdict: &Verdict) {
    let reason_oneline = verdict.reason.replace('\n', "; ");
    log::info!(
        "{decision}\t{subject}\t{reason}",
        decision = verdict.outcome.label(),
        subject = invocation.summary(),
        reason = reason_oneline,
    );
}
