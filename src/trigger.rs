//! Recurring trigger: cron installation and the in-process watch loop.

use crate::config::ConfigError;
use crate::service::CorrespondenceService;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Cron schedule expression for a tick every `every_minutes`.
///
/// # Errors
///
/// Returns [`ConfigError`] for intervals cron cannot express evenly: zero,
/// or above an hour without being a whole number of hours within a day.
pub fn schedule(every_minutes: u32) -> Result<String, ConfigError> {
    match every_minutes {
        0 => Err(ConfigError::new("Trigger interval must be positive")),
        1 => Ok("* * * * *".to_string()),
        2..=59 => Ok(format!("*/{} * * * *", every_minutes)),
        60 => Ok("0 * * * *".to_string()),
        m if m % 60 == 0 && m < 24 * 60 => Ok(format!("0 */{} * * *", m / 60)),
        m => Err(ConfigError::new(format!(
            "Cannot schedule a tick every {} minutes; use 1-59 or whole hours",
            m
        ))),
    }
}

/// Full crontab line running `tick`.
pub fn cron_line(every_minutes: u32, executable: &Path, config: &Path) -> Result<String, ConfigError> {
    Ok(format!(
        "{} {} --config {} tick",
        schedule(every_minutes)?,
        executable.display(),
        config.display()
    ))
}

/// Appends `line` to `crontab` unless the same tick command is already there.
///
/// Returns false when an entry existed.
#[instrument(skip(line), fields(crontab = %crontab.display()))]
pub fn install(crontab: &Path, line: &str) -> Result<bool, ConfigError> {
    let existing = match std::fs::read_to_string(crontab) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(ConfigError::new(format!("Failed to read crontab: {}", e))),
    };
    let command = line.split_whitespace().skip(5).collect::<Vec<_>>().join(" ");
    if existing
        .lines()
        .any(|l| l.split_whitespace().skip(5).collect::<Vec<_>>().join(" ") == command)
    {
        info!("Trigger already installed");
        return Ok(false);
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(crontab)
        .map_err(|e| ConfigError::new(format!("Failed to open crontab: {}", e)))?;
    let separator = if existing.is_empty() || existing.ends_with('\n') { "" } else { "\n" };
    writeln!(file, "{}{}", separator, line)
        .map_err(|e| ConfigError::new(format!("Failed to write crontab: {}", e)))?;
    info!("Trigger installed");
    Ok(true)
}

/// Ticks forever at `interval`. Failures are logged and left for the next tick.
#[instrument(skip(service))]
pub async fn watch(service: &CorrespondenceService, interval: Duration) {
    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        timer.tick().await;
        match service.tick().await {
            Ok(outcome) => info!(?outcome, "Tick complete"),
            Err(e) if e.needs_operator() => error!(operator_attention = true, error = %e, "Tick failed"),
            Err(e) => warn!(error = %e, "Tick failed; retrying next interval"),
        }
    }
}
