//! Offline inspection of a saved channel log.

use std::path::Path;

use anyhow::{Context, Result};
use coordination::channel::LogMessage;
use coordination::config::DebateSettings;
use coordination::debate::{DebateState, HistoryReconstructor};

/// Read a JSON array of messages.
pub fn load_log(path: &Path) -> Result<Vec<LogMessage>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read log file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid log file {}", path.display()))
}

pub fn save_log(path: &Path, log: &[LogMessage]) -> Result<()> {
    let json = serde_json::to_string_pretty(log).context("Failed to serialize log")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write log file {}", path.display()))
}

/// Reconstruct the debate a bot would see at the end of `log`.
pub fn reconstruct(log: &[LogMessage], settings: &DebateSettings) -> Result<DebateState> {
    let registry = settings.registry()?;
    let tail = &log[log.len().saturating_sub(settings.history_window)..];
    HistoryReconstructor::new(&registry)
        .reconstruct(tail)
        .context("Failed to reconstruct debate")
}
