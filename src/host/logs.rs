use crate::errors::{AppError, AppResult};
use crate::models::{ExportResponse, LogLevel};
use crate::redaction::Redactor;
use chrono::Utc;
use std::path::Path;

pub const LOG_FILE_PREFIX: &str = "panel.log";

/// Concatenates the rolling log files, redacts credentials, and writes one
/// export file.
pub fn export_logs(log_dir: &Path, export_dir: &Path) -> AppResult<ExportResponse> {
    if !log_dir.is_dir() {
        return Err(AppError::NotFound(format!("Log directory not found: {}", log_dir.display())));
    }

    let mut files = std::fs::read_dir(log_dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX))
        })
        .collect::<Vec<_>>();
    files.sort();

    let redactor = Redactor::new();
    let mut combined = String::new();
    let mut redactions = 0usize;
    for file in &files {
        let raw = std::fs::read_to_string(file)?;
        let redacted = redactor.redact(&raw);
        redactions += redacted.redaction_count;
        combined.push_str(&redacted.content);
        if !combined.ends_with('\n') && !combined.is_empty() {
            combined.push('\n');
        }
    }

    std::fs::create_dir_all(export_dir)?;
    let target = export_dir.join(format!(
        "beads-control-panel-logs-{}.log",
        Utc::now().format("%Y%m%d-%H%M%S")
    ));
    std::fs::write(&target, combined)?;
    tracing::info!(files = files.len(), redactions, path = %target.display(), "exported logs");

    Ok(ExportResponse {
        path: target.to_string_lossy().to_string(),
    })
}

pub fn log_frontend(level: LogLevel, message: &str) {
    match level {
        LogLevel::Error => tracing::error!(target: "frontend", "{}", message),
        LogLevel::Warn => tracing::warn!(target: "frontend", "{}", message),
        LogLevel::Info => tracing::info!(target: "frontend", "{}", message),
        LogLevel::Debug => tracing::debug!(target: "frontend", "{}", message),
    }
}
