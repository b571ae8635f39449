use crate::adapters::compatibility::{version_at_least, DOLT_MIN_VERSION};
use crate::errors::AppResult;
use crate::host::attachments::attachments_dir;
use crate::host::fs::{beads_dir, uses_dolt};
use crate::models::{LockCleanupResult, MigrationCheck};
use serde_json::Value;
use std::path::Path;
use walkdir::WalkDir;

const SQLITE_DB: &str = "beads.db";

pub fn check_needs_migration(project: &Path, bd_version: Option<&str>) -> MigrationCheck {
    let beads = beads_dir(project);
    if !beads.is_dir() {
        return MigrationCheck {
            needs_migration: false,
            reason: Some("No .beads directory in this project".to_string()),
        };
    }
    if uses_dolt(project) {
        return MigrationCheck {
            needs_migration: false,
            reason: None,
        };
    }
    if !beads.join(SQLITE_DB).is_file() {
        return MigrationCheck {
            needs_migration: false,
            reason: Some("No SQLite database found".to_string()),
        };
    }

    match bd_version {
        Some(version) if version_at_least(version, DOLT_MIN_VERSION) => MigrationCheck {
            needs_migration: true,
            reason: Some(format!(
                "bd {} stores data in Dolt, but this project still uses the SQLite database",
                version
            )),
        },
        Some(version) => MigrationCheck {
            needs_migration: false,
            reason: Some(format!("bd {} predates the Dolt storage engine", version)),
        },
        None => MigrationCheck {
            needs_migration: false,
            reason: Some("bd version could not be determined".to_string()),
        },
    }
}

/// Removes `*.lock` files directly under `.beads` and `LOCK` files anywhere
/// under `.beads/dolt`.
pub fn cleanup_stale_locks(project: &Path) -> AppResult<LockCleanupResult> {
    let beads = beads_dir(project);
    let mut removed = Vec::new();
    if !beads.is_dir() {
        return Ok(LockCleanupResult { removed });
    }

    for entry in std::fs::read_dir(&beads)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|extension| extension == "lock") {
            std::fs::remove_file(&path)?;
            removed.push(path.to_string_lossy().to_string());
        }
    }

    let dolt = beads.join("dolt");
    if dolt.is_dir() {
        for entry in WalkDir::new(&dolt).into_iter().filter_map(Result::ok) {
            if entry.file_type().is_file() && entry.file_name() == "LOCK" {
                std::fs::remove_file(entry.path())?;
                removed.push(entry.path().to_string_lossy().to_string());
            }
        }
    }

    if !removed.is_empty() {
        tracing::info!(count = removed.len(), project = %project.display(), "removed stale lock files");
    }
    Ok(LockCleanupResult { removed })
}

/// Issues whose description embeds an absolute path into this project's
/// attachments directory, paired with the rewritten description.
pub fn find_absolute_refs(project: &Path, raw_issues: &Value) -> Vec<(String, String)> {
    let absolute = attachments_dir(project).to_string_lossy().to_string();
    let prefix = format!("{}/", absolute.trim_end_matches('/'));
    raw_issues
        .as_array()
        .or_else(|| raw_issues.get("issues").and_then(Value::as_array))
        .map(|issues| {
            issues
                .iter()
                .filter_map(|issue| {
                    let id = issue.get("id")?.as_str()?;
                    let description = issue.get("description")?.as_str()?;
                    if !description.contains(&prefix) {
                        return None;
                    }
                    Some((id.to_string(), description.replace(&prefix, "attachments/")))
                })
                .collect()
        })
        .unwrap_or_default()
}
