use crate::errors::{AppError, AppResult};
use crate::host::fs::beads_dir;
use crate::models::{AttachmentPurgeResult, FileDeleteResult, FolderCleanupResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub fn attachments_dir(project: &Path) -> PathBuf {
    beads_dir(project).join("attachments")
}

/// Removes attachment folders whose issue id is not in `known_ids`.
pub fn purge_orphans(project: &Path, known_ids: &HashSet<String>) -> AppResult<AttachmentPurgeResult> {
    let root = attachments_dir(project);
    if !root.is_dir() {
        return Ok(AttachmentPurgeResult::default());
    }

    let mut folders = Vec::new();
    for entry in std::fs::read_dir(&root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if known_ids.contains(&name) {
            continue;
        }
        std::fs::remove_dir_all(entry.path())?;
        tracing::info!(issue_id = %name, "removed orphaned attachment folder");
        folders.push(name);
    }
    folders.sort();

    Ok(AttachmentPurgeResult {
        removed: folders.len(),
        folders,
    })
}

pub fn cleanup_empty_folder(project: &Path, issue_id: &str) -> AppResult<FolderCleanupResult> {
    validate_segment(issue_id)?;
    let folder = attachments_dir(project).join(issue_id);
    if !folder.is_dir() {
        return Ok(FolderCleanupResult { removed: false });
    }
    if std::fs::read_dir(&folder)?.next().is_some() {
        return Ok(FolderCleanupResult { removed: false });
    }
    std::fs::remove_dir(&folder)?;
    Ok(FolderCleanupResult { removed: true })
}

/// Deletes one attachment file; the path must resolve inside the project's
/// attachments directory.
pub fn delete_file(project: &Path, path: &str) -> AppResult<FileDeleteResult> {
    let root = attachments_dir(project);
    let candidate = if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        root.join(path)
    };
    if !candidate.exists() {
        return Ok(FileDeleteResult { deleted: false });
    }

    let canonical_root = root.canonicalize()?;
    let canonical = candidate.canonicalize()?;
    if !canonical.starts_with(&canonical_root) || !canonical.is_file() {
        return Err(AppError::Cli(format!(
            "Refusing to delete '{}': not an attachment file",
            path
        )));
    }
    std::fs::remove_file(&canonical)?;
    Ok(FileDeleteResult { deleted: true })
}

fn validate_segment(value: &str) -> AppResult<()> {
    if value.is_empty() || value.contains('/') || value.contains('\\') || value == "." || value == ".." {
        return Err(AppError::Cli(format!("Invalid issue id '{}'", value)));
    }
    Ok(())
}
