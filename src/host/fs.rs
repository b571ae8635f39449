use crate::errors::{AppError, AppResult};
use crate::models::{DirectoryEntry, FsListResult};
use std::path::{Path, PathBuf};

pub fn beads_dir(project: &Path) -> PathBuf {
    project.join(".beads")
}

pub fn uses_dolt(project: &Path) -> bool {
    beads_dir(project).join("dolt").is_dir()
}

pub fn list_directory(path: Option<&str>) -> AppResult<FsListResult> {
    let target = match path.filter(|path| !path.trim().is_empty()) {
        Some(path) => PathBuf::from(path),
        None => dirs::home_dir()
            .ok_or_else(|| AppError::NotFound("Home directory could not be resolved".to_string()))?,
    };
    if !target.is_dir() {
        return Err(AppError::NotFound(format!("Directory not found: {}", target.display())));
    }

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(&target)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let entry_path = entry.path();
        let is_directory = entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false);
        entries.push(DirectoryEntry {
            has_beads: is_directory && beads_dir(&entry_path).is_dir(),
            uses_dolt: is_directory && uses_dolt(&entry_path),
            name,
            path: entry_path.to_string_lossy().to_string(),
            is_directory,
        });
    }
    entries.sort_by(|left, right| {
        right
            .is_directory
            .cmp(&left.is_directory)
            .then_with(|| left.name.to_lowercase().cmp(&right.name.to_lowercase()))
    });

    Ok(FsListResult {
        current_path: target.to_string_lossy().to_string(),
        parent_path: target.parent().map(|parent| parent.to_string_lossy().to_string()),
        entries,
    })
}

pub fn path_exists(path: &str) -> bool {
    !path.trim().is_empty() && Path::new(path).exists()
}
