use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

const PROBED_PATHS: &[&str] = &[
    ".beads/beads.db",
    ".beads/beads.db-wal",
    ".beads/issues.jsonl",
    ".beads/dolt",
    ".beads",
];

/// Per-directory modification-time baselines. A directory without a
/// baseline always reports a change.
#[derive(Debug, Default)]
pub struct MtimeTracker {
    baselines: Mutex<HashMap<PathBuf, Option<SystemTime>>>,
}

impl MtimeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_changed(&self, dir: &Path) -> bool {
        let key = baseline_key(dir);
        let current = probe(dir);
        let mut baselines = self.baselines.lock().unwrap_or_else(PoisonError::into_inner);
        let changed = baselines.get(&key).map_or(true, |previous| *previous != current);
        baselines.insert(key, current);
        changed
    }

    pub fn reset(&self, dir: &Path) {
        let mut baselines = self.baselines.lock().unwrap_or_else(PoisonError::into_inner);
        baselines.remove(&baseline_key(dir));
    }
}

pub fn probe(dir: &Path) -> Option<SystemTime> {
    PROBED_PATHS
        .iter()
        .filter_map(|relative| {
            std::fs::metadata(dir.join(relative))
                .and_then(|metadata| metadata.modified())
                .ok()
        })
        .max()
}

fn baseline_key(dir: &Path) -> PathBuf {
    dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf())
}
