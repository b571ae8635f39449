use crate::errors::{AppError, AppResult};
use crate::models::BdCompatibility;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::{timeout, Duration};

/// Earliest `bd` release that stores project data in Dolt.
pub const DOLT_MIN_VERSION: &str = "0.50.0";

static SCHEMA_MIGRATION_PATTERNS: &[&str] = &[
    "no such column",
    "no such table",
    "schema version",
    "database schema is out of date",
    "run 'bd migrate'",
    "run `bd migrate`",
    "migration required",
];

static STORAGE_ENGINE_PATTERNS: &[&str] = &[
    "migrate to dolt",
    "migrate dolt",
    "dolt backend required",
    "sqlite backend is no longer supported",
    "sqlite storage is deprecated",
    "storage engine migration",
];

static CLI_MISSING_PATTERNS: &[&str] = &[
    "not installed",
    "command not found",
    "no such file or directory",
    "is not recognized as an internal or external command",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    SchemaMigration,
    StorageEngineMigration,
    CliMissing,
    Other,
}

/// The only place backend error text is pattern-matched. Storage engine
/// patterns are checked first because their messages also mention `migrate`.
pub fn classify_backend_message(message: &str) -> BackendErrorKind {
    let lower = message.to_ascii_lowercase();
    if STORAGE_ENGINE_PATTERNS.iter().any(|pattern| lower.contains(pattern)) {
        return BackendErrorKind::StorageEngineMigration;
    }
    if SCHEMA_MIGRATION_PATTERNS.iter().any(|pattern| lower.contains(pattern)) {
        return BackendErrorKind::SchemaMigration;
    }
    if CLI_MISSING_PATTERNS.iter().any(|pattern| lower.contains(pattern)) {
        return BackendErrorKind::CliMissing;
    }
    BackendErrorKind::Other
}

#[derive(Debug, Clone)]
pub struct MatrixEntry {
    pub min_version: &'static str,
    pub max_version: &'static str,
}

fn bd_matrix() -> Vec<MatrixEntry> {
    vec![MatrixEntry {
        min_version: "0.40.0",
        max_version: "1.99.99",
    }]
}

#[derive(Debug, Default, Clone)]
pub struct CompatibilityRegistry;

impl CompatibilityRegistry {
    pub fn new() -> Self {
        Self
    }

    pub async fn check(&self, binary_path: &str) -> BdCompatibility {
        let version = match detect_bd_version(binary_path).await {
            Ok(version) => version,
            Err(error) => {
                return BdCompatibility {
                    compatible: false,
                    version: None,
                    reason: Some(format!("Unable to detect bd version: {}", error)),
                }
            }
        };
        self.evaluate(&version)
    }

    pub fn evaluate(&self, version: &str) -> BdCompatibility {
        let supported = bd_matrix()
            .into_iter()
            .any(|entry| version_between(version, entry.min_version, entry.max_version));
        BdCompatibility {
            compatible: supported,
            version: Some(version.to_string()),
            reason: if supported {
                None
            } else {
                Some(format!(
                    "bd {} is outside the tested range; some features may not work",
                    version
                ))
            },
        }
    }
}

pub async fn detect_bd_version(binary_path: &str) -> AppResult<String> {
    let mut command = Command::new(binary_path);
    command.arg("--version");

    let output = timeout(Duration::from_secs(3), command.output())
        .await
        .map_err(|_| AppError::Cli("Version command timed out".to_string()))?
        .map_err(|err| AppError::backend(format!("{}: {}", binary_path, err)))?;

    if !output.status.success() {
        return Err(AppError::Cli(format!(
            "Version command failed with status {:?}",
            output.status.code()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        return Err(AppError::Cli("Version output was empty".to_string()));
    }

    extract_semver(&stdout)
        .ok_or_else(|| AppError::Cli(format!("Unrecognized version output: {}", stdout)))
}

pub fn extract_semver(raw: &str) -> Option<String> {
    let mut current = String::new();
    for ch in raw.chars() {
        if ch.is_ascii_digit() || (ch == '.' && !current.is_empty()) {
            current.push(ch);
        } else if !current.is_empty() {
            break;
        }
    }
    let trimmed = current.trim_end_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn version_at_least(version: &str, minimum: &str) -> bool {
    parse_version(version) >= parse_version(minimum)
}

fn version_between(version: &str, min_version: &str, max_version: &str) -> bool {
    let parsed = parse_version(version);
    let min = parse_version(min_version);
    let max = parse_version(max_version);
    parsed >= min && parsed <= max
}

fn parse_version(version: &str) -> (u64, u64, u64) {
    let mut parts = version.split('.').filter_map(|segment| segment.parse::<u64>().ok());
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}
