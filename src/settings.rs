use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

pub const SETTINGS_FILE: &str = "settings.json";
pub const DATA_DIR_VAR: &str = "BEADS_PANEL_DATA_DIR";
pub const PROJECT_DIR_VAR: &str = "BEADS_PANEL_PROJECT";
const EXPECTED_BINARY: &str = "bd";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub bd_path: String,
    pub logging_enabled: bool,
    pub verbose_logging: bool,
    pub web_base_url: String,
    pub dashboard_url: Option<String>,
    pub poll_interval_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            bd_path: EXPECTED_BINARY.to_string(),
            logging_enabled: true,
            verbose_logging: false,
            web_base_url: "http://127.0.0.1:3333".to_string(),
            dashboard_url: None,
            poll_interval_ms: 2_000,
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_VAR).filter(|value| !value.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("beads-control-panel")
}

#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn load(data_dir: &Path) -> AppResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(SETTINGS_FILE);
        let current = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<AppSettings>(&raw).unwrap_or_else(|error| {
                tracing::warn!(path = %path.display(), error = %error, "settings file unreadable; using defaults");
                AppSettings::default()
            }),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => AppSettings::default(),
            Err(error) => return Err(error.into()),
        };
        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    pub fn in_memory(settings: AppSettings) -> Self {
        Self {
            path: PathBuf::new(),
            current: RwLock::new(settings),
        }
    }

    pub fn current(&self) -> AppSettings {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, apply: impl FnOnce(&mut AppSettings)) -> AppResult<AppSettings> {
        let updated = {
            let mut writer = self.current.write().unwrap_or_else(PoisonError::into_inner);
            apply(&mut writer);
            writer.clone()
        };
        if !self.path.as_os_str().is_empty() {
            let raw = serde_json::to_string_pretty(&updated)?;
            std::fs::write(&self.path, raw)?;
        }
        Ok(updated)
    }
}

/// Accepts the `bd` alias or an absolute path to an executable named `bd`.
pub fn validate_cli_path(binary_path: &str) -> AppResult<String> {
    let trimmed = binary_path.trim();
    let candidate = Path::new(trimmed);
    if candidate.components().count() == 1 {
        if trimmed != EXPECTED_BINARY {
            return Err(AppError::Cli(format!(
                "Binary alias '{}' is not allowed. Use '{}' or an absolute path.",
                trimmed, EXPECTED_BINARY
            )));
        }
        return Ok(EXPECTED_BINARY.to_string());
    }

    if !candidate.is_absolute() {
        return Err(AppError::Cli(format!(
            "Binary path '{}' must be either '{}' alias or an absolute path",
            trimmed, EXPECTED_BINARY
        )));
    }

    let canonical = candidate
        .canonicalize()
        .map_err(|error| AppError::Cli(format!("Invalid binary path '{}': {}", trimmed, error)))?;
    if !canonical.is_file() {
        return Err(AppError::Cli(format!("Binary path '{}' is not a file", trimmed)));
    }

    let basename = canonical
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if basename != EXPECTED_BINARY {
        return Err(AppError::Cli(format!(
            "Binary path '{}' basename '{}' does not match expected '{}'",
            trimmed, basename, EXPECTED_BINARY
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(&canonical)
            .map_err(|error| AppError::Cli(format!("Cannot read binary metadata: {}", error)))?;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(AppError::Cli(format!("Binary path '{}' is not executable", trimmed)));
        }
    }

    Ok(canonical.to_string_lossy().to_string())
}
