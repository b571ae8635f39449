use serde::{Deserialize, Serialize};

pub const NATIVE_MARKERS: &[&str] = &["TAURI_ENV_PLATFORM", "BEADS_PANEL_NATIVE"];
pub const RUNTIME_OVERRIDE_VAR: &str = "BEADS_PANEL_RUNTIME";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeKind {
    Native,
    Web,
}

impl RuntimeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Web => "web",
        }
    }
}

pub trait RuntimeMarkers {
    fn has_marker(&self, name: &str) -> bool;

    fn value(&self, _name: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvMarkers;

impl RuntimeMarkers for ProcessEnvMarkers {
    fn has_marker(&self, name: &str) -> bool {
        std::env::var_os(name).is_some_and(|value| !value.is_empty())
    }

    fn value(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Evaluated on every call. `None` means there is no host context at all.
pub fn is_native_runtime(markers: Option<&dyn RuntimeMarkers>) -> bool {
    let Some(markers) = markers else {
        return false;
    };
    match markers.value(RUNTIME_OVERRIDE_VAR).as_deref() {
        Some("native") => return true,
        Some("web") => return false,
        _ => {}
    }
    NATIVE_MARKERS.iter().any(|marker| markers.has_marker(marker))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub runtime: RuntimeKind,
    pub web_base_url: String,
}

impl ExecutionContext {
    pub fn native() -> Self {
        Self {
            runtime: RuntimeKind::Native,
            web_base_url: String::new(),
        }
    }

    pub fn web(base_url: impl Into<String>) -> Self {
        Self {
            runtime: RuntimeKind::Web,
            web_base_url: base_url.into(),
        }
    }

    pub fn detect(markers: Option<&dyn RuntimeMarkers>, web_base_url: &str) -> Self {
        if is_native_runtime(markers) {
            Self::native()
        } else {
            Self::web(web_base_url)
        }
    }

    pub fn is_native(&self) -> bool {
        self.runtime == RuntimeKind::Native
    }
}
