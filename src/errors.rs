use crate::adapters::compatibility::{classify_backend_message, BackendErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("CLI_INVALID: {0}")]
    Cli(String),
    #[error("UNAVAILABLE: {0}")]
    Unavailable(String),
    #[error("{message}")]
    Backend { kind: BackendErrorKind, message: String },
    #[error("CONFLICT: {0}")]
    Conflict(String),
    #[error("HTTP_FAILURE: {0}")]
    Http(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    pub fn backend(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Backend {
            kind: classify_backend_message(&message),
            message,
        }
    }

    pub fn desktop_only(feature: &str) -> Self {
        Self::Unavailable(format!("{} is only available in the desktop app", feature))
    }

    pub fn backend_kind(&self) -> BackendErrorKind {
        match self {
            Self::Backend { kind, .. } => *kind,
            Self::Conflict(message) | Self::Http(message) | Self::Cli(message) => {
                classify_backend_message(message)
            }
            _ => BackendErrorKind::Other,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
