pub mod compatibility;
pub mod http;
pub mod native;

use crate::errors::AppResult;
use crate::models::{ExternalMethod, ListOptions, LogLevel, LoggingSettings};
use crate::runtime::RuntimeKind;
use async_trait::async_trait;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    List(ListOptions),
    Count,
    Ready,
    Status,
    Show { id: String },
    Create { fields: Map<String, Value> },
    Update { id: String, fields: Map<String, Value> },
    Close { id: String, reason: Option<String> },
    Delete { id: String },
    AddComment { id: String, content: String },
    Search { query: String },
    AddLabel { id: String, label: String },
    RemoveLabel { id: String, label: String },
    AddDependency { issue_id: String, depends_on_id: String },
    RemoveDependency { issue_id: String, depends_on_id: String },
    AddRelation { issue_id: String, related_id: String, relation_type: String },
    RemoveRelation { issue_id: String, related_id: String, relation_type: String },
    AvailableRelationTypes,
    Sync,
    PollData,
    CheckChanged,
    ResetMtime,
    PurgeOrphanAttachments,
    CleanupEmptyAttachmentFolder { issue_id: String },
    DeleteAttachmentFile { path: String },
    FsList { path: Option<String> },
    FsExists { path: String },
    StartWatching,
    StopWatching,
    WatcherStatus,
    RepairDatabase,
    CheckNeedsMigration,
    MigrateToDolt,
    CheckRefsMigration,
    MigrateAttachmentRefs,
    CleanupStaleLocks,
    GetCliPath,
    SetCliPath { path: String },
    GetLoggingSettings,
    SetLoggingSettings(LoggingSettings),
    LogFrontend { level: LogLevel, message: String },
    ExportLogs,
    GetAppVersion,
    GetBdVersion,
    CheckBdCompatibility,
    LaunchProbe,
    External { method: ExternalMethod, url: String, body: Option<Value> },
}

impl Operation {
    /// Feature name used in capability errors.
    pub fn feature(&self) -> &'static str {
        match self {
            Self::AddLabel { .. } | Self::RemoveLabel { .. } => "Label management",
            Self::AddDependency { .. } | Self::RemoveDependency { .. } => "Dependency management",
            Self::AddRelation { .. } | Self::RemoveRelation { .. } | Self::AvailableRelationTypes => {
                "Relation management"
            }
            Self::GetCliPath | Self::SetCliPath { .. } => "CLI binary configuration",
            Self::ExportLogs => "Log export",
            Self::GetLoggingSettings | Self::SetLoggingSettings(_) => "Logging settings",
            Self::DeleteAttachmentFile { .. } => "Attachment deletion",
            Self::RepairDatabase => "Database repair",
            Self::CheckNeedsMigration | Self::MigrateToDolt => "Storage engine migration",
            Self::CheckRefsMigration | Self::MigrateAttachmentRefs => "Attachment reference migration",
            Self::CleanupStaleLocks => "Stale lock cleanup",
            Self::FsExists { .. } => "Filesystem checks",
            Self::GetBdVersion | Self::CheckBdCompatibility => "CLI version detection",
            _ => "This operation",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub operation: Operation,
    pub cwd: Option<String>,
}

impl BackendRequest {
    pub fn new(operation: Operation, cwd: Option<&str>) -> Self {
        Self {
            operation,
            cwd: cwd.map(ToString::to_string),
        }
    }
}

#[async_trait]
pub trait BackendAdapter: Send + Sync {
    fn runtime(&self) -> RuntimeKind;

    async fn execute(&self, request: BackendRequest) -> AppResult<Value>;
}
