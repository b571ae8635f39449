use crate::adapters::http::HttpAdapter;
use crate::adapters::native::{NativeAdapter, NativeHost};
use crate::adapters::{BackendAdapter, BackendRequest, Operation};
use crate::errors::{AppError, AppResult};
use crate::models::{
    AttachmentPurgeResult, BdCompatibility, ChangeCheck, CommandOutcome, Comment, CountResult, CreateIssuePayload,
    ExportResponse, ExternalMethod, FileDeleteResult, FolderCleanupResult, FsListResult, Issue, LaunchProbe,
    ListOptions, LockCleanupResult, LogLevel, LoggingSettings, MigrationCheck, PollData, RefsMigrationCheck,
    RefsMigrationResult, StatusSummary, UpdateIssuePayload, WatcherStatus,
};
use crate::normalization::{
    denormalize_for_create, denormalize_for_update, normalize_comment, normalize_issues, normalize_single_issue,
};
use crate::runtime::{ExecutionContext, RuntimeKind};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// One async method per backend operation. The adapter is picked once from
/// the [`ExecutionContext`]; results are normalized the same way for both.
#[derive(Clone)]
pub struct BeadsClient {
    adapter: Arc<dyn BackendAdapter>,
}

impl BeadsClient {
    pub fn new(adapter: Arc<dyn BackendAdapter>) -> Self {
        Self { adapter }
    }

    pub fn from_context(context: &ExecutionContext, host: Arc<dyn NativeHost>) -> Self {
        let adapter: Arc<dyn BackendAdapter> = match context.runtime {
            RuntimeKind::Native => Arc::new(NativeAdapter::new(host)),
            RuntimeKind::Web => Arc::new(HttpAdapter::new(context.web_base_url.clone())),
        };
        tracing::info!(runtime = context.runtime.as_str(), "backend client ready");
        Self::new(adapter)
    }

    pub fn runtime(&self) -> RuntimeKind {
        self.adapter.runtime()
    }

    pub fn is_native(&self) -> bool {
        self.runtime() == RuntimeKind::Native
    }

    async fn call(&self, operation: Operation, cwd: Option<&str>) -> AppResult<Value> {
        self.adapter.execute(BackendRequest::new(operation, cwd)).await
    }

    async fn call_as<T: DeserializeOwned>(&self, operation: Operation, cwd: Option<&str>) -> AppResult<T> {
        let raw = self.call(operation, cwd).await?;
        Ok(serde_json::from_value(raw)?)
    }

    async fn call_unit(&self, operation: Operation, cwd: Option<&str>) -> AppResult<()> {
        self.call(operation, cwd).await.map(|_| ())
    }

    /// Mutations echo the affected record; when the echo is not an issue the
    /// record is re-read.
    async fn issue_or_show(&self, raw: Value, id: &str, cwd: Option<&str>) -> AppResult<Issue> {
        match normalize_single_issue(&raw).filter(|issue| !issue.id.is_empty()) {
            Some(issue) => Ok(issue),
            None => self.show(id, cwd).await,
        }
    }

    pub async fn list(&self, options: ListOptions, cwd: Option<&str>) -> AppResult<Vec<Issue>> {
        let raw = self.call(Operation::List(options), cwd).await?;
        Ok(normalize_issues(&raw))
    }

    pub async fn count(&self, cwd: Option<&str>) -> AppResult<CountResult> {
        let raw = self.call(Operation::Count, cwd).await?;
        if let Some(count) = raw.as_u64() {
            return Ok(CountResult { count });
        }
        Ok(serde_json::from_value(raw)?)
    }

    pub async fn ready(&self, cwd: Option<&str>) -> AppResult<Vec<Issue>> {
        let raw = self.call(Operation::Ready, cwd).await?;
        Ok(normalize_issues(&raw))
    }

    pub async fn status(&self, cwd: Option<&str>) -> AppResult<StatusSummary> {
        let raw = self.call(Operation::Status, cwd).await?;
        let summary = raw.get("summary").cloned().unwrap_or(raw);
        Ok(serde_json::from_value(summary)?)
    }

    pub async fn show(&self, id: &str, cwd: Option<&str>) -> AppResult<Issue> {
        let raw = self.call(Operation::Show { id: id.to_string() }, cwd).await?;
        normalize_single_issue(&raw)
            .filter(|issue| !issue.id.is_empty())
            .ok_or_else(|| AppError::NotFound(format!("Issue {} not found", id)))
    }

    pub async fn create(&self, payload: &CreateIssuePayload, cwd: Option<&str>) -> AppResult<Issue> {
        if payload.title.trim().is_empty() {
            return Err(AppError::Cli("Issue title cannot be empty".to_string()));
        }
        let raw = self
            .call(Operation::Create { fields: denormalize_for_create(payload) }, cwd)
            .await?;
        normalize_single_issue(&raw)
            .filter(|issue| !issue.id.is_empty())
            .ok_or_else(|| AppError::Internal("Backend did not return the created issue".to_string()))
    }

    pub async fn update(&self, id: &str, update: &UpdateIssuePayload, cwd: Option<&str>) -> AppResult<Issue> {
        let fields = denormalize_for_update(update);
        let raw = self
            .call(Operation::Update { id: id.to_string(), fields }, cwd)
            .await?;
        self.issue_or_show(raw, id, cwd).await
    }

    pub async fn close(&self, id: &str, reason: Option<&str>, cwd: Option<&str>) -> AppResult<Issue> {
        let operation = Operation::Close {
            id: id.to_string(),
            reason: reason.map(ToString::to_string),
        };
        let raw = self.call(operation, cwd).await?;
        self.issue_or_show(raw, id, cwd).await
    }

    pub async fn delete(&self, id: &str, cwd: Option<&str>) -> AppResult<()> {
        self.call_unit(Operation::Delete { id: id.to_string() }, cwd).await
    }

    pub async fn add_comment(&self, id: &str, content: &str, cwd: Option<&str>) -> AppResult<Comment> {
        let operation = Operation::AddComment {
            id: id.to_string(),
            content: content.to_string(),
        };
        let raw = self.call(operation, cwd).await?;
        let record = raw.as_array().and_then(|items| items.last()).unwrap_or(&raw);
        Ok(normalize_comment(record))
    }

    pub async fn search(&self, query: &str, cwd: Option<&str>) -> AppResult<Vec<Issue>> {
        let raw = self.call(Operation::Search { query: query.to_string() }, cwd).await?;
        Ok(normalize_issues(&raw))
    }

    pub async fn add_label(&self, id: &str, label: &str, cwd: Option<&str>) -> AppResult<()> {
        let operation = Operation::AddLabel {
            id: id.to_string(),
            label: label.to_string(),
        };
        self.call_unit(operation, cwd).await
    }

    pub async fn remove_label(&self, id: &str, label: &str, cwd: Option<&str>) -> AppResult<()> {
        let operation = Operation::RemoveLabel {
            id: id.to_string(),
            label: label.to_string(),
        };
        self.call_unit(operation, cwd).await
    }

    pub async fn add_dependency(&self, issue_id: &str, depends_on_id: &str, cwd: Option<&str>) -> AppResult<()> {
        let operation = Operation::AddDependency {
            issue_id: issue_id.to_string(),
            depends_on_id: depends_on_id.to_string(),
        };
        self.call_unit(operation, cwd).await
    }

    pub async fn remove_dependency(&self, issue_id: &str, depends_on_id: &str, cwd: Option<&str>) -> AppResult<()> {
        let operation = Operation::RemoveDependency {
            issue_id: issue_id.to_string(),
            depends_on_id: depends_on_id.to_string(),
        };
        self.call_unit(operation, cwd).await
    }

    pub async fn add_relation(
        &self,
        issue_id: &str,
        related_id: &str,
        relation_type: &str,
        cwd: Option<&str>,
    ) -> AppResult<()> {
        let operation = Operation::AddRelation {
            issue_id: issue_id.to_string(),
            related_id: related_id.to_string(),
            relation_type: relation_type.to_string(),
        };
        self.call_unit(operation, cwd).await
    }

    pub async fn remove_relation(
        &self,
        issue_id: &str,
        related_id: &str,
        relation_type: &str,
        cwd: Option<&str>,
    ) -> AppResult<()> {
        let operation = Operation::RemoveRelation {
            issue_id: issue_id.to_string(),
            related_id: related_id.to_string(),
            relation_type: relation_type.to_string(),
        };
        self.call_unit(operation, cwd).await
    }

    pub async fn available_relation_types(&self) -> AppResult<Vec<String>> {
        self.call_as(Operation::AvailableRelationTypes, None).await
    }

    pub async fn sync(&self, cwd: Option<&str>) -> AppResult<()> {
        self.call_unit(Operation::Sync, cwd).await
    }

    /// All three lists or an error; a response missing any list is rejected.
    pub async fn poll_data(&self, cwd: Option<&str>) -> AppResult<PollData> {
        let raw = self.call(Operation::PollData, cwd).await?;
        Ok(PollData {
            open: poll_list(&raw, "open")?,
            closed: poll_list(&raw, "closed")?,
            ready: poll_list(&raw, "ready")?,
        })
    }

    pub async fn check_changed(&self, cwd: Option<&str>) -> AppResult<bool> {
        let check: ChangeCheck = self.call_as(Operation::CheckChanged, cwd).await?;
        Ok(check.changed)
    }

    pub async fn reset_mtime(&self, cwd: Option<&str>) -> AppResult<()> {
        self.call_unit(Operation::ResetMtime, cwd).await
    }

    pub async fn purge_orphan_attachments(&self, cwd: Option<&str>) -> AppResult<AttachmentPurgeResult> {
        self.call_as(Operation::PurgeOrphanAttachments, cwd).await
    }

    pub async fn cleanup_empty_attachment_folder(
        &self,
        issue_id: &str,
        cwd: Option<&str>,
    ) -> AppResult<FolderCleanupResult> {
        let operation = Operation::CleanupEmptyAttachmentFolder {
            issue_id: issue_id.to_string(),
        };
        self.call_as(operation, cwd).await
    }

    pub async fn delete_attachment_file(&self, path: &str, cwd: Option<&str>) -> AppResult<FileDeleteResult> {
        self.call_as(Operation::DeleteAttachmentFile { path: path.to_string() }, cwd)
            .await
    }

    pub async fn fs_list(&self, path: Option<&str>) -> AppResult<FsListResult> {
        let operation = Operation::FsList {
            path: path.map(ToString::to_string),
        };
        self.call_as(operation, None).await
    }

    pub async fn fs_exists(&self, path: &str) -> AppResult<bool> {
        self.call_as(Operation::FsExists { path: path.to_string() }, None).await
    }

    pub async fn start_watching(&self, cwd: Option<&str>) -> AppResult<()> {
        self.call_unit(Operation::StartWatching, cwd).await
    }

    pub async fn stop_watching(&self) -> AppResult<()> {
        self.call_unit(Operation::StopWatching, None).await
    }

    pub async fn watcher_status(&self) -> AppResult<WatcherStatus> {
        self.call_as(Operation::WatcherStatus, None).await
    }

    pub async fn repair_database(&self, cwd: Option<&str>) -> AppResult<CommandOutcome> {
        self.call_as(Operation::RepairDatabase, cwd).await
    }

    pub async fn check_needs_migration(&self, cwd: Option<&str>) -> AppResult<MigrationCheck> {
        self.call_as(Operation::CheckNeedsMigration, cwd).await
    }

    pub async fn migrate_to_dolt(&self, cwd: Option<&str>) -> AppResult<CommandOutcome> {
        self.call_as(Operation::MigrateToDolt, cwd).await
    }

    pub async fn check_refs_migration(&self, cwd: Option<&str>) -> AppResult<RefsMigrationCheck> {
        self.call_as(Operation::CheckRefsMigration, cwd).await
    }

    pub async fn migrate_attachment_refs(&self, cwd: Option<&str>) -> AppResult<RefsMigrationResult> {
        self.call_as(Operation::MigrateAttachmentRefs, cwd).await
    }

    pub async fn cleanup_stale_locks(&self, cwd: Option<&str>) -> AppResult<LockCleanupResult> {
        self.call_as(Operation::CleanupStaleLocks, cwd).await
    }

    pub async fn cli_path(&self) -> AppResult<String> {
        self.call_as(Operation::GetCliPath, None).await
    }

    pub async fn set_cli_path(&self, path: &str) -> AppResult<String> {
        self.call_as(Operation::SetCliPath { path: path.to_string() }, None).await
    }

    pub async fn logging_settings(&self) -> AppResult<LoggingSettings> {
        self.call_as(Operation::GetLoggingSettings, None).await
    }

    pub async fn set_logging_settings(&self, settings: LoggingSettings) -> AppResult<LoggingSettings> {
        self.call_as(Operation::SetLoggingSettings(settings), None).await
    }

    /// Best effort: a failed forward is logged locally and never surfaces.
    pub async fn log_frontend(&self, level: LogLevel, message: &str) {
        let operation = Operation::LogFrontend {
            level,
            message: message.to_string(),
        };
        if let Err(error) = self.call(operation, None).await {
            tracing::warn!(error = %error, "failed to forward frontend log entry");
        }
    }

    pub async fn export_logs(&self) -> AppResult<ExportResponse> {
        self.call_as(Operation::ExportLogs, None).await
    }

    pub async fn app_version(&self) -> AppResult<String> {
        self.call_as(Operation::GetAppVersion, None).await
    }

    pub async fn bd_version(&self) -> AppResult<String> {
        self.call_as(Operation::GetBdVersion, None).await
    }

    pub async fn bd_compatibility(&self) -> AppResult<BdCompatibility> {
        self.call_as(Operation::CheckBdCompatibility, None).await
    }

    pub async fn launch_probe(&self) -> AppResult<LaunchProbe> {
        self.call_as(Operation::LaunchProbe, None).await
    }

    pub async fn external(&self, method: ExternalMethod, url: &str, body: Option<Value>) -> AppResult<Value> {
        let operation = Operation::External {
            method,
            url: url.to_string(),
            body,
        };
        self.call(operation, None).await
    }
}

fn poll_list(raw: &Value, key: &str) -> AppResult<Vec<Issue>> {
    let list = raw
        .get(key)
        .filter(|value| value.is_array() || value.get("issues").is_some_and(Value::is_array))
        .ok_or_else(|| AppError::Internal(format!("Poll data is missing the '{}' list", key)))?;
    Ok(normalize_issues(list))
}
