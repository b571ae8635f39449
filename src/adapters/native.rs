use crate::adapters::{BackendAdapter, BackendRequest, Operation};
use crate::errors::AppResult;
use crate::runtime::RuntimeKind;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// The in-process command bridge: a command name plus a structured
/// argument object in, decoded JSON or the backend's error out.
#[async_trait]
pub trait NativeHost: Send + Sync {
    async fn invoke(&self, command: &str, args: Value) -> AppResult<Value>;
}

#[derive(Clone)]
pub struct NativeAdapter {
    host: Arc<dyn NativeHost>,
}

impl NativeAdapter {
    pub fn new(host: Arc<dyn NativeHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl BackendAdapter for NativeAdapter {
    fn runtime(&self) -> RuntimeKind {
        RuntimeKind::Native
    }

    async fn execute(&self, request: BackendRequest) -> AppResult<Value> {
        let (command, args) = command_for(request);
        tracing::debug!(command, "invoking native command");
        self.host.invoke(command, args).await
    }
}

pub fn command_for(request: BackendRequest) -> (&'static str, Value) {
    let BackendRequest { operation, cwd } = request;
    let (command, mut args) = match operation {
        Operation::List(options) => ("bd_list", json!({ "options": options })),
        Operation::Count => ("bd_count", json!({})),
        Operation::Ready => ("bd_ready", json!({})),
        Operation::Status => ("bd_status", json!({})),
        Operation::Show { id } => ("bd_show", json!({ "id": id })),
        Operation::Create { fields } => ("bd_create", json!({ "payload": Value::Object(fields) })),
        Operation::Update { id, fields } => ("bd_update", json!({ "id": id, "updates": Value::Object(fields) })),
        Operation::Close { id, reason } => ("bd_close", json!({ "id": id, "reason": reason })),
        Operation::Delete { id } => ("bd_delete", json!({ "id": id })),
        Operation::AddComment { id, content } => ("bd_comments_add", json!({ "id": id, "content": content })),
        Operation::Search { query } => ("bd_search", json!({ "query": query })),
        Operation::AddLabel { id, label } => ("bd_label_add", json!({ "id": id, "label": label })),
        Operation::RemoveLabel { id, label } => ("bd_label_remove", json!({ "id": id, "label": label })),
        Operation::AddDependency { issue_id, depends_on_id } => (
            "bd_dep_add",
            json!({ "issueId": issue_id, "dependsOnId": depends_on_id }),
        ),
        Operation::RemoveDependency { issue_id, depends_on_id } => (
            "bd_dep_remove",
            json!({ "issueId": issue_id, "dependsOnId": depends_on_id }),
        ),
        Operation::AddRelation { issue_id, related_id, relation_type } => (
            "bd_dep_add_relation",
            json!({ "issueId": issue_id, "relatedId": related_id, "relationType": relation_type }),
        ),
        Operation::RemoveRelation { issue_id, related_id, relation_type } => (
            "bd_dep_remove_relation",
            json!({ "issueId": issue_id, "relatedId": related_id, "relationType": relation_type }),
        ),
        Operation::AvailableRelationTypes => ("bd_available_relation_types", json!({})),
        Operation::Sync => ("bd_sync", json!({})),
        Operation::PollData => ("bd_poll_data", json!({})),
        Operation::CheckChanged => ("bd_check_changed", json!({})),
        Operation::ResetMtime => ("bd_reset_mtime", json!({})),
        Operation::PurgeOrphanAttachments => ("purge_orphan_attachments", json!({})),
        Operation::CleanupEmptyAttachmentFolder { issue_id } => {
            ("cleanup_empty_attachment_folder", json!({ "issueId": issue_id }))
        }
        Operation::DeleteAttachmentFile { path } => ("delete_attachment_file", json!({ "path": path })),
        Operation::FsList { path } => ("fs_list", json!({ "path": path })),
        Operation::FsExists { path } => ("fs_exists", json!({ "path": path })),
        Operation::StartWatching => ("start_watching", json!({})),
        Operation::StopWatching => ("stop_watching", json!({})),
        Operation::WatcherStatus => ("get_watcher_status", json!({})),
        Operation::RepairDatabase => ("bd_repair_database", json!({})),
        Operation::CheckNeedsMigration => ("bd_check_needs_migration", json!({})),
        Operation::MigrateToDolt => ("bd_migrate_to_dolt", json!({})),
        Operation::CheckRefsMigration => ("check_refs_migration", json!({})),
        Operation::MigrateAttachmentRefs => ("migrate_attachment_refs", json!({})),
        Operation::CleanupStaleLocks => ("bd_cleanup_stale_locks", json!({})),
        Operation::GetCliPath => ("get_cli_binary_path", json!({})),
        Operation::SetCliPath { path } => ("set_cli_binary_path", json!({ "path": path })),
        Operation::GetLoggingSettings => ("get_logging_settings", json!({})),
        Operation::SetLoggingSettings(settings) => ("set_logging_settings", json!({ "settings": settings })),
        Operation::LogFrontend { level, message } => {
            ("log_frontend", json!({ "level": level, "message": message }))
        }
        Operation::ExportLogs => ("export_logs", json!({})),
        Operation::GetAppVersion => ("get_app_version", json!({})),
        Operation::GetBdVersion => ("get_bd_version", json!({})),
        Operation::CheckBdCompatibility => ("check_bd_compatibility", json!({})),
        Operation::LaunchProbe => ("launch_probe", json!({})),
        Operation::External { method, url, body } => {
            let command = match method {
                crate::models::ExternalMethod::Get => "fetch_external_data",
                crate::models::ExternalMethod::Post => "post_external_data",
                crate::models::ExternalMethod::Patch => "patch_external_data",
                crate::models::ExternalMethod::Delete => "delete_external_data",
            };
            (command, json!({ "url": url, "body": body }))
        }
    };

    if let (Some(cwd), Some(object)) = (cwd, args.as_object_mut()) {
        object.insert("cwd".to_string(), Value::from(cwd));
    }
    (command, args)
}

/// Reads `cwd` back out of an argument object built by [`command_for`].
pub fn cwd_arg(args: &Value) -> Option<String> {
    args.get("cwd").and_then(Value::as_str).map(ToString::to_string)
}

pub fn object_arg(args: &Value, key: &str) -> Map<String, Value> {
    args.get(key).and_then(Value::as_object).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::command_for;
    use crate::adapters::{BackendRequest, Operation};
    use crate::models::{IssueStatus, ListOptions};

    #[test]
    fn list_forwards_full_options_and_cwd() {
        let options = ListOptions {
            status: Some(vec![IssueStatus::Open, IssueStatus::Blocked]),
            include_all: true,
            ..ListOptions::default()
        };
        let (command, args) = command_for(BackendRequest::new(Operation::List(options), Some("/work/app")));
        assert_eq!(command, "bd_list");
        assert_eq!(args["cwd"], "/work/app");
        assert_eq!(args["options"]["status"], serde_json::json!(["open", "blocked"]));
        assert_eq!(args["options"]["includeAll"], true);
    }

    #[test]
    fn omitted_cwd_is_not_sent() {
        let (command, args) = command_for(BackendRequest::new(Operation::Sync, None));
        assert_eq!(command, "bd_sync");
        assert!(args.get("cwd").is_none());
    }

    #[test]
    fn relation_commands_use_camel_case_arguments() {
        let (command, args) = command_for(BackendRequest::new(
            Operation::AddRelation {
                issue_id: "bd-1".to_string(),
                related_id: "bd-2".to_string(),
                relation_type: "relates-to".to_string(),
            },
            None,
        ));
        assert_eq!(command, "bd_dep_add_relation");
        assert_eq!(args["relatedId"], "bd-2");
        assert_eq!(args["relationType"], "relates-to");
    }
}
