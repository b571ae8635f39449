pub mod attachments;
pub mod bd;
pub mod fs;
pub mod logs;
pub mod mtime;
pub mod storage;
pub mod watcher;

use crate::adapters::compatibility::{detect_bd_version, CompatibilityRegistry};
use crate::adapters::http::{external_method, send_json};
use crate::adapters::native::{cwd_arg, object_arg, NativeHost};
use crate::errors::{AppError, AppResult};
use crate::host::bd::{BdArgs, BdRunner};
use crate::host::mtime::MtimeTracker;
use crate::host::watcher::WatcherRegistry;
use crate::models::{
    CommandOutcome, ExternalMethod, IssueStatus, ListOptions, LoggingSettings, LogLevel, RefsMigrationCheck,
    RefsMigrationResult,
};
use crate::normalization::{normalize_priority, normalize_status, normalize_type};
use crate::settings::{validate_cli_path, SettingsStore};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const RELATION_TYPES: &[&str] = &["related", "discovered-from", "duplicates", "supersedes"];

/// Backend field name to `bd` flag. `title` is positional on create.
const FIELD_FLAGS: &[(&str, &str)] = &[
    ("title", "--title"),
    ("description", "--description"),
    ("issue_type", "--type"),
    ("status", "--status"),
    ("priority", "--priority"),
    ("assignee", "--assignee"),
    ("external_ref", "--external-ref"),
    ("estimate", "--estimate"),
    ("design", "--design"),
    ("acceptance_criteria", "--acceptance"),
    ("notes", "--notes"),
];

/// Native command surface served by spawning the `bd` CLI.
pub struct CliHost {
    settings: Arc<SettingsStore>,
    mtime: MtimeTracker,
    watcher: WatcherRegistry,
    compatibility: CompatibilityRegistry,
    http: reqwest::Client,
    log_dir: PathBuf,
    export_dir: PathBuf,
    default_project: PathBuf,
}

impl CliHost {
    pub fn new(settings: Arc<SettingsStore>, data_dir: &Path, default_project: PathBuf) -> Self {
        Self {
            settings,
            mtime: MtimeTracker::new(),
            watcher: WatcherRegistry::default(),
            compatibility: CompatibilityRegistry::new(),
            http: reqwest::Client::new(),
            log_dir: data_dir.join("logs"),
            export_dir: data_dir.join("exports"),
            default_project,
        }
    }

    fn runner(&self) -> BdRunner {
        let settings = self.settings.current();
        BdRunner::new(settings.bd_path, settings.verbose_logging)
    }

    fn project(&self, args: &Value) -> PathBuf {
        cwd_arg(args)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.default_project.clone())
    }

    async fn list(&self, runner: &BdRunner, project: &Path, options: &ListOptions) -> AppResult<Value> {
        let wants_closed = options
            .status
            .as_ref()
            .is_some_and(|statuses| statuses.contains(&IssueStatus::Closed));
        let args = BdArgs::new(&["list"])
            .switch("--all", options.include_all || wants_closed)
            .json()
            .build();
        let raw = runner.run_json(project, &args).await?;
        Ok(filter_issues(raw, options))
    }

    async fn list_all(&self, runner: &BdRunner, project: &Path) -> AppResult<Value> {
        runner
            .run_json(project, &BdArgs::new(&["list", "--all"]).json().build())
            .await
    }

    async fn poll_data(&self, runner: &BdRunner, project: &Path) -> AppResult<Value> {
        runner.run(project, &BdArgs::new(&["sync"]).build()).await?;
        let open = or_empty(runner.run_json(project, &BdArgs::new(&["list"]).json().build()).await?);
        let closed = self
            .list(
                runner,
                project,
                &ListOptions {
                    status: Some(vec![IssueStatus::Closed]),
                    include_all: true,
                    ..ListOptions::default()
                },
            )
            .await
            .map(or_empty)?;
        let ready = or_empty(runner.run_json(project, &BdArgs::new(&["ready"]).json().build()).await?);
        Ok(json!({ "open": open, "closed": closed, "ready": ready }))
    }

    async fn external(&self, method: ExternalMethod, args: &Value) -> AppResult<Value> {
        let raw_url = string_arg(args, "url")?;
        let url = Url::parse(&raw_url)
            .map_err(|error| AppError::Http(format!("Invalid URL '{}': {}", raw_url, error)))?;
        let body = args.get("body").filter(|body| !body.is_null()).cloned();
        send_json(&self.http, external_method(method), url, Vec::new(), body).await
    }

    async fn dispatch(&self, command: &str, args: &Value) -> AppResult<Value> {
        let project = self.project(args);
        let runner = self.runner();

        match command {
            "bd_list" => {
                let options: ListOptions = field_or_default(args, "options")?;
                self.list(&runner, &project, &options).await
            }
            "bd_count" => runner.run_json(&project, &BdArgs::new(&["count"]).json().build()).await,
            "bd_ready" => runner.run_json(&project, &BdArgs::new(&["ready"]).json().build()).await,
            "bd_status" => runner.run_json(&project, &BdArgs::new(&["status"]).json().build()).await,
            "bd_show" => {
                let args = BdArgs::new(&["show"]).arg(string_arg(args, "id")?).json().build();
                runner.run_json(&project, &args).await
            }
            "bd_create" => {
                let payload = object_arg(args, "payload");
                let title = payload
                    .get("title")
                    .and_then(Value::as_str)
                    .filter(|title| !title.trim().is_empty())
                    .ok_or_else(|| AppError::Cli("Issue title cannot be empty".to_string()))?;
                let mut bd_args = field_flags(BdArgs::new(&["create"]).arg(title), &payload, &["title"]);
                bd_args = bd_args
                    .flag("--labels", payload.get("labels").and_then(flag_value))
                    .flag("--parent", payload.get("parent").and_then(flag_value));
                runner.run_json(&project, &bd_args.json().build()).await
            }
            "bd_update" => {
                let updates = object_arg(args, "updates");
                let bd_args = field_flags(BdArgs::new(&["update"]).arg(string_arg(args, "id")?), &updates, &[]);
                runner.run_json(&project, &bd_args.json().build()).await
            }
            "bd_close" => {
                let bd_args = BdArgs::new(&["close"])
                    .arg(string_arg(args, "id")?)
                    .flag("--reason", optional_string(args, "reason"))
                    .json();
                runner.run_json(&project, &bd_args.build()).await
            }
            "bd_delete" => {
                let bd_args = BdArgs::new(&["delete"]).arg(string_arg(args, "id")?).switch("--force", true);
                runner.run_json(&project, &bd_args.json().build()).await
            }
            "bd_comments_add" => {
                let bd_args = BdArgs::new(&["comments", "add"])
                    .arg(string_arg(args, "id")?)
                    .arg(string_arg(args, "content")?);
                runner.run_json(&project, &bd_args.json().build()).await
            }
            "bd_search" => {
                let bd_args = BdArgs::new(&["search"]).arg(string_arg(args, "query")?);
                runner.run_json(&project, &bd_args.json().build()).await
            }
            "bd_label_add" | "bd_label_remove" => {
                let action = if command == "bd_label_add" { "add" } else { "remove" };
                let bd_args = BdArgs::new(&["label", action])
                    .arg(string_arg(args, "id")?)
                    .arg(string_arg(args, "label")?);
                runner.run_json(&project, &bd_args.json().build()).await
            }
            "bd_dep_add" | "bd_dep_remove" => {
                let action = if command == "bd_dep_add" { "add" } else { "remove" };
                let bd_args = BdArgs::new(&["dep", action])
                    .arg(string_arg(args, "issueId")?)
                    .arg(string_arg(args, "dependsOnId")?);
                runner.run_json(&project, &bd_args.json().build()).await
            }
            "bd_dep_add_relation" | "bd_dep_remove_relation" => {
                let action = if command == "bd_dep_add_relation" { "add" } else { "remove" };
                let relation_type = string_arg(args, "relationType")?;
                if !RELATION_TYPES.contains(&relation_type.as_str()) {
                    return Err(AppError::Cli(format!("Unknown relation type '{}'", relation_type)));
                }
                let bd_args = BdArgs::new(&["dep", action])
                    .arg(string_arg(args, "issueId")?)
                    .arg(string_arg(args, "relatedId")?)
                    .flag("--type", Some(relation_type));
                runner.run_json(&project, &bd_args.json().build()).await
            }
            "bd_available_relation_types" => Ok(json!(RELATION_TYPES)),
            "bd_sync" => {
                runner.run(&project, &BdArgs::new(&["sync"]).build()).await?;
                Ok(Value::Null)
            }
            "bd_poll_data" => {
                let data = self.poll_data(&runner, &project).await?;
                // The fetch itself touches `.beads`; the baseline has to move past it.
                self.mtime.check_changed(&project);
                Ok(data)
            }
            "bd_check_changed" => Ok(json!({ "changed": self.mtime.check_changed(&project) })),
            "bd_reset_mtime" => {
                self.mtime.reset(&project);
                Ok(Value::Null)
            }
            "purge_orphan_attachments" => {
                let raw = self.list_all(&runner, &project).await?;
                let known = issue_ids(&raw);
                to_json(attachments::purge_orphans(&project, &known)?)
            }
            "cleanup_empty_attachment_folder" => {
                to_json(attachments::cleanup_empty_folder(&project, &string_arg(args, "issueId")?)?)
            }
            "delete_attachment_file" => to_json(attachments::delete_file(&project, &string_arg(args, "path")?)?),
            "fs_list" => to_json(fs::list_directory(optional_string(args, "path").as_deref())?),
            "fs_exists" => Ok(Value::Bool(fs::path_exists(&string_arg(args, "path")?))),
            "start_watching" => {
                self.watcher.start(project).await;
                Ok(Value::Null)
            }
            "stop_watching" => {
                self.watcher.stop().await;
                Ok(Value::Null)
            }
            "get_watcher_status" => to_json(self.watcher.status().await),
            "bd_repair_database" => {
                let output = runner.run(&project, &BdArgs::new(&["doctor", "--fix"]).build()).await?;
                to_json(CommandOutcome { success: true, output })
            }
            "bd_check_needs_migration" => {
                let version = detect_bd_version(runner.binary()).await.ok();
                to_json(storage::check_needs_migration(&project, version.as_deref()))
            }
            "bd_migrate_to_dolt" => {
                let output = runner.run(&project, &BdArgs::new(&["migrate", "dolt"]).build()).await?;
                self.mtime.reset(&project);
                to_json(CommandOutcome { success: true, output })
            }
            "check_refs_migration" => {
                let raw = self.list_all(&runner, &project).await?;
                let refs = storage::find_absolute_refs(&project, &raw);
                to_json(RefsMigrationCheck {
                    needs_migration: !refs.is_empty(),
                    affected_issues: refs.into_iter().map(|(id, _)| id).collect(),
                })
            }
            "migrate_attachment_refs" => {
                let raw = self.list_all(&runner, &project).await?;
                let refs = storage::find_absolute_refs(&project, &raw);
                for (id, description) in &refs {
                    let bd_args = BdArgs::new(&["update"])
                        .arg(id.as_str())
                        .flag("--description", Some(description));
                    runner.run(&project, &bd_args.build()).await?;
                }
                tracing::info!(migrated = refs.len(), "rewrote attachment references");
                to_json(RefsMigrationResult { migrated: refs.len() })
            }
            "bd_cleanup_stale_locks" => to_json(storage::cleanup_stale_locks(&project)?),
            "get_cli_binary_path" => Ok(Value::from(self.settings.current().bd_path)),
            "set_cli_binary_path" => {
                let validated = validate_cli_path(&string_arg(args, "path")?)?;
                let settings = self.settings.update(|settings| settings.bd_path = validated.clone())?;
                tracing::info!(bd_path = %settings.bd_path, "updated bd binary path");
                Ok(Value::from(settings.bd_path))
            }
            "get_logging_settings" => {
                let settings = self.settings.current();
                to_json(LoggingSettings {
                    enabled: settings.logging_enabled,
                    verbose: settings.verbose_logging,
                })
            }
            "set_logging_settings" => {
                let requested: LoggingSettings = field(args, "settings")?;
                self.settings.update(|settings| {
                    settings.logging_enabled = requested.enabled;
                    settings.verbose_logging = requested.verbose;
                })?;
                to_json(requested)
            }
            "log_frontend" => {
                let level: LogLevel = field(args, "level")?;
                logs::log_frontend(level, &string_arg(args, "message")?);
                Ok(Value::Null)
            }
            "export_logs" => to_json(logs::export_logs(&self.log_dir, &self.export_dir)?),
            "get_app_version" => Ok(Value::from(env!("CARGO_PKG_VERSION"))),
            "get_bd_version" => Ok(Value::from(detect_bd_version(runner.binary()).await?)),
            "check_bd_compatibility" => to_json(self.compatibility.check(runner.binary()).await),
            "launch_probe" => match detect_bd_version(runner.binary()).await {
                Ok(version) => Ok(json!({ "ready": true, "detail": version })),
                Err(error) => Ok(json!({ "ready": false, "detail": error.to_string() })),
            },
            "fetch_external_data" => self.external(ExternalMethod::Get, args).await,
            "post_external_data" => self.external(ExternalMethod::Post, args).await,
            "patch_external_data" => self.external(ExternalMethod::Patch, args).await,
            "delete_external_data" => self.external(ExternalMethod::Delete, args).await,
            other => Err(AppError::NotFound(format!("Unknown native command: {}", other))),
        }
    }
}

#[async_trait]
impl NativeHost for CliHost {
    async fn invoke(&self, command: &str, args: Value) -> AppResult<Value> {
        self.dispatch(command, &args).await
    }
}

fn filter_issues(raw: Value, options: &ListOptions) -> Value {
    match raw {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|issue| matches_options(issue, options))
                .collect(),
        ),
        Value::Object(mut envelope) => {
            if let Some(Value::Array(items)) = envelope.remove("issues") {
                let kept = items
                    .into_iter()
                    .filter(|issue| matches_options(issue, options))
                    .collect();
                envelope.insert("issues".to_string(), Value::Array(kept));
            }
            Value::Object(envelope)
        }
        other => other,
    }
}

/// Each present, non-empty option narrows the result.
pub fn matches_options(raw: &Value, options: &ListOptions) -> bool {
    if let Some(statuses) = options.status.as_ref().filter(|values| !values.is_empty()) {
        if !statuses.contains(&normalize_status(raw.get("status"))) {
            return false;
        }
    }
    if let Some(types) = options.r#type.as_ref().filter(|values| !values.is_empty()) {
        if !types.contains(&normalize_type(raw.get("issue_type"))) {
            return false;
        }
    }
    if let Some(priorities) = options.priority.as_ref().filter(|values| !values.is_empty()) {
        if !priorities.contains(&normalize_priority(raw.get("priority"))) {
            return false;
        }
    }
    if let Some(assignee) = options.assignee.as_ref().filter(|value| !value.is_empty()) {
        let owner = ["owner", "assignee"].iter().find_map(|key| {
            raw.get(*key)
                .and_then(Value::as_str)
                .filter(|value| !value.trim().is_empty())
        });
        if owner != Some(assignee.as_str()) {
            return false;
        }
    }
    true
}

fn field_flags(mut bd_args: BdArgs, fields: &Map<String, Value>, skip: &[&str]) -> BdArgs {
    for (key, flag) in FIELD_FLAGS {
        if skip.contains(key) {
            continue;
        }
        bd_args = bd_args.flag(flag, fields.get(*key).and_then(flag_value));
    }
    bd_args
}

fn flag_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Null | Value::Object(_) => None,
    }
}

/// `bd` prints nothing for an empty result set.
fn or_empty(raw: Value) -> Value {
    if raw.is_null() {
        Value::Array(Vec::new())
    } else {
        raw
    }
}

fn issue_ids(raw: &Value) -> HashSet<String> {
    raw.as_array()
        .or_else(|| raw.get("issues").and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .filter_map(|issue| issue.get("id").and_then(Value::as_str).map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn string_arg(args: &Value, key: &str) -> AppResult<String> {
    optional_string(args, key).ok_or_else(|| AppError::Cli(format!("Missing argument '{}'", key)))
}

fn optional_string(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(ToString::to_string)
}

fn field<T: DeserializeOwned>(args: &Value, key: &str) -> AppResult<T> {
    let value = args
        .get(key)
        .filter(|value| !value.is_null())
        .cloned()
        .ok_or_else(|| AppError::Cli(format!("Missing argument '{}'", key)))?;
    Ok(serde_json::from_value(value)?)
}

fn field_or_default<T: DeserializeOwned + Default>(args: &Value, key: &str) -> AppResult<T> {
    match args.get(key).filter(|value| !value.is_null()) {
        Some(value) => Ok(serde_json::from_value(value.clone())?),
        None => Ok(T::default()),
    }
}

fn to_json(value: impl Serialize) -> AppResult<Value> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::{field_flags, filter_issues, flag_value, matches_options};
    use crate::host::bd::BdArgs;
    use crate::models::{IssueStatus, IssueType, ListOptions, Priority};
    use serde_json::json;

    #[test]
    fn options_narrow_results_only_when_present() {
        let issue = json!({ "status": "open", "issue_type": "bug", "priority": 1, "owner": "ana" });
        assert!(matches_options(&issue, &ListOptions::default()));
        assert!(matches_options(
            &issue,
            &ListOptions {
                status: Some(vec![IssueStatus::Open, IssueStatus::Blocked]),
                r#type: Some(vec![IssueType::Bug]),
                priority: Some(vec![Priority::P1]),
                assignee: Some("ana".to_string()),
                include_all: false,
            }
        ));
        assert!(!matches_options(
            &issue,
            &ListOptions {
                priority: Some(vec![Priority::P0]),
                ..ListOptions::default()
            }
        ));
        assert!(!matches_options(
            &issue,
            &ListOptions {
                assignee: Some("bo".to_string()),
                ..ListOptions::default()
            }
        ));
    }

    #[test]
    fn blank_owner_falls_back_to_assignee() {
        let issue = json!({ "owner": "", "assignee": "bo" });
        let options = ListOptions {
            assignee: Some("bo".to_string()),
            ..ListOptions::default()
        };
        assert!(matches_options(&issue, &options));
    }

    #[test]
    fn filters_inside_issue_envelopes() {
        let raw = json!({ "issues": [{ "id": "a", "status": "closed" }, { "id": "b", "status": "open" }] });
        let filtered = filter_issues(
            raw,
            &ListOptions {
                status: Some(vec![IssueStatus::Closed]),
                ..ListOptions::default()
            },
        );
        assert_eq!(filtered["issues"], json!([{ "id": "a", "status": "closed" }]));
    }

    #[test]
    fn backend_fields_map_to_bd_flags() {
        let fields = json!({ "title": "T", "priority": 2, "acceptance_criteria": "done" });
        let args = field_flags(BdArgs::new(&["update", "bd-1"]), fields.as_object().expect("object"), &[]).build();
        assert_eq!(
            args,
            vec!["update", "bd-1", "--title", "T", "--priority", "2", "--acceptance", "done"]
        );
        assert_eq!(flag_value(&json!(["a", "b"])).as_deref(), Some("a,b"));
        assert_eq!(flag_value(&json!(null)), None);
    }
}
