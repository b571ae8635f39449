use async_trait::async_trait;
use beads_control_panel_lib::adapters::native::NativeHost;
use beads_control_panel_lib::client::BeadsClient;
use beads_control_panel_lib::errors::{AppError, AppResult};
use beads_control_panel_lib::models::{CreateIssuePayload, IssueStatus, IssueType, Priority};
use beads_control_panel_lib::poller::{ChangeState, PollCoordinator};
use beads_control_panel_lib::runtime::{ExecutionContext, RuntimeKind};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeHost {
    responses: Mutex<HashMap<&'static str, AppResult<Value>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl FakeHost {
    fn respond(self, command: &'static str, response: AppResult<Value>) -> Self {
        self.responses.lock().expect("responses lock").insert(command, response);
        self
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl NativeHost for FakeHost {
    async fn invoke(&self, command: &str, args: Value) -> AppResult<Value> {
        self.calls.lock().expect("calls lock").push((command.to_string(), args));
        match self.responses.lock().expect("responses lock").get(command) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(error)) => Err(AppError::backend(error.to_string())),
            None => Ok(Value::Null),
        }
    }
}

fn native_client(host: Arc<FakeHost>) -> BeadsClient {
    BeadsClient::from_context(&ExecutionContext::native(), host)
}

#[tokio::test]
async fn show_normalizes_loosely_typed_records() {
    let host = Arc::new(FakeHost::default().respond(
        "bd_show",
        Ok(json!([{
            "id": "bd-1",
            "status": "bogus",
            "issue_type": "story",
            "priority": 9,
            "comments": [{ "id": 5, "author": "a", "text": "hi", "created_at": "t" }]
        }])),
    ));
    let client = native_client(host.clone());
    assert_eq!(client.runtime(), RuntimeKind::Native);

    let issue = client.show("bd-1", Some("/work")).await.expect("show");
    assert_eq!(issue.status, IssueStatus::Open);
    assert_eq!(issue.r#type, IssueType::Task);
    assert_eq!(issue.priority, Priority::P3);
    assert_eq!(
        serde_json::to_value(&issue.comments).expect("serialize"),
        json!([{ "id": "5", "author": "a", "content": "hi", "createdAt": "t" }])
    );

    let calls = host.calls();
    assert_eq!(calls[0].0, "bd_show");
    assert_eq!(calls[0].1, json!({ "id": "bd-1", "cwd": "/work" }));
}

#[tokio::test]
async fn empty_show_is_not_found() {
    let host = Arc::new(FakeHost::default().respond("bd_show", Ok(json!([]))));
    let error = native_client(host).show("bd-9", None).await.expect_err("missing issue");
    assert!(matches!(error, AppError::NotFound(_)));
}

#[tokio::test]
async fn backend_errors_propagate_unchanged() {
    let host = Arc::new(FakeHost::default().respond("bd_close", Err(AppError::backend("issue bd-3 is locked"))));
    let error = native_client(host)
        .close("bd-3", Some("done"), None)
        .await
        .expect_err("close fails");
    assert_eq!(error.to_string(), "issue bd-3 is locked");
}

#[tokio::test]
async fn create_sends_backend_field_names() {
    let host = Arc::new(FakeHost::default().respond(
        "bd_create",
        Ok(json!({ "id": "bd-4", "title": "Fix login", "issue_type": "bug", "priority": 1 })),
    ));
    let client = native_client(host.clone());
    let payload = CreateIssuePayload {
        title: "Fix login".to_string(),
        r#type: Some(IssueType::Bug),
        priority: Some(Priority::P1),
        labels: Some(vec!["auth".to_string()]),
        ..CreateIssuePayload::default()
    };

    let issue = client.create(&payload, None).await.expect("create");
    assert_eq!(issue.id, "bd-4");
    assert_eq!(issue.r#type, IssueType::Bug);

    let calls = host.calls();
    assert_eq!(
        calls[0].1["payload"],
        json!({ "title": "Fix login", "issue_type": "bug", "priority": 1, "labels": ["auth"] })
    );
}

#[tokio::test]
async fn blank_titles_never_reach_the_backend() {
    let host = Arc::new(FakeHost::default());
    let payload = CreateIssuePayload {
        title: "  ".to_string(),
        ..CreateIssuePayload::default()
    };
    assert!(native_client(host.clone()).create(&payload, None).await.is_err());
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn partial_poll_responses_are_rejected() {
    let host = Arc::new(FakeHost::default().respond(
        "bd_poll_data",
        Ok(json!({ "open": [{ "id": "bd-1" }], "closed": [] })),
    ));
    assert!(native_client(host).poll_data(None).await.is_err());
}

#[tokio::test]
async fn coordinator_fetches_on_first_check_and_after_switching() {
    let host = Arc::new(
        FakeHost::default()
            .respond("bd_check_changed", Ok(json!({ "changed": true })))
            .respond("bd_poll_data", Ok(json!({ "open": [], "closed": [], "ready": [] }))),
    );
    let coordinator = PollCoordinator::new(native_client(host.clone()), Some("/a".to_string()));

    assert!(coordinator.poll().await.expect("poll").is_some());
    assert_eq!(coordinator.state(), ChangeState::Changed);

    coordinator.switch_project(Some("/b".to_string())).await.expect("switch");
    let commands = host
        .calls()
        .into_iter()
        .map(|(command, args)| (command, args["cwd"].as_str().map(ToString::to_string)))
        .collect::<Vec<_>>();
    assert_eq!(
        commands,
        vec![
            ("bd_check_changed".to_string(), Some("/a".to_string())),
            ("bd_poll_data".to_string(), Some("/a".to_string())),
            ("bd_reset_mtime".to_string(), Some("/b".to_string())),
        ]
    );
}

#[tokio::test]
async fn web_coordinator_always_reports_changes() {
    let client = BeadsClient::from_context(&ExecutionContext::web("http://127.0.0.1:9"), Arc::new(FakeHost::default()));
    let coordinator = PollCoordinator::new(client, None);
    assert_eq!(coordinator.check().await.expect("check"), ChangeState::Changed);
    assert_eq!(coordinator.check().await.expect("check"), ChangeState::Changed);
}

#[tokio::test]
async fn frontend_log_failures_do_not_surface() {
    let host = Arc::new(FakeHost::default().respond("log_frontend", Err(AppError::backend("log sink closed"))));
    native_client(host.clone())
        .log_frontend(beads_control_panel_lib::models::LogLevel::Warn, "button clicked")
        .await;
    assert_eq!(host.calls()[0].1, json!({ "level": "warn", "message": "button clicked" }));
}
