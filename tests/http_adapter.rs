use beads_control_panel_lib::adapters::http::HttpAdapter;
use beads_control_panel_lib::client::BeadsClient;
use beads_control_panel_lib::errors::AppError;
use beads_control_panel_lib::models::{IssueStatus, IssueType, ListOptions, Priority, UpdateIssuePayload};
use beads_control_panel_lib::registry::ProjectRegistry;
use serde_json::json;
use std::sync::Arc;
use wiremock::{
    matchers::{body_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn web_client(server: &MockServer) -> BeadsClient {
    BeadsClient::new(Arc::new(HttpAdapter::new(server.uri())))
}

#[tokio::test]
async fn gated_operations_fail_without_network_traffic() {
    let server = MockServer::start().await;
    let client = web_client(&server);

    let error = client
        .add_dependency("bd-1", "bd-2", Some("/work"))
        .await
        .expect_err("dependency add is desktop only");
    assert!(matches!(error, AppError::Unavailable(_)));
    assert!(error.to_string().contains("only available in the desktop app"));

    assert!(client.add_label("bd-1", "ui", None).await.is_err());
    assert!(client.export_logs().await.is_err());
    assert!(client.set_cli_path("/usr/bin/bd").await.is_err());

    let requests = server.received_requests().await.expect("request recording");
    assert!(requests.is_empty());
}

#[tokio::test]
async fn degraded_operations_succeed_with_empty_results() {
    let server = MockServer::start().await;
    let client = web_client(&server);

    assert!(client.search("login", None).await.expect("search").is_empty());
    let purge = client.purge_orphan_attachments(None).await.expect("purge");
    assert_eq!(purge.removed, 0);
    client.sync(None).await.expect("sync");
    assert!(client.check_changed(None).await.expect("check"));
    assert!(!client.watcher_status().await.expect("status").watching);

    let requests = server.received_requests().await.expect("request recording");
    assert!(requests.is_empty());
}

#[tokio::test]
async fn list_forwards_only_the_first_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bd/list"))
        .and(query_param("path", "/work"))
        .and(query_param("status", "in_progress"))
        .and(query_param("type", "bug,epic"))
        .and(query_param("priority", "0,1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "bd-7", "title": "Crash", "status": "in_progress", "priority": 0, "issue_type": "bug" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let options = ListOptions {
        status: Some(vec![IssueStatus::InProgress, IssueStatus::Blocked]),
        r#type: Some(vec![IssueType::Bug, IssueType::Epic]),
        priority: Some(vec![Priority::P0, Priority::P1]),
        ..ListOptions::default()
    };
    let issues = web_client(&server).list(options, Some("/work")).await.expect("list");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].priority, Priority::P0);

    let requests = server.received_requests().await.expect("request recording");
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(!query.contains("blocked"));
}

#[tokio::test]
async fn poll_fails_when_any_list_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bd/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "bd-1" }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bd/ready"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "bd ready exploded" })))
        .mount(&server)
        .await;

    let error = web_client(&server).poll_data(None).await.expect_err("poll must fail");
    assert_eq!(error.to_string(), "bd ready exploded");
}

#[tokio::test]
async fn poll_returns_all_three_lists() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bd/list"))
        .and(query_param("status", "closed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "bd-2", "status": "closed", "closed_at": "2025-01-01T00:00:00Z" }
        ])))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bd/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "bd-1" }, { "id": "bd-3" }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bd/ready"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "issues": [{ "id": "bd-3" }] })))
        .mount(&server)
        .await;

    let data = web_client(&server).poll_data(Some("/work")).await.expect("poll");
    assert_eq!(data.open.len(), 2);
    assert_eq!(data.closed[0].status, IssueStatus::Closed);
    assert_eq!(data.ready[0].id, "bd-3");
}

#[tokio::test]
async fn update_sends_only_present_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/bd/update/bd-5"))
        .and(body_json(json!({ "status": "blocked", "priority": 1, "path": "/work" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "bd-5", "title": "Kept", "status": "blocked", "priority": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let update = UpdateIssuePayload {
        status: Some(IssueStatus::Blocked),
        priority: Some(Priority::P1),
        ..UpdateIssuePayload::default()
    };
    let issue = web_client(&server)
        .update("bd-5", &update, Some("/work"))
        .await
        .expect("update");
    assert_eq!(issue.title, "Kept");
    assert_eq!(issue.status, IssueStatus::Blocked);
}

#[tokio::test]
async fn backend_messages_propagate_verbatim_and_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bd/show/bd-1"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "message": "Error: no such column: issues.owner" })),
        )
        .mount(&server)
        .await;

    let error = web_client(&server).show("bd-1", None).await.expect_err("show fails");
    assert_eq!(error.to_string(), "Error: no such column: issues.owner");
    assert!(beads_control_panel_lib::migration::is_schema_migration_error(&error));
}

#[tokio::test]
async fn registration_conflict_patches_the_existing_project() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/projects"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "error": "Project already exists" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/projects"))
        .and(query_param("path", "/work/app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "proj-9", "name": "App (existing)", "path": "/work/app" }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/projects/proj-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "proj-9" })))
        .expect(1)
        .mount(&server)
        .await;

    let registration = ProjectRegistry::new(server.uri())
        .register("app", "/work/app")
        .await
        .expect("conflict falls back to update");
    assert_eq!(registration.id, "proj-9");
    assert_eq!(registration.name, "App (existing)");
    assert!(!registration.created);
}

#[tokio::test]
async fn unregister_failures_are_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/projects/proj-1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    ProjectRegistry::new(server.uri()).unregister("proj-1").await;
}

#[tokio::test]
async fn registration_conflict_without_matching_path_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/projects"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "error": "Project already exists" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "other", "name": "Other", "path": "/elsewhere" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let error = ProjectRegistry::new(server.uri())
        .register("app", "/work/app")
        .await
        .expect_err("unrelated project is never patched");
    assert!(matches!(error, AppError::NotFound(_)));
}

#[tokio::test]
async fn registration_without_an_id_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/projects"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "name": "app" })))
        .expect(1)
        .mount(&server)
        .await;

    let error = ProjectRegistry::new(server.uri())
        .register("app", "/work/app")
        .await
        .expect_err("missing id");
    assert!(matches!(error, AppError::Internal(_)));
}

#[tokio::test]
async fn unregister_without_an_id_sends_nothing() {
    let server = MockServer::start().await;
    ProjectRegistry::new(server.uri()).unregister("").await;

    let requests = server.received_requests().await.expect("request recording");
    assert!(requests.is_empty());
}
