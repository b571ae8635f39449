use crate::models::{
    Comment, CreateIssuePayload, Issue, IssueStatus, IssueSummary, IssueType, Priority, UpdateIssuePayload,
};
use serde_json::{Map, Value};

const PARENT_CHILD: &str = "parent-child";

/// Converts a raw backend issue record into an [`Issue`]. Total: every field
/// has a fallback, and enum fields never carry values outside their enums.
pub fn normalize_issue(raw: &Value) -> Issue {
    let parent = raw
        .get("parent")
        .and_then(normalize_summary)
        .or_else(|| parent_from_dependencies(raw.get("dependencies")));
    let children = raw
        .get("children")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(normalize_summary).collect::<Vec<_>>())
        .or_else(|| children_from_dependents(raw.get("dependents")));

    Issue {
        id: string_field(raw, "id").unwrap_or_default(),
        title: string_field(raw, "title").unwrap_or_default(),
        description: string_field(raw, "description").unwrap_or_default(),
        r#type: normalize_type(raw.get("issue_type")),
        status: normalize_status(raw.get("status")),
        priority: normalize_priority(raw.get("priority")),
        assignee: non_empty_field(raw, "owner").or_else(|| non_empty_field(raw, "assignee")),
        labels: string_list(raw.get("labels")).unwrap_or_default(),
        created_at: string_field(raw, "created_at").unwrap_or_default(),
        updated_at: string_field(raw, "updated_at").unwrap_or_default(),
        closed_at: non_empty_field(raw, "closed_at"),
        comments: raw
            .get("comments")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(normalize_comment).collect())
            .unwrap_or_default(),
        blocked_by: string_list(raw.get("blocked_by")),
        blocks: string_list(raw.get("blocks")),
        external_ref: non_empty_field(raw, "external_ref"),
        estimate: raw.get("estimate").and_then(Value::as_i64),
        design: string_field(raw, "design"),
        acceptance_criteria: string_field(raw, "acceptance_criteria"),
        notes: string_field(raw, "notes"),
        parent,
        children,
    }
}

/// Accepts a bare array, an `{"issues": [...]}` envelope, or anything else
/// (treated as an empty result).
pub fn normalize_issues(raw: &Value) -> Vec<Issue> {
    let items = raw
        .as_array()
        .or_else(|| raw.get("issues").and_then(Value::as_array));
    items
        .map(|items| items.iter().map(normalize_issue).collect())
        .unwrap_or_default()
}

/// `bd show --json` emits either the record or a one-element array.
pub fn normalize_single_issue(raw: &Value) -> Option<Issue> {
    match raw {
        Value::Array(items) => items.first().map(normalize_issue),
        Value::Object(_) => Some(normalize_issue(raw)),
        _ => None,
    }
}

pub fn normalize_comment(raw: &Value) -> Comment {
    let content = non_empty_field(raw, "text")
        .or_else(|| non_empty_field(raw, "content"))
        .unwrap_or_default();
    Comment {
        id: raw.get("id").and_then(coerce_string).unwrap_or_default(),
        author: string_field(raw, "author").unwrap_or_default(),
        content,
        created_at: string_field(raw, "created_at").unwrap_or_default(),
    }
}

pub fn normalize_summary(raw: &Value) -> Option<IssueSummary> {
    let id = raw.get("id").and_then(coerce_string)?;
    Some(IssueSummary {
        id,
        title: string_field(raw, "title").unwrap_or_default(),
        status: normalize_status(raw.get("status")),
        priority: normalize_priority(raw.get("priority")),
    })
}

pub fn normalize_type(value: Option<&Value>) -> IssueType {
    value
        .and_then(Value::as_str)
        .and_then(IssueType::parse)
        .unwrap_or(IssueType::Task)
}

pub fn normalize_status(value: Option<&Value>) -> IssueStatus {
    value
        .and_then(Value::as_str)
        .and_then(IssueStatus::parse)
        .unwrap_or(IssueStatus::Open)
}

pub fn normalize_priority(value: Option<&Value>) -> Priority {
    value
        .and_then(Value::as_i64)
        .and_then(Priority::from_backend)
        .unwrap_or(Priority::P3)
}

/// Backend field map for an update: only fields present in `update` appear.
pub fn denormalize_for_update(update: &UpdateIssuePayload) -> Map<String, Value> {
    let mut fields = Map::new();
    put_string(&mut fields, "title", update.title.as_deref());
    put_string(&mut fields, "description", update.description.as_deref());
    if let Some(issue_type) = update.r#type {
        fields.insert("issue_type".to_string(), Value::from(issue_type.as_str()));
    }
    if let Some(status) = update.status {
        fields.insert("status".to_string(), Value::from(status.as_str()));
    }
    if let Some(priority) = update.priority {
        fields.insert("priority".to_string(), Value::from(priority.as_backend()));
    }
    put_string(&mut fields, "assignee", update.assignee.as_deref());
    put_string(&mut fields, "external_ref", update.external_ref.as_deref());
    if let Some(estimate) = update.estimate {
        fields.insert("estimate".to_string(), Value::from(estimate));
    }
    put_string(&mut fields, "design", update.design.as_deref());
    put_string(&mut fields, "acceptance_criteria", update.acceptance_criteria.as_deref());
    put_string(&mut fields, "notes", update.notes.as_deref());
    fields
}

pub fn denormalize_for_create(payload: &CreateIssuePayload) -> Map<String, Value> {
    let mut fields = denormalize_for_update(&UpdateIssuePayload {
        title: Some(payload.title.clone()),
        description: payload.description.clone(),
        r#type: payload.r#type,
        status: None,
        priority: payload.priority,
        assignee: payload.assignee.clone(),
        external_ref: payload.external_ref.clone(),
        estimate: payload.estimate,
        design: payload.design.clone(),
        acceptance_criteria: payload.acceptance_criteria.clone(),
        notes: payload.notes.clone(),
    });
    if let Some(labels) = &payload.labels {
        fields.insert(
            "labels".to_string(),
            Value::Array(labels.iter().cloned().map(Value::from).collect()),
        );
    }
    put_string(&mut fields, "parent", payload.parent.as_deref());
    fields
}

fn put_string(fields: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), Value::from(value));
    }
}

fn parent_from_dependencies(value: Option<&Value>) -> Option<IssueSummary> {
    value?
        .as_array()?
        .iter()
        .filter(|entry| is_parent_child(entry))
        .find_map(normalize_summary)
}

fn children_from_dependents(value: Option<&Value>) -> Option<Vec<IssueSummary>> {
    let children = value?
        .as_array()?
        .iter()
        .filter(|entry| is_parent_child(entry))
        .filter_map(normalize_summary)
        .collect::<Vec<_>>();
    if children.is_empty() {
        None
    } else {
        Some(children)
    }
}

fn is_parent_child(entry: &Value) -> bool {
    entry
        .get("dependency_type")
        .or_else(|| entry.get("type"))
        .and_then(Value::as_str)
        == Some(PARENT_CHILD)
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(ToString::to_string)
}

fn non_empty_field(raw: &Value, key: &str) -> Option<String> {
    string_field(raw, key).filter(|value| !value.trim().is_empty())
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| match item {
                Value::Object(_) => item.get("id").and_then(coerce_string),
                other => coerce_string(other),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::{denormalize_for_create, denormalize_for_update, normalize_issue, normalize_issues};
    use crate::models::{
        CreateIssuePayload, IssueStatus, IssueType, Priority, UpdateIssuePayload,
    };
    use serde_json::json;

    #[test]
    fn coerces_unknown_enums_and_priority() {
        let issue = normalize_issue(&json!({
            "id": "bd-1",
            "status": "bogus",
            "issue_type": "story",
            "priority": 9,
            "comments": [{ "id": 5, "author": "a", "text": "hi", "created_at": "t" }]
        }));
        assert_eq!(issue.status, IssueStatus::Open);
        assert_eq!(issue.r#type, IssueType::Task);
        assert_eq!(issue.priority, Priority::P3);
        assert_eq!(issue.comments.len(), 1);
        assert_eq!(issue.comments[0].id, "5");
        assert_eq!(issue.comments[0].author, "a");
        assert_eq!(issue.comments[0].content, "hi");
        assert_eq!(issue.comments[0].created_at, "t");

        let serialized = serde_json::to_value(&issue).expect("serialize");
        assert_eq!(serialized["status"], "open");
        assert_eq!(serialized["type"], "task");
        assert_eq!(serialized["priority"], "p3");
        assert_eq!(serialized["comments"][0]["createdAt"], "t");
    }

    #[test]
    fn malformed_priorities_fall_back_to_p3() {
        for raw in [json!(-1), json!(5), json!(2.5), json!("1"), json!(null), json!(true)] {
            let issue = normalize_issue(&json!({ "id": "bd-1", "priority": raw }));
            assert_eq!(issue.priority, Priority::P3, "priority input {}", raw);
        }
        let missing = normalize_issue(&json!({ "id": "bd-1" }));
        assert_eq!(missing.priority, Priority::P3);
    }

    #[test]
    fn valid_enum_values_map_to_themselves() {
        for issue_type in IssueType::ALL {
            let issue = normalize_issue(&json!({ "issue_type": issue_type.as_str() }));
            assert_eq!(issue.r#type, issue_type);
        }
        for status in IssueStatus::ALL {
            let issue = normalize_issue(&json!({ "status": status.as_str() }));
            assert_eq!(issue.status, status);
        }
        for value in 0..=4 {
            let issue = normalize_issue(&json!({ "priority": value }));
            assert_eq!(issue.priority.as_backend(), value);
        }
    }

    #[test]
    fn maps_snake_case_fields_and_owner() {
        let issue = normalize_issue(&json!({
            "id": "bd-7",
            "title": "Wire poller",
            "owner": "sam",
            "labels": ["ui", "backend"],
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-02T00:00:00Z",
            "closed_at": "2025-01-03T00:00:00Z",
            "status": "closed",
            "blocked_by": ["bd-1", { "id": "bd-2" }],
            "blocks": [],
            "external_ref": "gh-12",
            "estimate": 90,
            "design": "d",
            "acceptance_criteria": "a",
            "notes": "n"
        }));
        assert_eq!(issue.assignee.as_deref(), Some("sam"));
        assert_eq!(issue.labels, vec!["ui", "backend"]);
        assert_eq!(issue.closed_at.as_deref(), Some("2025-01-03T00:00:00Z"));
        assert_eq!(issue.blocked_by, Some(vec!["bd-1".to_string(), "bd-2".to_string()]));
        assert_eq!(issue.blocks, Some(vec![]));
        assert_eq!(issue.external_ref.as_deref(), Some("gh-12"));
        assert_eq!(issue.estimate, Some(90));
        assert_eq!(issue.design.as_deref(), Some("d"));
        assert_eq!(issue.acceptance_criteria.as_deref(), Some("a"));
        assert_eq!(issue.notes.as_deref(), Some("n"));
        assert!(issue.comments.is_empty());
    }

    #[test]
    fn comment_content_prefers_non_empty_text() {
        let issue = normalize_issue(&json!({
            "comments": [
                { "id": "c1", "text": "", "content": "from content" },
                { "id": "c2" }
            ]
        }));
        assert_eq!(issue.comments[0].content, "from content");
        assert_eq!(issue.comments[1].content, "");
    }

    #[test]
    fn derives_parent_and_children_from_dependency_edges() {
        let issue = normalize_issue(&json!({
            "id": "bd-5",
            "dependencies": [
                { "id": "bd-2", "title": "blocker", "status": "open", "priority": 1, "dependency_type": "blocks" },
                { "id": "bd-1", "title": "epic", "status": "in_progress", "priority": 0, "dependency_type": "parent-child" }
            ],
            "dependents": [
                { "id": "bd-9", "title": "child", "status": "weird", "priority": 7, "dependency_type": "parent-child" }
            ]
        }));
        let parent = issue.parent.expect("parent");
        assert_eq!(parent.id, "bd-1");
        assert_eq!(parent.status, IssueStatus::InProgress);
        let children = issue.children.expect("children");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].status, IssueStatus::Open);
        assert_eq!(children[0].priority, Priority::P3);
    }

    #[test]
    fn accepts_issue_envelopes() {
        assert_eq!(normalize_issues(&json!([{ "id": "a" }, { "id": "b" }])).len(), 2);
        assert_eq!(normalize_issues(&json!({ "issues": [{ "id": "a" }] })).len(), 1);
        assert!(normalize_issues(&json!(null)).is_empty());
    }

    #[test]
    fn update_includes_only_present_fields() {
        let fields = denormalize_for_update(&UpdateIssuePayload {
            status: Some(IssueStatus::InProgress),
            priority: Some(Priority::P1),
            ..UpdateIssuePayload::default()
        });
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["status"], "in_progress");
        assert_eq!(fields["priority"], 1);
        assert!(!fields.contains_key("title"));
        assert!(!fields.contains_key("assignee"));
    }

    #[test]
    fn update_round_trip_only_changes_requested_fields() {
        let original = normalize_issue(&json!({
            "id": "bd-3",
            "title": "Old title",
            "description": "keep me",
            "status": "open",
            "priority": 2,
            "issue_type": "bug",
            "owner": "kim"
        }));
        let update = UpdateIssuePayload {
            title: Some("New title".to_string()),
            ..UpdateIssuePayload::default()
        };
        let fields = denormalize_for_update(&update);

        let mut echo = json!({
            "id": "bd-3",
            "title": "Old title",
            "description": "keep me",
            "status": "open",
            "priority": 2,
            "issue_type": "bug",
            "owner": "kim"
        });
        for (key, value) in &fields {
            echo[key] = value.clone();
        }
        let updated = normalize_issue(&echo);

        assert_eq!(updated.title, "New title");
        assert_eq!(updated.description, original.description);
        assert_eq!(updated.status, original.status);
        assert_eq!(updated.priority, original.priority);
        assert_eq!(updated.r#type, original.r#type);
        assert_eq!(updated.assignee, original.assignee);
    }

    #[test]
    fn create_carries_labels_and_parent() {
        let fields = denormalize_for_create(&CreateIssuePayload {
            title: "New".to_string(),
            r#type: Some(IssueType::Feature),
            labels: Some(vec!["ui".to_string()]),
            parent: Some("bd-1".to_string()),
            ..CreateIssuePayload::default()
        });
        assert_eq!(fields["title"], "New");
        assert_eq!(fields["issue_type"], "feature");
        assert_eq!(fields["labels"], json!(["ui"]));
        assert_eq!(fields["parent"], "bd-1");
        assert!(!fields.contains_key("priority"));
    }
}
