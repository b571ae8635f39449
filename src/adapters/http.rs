use crate::adapters::{BackendAdapter, BackendRequest, Operation};
use crate::errors::{AppError, AppResult};
use crate::models::{ExternalMethod, ListOptions};
use crate::runtime::RuntimeKind;
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde_json::{json, Map, Value};

pub type Query = Vec<(&'static str, String)>;

#[derive(Debug, Clone)]
pub struct HttpAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|error| AppError::Http(format!("Invalid base URL '{}': {}", self.base_url, error)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Http(format!("Base URL '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, segments: &[&str], query: Query) -> AppResult<Value> {
        let url = self.url(segments)?;
        self.send(Method::GET, url, query, None).await
    }

    async fn send(&self, method: Method, url: Url, query: Query, body: Option<Value>) -> AppResult<Value> {
        send_json(&self.client, method, url, query, body).await
    }

    async fn poll_data(&self, cwd: Option<&str>) -> AppResult<Value> {
        let mut closed_query = path_query(cwd);
        closed_query.push(("status", "closed".to_string()));
        closed_query.push(("all", "true".to_string()));

        let (open, closed, ready) = tokio::try_join!(
            self.get(&["api", "bd", "list"], path_query(cwd)),
            self.get(&["api", "bd", "list"], closed_query),
            self.get(&["api", "bd", "ready"], path_query(cwd)),
        )?;
        Ok(json!({ "open": open, "closed": closed, "ready": ready }))
    }
}

#[async_trait]
impl BackendAdapter for HttpAdapter {
    fn runtime(&self) -> RuntimeKind {
        RuntimeKind::Web
    }

    async fn execute(&self, request: BackendRequest) -> AppResult<Value> {
        let cwd = request.cwd.as_deref();
        match request.operation {
            Operation::List(options) => self.get(&["api", "bd", "list"], list_query(&options, cwd)).await,
            Operation::Count => self.get(&["api", "bd", "count"], path_query(cwd)).await,
            Operation::Ready => self.get(&["api", "bd", "ready"], path_query(cwd)).await,
            Operation::Status => self.get(&["api", "bd", "status"], path_query(cwd)).await,
            Operation::Show { id } => self.get(&["api", "bd", "show", id.as_str()], path_query(cwd)).await,
            Operation::Create { fields } => {
                let url = self.url(&["api", "bd", "create"])?;
                self.send(Method::POST, url, Vec::new(), Some(with_path(fields, cwd))).await
            }
            Operation::Update { id, fields } => {
                let url = self.url(&["api", "bd", "update", id.as_str()])?;
                self.send(Method::PATCH, url, Vec::new(), Some(with_path(fields, cwd))).await
            }
            Operation::Close { id, reason } => {
                let url = self.url(&["api", "bd", "close", id.as_str()])?;
                let mut fields = Map::new();
                if let Some(reason) = reason {
                    fields.insert("reason".to_string(), Value::from(reason));
                }
                self.send(Method::POST, url, Vec::new(), Some(with_path(fields, cwd))).await
            }
            Operation::Delete { id } => {
                let url = self.url(&["api", "bd", "delete", id.as_str()])?;
                self.send(Method::DELETE, url, path_query(cwd), None).await
            }
            Operation::AddComment { id, content } => {
                let url = self.url(&["api", "bd", "comments", id.as_str()])?;
                let mut fields = Map::new();
                fields.insert("content".to_string(), Value::from(content));
                self.send(Method::POST, url, Vec::new(), Some(with_path(fields, cwd))).await
            }
            Operation::FsList { path } => {
                let query = path.map(|path| vec![("path", path)]).unwrap_or_default();
                self.get(&["api", "fs", "list"], query).await
            }
            Operation::PollData => self.poll_data(cwd).await,
            Operation::LaunchProbe => match self.get(&["api", "bd", "status"], path_query(cwd)).await {
                Ok(_) => Ok(json!({ "ready": true })),
                Err(error) => Ok(json!({ "ready": false, "detail": error.to_string() })),
            },
            Operation::External { method, url, body } => {
                let url = Url::parse(&url)
                    .map_err(|error| AppError::Http(format!("Invalid URL '{}': {}", url, error)))?;
                self.send(external_method(method), url, Vec::new(), body).await
            }

            // Client-side filtering takes over on the web.
            Operation::Search { .. } => Ok(json!([])),
            Operation::PurgeOrphanAttachments => Ok(json!({ "removed": 0, "folders": [] })),
            Operation::CleanupEmptyAttachmentFolder { .. } => Ok(json!({ "removed": false })),
            Operation::Sync | Operation::ResetMtime | Operation::StartWatching | Operation::StopWatching => {
                Ok(Value::Null)
            }
            Operation::CheckChanged => Ok(json!({ "changed": true })),
            Operation::WatcherStatus => Ok(json!({ "watching": false, "changeCount": 0 })),
            Operation::GetAppVersion => Ok(Value::from(env!("CARGO_PKG_VERSION"))),
            Operation::LogFrontend { level, message } => {
                crate::host::logs::log_frontend(level, &message);
                Ok(Value::Null)
            }

            operation => Err(AppError::desktop_only(operation.feature())),
        }
    }
}

/// Sends one request and decodes the JSON response. Non-2xx statuses carry
/// the backend's message; 409 becomes [`AppError::Conflict`].
pub async fn send_json(
    client: &reqwest::Client,
    method: Method,
    url: Url,
    query: Query,
    body: Option<Value>,
) -> AppResult<Value> {
    tracing::debug!(method = %method, url = %url, "sending backend request");
    let mut builder = client.request(method, url).query(&query);
    if let Some(body) = body {
        builder = builder.json(&body);
    }
    let response = builder.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if status.is_success() {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        return Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)));
    }

    let message = error_message(status, &text);
    if status == StatusCode::CONFLICT {
        return Err(AppError::Conflict(message));
    }
    Err(AppError::backend(message))
}

pub fn path_query(cwd: Option<&str>) -> Query {
    cwd.map(|cwd| vec![("path", cwd.to_string())]).unwrap_or_default()
}

/// The list endpoint filters on a single status, so only the first requested
/// status is forwarded.
pub fn list_query(options: &ListOptions, cwd: Option<&str>) -> Query {
    let mut query = path_query(cwd);
    if options.include_all {
        query.push(("all", "true".to_string()));
    }
    if let Some(status) = options.status.as_ref().and_then(|statuses| statuses.first()) {
        query.push(("status", status.as_str().to_string()));
    }
    if let Some(types) = options.r#type.as_ref().filter(|types| !types.is_empty()) {
        let joined = types.iter().map(|value| value.as_str()).collect::<Vec<_>>().join(",");
        query.push(("type", joined));
    }
    if let Some(priorities) = options.priority.as_ref().filter(|priorities| !priorities.is_empty()) {
        let joined = priorities
            .iter()
            .map(|value| value.as_backend().to_string())
            .collect::<Vec<_>>()
            .join(",");
        query.push(("priority", joined));
    }
    if let Some(assignee) = options.assignee.as_ref().filter(|assignee| !assignee.is_empty()) {
        query.push(("assignee", assignee.clone()));
    }
    query
}

fn with_path(mut fields: Map<String, Value>, cwd: Option<&str>) -> Value {
    if let Some(cwd) = cwd {
        fields.insert("path".to_string(), Value::from(cwd));
    }
    Value::Object(fields)
}

pub fn external_method(method: ExternalMethod) -> Method {
    match method {
        ExternalMethod::Get => Method::GET,
        ExternalMethod::Post => Method::POST,
        ExternalMethod::Patch => Method::PATCH,
        ExternalMethod::Delete => Method::DELETE,
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        ["error", "message"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str).map(ToString::to_string))
    });
    if let Some(message) = from_json.filter(|message| !message.trim().is_empty()) {
        return message;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() && !trimmed.starts_with('{') {
        return trimmed.to_string();
    }
    format!(
        "Request failed with status {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    )
    .trim_end()
    .to_string()
}
