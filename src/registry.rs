use crate::adapters::http::send_json;
use crate::errors::{AppError, AppResult};
use crate::models::ProjectRegistration;
use reqwest::{Method, Url};
use serde_json::{json, Value};

/// Registers projects with the dashboard service.
#[derive(Debug, Clone)]
pub struct ProjectRegistry {
    http: reqwest::Client,
    dashboard_url: String,
}

impl ProjectRegistry {
    pub fn new(dashboard_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), dashboard_url)
    }

    pub fn with_client(http: reqwest::Client, dashboard_url: impl Into<String>) -> Self {
        Self {
            http,
            dashboard_url: dashboard_url.into(),
        }
    }

    fn projects_url(&self, id: Option<&str>) -> AppResult<Url> {
        let mut url = Url::parse(&self.dashboard_url)
            .map_err(|error| AppError::Http(format!("Invalid dashboard URL '{}': {}", self.dashboard_url, error)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AppError::Http(format!("Dashboard URL '{}' cannot carry a path", self.dashboard_url)))?;
            segments.pop_if_empty().extend(["api", "projects"]);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    /// A 409 means the path is already registered: the existing entry is
    /// looked up and patched, and its name is returned.
    pub async fn register(&self, name: &str, path: &str) -> AppResult<ProjectRegistration> {
        let body = json!({ "name": name, "path": path });
        match send_json(&self.http, Method::POST, self.projects_url(None)?, Vec::new(), Some(body.clone())).await {
            Ok(created) => {
                let id = string_field(&created, "id")
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| AppError::Internal("Dashboard did not return a project id".to_string()))?;
                let registration = ProjectRegistration {
                    id,
                    name: string_field(&created, "name").unwrap_or_else(|| name.to_string()),
                    created: true,
                };
                tracing::info!(id = %registration.id, path, "registered project");
                Ok(registration)
            }
            Err(AppError::Conflict(message)) => {
                tracing::debug!(path, conflict = %message, "project already registered; updating");
                self.update_existing(path, body).await
            }
            Err(error) => Err(error),
        }
    }

    async fn update_existing(&self, path: &str, body: Value) -> AppResult<ProjectRegistration> {
        let found = send_json(
            &self.http,
            Method::GET,
            self.projects_url(None)?,
            vec![("path", path.to_string())],
            None,
        )
        .await?;
        let existing = first_project(&found, path)
            .ok_or_else(|| AppError::NotFound(format!("No registered project for {}", path)))?;
        let id = string_field(existing, "id")
            .ok_or_else(|| AppError::Internal("Registered project has no id".to_string()))?;
        let existing_name = string_field(existing, "name");

        send_json(&self.http, Method::PATCH, self.projects_url(Some(&id))?, Vec::new(), Some(body)).await?;
        tracing::info!(id = %id, path, "updated existing project registration");
        Ok(ProjectRegistration {
            id,
            name: existing_name.unwrap_or_default(),
            created: false,
        })
    }

    /// Fire and forget.
    pub async fn unregister(&self, id: &str) {
        if id.is_empty() {
            tracing::warn!("refusing to unregister a project without an id");
            return;
        }
        let url = match self.projects_url(Some(id)) {
            Ok(url) => url,
            Err(error) => {
                tracing::warn!(id, error = %error, "failed to unregister project");
                return;
            }
        };
        if let Err(error) = send_json(&self.http, Method::DELETE, url, Vec::new(), None).await {
            tracing::warn!(id, error = %error, "failed to unregister project");
        }
    }
}

fn first_project<'a>(found: &'a Value, path: &str) -> Option<&'a Value> {
    let candidates = found
        .as_array()
        .or_else(|| found.get("projects").and_then(Value::as_array));
    match candidates {
        Some(items) => items
            .iter()
            .find(|item| item.get("path").and_then(Value::as_str) == Some(path)),
        None => found
            .get("id")
            .map(|_| found)
            .filter(|item| item.get("path").and_then(Value::as_str).map_or(true, |found_path| found_path == path)),
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{first_project, ProjectRegistry};
    use serde_json::json;

    #[test]
    fn lookup_prefers_the_matching_path() {
        let found = json!({ "projects": [
            { "id": "1", "path": "/a" },
            { "id": "2", "path": "/b" }
        ] });
        assert_eq!(first_project(&found, "/b").expect("match")["id"], "2");
        assert_eq!(first_project(&json!({ "id": 7 }), "/x").expect("single")["id"], 7);
        assert!(first_project(&json!([]), "/x").is_none());
    }

    #[test]
    fn lookup_never_falls_back_to_another_path() {
        let found = json!([{ "id": "other", "path": "/elsewhere" }]);
        assert!(first_project(&found, "/work/app").is_none());
        assert!(first_project(&json!({ "id": "other", "path": "/elsewhere" }), "/work/app").is_none());
    }

    #[test]
    fn project_urls_extend_the_dashboard_path() {
        let registry = ProjectRegistry::new("http://localhost:4000/dash/");
        assert_eq!(
            registry.projects_url(Some("p 1")).expect("url").as_str(),
            "http://localhost:4000/dash/api/projects/p%201"
        );
    }
}
