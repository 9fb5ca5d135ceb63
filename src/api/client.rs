//! reqwest-backed implementation of [`RemoteClient`]

use super::envelope::{Envelope, ErrorBody};
use super::error::{ApiError, ApiResult, NETWORK_ERROR_MESSAGE};
use super::query::{ProjectQuery, TaskQuery};
use super::traits::RemoteClient;
use crate::models::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use urlencoding::encode;

/// HTTP client for the board API
#[derive(Clone)]
pub struct HttpClient {
    http: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a client rooted at `base_url` (e.g. `http://localhost:5000/api`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and unwrap the envelope of its response
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, fallback: &str) -> ApiResult<T> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!("Unauthorized access");
        }

        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            let (error, errors) = body.into_parts();
            return Err(ApiError::from_response(
                status.as_u16(),
                status.canonical_reason(),
                error,
                errors,
            ));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        envelope.into_result(fallback)
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    debug!("HTTP request failed: {}", err);
    if err.is_timeout() {
        ApiError::transport("Request timed out")
    } else if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::transport(NETWORK_ERROR_MESSAGE)
    }
}

#[async_trait]
impl RemoteClient for HttpClient {
    // ========================================================================
    // Projects
    // ========================================================================

    async fn list_projects(&self, query: &ProjectQuery) -> ApiResult<Vec<Project>> {
        let request = self.http.get(self.url("/projects")).query(&query.to_pairs());
        self.send(request, "Failed to fetch projects").await
    }

    async fn get_project(&self, id: &str) -> ApiResult<Project> {
        let request = self.http.get(self.url(&format!("/projects/{}", encode(id))));
        self.send(request, "Project not found").await
    }

    async fn create_project(&self, draft: &ProjectDraft) -> ApiResult<Project> {
        let request = self.http.post(self.url("/projects")).json(draft);
        self.send(request, "Failed to create project").await
    }

    async fn update_project(&self, id: &str, patch: &ProjectPatch) -> ApiResult<Project> {
        let request = self
            .http
            .put(self.url(&format!("/projects/{}", encode(id))))
            .json(patch);
        self.send(request, "Failed to update project").await
    }

    async fn delete_project(&self, id: &str) -> ApiResult<()> {
        let request = self.http.delete(self.url(&format!("/projects/{}", encode(id))));
        self.send::<serde_json::Value>(request, "Failed to delete project")
            .await
            .map(|_| ())
    }

    async fn project_stats(&self) -> ApiResult<Vec<ProjectStats>> {
        let request = self.http.get(self.url("/projects/stats/summary"));
        self.send(request, "Failed to fetch project stats").await
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    async fn list_tasks(&self, query: &TaskQuery) -> ApiResult<Vec<Task>> {
        let request = self
            .http
            .get(self.url(&format!("/projects/{}/tasks", encode(&query.project_id))))
            .query(&query.to_pairs());
        self.send(request, "Failed to fetch tasks").await
    }

    async fn get_task(&self, id: &str) -> ApiResult<Task> {
        let request = self.http.get(self.url(&format!("/tasks/{}", encode(id))));
        self.send(request, "Task not found").await
    }

    async fn create_task(&self, draft: &TaskDraft) -> ApiResult<Task> {
        let request = self
            .http
            .post(self.url(&format!("/projects/{}/tasks", encode(&draft.project_id))))
            .json(draft);
        self.send(request, "Failed to create task").await
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> ApiResult<Task> {
        let request = self
            .http
            .put(self.url(&format!("/tasks/{}", encode(id))))
            .json(patch);
        self.send(request, "Failed to update task on server").await
    }

    async fn reorder_task(&self, request: &ReorderRequest) -> ApiResult<Task> {
        let builder = self
            .http
            .put(self.url(&format!("/tasks/{}/reorder", encode(&request.task_id))))
            .json(request);
        self.send(builder, "Failed to reorder task on server").await
    }

    async fn delete_task(&self, id: &str) -> ApiResult<()> {
        let request = self.http.delete(self.url(&format!("/tasks/{}", encode(id))));
        self.send::<serde_json::Value>(request, "Failed to delete task on server")
            .await
            .map(|_| ())
    }

    async fn task_stats(&self, project_id: &str) -> ApiResult<TaskStats> {
        let request = self
            .http
            .get(self.url(&format!("/projects/{}/tasks/stats", encode(project_id))));
        self.send(request, "Failed to fetch task stats").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpClient::new("http://localhost:5000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");
        assert_eq!(client.url("/projects"), "http://localhost:5000/api/projects");
    }
}
