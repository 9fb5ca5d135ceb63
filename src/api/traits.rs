//! Trait abstraction for the board API

use super::error::ApiResult;
use super::query::{ProjectQuery, TaskQuery};
use crate::models::*;
use async_trait::async_trait;

/// Every remote operation the stores rely on.
///
/// Implementations unwrap the response envelope and normalize failures, so a
/// store only ever sees `Ok(data)` or an [`ApiError`](super::ApiError).
#[async_trait]
pub trait RemoteClient: Send + Sync {
    // ========================================================================
    // Projects
    // ========================================================================

    /// `GET /projects`
    async fn list_projects(&self, query: &ProjectQuery) -> ApiResult<Vec<Project>>;

    /// `GET /projects/{id}`
    async fn get_project(&self, id: &str) -> ApiResult<Project>;

    /// `POST /projects`
    async fn create_project(&self, draft: &ProjectDraft) -> ApiResult<Project>;

    /// `PUT /projects/{id}`
    async fn update_project(&self, id: &str, patch: &ProjectPatch) -> ApiResult<Project>;

    /// `DELETE /projects/{id}`
    async fn delete_project(&self, id: &str) -> ApiResult<()>;

    /// `GET /projects/stats/summary`
    async fn project_stats(&self) -> ApiResult<Vec<ProjectStats>>;

    // ========================================================================
    // Tasks
    // ========================================================================

    /// `GET /projects/{id}/tasks`
    async fn list_tasks(&self, query: &TaskQuery) -> ApiResult<Vec<Task>>;

    /// `GET /tasks/{id}`
    async fn get_task(&self, id: &str) -> ApiResult<Task>;

    /// `POST /projects/{id}/tasks`
    async fn create_task(&self, draft: &TaskDraft) -> ApiResult<Task>;

    /// `PUT /tasks/{id}`
    async fn update_task(&self, id: &str, patch: &TaskPatch) -> ApiResult<Task>;

    /// `PUT /tasks/{id}/reorder`
    async fn reorder_task(&self, request: &ReorderRequest) -> ApiResult<Task>;

    /// `DELETE /tasks/{id}`
    async fn delete_task(&self, id: &str) -> ApiResult<()>;

    /// `GET /projects/{id}/tasks/stats`
    async fn task_stats(&self, project_id: &str) -> ApiResult<TaskStats>;
}
