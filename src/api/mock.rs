//! In-memory implementation of RemoteClient for tests and offline runs.

use super::error::{ApiError, ApiResult, NETWORK_ERROR_MESSAGE};
use super::query::{ProjectQuery, TaskQuery};
use super::traits::RemoteClient;
use crate::models::*;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Remote operations, used to script failures and inspect calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    ListProjects,
    GetProject,
    CreateProject,
    UpdateProject,
    DeleteProject,
    ProjectStats,
    ListTasks,
    GetTask,
    CreateTask,
    UpdateTask,
    ReorderTask,
    DeleteTask,
    TaskStats,
}

/// In-memory board server.
///
/// Behaves like the real API: assigns ids, keeps task orders dense per
/// status column, and answers stats. Failures can be scripted per operation
/// with [`MockRemote::fail_next`], or globally with [`MockRemote::set_offline`].
pub struct MockRemote {
    projects: RwLock<Vec<Project>>,
    tasks: RwLock<Vec<Task>>,
    failures: Mutex<HashMap<RemoteOp, VecDeque<ApiError>>>,
    calls: Mutex<Vec<RemoteOp>>,
    offline: AtomicBool,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemote {
    /// Create an empty mock server.
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(Vec::new()),
            tasks: RwLock::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Create a mock server pre-seeded with data.
    pub fn with_data(projects: Vec<Project>, tasks: Vec<Task>) -> Self {
        Self {
            projects: RwLock::new(projects),
            tasks: RwLock::new(tasks),
            ..Self::new()
        }
    }

    /// Make the next call to `op` fail with `error`. Calls queue up.
    pub async fn fail_next(&self, op: RemoteOp, error: ApiError) {
        self.failures
            .lock()
            .await
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// While offline every call fails with a transport error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Operations received so far, in arrival order
    pub async fn calls(&self) -> Vec<RemoteOp> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self, op: RemoteOp) -> usize {
        self.calls.lock().await.iter().filter(|c| **c == op).count()
    }

    /// Server-side copy of the projects
    pub async fn projects(&self) -> Vec<Project> {
        self.projects.read().await.clone()
    }

    /// Server-side copy of the tasks
    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    async fn check(&self, op: RemoteOp) -> ApiResult<()> {
        self.calls.lock().await.push(op);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::transport(NETWORK_ERROR_MESSAGE));
        }
        match self.failures.lock().await.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn not_found(kind: &str) -> ApiError {
    ApiError::Rejected {
        message: format!("{} not found", kind),
        status: Some(404),
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Renumber one status column of one project to 0..n, keeping relative order
fn renumber(tasks: &mut [Task], project_id: &str, status: TaskStatus) {
    let mut column: Vec<&mut Task> = tasks
        .iter_mut()
        .filter(|t| t.project_id == project_id && t.status == status)
        .collect();
    column.sort_by_key(|t| t.order);
    for (i, task) in column.into_iter().enumerate() {
        task.order = i as u32;
    }
}

// ---------------------------------------------------------------------------
// RemoteClient implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl RemoteClient for MockRemote {
    // ======================================================================
    // Projects
    // ======================================================================

    async fn list_projects(&self, query: &ProjectQuery) -> ApiResult<Vec<Project>> {
        self.check(RemoteOp::ListProjects).await?;
        let projects = self.projects.read().await;
        Ok(projects
            .iter()
            .filter(|p| query.status.map_or(true, |s| p.status == s))
            .filter(|p| match query.search.as_deref() {
                Some(q) if !q.trim().is_empty() => {
                    contains_ci(&p.name, q) || contains_ci(&p.description, q)
                }
                _ => true,
            })
            .cloned()
            .collect())
    }

    async fn get_project(&self, id: &str) -> ApiResult<Project> {
        self.check(RemoteOp::GetProject).await?;
        self.projects
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| not_found("Project"))
    }

    async fn create_project(&self, draft: &ProjectDraft) -> ApiResult<Project> {
        self.check(RemoteOp::CreateProject).await?;
        let now = Utc::now();
        let project = Project {
            id: new_id(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            status: draft.status.unwrap_or_default(),
            tasks_count: 0,
            created_by: "mock".to_string(),
            created_at: now,
            updated_at: now,
        };
        self.projects.write().await.push(project.clone());
        Ok(project)
    }

    async fn update_project(&self, id: &str, patch: &ProjectPatch) -> ApiResult<Project> {
        self.check(RemoteOp::UpdateProject).await?;
        let mut projects = self.projects.write().await;
        let project = projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found("Project"))?;
        if let Some(name) = &patch.name {
            project.name = name.clone();
        }
        if let Some(description) = &patch.description {
            project.description = description.clone();
        }
        if let Some(status) = patch.status {
            project.status = status;
        }
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn delete_project(&self, id: &str) -> ApiResult<()> {
        self.check(RemoteOp::DeleteProject).await?;
        let mut projects = self.projects.write().await;
        let before = projects.len();
        projects.retain(|p| p.id != id);
        if projects.len() == before {
            return Err(not_found("Project"));
        }
        self.tasks.write().await.retain(|t| t.project_id != id);
        Ok(())
    }

    async fn project_stats(&self) -> ApiResult<Vec<ProjectStats>> {
        self.check(RemoteOp::ProjectStats).await?;
        let projects = self.projects.read().await;
        let tasks = self.tasks.read().await;
        let mut groups: BTreeMap<&str, ProjectStats> = BTreeMap::new();
        for project in projects.iter() {
            let entry = groups
                .entry(project.status.as_str())
                .or_insert_with(|| ProjectStats {
                    status: project.status.as_str().to_string(),
                    count: 0,
                    total_tasks: 0,
                });
            entry.count += 1;
            entry.total_tasks += tasks.iter().filter(|t| t.project_id == project.id).count() as u64;
        }
        Ok(groups.into_values().collect())
    }

    // ======================================================================
    // Tasks
    // ======================================================================

    async fn list_tasks(&self, query: &TaskQuery) -> ApiResult<Vec<Task>> {
        self.check(RemoteOp::ListTasks).await?;
        let tasks = self.tasks.read().await;
        let mut result: Vec<Task> = tasks
            .iter()
            .filter(|t| t.project_id == query.project_id)
            .filter(|t| query.status.map_or(true, |s| t.status == s))
            .filter(|t| match query.assignee.as_deref() {
                Some("unassigned") => t.assignee().is_none(),
                Some(name) => t.assignee() == Some(name),
                None => true,
            })
            .filter(|t| match query.search.as_deref() {
                Some(q) if !q.trim().is_empty() => {
                    contains_ci(&t.title, q) || contains_ci(&t.description, q)
                }
                _ => true,
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            a.status
                .as_str()
                .cmp(b.status.as_str())
                .then(a.order.cmp(&b.order))
        });
        Ok(result)
    }

    async fn get_task(&self, id: &str) -> ApiResult<Task> {
        self.check(RemoteOp::GetTask).await?;
        self.tasks
            .read()
            .await
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| not_found("Task"))
    }

    async fn create_task(&self, draft: &TaskDraft) -> ApiResult<Task> {
        self.check(RemoteOp::CreateTask).await?;
        if !self.projects.read().await.iter().any(|p| p.id == draft.project_id) {
            return Err(not_found("Project"));
        }
        let mut tasks = self.tasks.write().await;
        let now = Utc::now();
        let order = tasks
            .iter()
            .filter(|t| t.project_id == draft.project_id && t.status == draft.status)
            .count() as u32;
        let task = Task {
            id: new_id(),
            title: draft.title.clone(),
            description: draft.description.clone().unwrap_or_default(),
            assignee: draft.assignee.clone().filter(|a| !a.is_empty()),
            status: draft.status,
            priority: draft.priority.unwrap_or_default(),
            due_date: draft
                .due_date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc()),
            project_id: draft.project_id.clone(),
            order,
            created_by: "mock".to_string(),
            created_at: now,
            updated_at: now,
        };
        tasks.push(task.clone());
        if let Some(project) = self
            .projects
            .write()
            .await
            .iter_mut()
            .find(|p| p.id == draft.project_id)
        {
            project.tasks_count += 1;
        }
        Ok(task)
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> ApiResult<Task> {
        self.check(RemoteOp::UpdateTask).await?;
        let mut tasks = self.tasks.write().await;
        let index = tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| not_found("Task"))?;
        let project_id = tasks[index].project_id.clone();
        let previous_status = tasks[index].status;

        if let Some(status) = patch.status.filter(|s| *s != previous_status) {
            let end = tasks
                .iter()
                .filter(|t| t.project_id == project_id && t.status == status)
                .count() as u32;
            tasks[index].status = status;
            tasks[index].order = end;
            renumber(&mut tasks, &project_id, previous_status);
        }

        let task = &mut tasks[index];
        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(description) = &patch.description {
            task.description = description.clone();
        }
        if let Some(assignee) = &patch.assignee {
            task.assignee = assignee.clone();
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due) = patch.due_date {
            task.due_date = due.and_hms_opt(0, 0, 0).map(|d| d.and_utc());
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn reorder_task(&self, request: &ReorderRequest) -> ApiResult<Task> {
        self.check(RemoteOp::ReorderTask).await?;
        let mut tasks = self.tasks.write().await;
        let index = tasks
            .iter()
            .position(|t| t.id == request.task_id)
            .ok_or_else(|| not_found("Task"))?;
        let project_id = tasks[index].project_id.clone();
        let from = tasks[index].status;

        // Take the task out of its column, then splice it into the target one
        let mut target: Vec<String> = {
            let mut column: Vec<&Task> = tasks
                .iter()
                .filter(|t| {
                    t.project_id == project_id && t.status == request.status && t.id != request.task_id
                })
                .collect();
            column.sort_by_key(|t| t.order);
            column.into_iter().map(|t| t.id.clone()).collect()
        };
        let slot = (request.order as usize).min(target.len());
        target.insert(slot, request.task_id.clone());

        tasks[index].status = request.status;
        tasks[index].updated_at = Utc::now();
        for (position, id) in target.iter().enumerate() {
            if let Some(task) = tasks.iter_mut().find(|t| &t.id == id) {
                task.order = position as u32;
            }
        }
        if from != request.status {
            renumber(&mut tasks, &project_id, from);
        }
        Ok(tasks[index].clone())
    }

    async fn delete_task(&self, id: &str) -> ApiResult<()> {
        self.check(RemoteOp::DeleteTask).await?;
        let mut tasks = self.tasks.write().await;
        let index = tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| not_found("Task"))?;
        let removed = tasks.remove(index);
        renumber(&mut tasks, &removed.project_id, removed.status);
        if let Some(project) = self
            .projects
            .write()
            .await
            .iter_mut()
            .find(|p| p.id == removed.project_id)
        {
            project.tasks_count = project.tasks_count.saturating_sub(1);
        }
        Ok(())
    }

    async fn task_stats(&self, project_id: &str) -> ApiResult<TaskStats> {
        self.check(RemoteOp::TaskStats).await?;
        let tasks = self.tasks.read().await;
        let mut status_stats: Vec<StatusStat> = Vec::new();
        let mut assignees: Vec<String> = Vec::new();
        for task in tasks.iter().filter(|t| t.project_id == project_id) {
            match status_stats.iter_mut().find(|s| s.status == task.status.as_str()) {
                Some(stat) => stat.count += 1,
                None => status_stats.push(StatusStat {
                    status: task.status.as_str().to_string(),
                    count: 1,
                    high_priority: 0,
                }),
            }
            if task.priority == TaskPriority::High {
                if let Some(stat) = status_stats.iter_mut().find(|s| s.status == task.status.as_str()) {
                    stat.high_priority += 1;
                }
            }
            if let Some(name) = task.assignee() {
                if !assignees.iter().any(|a| a == name) {
                    assignees.push(name.to_string());
                }
            }
        }
        Ok(TaskStats {
            status_stats,
            assignees,
        })
    }
}
