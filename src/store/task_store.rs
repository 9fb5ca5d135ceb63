//! Task board store

use super::entity::{field_error, is_provisional, Entity, Resource};
use super::entity_store::EntityStore;
use super::filter::TaskFilters;
use super::ordering::{self, BoardSnapshot, Placement};
use super::persist::{forget, load_json, save_json, KeyValueStore};
use super::{Collection, StoreError, StoreResult};
use crate::api::{ApiResult, FieldErrors, RemoteClient, TaskQuery};
use crate::events::{EntityType, EventBus, StoreAction};
use crate::models::{ReorderRequest, Task, TaskDraft, TaskPatch, TaskStats, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, warn};

const FILTERS_KEY: &str = "taskFilters";

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|d| d.and_utc())
}

impl Entity for Task {
    type Draft = TaskDraft;
    type Patch = TaskPatch;

    const KIND: EntityType = EntityType::Task;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn project_id(&self) -> Option<&str> {
        Some(&self.project_id)
    }

    fn validate(draft: &TaskDraft) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if draft.title.trim().is_empty() {
            errors.extend(field_error("title", "Task title is required"));
        }
        if draft.project_id.trim().is_empty() {
            errors.extend(field_error("projectId", "Project is required"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Appended to the end of its column
    fn provisional(id: String, draft: &TaskDraft, items: &Collection<Self>, now: DateTime<Utc>) -> Self {
        Task {
            id,
            title: draft.title.clone(),
            description: draft.description.clone().unwrap_or_default(),
            assignee: draft.assignee.clone().filter(|a| !a.trim().is_empty()),
            status: draft.status,
            priority: draft.priority.unwrap_or_default(),
            due_date: draft.due_date.and_then(midnight),
            project_id: draft.project_id.clone(),
            order: ordering::bucket_len(items, draft.status, None) as u32,
            created_by: "local".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &TaskPatch, now: DateTime<Utc>) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(assignee) = &patch.assignee {
            self.assignee = assignee.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due) = patch.due_date {
            self.due_date = midnight(due);
        }
        self.updated_at = now;
    }

    /// A status change moves the task to the end of its new column
    fn after_patch(items: &mut Collection<Self>, id: &str, before: &Self) {
        let Some(status) = items.get(id).map(|t| t.status) else {
            return;
        };
        if status == before.status {
            return;
        }
        ordering::close_gap(items, before.status, before.order, id);
        let end = ordering::bucket_len(items, status, Some(id)) as u32;
        items.update(id, |t| t.order = end);
        ordering::sort_board(items);
    }

    /// Within the same column the task keeps the position it has now
    fn rolled_back(before: &Self, current: &Self) -> Self {
        let mut restored = before.clone();
        if before.status == current.status {
            restored.order = current.order;
        }
        restored
    }

    fn detach(items: &mut Collection<Self>, removed: &Self) {
        ordering::close_gap(items, removed.status, removed.order, &removed.id);
    }

    fn attach(items: &mut Collection<Self>, restored: &Self) {
        ordering::open_gap(items, restored.status, restored.order, &restored.id);
    }

    fn normalize(items: &mut Collection<Self>) {
        ordering::compact(items);
    }
}

#[async_trait]
impl Resource for Task {
    type Query = TaskQuery;

    async fn list(remote: &dyn RemoteClient, query: &TaskQuery) -> ApiResult<Vec<Self>> {
        remote.list_tasks(query).await
    }

    async fn fetch(remote: &dyn RemoteClient, id: &str) -> ApiResult<Self> {
        remote.get_task(id).await
    }

    async fn create(remote: &dyn RemoteClient, draft: &TaskDraft) -> ApiResult<Self> {
        remote.create_task(draft).await
    }

    async fn update(remote: &dyn RemoteClient, id: &str, patch: &TaskPatch) -> ApiResult<Self> {
        remote.update_task(id, patch).await
    }

    async fn delete(remote: &dyn RemoteClient, id: &str) -> ApiResult<()> {
        remote.delete_task(id).await
    }
}

/// The tasks of one project, laid out as a board of status columns.
#[derive(Clone)]
pub struct TaskStore {
    store: EntityStore<Task>,
    cache: Arc<dyn KeyValueStore>,
    filters: Arc<Mutex<TaskFilters>>,
    stats: Arc<Mutex<Option<TaskStats>>>,
    project_id: Arc<Mutex<Option<String>>>,
}

impl TaskStore {
    pub fn new(remote: Arc<dyn RemoteClient>, cache: Arc<dyn KeyValueStore>, events: EventBus) -> Self {
        Self {
            store: EntityStore::new(remote, events),
            cache,
            filters: Arc::new(Mutex::new(TaskFilters::default())),
            stats: Arc::new(Mutex::new(None)),
            project_id: Arc::new(Mutex::new(None)),
        }
    }

    pub fn inner(&self) -> &EntityStore<Task> {
        &self.store
    }

    /// Restore the saved filters
    pub fn initialize(&self) {
        if let Some(filters) = load_json::<TaskFilters>(self.cache.as_ref(), FILTERS_KEY) {
            *self.lock_filters() = filters;
        }
    }

    fn lock_filters(&self) -> MutexGuard<'_, TaskFilters> {
        self.filters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_project(&self) -> MutexGuard<'_, Option<String>> {
        self.project_id.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_stats(&self) -> MutexGuard<'_, Option<TaskStats>> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Load the board of `project_id` with the current filters
    pub async fn fetch_tasks(&self, project_id: &str) -> StoreResult<Vec<Task>> {
        *self.lock_project() = Some(project_id.to_string());
        let query = self.filters().to_query(project_id);
        self.store.fetch_all(&query).await
    }

    /// Load every column of `project_id`, ignoring the saved filters
    pub async fn fetch_board(&self, project_id: &str) -> StoreResult<Vec<Task>> {
        *self.lock_project() = Some(project_id.to_string());
        self.store
            .fetch_all(&TaskFilters::default().to_query(project_id))
            .await
    }

    pub async fn fetch_task(&self, id: &str) -> StoreResult<Task> {
        self.store.fetch_one(id).await
    }

    pub fn create_task(&self, draft: TaskDraft) -> StoreResult<Task> {
        self.store.create(draft)
    }

    pub fn update_task(&self, id: &str, patch: TaskPatch) -> StoreResult<Task> {
        self.store.update(id, patch)
    }

    pub fn delete_task(&self, id: &str) -> StoreResult<()> {
        self.store.delete(id)
    }

    /// Move a task to another position or column.
    ///
    /// The board changes at once. `prev_status`/`prev_order` default to the
    /// task's current placement and are sent as given. If the server refuses
    /// the move, both columns go back to how they were, unless they were
    /// written to in the meantime.
    pub fn reorder_task(&self, request: ReorderRequest) -> StoreResult<Task> {
        if is_provisional(&request.task_id) {
            return Err(StoreError::Pending {
                kind: EntityType::Task,
                id: request.task_id.clone(),
            });
        }

        let now = Utc::now();
        let (moved, request, snapshot) = self.store.write(|s| {
            let not_found = || StoreError::not_found(EntityType::Task, &request.task_id);
            let task = s.items.get(&request.task_id).cloned().ok_or_else(not_found)?;
            s.error = None;

            let from = Placement::of(&task);
            let mut snapshot = BoardSnapshot::capture(&s.items, &[from.status, request.status])
                .with_moved(&task.id, task.updated_at);
            let mv = ordering::move_task(&mut s.items, &task.id, request.status, request.order, now)
                .ok_or_else(not_found)?;
            snapshot.seal(&s.items);

            let moved = s.items.get(&task.id).cloned().ok_or_else(not_found)?;
            if s.current.as_ref().is_some_and(|c| c.id == moved.id) {
                s.current = Some(moved.clone());
            }

            let request = ReorderRequest {
                order: mv.to.order,
                prev_status: request.prev_status.or(Some(from.status)),
                prev_order: request.prev_order.or(Some(from.order)),
                ..request.clone()
            };
            Ok::<_, StoreError>((moved, request, snapshot))
        })?;
        self.store
            .notify(StoreAction::Reordered, &moved.id, Some(&moved.project_id));

        let store = self.clone();
        self.store
            .spawn(async move { store.confirm_reorder(request, snapshot).await });

        Ok(moved)
    }

    async fn confirm_reorder(&self, request: ReorderRequest, snapshot: BoardSnapshot) {
        match self.store.remote().reorder_task(&request).await {
            Ok(task) => {
                debug!(
                    "Task {} reorder confirmed at {}:{}",
                    task.id, task.status, task.order
                );
                self.store
                    .notify(StoreAction::Confirmed, &task.id, Some(&task.project_id));
            }
            Err(e) => {
                error!("Failed to reorder task {}: {}", request.task_id, e);
                let restored = self.store.write(|s| {
                    s.error = Some(StoreError::from(e));
                    if !snapshot.is_current(&s.items) {
                        return None;
                    }
                    snapshot.restore(&mut s.items);
                    let task = s.items.get(&request.task_id).cloned();
                    if s.current.as_ref().is_some_and(|c| c.id == request.task_id) {
                        s.current = task.clone();
                    }
                    task
                });
                match restored {
                    Some(task) => self.store.notify(
                        StoreAction::RolledBack,
                        &task.id,
                        Some(&task.project_id),
                    ),
                    None => warn!(
                        "Skipping rollback of task {} reorder: the board changed since",
                        request.task_id
                    ),
                }
            }
        }
    }

    /// Refresh the per-status summary. Failures are logged, not stored.
    pub async fn fetch_stats(&self, project_id: &str) -> StoreResult<TaskStats> {
        match self.store.remote().task_stats(project_id).await {
            Ok(stats) => {
                *self.lock_stats() = Some(stats.clone());
                Ok(stats)
            }
            Err(e) => {
                error!("Failed to fetch task stats: {}", e);
                Err(e.into())
            }
        }
    }

    pub fn stats(&self) -> Option<TaskStats> {
        self.lock_stats().clone()
    }

    // ========================================================================
    // Filters
    // ========================================================================

    pub fn filters(&self) -> TaskFilters {
        self.lock_filters().clone()
    }

    /// Change some filters and persist the result
    pub fn set_filters(&self, change: impl FnOnce(&mut TaskFilters)) {
        let filters = {
            let mut filters = self.lock_filters();
            change(&mut filters);
            filters.clone()
        };
        save_json(self.cache.as_ref(), FILTERS_KEY, &filters);
    }

    pub fn clear_filters(&self) {
        *self.lock_filters() = TaskFilters::default();
        forget(self.cache.as_ref(), FILTERS_KEY);
    }

    /// Forget the board: tasks, current task, stats and filters
    pub fn clear_current_project(&self) {
        self.store.write(|s| {
            s.items.replace_all(Vec::new());
            s.current = None;
        });
        *self.lock_project() = None;
        *self.lock_stats() = None;
        self.clear_filters();
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn tasks(&self) -> Vec<Task> {
        self.store.items()
    }

    pub fn current_task(&self) -> Option<Task> {
        self.store.current()
    }

    pub fn current_project_id(&self) -> Option<String> {
        self.lock_project().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    pub fn error(&self) -> Option<StoreError> {
        self.store.error()
    }

    pub fn clear_error(&self) {
        self.store.clear_error();
    }

    pub fn pending(&self) -> usize {
        self.store.pending()
    }

    pub async fn settle(&self) {
        self.store.settle().await;
    }

    // ========================================================================
    // Derived views
    // ========================================================================

    pub fn filtered_tasks(&self) -> Vec<Task> {
        let filters = self.filters();
        self.store.read(|s| filters.apply(&s.items.to_vec()))
    }

    /// Columns in use, each sorted by order
    pub fn tasks_by_status(&self) -> HashMap<TaskStatus, Vec<Task>> {
        let mut columns: HashMap<TaskStatus, Vec<Task>> = HashMap::new();
        for task in self.tasks() {
            columns.entry(task.status).or_default().push(task);
        }
        for column in columns.values_mut() {
            column.sort_by_key(|t| t.order);
        }
        columns
    }

    /// Distinct assignees, in board order
    pub fn assignees(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for task in self.tasks() {
            if let Some(name) = task.assignee() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    /// Unfinished tasks due strictly before `today`
    pub fn overdue_tasks(&self, today: NaiveDate) -> Vec<Task> {
        self.tasks()
            .into_iter()
            .filter(|t| t.status != TaskStatus::Done)
            .filter(|t| t.due_date.is_some_and(|due| due.date_naive() < today))
            .collect()
    }

    pub fn total_tasks(&self) -> usize {
        self.store.len()
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.store.read(|s| s.items.count_where(|t| t.status == status))
    }

    pub fn todo_tasks(&self) -> usize {
        self.count(TaskStatus::Todo)
    }

    pub fn in_progress_tasks(&self) -> usize {
        self.count(TaskStatus::InProgress)
    }

    pub fn done_tasks(&self) -> usize {
        self.count(TaskStatus::Done)
    }
}
