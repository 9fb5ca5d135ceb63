//! Project list store

use super::entity::{field_error, Entity, Resource};
use super::entity_store::{EntityStore, SnapshotSink};
use super::filter::ProjectFilters;
use super::persist::{forget, load_json, save_json, KeyValueStore};
use super::{Collection, StoreError, StoreResult};
use crate::api::{ApiResult, FieldErrors, ProjectQuery, RemoteClient};
use crate::events::{EntityType, EventBus};
use crate::models::{Project, ProjectDraft, ProjectPatch, ProjectStats, ProjectStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

const PROJECTS_KEY: &str = "projects";
const FILTERS_KEY: &str = "projectFilters";

fn project_key(id: &str) -> String {
    format!("project_{}", id)
}

impl Entity for Project {
    type Draft = ProjectDraft;
    type Patch = ProjectPatch;

    const KIND: EntityType = EntityType::Project;
    // The list is newest first by default
    const INSERT_FRONT: bool = true;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn validate(draft: &ProjectDraft) -> Result<(), FieldErrors> {
        if draft.name.trim().is_empty() {
            return Err(field_error("name", "Project name is required"));
        }
        Ok(())
    }

    fn provisional(id: String, draft: &ProjectDraft, _items: &Collection<Self>, now: DateTime<Utc>) -> Self {
        Project {
            id,
            name: draft.name.clone(),
            description: draft.description.clone(),
            status: draft.status.unwrap_or_default(),
            tasks_count: 0,
            created_by: "local".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &ProjectPatch, now: DateTime<Utc>) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = now;
    }
}

#[async_trait]
impl Resource for Project {
    type Query = ProjectQuery;

    async fn list(remote: &dyn RemoteClient, query: &ProjectQuery) -> ApiResult<Vec<Self>> {
        remote.list_projects(query).await
    }

    async fn fetch(remote: &dyn RemoteClient, id: &str) -> ApiResult<Self> {
        remote.get_project(id).await
    }

    async fn create(remote: &dyn RemoteClient, draft: &ProjectDraft) -> ApiResult<Self> {
        remote.create_project(draft).await
    }

    async fn update(remote: &dyn RemoteClient, id: &str, patch: &ProjectPatch) -> ApiResult<Self> {
        remote.update_project(id, patch).await
    }

    async fn delete(remote: &dyn RemoteClient, id: &str) -> ApiResult<()> {
        remote.delete_project(id).await
    }
}

/// Projects, their filters and the status summary.
///
/// The last collection confirmed by the server is cached, so a restart or a
/// network failure still has something to show.
#[derive(Clone)]
pub struct ProjectStore {
    store: EntityStore<Project>,
    cache: Arc<dyn KeyValueStore>,
    filters: Arc<Mutex<ProjectFilters>>,
    stats: Arc<Mutex<Vec<ProjectStats>>>,
}

impl ProjectStore {
    pub fn new(remote: Arc<dyn RemoteClient>, cache: Arc<dyn KeyValueStore>, events: EventBus) -> Self {
        let sink_cache = cache.clone();
        let sink: SnapshotSink<Project> =
            Arc::new(move |projects: &[Project]| save_json(sink_cache.as_ref(), PROJECTS_KEY, projects));

        Self {
            store: EntityStore::new(remote, events).with_snapshot_sink(sink),
            cache,
            filters: Arc::new(Mutex::new(ProjectFilters::default())),
            stats: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The underlying generic store
    pub fn inner(&self) -> &EntityStore<Project> {
        &self.store
    }

    /// Restore the cached collection and the saved filters
    pub fn initialize(&self) {
        if let Some(projects) = load_json::<Vec<Project>>(self.cache.as_ref(), PROJECTS_KEY) {
            if !projects.is_empty() && self.store.is_empty() {
                info!("Restored {} cached projects", projects.len());
                self.store.hydrate(projects);
            }
        }
        if let Some(filters) = load_json::<ProjectFilters>(self.cache.as_ref(), FILTERS_KEY) {
            *self.lock_filters() = filters;
        }
    }

    fn lock_filters(&self) -> std::sync::MutexGuard<'_, ProjectFilters> {
        self.filters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Fetch the list with the current filters.
    ///
    /// When it fails and nothing is loaded yet, the cached list is shown.
    pub async fn fetch_projects(&self) -> StoreResult<Vec<Project>> {
        let query = self.filters().to_query();
        let result = self.store.fetch_all(&query).await;
        if result.is_err() && self.store.is_empty() {
            if let Some(cached) = load_json::<Vec<Project>>(self.cache.as_ref(), PROJECTS_KEY) {
                if !cached.is_empty() {
                    warn!("Loaded {} projects from cache after a failed fetch", cached.len());
                    self.store.hydrate(cached);
                }
            }
        }
        result
    }

    /// Fetch every project, ignoring the saved filters.
    ///
    /// Used before a mutation, which needs the whole list rather than the
    /// filtered view.
    pub async fn fetch_all_projects(&self) -> StoreResult<Vec<Project>> {
        self.store.fetch_all(&ProjectFilters::default().to_query()).await
    }

    /// Load one project into the current slot, falling back to its cached copy
    pub async fn fetch_project(&self, id: &str) -> StoreResult<Project> {
        match self.store.fetch_one(id).await {
            Ok(project) => {
                save_json(self.cache.as_ref(), &project_key(id), &project);
                Ok(project)
            }
            Err(err) => {
                let holds_it = self.store.current().is_some_and(|p| p.id == id);
                if !holds_it {
                    if let Some(cached) = load_json::<Project>(self.cache.as_ref(), &project_key(id)) {
                        warn!("Showing cached copy of project {}", id);
                        self.store.set_current(Some(cached));
                    }
                }
                Err(err)
            }
        }
    }

    pub fn create_project(&self, draft: ProjectDraft) -> StoreResult<Project> {
        self.store.create(draft)
    }

    pub fn update_project(&self, id: &str, patch: ProjectPatch) -> StoreResult<Project> {
        self.store.update(id, patch)
    }

    pub fn delete_project(&self, id: &str) -> StoreResult<()> {
        self.store.delete(id)
    }

    /// Refresh the per-status summary. Failures are logged, not stored.
    pub async fn fetch_stats(&self) -> StoreResult<Vec<ProjectStats>> {
        match self.store.remote().project_stats().await {
            Ok(stats) => {
                *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = stats.clone();
                Ok(stats)
            }
            Err(e) => {
                error!("Failed to fetch project stats: {}", e);
                Err(e.into())
            }
        }
    }

    pub fn stats(&self) -> Vec<ProjectStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    // ========================================================================
    // Filters
    // ========================================================================

    pub fn filters(&self) -> ProjectFilters {
        self.lock_filters().clone()
    }

    /// Change some filters and persist the result
    pub fn set_filters(&self, change: impl FnOnce(&mut ProjectFilters)) {
        let filters = {
            let mut filters = self.lock_filters();
            change(&mut filters);
            filters.clone()
        };
        save_json(self.cache.as_ref(), FILTERS_KEY, &filters);
    }

    pub fn clear_filters(&self) {
        *self.lock_filters() = ProjectFilters::default();
        forget(self.cache.as_ref(), FILTERS_KEY);
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn projects(&self) -> Vec<Project> {
        self.store.items()
    }

    pub fn current_project(&self) -> Option<Project> {
        self.store.current()
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

    /// The collection with the current filters and sort applied
    pub fn filtered_projects(&self) -> Vec<Project> {
        let filters = self.filters();
        self.store.read(|s| filters.apply(&s.items.to_vec()))
    }

    /// Projects grouped by status; only statuses in use appear
    pub fn projects_by_status(&self) -> HashMap<ProjectStatus, Vec<Project>> {
        self.store.read(|s| {
            let mut groups: HashMap<ProjectStatus, Vec<Project>> = HashMap::new();
            for project in s.items.iter() {
                groups.entry(project.status).or_default().push(project.clone());
            }
            groups
        })
    }

    pub fn total_projects(&self) -> usize {
        self.store.len()
    }

    /// Number of projects in progress
    pub fn active_projects(&self) -> usize {
        self.store
            .read(|s| s.items.count_where(|p| p.status == ProjectStatus::InProgress))
    }

    pub fn completed_projects(&self) -> usize {
        self.store
            .read(|s| s.items.count_where(|p| p.status == ProjectStatus::Done))
    }
}
