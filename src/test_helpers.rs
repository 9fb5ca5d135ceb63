//! Test helper factories and mock store builders
//!
//! Provides convenience functions for creating test objects with sensible defaults,
//! and helpers for wiring stores to an in-memory backend.

use crate::api::MockRemote;
use crate::events::EventBus;
use crate::models::*;
use crate::store::{MemoryStore, ProjectStore, TaskStore};
use crate::Stores;
use chrono::{TimeZone, Utc};
use std::sync::Arc;

// ============================================================================
// Model factories
// ============================================================================

/// A project in the "To do" status, created at a fixed instant
pub fn test_project(id: &str, name: &str) -> Project {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    Project {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        status: ProjectStatus::ToDo,
        tasks_count: 0,
        created_by: "tester".to_string(),
        created_at: at,
        updated_at: at,
    }
}

/// A medium-priority, unassigned task at `order` in `status`
pub fn test_task(id: &str, project_id: &str, status: TaskStatus, order: u32) -> Task {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    Task {
        id: id.to_string(),
        title: format!("Task {}", id),
        description: String::new(),
        assignee: None,
        status,
        priority: TaskPriority::Medium,
        due_date: None,
        project_id: project_id.to_string(),
        order,
        created_by: "tester".to_string(),
        created_at: at,
        updated_at: at,
    }
}

// ============================================================================
// Store builders
// ============================================================================

/// Stores wired to `remote` with an in-memory cache
pub fn mock_stores(remote: Arc<MockRemote>) -> Stores {
    Stores::new(remote, Arc::new(MemoryStore::new()), EventBus::default())
}

/// A project store over `remote` with an in-memory cache
pub fn mock_project_store(remote: Arc<MockRemote>) -> ProjectStore {
    ProjectStore::new(remote, Arc::new(MemoryStore::new()), EventBus::default())
}

pub fn mock_task_store(remote: Arc<MockRemote>) -> TaskStore {
    TaskStore::new(remote, Arc::new(MemoryStore::new()), EventBus::default())
}
