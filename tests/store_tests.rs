//! Store behaviour tests
//!
//! Drive the project and task stores against the in-memory board server and
//! check local state before and after background confirmations settle.

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use taskboard::api::{ApiError, MockRemote, RemoteOp};
use taskboard::events::{EntityType, EventBus, StoreAction};
use taskboard::models::*;
use taskboard::store::{KeyValueStore, MemoryStore, ProjectStore, StoreError, TaskStore};
use taskboard::Stores;

// ============================================================================
// Fixtures
// ============================================================================

fn project(id: &str, name: &str) -> Project {
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

fn task(id: &str, status: TaskStatus, order: u32) -> Task {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    Task {
        id: id.to_string(),
        title: format!("Task {}", id),
        description: String::new(),
        assignee: None,
        status,
        priority: TaskPriority::Medium,
        due_date: None,
        project_id: "p1".to_string(),
        order,
        created_by: "tester".to_string(),
        created_at: at,
        updated_at: at,
    }
}

/// Project p1 with todo: a0 b1 c2 and in_progress: d0 e1
fn board() -> Vec<Task> {
    vec![
        task("a", TaskStatus::Todo, 0),
        task("b", TaskStatus::Todo, 1),
        task("c", TaskStatus::Todo, 2),
        task("d", TaskStatus::InProgress, 0),
        task("e", TaskStatus::InProgress, 1),
    ]
}

async fn task_store_with(tasks: Vec<Task>) -> (Arc<MockRemote>, TaskStore) {
    let remote = Arc::new(MockRemote::with_data(vec![project("p1", "Board")], tasks));
    let store = TaskStore::new(remote.clone(), Arc::new(MemoryStore::new()), EventBus::default());
    store.fetch_tasks("p1").await.unwrap();
    (remote, store)
}

fn project_store(remote: Arc<MockRemote>, cache: Arc<dyn KeyValueStore>) -> ProjectStore {
    ProjectStore::new(remote, cache, EventBus::default())
}

/// Ids of one column in order
fn column(store: &TaskStore, status: TaskStatus) -> Vec<String> {
    let mut tasks: Vec<Task> = store
        .tasks()
        .into_iter()
        .filter(|t| t.status == status)
        .collect();
    tasks.sort_by_key(|t| t.order);
    tasks.into_iter().map(|t| t.id).collect()
}

fn assert_dense(store: &TaskStore) {
    for status in TaskStatus::ALL {
        let mut orders: Vec<u32> = store
            .tasks()
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.order)
            .collect();
        orders.sort_unstable();
        let expected: Vec<u32> = (0..orders.len() as u32).collect();
        assert_eq!(orders, expected, "column {} is not dense", status);
    }
}

fn order_of(store: &TaskStore, id: &str) -> u32 {
    store.tasks().iter().find(|t| t.id == id).unwrap().order
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_task_appends_to_column() {
    let (remote, store) = task_store_with(vec![
        task("a", TaskStatus::Todo, 0),
        task("b", TaskStatus::Todo, 1),
    ])
    .await;

    let provisional = store
        .create_task(TaskDraft::new("p1", "Write docs", TaskStatus::Todo))
        .unwrap();
    assert!(provisional.id.starts_with("temp_"));
    assert_eq!(provisional.order, 2);
    assert_eq!(provisional.created_by, "local");
    assert_eq!(store.total_tasks(), 3);
    assert_eq!(store.pending(), 1);

    store.settle().await;

    assert_eq!(store.pending(), 0);
    assert!(store.error().is_none());
    assert!(store.tasks().iter().all(|t| !t.id.starts_with("temp_")));
    assert_eq!(store.total_tasks(), 3);
    assert_dense(&store);
    assert_eq!(remote.tasks().await.len(), 3);
}

#[tokio::test]
async fn test_create_failure_leaves_no_provisional() {
    let (remote, store) = task_store_with(board()).await;
    remote
        .fail_next(RemoteOp::CreateTask, ApiError::rejected("Quota exceeded"))
        .await;
    let mut rx = store.inner().events().subscribe();

    let provisional = store
        .create_task(TaskDraft::new("p1", "Doomed", TaskStatus::Todo))
        .unwrap();
    assert_eq!(column(&store, TaskStatus::Todo).len(), 4);

    store.settle().await;

    assert!(store.tasks().iter().all(|t| !t.id.starts_with("temp_")));
    assert_eq!(column(&store, TaskStatus::Todo), vec!["a", "b", "c"]);
    assert_dense(&store);
    assert_eq!(
        store.error(),
        Some(StoreError::Api(ApiError::rejected("Quota exceeded")))
    );

    let inserted = rx.try_recv().unwrap();
    assert_eq!(inserted.action, StoreAction::Inserted);
    assert_eq!(inserted.entity_id, provisional.id);
    let rolled_back = rx.try_recv().unwrap();
    assert_eq!(rolled_back.action, StoreAction::RolledBack);
    assert_eq!(rolled_back.entity_id, provisional.id);
    assert_eq!(rolled_back.project_id.as_deref(), Some("p1"));
}

#[tokio::test]
async fn test_create_invalid_draft_is_rejected_synchronously() {
    let (remote, store) = task_store_with(board()).await;

    let err = store
        .create_task(TaskDraft::new("", "  ", TaskStatus::Todo))
        .unwrap_err();

    let fields = err.field_errors().unwrap();
    assert_eq!(fields["title"], vec!["Task title is required"]);
    assert_eq!(fields["projectId"], vec!["Project is required"]);
    assert_eq!(store.total_tasks(), 5);
    assert_eq!(store.pending(), 0);
    assert_eq!(remote.call_count(RemoteOp::CreateTask).await, 0);
}

#[tokio::test]
async fn test_create_project_prepends_and_confirms_in_place() {
    let remote = Arc::new(MockRemote::with_data(
        vec![project("p1", "First"), project("p2", "Second")],
        vec![],
    ));
    let store = project_store(remote.clone(), Arc::new(MemoryStore::new()));
    store.fetch_projects().await.unwrap();

    let provisional = store
        .create_project(ProjectDraft::new("Launch", "Ship it"))
        .unwrap();
    assert_eq!(store.projects()[0].id, provisional.id);
    assert_eq!(provisional.status, ProjectStatus::ToDo);

    store.settle().await;

    let projects = store.projects();
    assert_eq!(projects.len(), 3);
    assert_eq!(projects[0].name, "Launch");
    assert_eq!(projects[0].created_by, "mock");
    assert!(!projects[0].id.starts_with("temp_"));
    assert_eq!(projects[1].id, "p1");
}

// ============================================================================
// Update
// ============================================================================

#[tokio::test]
async fn test_update_failure_restores_exact_entity() {
    let (remote, store) = task_store_with(board()).await;
    remote
        .fail_next(RemoteOp::UpdateTask, ApiError::transport("Network error. Please check your connection."))
        .await;
    let before = store.tasks().into_iter().find(|t| t.id == "b").unwrap();

    let patch = TaskPatch {
        title: Some("Renamed".into()),
        priority: Some(TaskPriority::High),
        ..Default::default()
    };
    let updated = store.update_task("b", patch).unwrap();
    assert_eq!(updated.title, "Renamed");
    assert!(updated.updated_at > before.updated_at);

    store.settle().await;

    let after = store.tasks().into_iter().find(|t| t.id == "b").unwrap();
    assert_eq!(after, before);
    assert!(matches!(
        store.error(),
        Some(StoreError::Api(ApiError::Transport { .. }))
    ));
}

#[tokio::test]
async fn test_update_status_failure_restores_both_columns() {
    let (remote, store) = task_store_with(board()).await;
    remote
        .fail_next(RemoteOp::UpdateTask, ApiError::rejected("Nope"))
        .await;

    let moved = store
        .update_task(
            "a",
            TaskPatch {
                status: Some(TaskStatus::InProgress),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(moved.order, 2);
    assert_eq!(column(&store, TaskStatus::Todo), vec!["b", "c"]);
    assert_eq!(column(&store, TaskStatus::InProgress), vec!["d", "e", "a"]);
    assert_dense(&store);

    store.settle().await;

    assert_eq!(column(&store, TaskStatus::Todo), vec!["a", "b", "c"]);
    assert_eq!(column(&store, TaskStatus::InProgress), vec!["d", "e"]);
    assert_dense(&store);
}

#[tokio::test]
async fn test_stale_update_rollback_is_skipped() {
    let (remote, store) = task_store_with(board()).await;
    remote
        .fail_next(RemoteOp::UpdateTask, ApiError::rejected("Conflict"))
        .await;

    store
        .update_task(
            "c",
            TaskPatch {
                title: Some("First".into()),
                ..Default::default()
            },
        )
        .unwrap();
    store
        .update_task(
            "c",
            TaskPatch {
                title: Some("Second".into()),
                ..Default::default()
            },
        )
        .unwrap();

    store.settle().await;

    let c = store.tasks().into_iter().find(|t| t.id == "c").unwrap();
    assert_eq!(c.title, "Second");
    assert!(store.error().is_some());
    assert_eq!(remote.call_count(RemoteOp::UpdateTask).await, 2);
}

#[tokio::test]
async fn test_failed_update_survives_sibling_delete() {
    let (remote, store) = task_store_with(board()).await;
    remote
        .fail_next(RemoteOp::UpdateTask, ApiError::rejected("Title taken"))
        .await;
    let before = store.tasks().into_iter().find(|t| t.id == "b").unwrap();

    store
        .update_task(
            "b",
            TaskPatch {
                title: Some("Rejected".into()),
                priority: Some(TaskPriority::High),
                ..Default::default()
            },
        )
        .unwrap();
    store.delete_task("a").unwrap();
    assert_eq!(order_of(&store, "b"), 0);

    store.settle().await;

    let after = store.tasks().into_iter().find(|t| t.id == "b").unwrap();
    assert_eq!(after, Task { order: 0, ..before });
    assert_eq!(column(&store, TaskStatus::Todo), vec!["b", "c"]);
    assert_dense(&store);
    assert!(matches!(
        store.error(),
        Some(StoreError::Api(ApiError::Rejected { .. }))
    ));
}

#[tokio::test]
async fn test_failed_update_survives_sibling_reorder() {
    let (remote, store) = task_store_with(board()).await;
    remote
        .fail_next(RemoteOp::UpdateTask, ApiError::rejected("Title taken"))
        .await;

    store
        .update_task(
            "b",
            TaskPatch {
                title: Some("Rejected".into()),
                ..Default::default()
            },
        )
        .unwrap();
    store
        .reorder_task(ReorderRequest::new("c", TaskStatus::Todo, 0))
        .unwrap();

    store.settle().await;

    let b = store.tasks().into_iter().find(|t| t.id == "b").unwrap();
    assert_eq!(b.title, "Task b");
    assert_eq!(column(&store, TaskStatus::Todo), vec!["c", "a", "b"]);
    assert_dense(&store);
}

#[tokio::test]
async fn test_update_unknown_and_provisional_ids() {
    let (remote, store) = task_store_with(board()).await;

    let err = store.update_task("zzz", TaskPatch::default()).unwrap_err();
    assert_eq!(
        err,
        StoreError::NotFound {
            kind: EntityType::Task,
            id: "zzz".into()
        }
    );

    let provisional = store
        .create_task(TaskDraft::new("p1", "Fresh", TaskStatus::Done))
        .unwrap();
    let err = store
        .update_task(&provisional.id, TaskPatch::default())
        .unwrap_err();
    assert!(matches!(err, StoreError::Pending { .. }));
    assert!(matches!(
        store.delete_task(&provisional.id),
        Err(StoreError::Pending { .. })
    ));
    assert!(matches!(
        store.reorder_task(ReorderRequest::new(provisional.id.clone(), TaskStatus::Todo, 0)),
        Err(StoreError::Pending { .. })
    ));

    store.settle().await;
    assert_eq!(remote.call_count(RemoteOp::UpdateTask).await, 0);
}

#[tokio::test]
async fn test_update_keeps_current_task_in_sync() {
    let (_remote, store) = task_store_with(board()).await;
    store.fetch_task("d").await.unwrap();

    store
        .update_task(
            "d",
            TaskPatch {
                assignee: Some(Some("Ada".into())),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(store.current_task().unwrap().assignee(), Some("Ada"));

    store.settle().await;
    assert_eq!(store.assignees(), vec!["Ada".to_string()]);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_compacts_column() {
    let (remote, store) = task_store_with(board()).await;

    store.delete_task("a").unwrap();
    assert_eq!(column(&store, TaskStatus::Todo), vec!["b", "c"]);
    assert_eq!(order_of(&store, "b"), 0);
    assert_eq!(order_of(&store, "c"), 1);

    store.settle().await;
    assert!(store.error().is_none());
    assert_eq!(remote.tasks().await.len(), 4);
}

#[tokio::test]
async fn test_delete_failure_restores_entity_and_column() {
    let (remote, store) = task_store_with(board()).await;
    remote
        .fail_next(RemoteOp::DeleteTask, ApiError::rejected("Locked"))
        .await;

    store.delete_task("b").unwrap();
    assert_eq!(column(&store, TaskStatus::Todo), vec!["a", "c"]);

    store.settle().await;

    assert_eq!(column(&store, TaskStatus::Todo), vec!["a", "b", "c"]);
    assert_eq!(order_of(&store, "b"), 1);
    assert_dense(&store);
    assert_eq!(store.error(), Some(StoreError::Api(ApiError::rejected("Locked"))));
}

#[tokio::test]
async fn test_create_delete_sequences_stay_dense() {
    let (remote, store) = task_store_with(board()).await;
    remote
        .fail_next(RemoteOp::CreateTask, ApiError::rejected("No"))
        .await;
    remote
        .fail_next(RemoteOp::DeleteTask, ApiError::rejected("No"))
        .await;

    store
        .create_task(TaskDraft::new("p1", "Rolled back", TaskStatus::Todo))
        .unwrap();
    store.settle().await;
    assert_dense(&store);

    store.delete_task("c").unwrap();
    store.settle().await;
    assert_dense(&store);
    assert_eq!(column(&store, TaskStatus::Todo), vec!["a", "b", "c"]);

    store
        .create_task(TaskDraft::new("p1", "Kept", TaskStatus::Todo))
        .unwrap();
    store.delete_task("a").unwrap();
    assert_dense(&store);
    store.settle().await;
    assert_dense(&store);
    assert_eq!(column(&store, TaskStatus::Todo).len(), 3);
}

// ============================================================================
// Reorder
// ============================================================================

#[tokio::test]
async fn test_reorder_to_front_of_column() {
    let (remote, store) = task_store_with(board()).await;

    let moved = store
        .reorder_task(ReorderRequest::new("c", TaskStatus::Todo, 0).from_position(TaskStatus::Todo, 2))
        .unwrap();

    assert_eq!(moved.order, 0);
    assert_eq!(order_of(&store, "a"), 1);
    assert_eq!(order_of(&store, "b"), 2);
    assert_eq!(order_of(&store, "c"), 0);

    store.settle().await;
    assert!(store.error().is_none());
    let server_c = remote.tasks().await.into_iter().find(|t| t.id == "c").unwrap();
    assert_eq!(server_c.order, 0);
}

#[tokio::test]
async fn test_inverse_reorders_restore_column() {
    let (_remote, store) = task_store_with(board()).await;
    let original = column(&store, TaskStatus::Todo);

    store
        .reorder_task(ReorderRequest::new("a", TaskStatus::Todo, 2))
        .unwrap();
    assert_eq!(column(&store, TaskStatus::Todo), vec!["b", "c", "a"]);
    store
        .reorder_task(ReorderRequest::new("a", TaskStatus::Todo, 0))
        .unwrap();

    assert_eq!(column(&store, TaskStatus::Todo), original);
    store.settle().await;
    assert_eq!(column(&store, TaskStatus::Todo), original);
}

#[tokio::test]
async fn test_reorder_across_columns_clamps_order() {
    let (remote, store) = task_store_with(board()).await;
    let mut rx = store.inner().events().subscribe();

    let moved = store
        .reorder_task(ReorderRequest::new("b", TaskStatus::InProgress, 40))
        .unwrap();

    assert_eq!(moved.status, TaskStatus::InProgress);
    assert_eq!(moved.order, 2);
    assert_eq!(column(&store, TaskStatus::Todo), vec!["a", "c"]);
    assert_eq!(column(&store, TaskStatus::InProgress), vec!["d", "e", "b"]);
    assert_dense(&store);

    let event = rx.try_recv().unwrap();
    assert_eq!(event.action, StoreAction::Reordered);
    assert_eq!(event.entity_id, "b");

    store.settle().await;
    let server_b = remote.tasks().await.into_iter().find(|t| t.id == "b").unwrap();
    assert_eq!(server_b.status, TaskStatus::InProgress);
    assert_eq!(server_b.order, 2);
}

#[tokio::test]
async fn test_reorder_failure_rolls_back_both_columns() {
    let (remote, store) = task_store_with(board()).await;
    remote
        .fail_next(RemoteOp::ReorderTask, ApiError::rejected("Out of date"))
        .await;
    let before = store.tasks();
    let mut rx = store.inner().events().subscribe();

    store
        .reorder_task(ReorderRequest::new("a", TaskStatus::InProgress, 1))
        .unwrap();
    assert_eq!(column(&store, TaskStatus::InProgress), vec!["d", "a", "e"]);

    store.settle().await;

    assert_eq!(store.tasks(), before);
    assert_eq!(
        store.error(),
        Some(StoreError::Api(ApiError::rejected("Out of date")))
    );
    assert_eq!(rx.try_recv().unwrap().action, StoreAction::Reordered);
    assert_eq!(rx.try_recv().unwrap().action, StoreAction::RolledBack);
}

#[tokio::test]
async fn test_reorder_rollback_skipped_after_later_write() {
    let (remote, store) = task_store_with(board()).await;
    remote
        .fail_next(RemoteOp::ReorderTask, ApiError::rejected("Out of date"))
        .await;

    store
        .reorder_task(ReorderRequest::new("c", TaskStatus::Todo, 0))
        .unwrap();
    store
        .update_task(
            "b",
            TaskPatch {
                title: Some("Touched".into()),
                ..Default::default()
            },
        )
        .unwrap();

    store.settle().await;

    assert_eq!(column(&store, TaskStatus::Todo), vec!["c", "a", "b"]);
    assert!(store.error().is_some());
}

#[tokio::test]
async fn test_reorder_unknown_task_is_not_found() {
    let (remote, store) = task_store_with(board()).await;
    let err = store
        .reorder_task(ReorderRequest::new("ghost", TaskStatus::Done, 0))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    store.settle().await;
    assert_eq!(remote.call_count(RemoteOp::ReorderTask).await, 0);
}

// ============================================================================
// Fetch and cache
// ============================================================================

#[tokio::test]
async fn test_failed_fetch_keeps_loaded_projects() {
    let projects: Vec<Project> = (1..=5)
        .map(|i| project(&format!("p{}", i), &format!("Project {}", i)))
        .collect();
    let remote = Arc::new(MockRemote::with_data(projects.clone(), vec![]));
    let store = project_store(remote.clone(), Arc::new(MemoryStore::new()));
    store.fetch_projects().await.unwrap();

    remote.set_offline(true);
    let err = store.fetch_projects().await.unwrap_err();

    assert!(matches!(err, StoreError::Api(ApiError::Transport { .. })));
    assert_eq!(store.projects(), projects);
    assert_eq!(store.error(), Some(err));
    assert!(!store.is_loading());
}

#[tokio::test]
async fn test_failed_fetch_falls_back_to_cached_projects() {
    let cache: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let remote = Arc::new(MockRemote::with_data(
        vec![project("p1", "Cached"), project("p2", "Also cached")],
        vec![],
    ));
    project_store(remote.clone(), cache.clone())
        .fetch_projects()
        .await
        .unwrap();

    remote.set_offline(true);
    let fresh = project_store(remote, cache);
    assert!(fresh.fetch_projects().await.is_err());

    assert_eq!(fresh.total_projects(), 2);
    assert!(fresh.error().is_some());
}

#[tokio::test]
async fn test_failed_fetch_by_id_shows_cached_copy() {
    let cache: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let remote = Arc::new(MockRemote::with_data(vec![project("p1", "Board")], vec![]));
    project_store(remote.clone(), cache.clone())
        .fetch_project("p1")
        .await
        .unwrap();

    remote.set_offline(true);
    let fresh = project_store(remote, cache);
    assert!(fresh.fetch_project("p1").await.is_err());

    assert_eq!(fresh.current_project().unwrap().name, "Board");
}

#[tokio::test]
async fn test_fetch_unknown_project_is_rejected() {
    let remote = Arc::new(MockRemote::new());
    let store = project_store(remote, Arc::new(MemoryStore::new()));

    let err = store.fetch_project("missing").await.unwrap_err();
    let StoreError::Api(api) = err else {
        panic!("expected an API error");
    };
    assert_eq!(api.status(), Some(404));
    assert!(store.current_project().is_none());
}

#[tokio::test]
async fn test_initialize_restores_collection_and_filters() {
    let cache: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let remote = Arc::new(MockRemote::with_data(vec![project("p1", "Auth service")], vec![]));
    let first = Stores::new(remote.clone(), cache.clone(), EventBus::default());
    first.projects.fetch_projects().await.unwrap();
    first.projects.set_filters(|f| f.search = "auth".into());
    first.tasks.set_filters(|f| f.status = Some(TaskStatus::Done));

    let second = Stores::new(remote, cache, EventBus::default());
    second.initialize();

    assert_eq!(second.projects.total_projects(), 1);
    assert_eq!(second.projects.filters().search, "auth");
    assert_eq!(second.tasks.filters().status, Some(TaskStatus::Done));
}

// ============================================================================
// Filters, views and stats
// ============================================================================

#[tokio::test]
async fn test_fetch_board_ignores_saved_filters() {
    let (_remote, store) = task_store_with(board()).await;
    store.set_filters(|f| f.status = Some(TaskStatus::Done));
    store.fetch_tasks("p1").await.unwrap();
    assert_eq!(store.total_tasks(), 0);

    store.fetch_board("p1").await.unwrap();
    assert_eq!(store.total_tasks(), 5);
    assert_eq!(store.filters().status, Some(TaskStatus::Done));

    let moved = store
        .reorder_task(ReorderRequest::new("a", TaskStatus::InProgress, 1))
        .unwrap();
    assert_eq!(moved.order, 1);

    store.settle().await;

    assert!(store.error().is_none());
    assert_eq!(column(&store, TaskStatus::Todo), vec!["b", "c"]);
    assert_eq!(column(&store, TaskStatus::InProgress), vec!["d", "a", "e"]);
    assert_dense(&store);
}

#[tokio::test]
async fn test_fetch_all_projects_ignores_saved_filters() {
    let remote = Arc::new(MockRemote::with_data(
        vec![project("p1", "Alpha"), project("p2", "Beta")],
        vec![],
    ));
    let store = project_store(remote.clone(), Arc::new(MemoryStore::new()));
    store.set_filters(|f| f.search = "alpha".into());
    store.fetch_projects().await.unwrap();
    assert_eq!(store.total_projects(), 1);

    store.fetch_all_projects().await.unwrap();
    assert_eq!(store.total_projects(), 2);
    assert_eq!(store.filters().search, "alpha");

    store
        .update_project(
            "p2",
            ProjectPatch {
                name: Some("Beta launch".into()),
                ..Default::default()
            },
        )
        .unwrap();
    store.settle().await;

    assert!(store.error().is_none());
    let names: Vec<String> = remote.projects().await.into_iter().map(|p| p.name).collect();
    assert!(names.contains(&"Beta launch".to_string()));
}

#[tokio::test]
async fn test_concurrent_settles_both_return() {
    let (remote, store) = task_store_with(board()).await;
    store
        .update_task(
            "a",
            TaskPatch {
                title: Some("Renamed".into()),
                ..Default::default()
            },
        )
        .unwrap();
    store.delete_task("e").unwrap();
    assert_eq!(store.pending(), 2);

    tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(store.settle(), store.settle());
    })
    .await
    .unwrap();
    assert_eq!(store.pending(), 0);

    // The tracker is open again for later mutations
    store.delete_task("d").unwrap();
    assert_eq!(store.pending(), 1);
    store.settle().await;
    assert_eq!(store.pending(), 0);
    assert_eq!(remote.tasks().await.len(), 3);
}

#[tokio::test]
async fn test_project_search_ignores_sort() {
    let mut auth = project("p1", "Auth rewrite");
    auth.created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut billing = project("p2", "Billing");
    billing.description = "OAuth callbacks".into();
    billing.created_at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let other = project("p3", "Marketing site");

    let remote = Arc::new(MockRemote::with_data(vec![auth, billing, other], vec![]));
    let store = project_store(remote, Arc::new(MemoryStore::new()));
    store.fetch_projects().await.unwrap();

    store.set_filters(|f| f.search = "AUTH".into());
    let ids: Vec<String> = store.filtered_projects().into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec!["p2", "p1"]);

    store.set_filters(|f| f.sort = "name:asc".parse().unwrap());
    let ids: Vec<String> = store.filtered_projects().into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec!["p1", "p2"]);
}

#[tokio::test]
async fn test_task_filters_are_sent_to_server() {
    let mut assigned = task("x", TaskStatus::Done, 0);
    assigned.assignee = Some("Ada".into());
    let mut tasks = board();
    tasks.push(assigned);
    let (_remote, store) = task_store_with(tasks).await;

    store.set_filters(|f| f.assignee = "unassigned".into());
    store.fetch_tasks("p1").await.unwrap();
    assert_eq!(store.total_tasks(), 5);

    store.set_filters(|f| {
        f.assignee = "all".into();
        f.status = Some(TaskStatus::Done);
    });
    store.fetch_tasks("p1").await.unwrap();
    assert_eq!(store.total_tasks(), 1);
    assert_eq!(store.done_tasks(), 1);
    assert_eq!(store.current_project_id().as_deref(), Some("p1"));
}

#[tokio::test]
async fn test_tasks_by_status_sorted_by_order() {
    let (_remote, store) = task_store_with(board()).await;
    store
        .reorder_task(ReorderRequest::new("e", TaskStatus::InProgress, 0))
        .unwrap();

    let columns = store.tasks_by_status();
    let in_progress: Vec<&str> = columns[&TaskStatus::InProgress]
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(in_progress, vec!["e", "d"]);
    assert_eq!(store.todo_tasks(), 3);
    assert_eq!(store.in_progress_tasks(), 2);
    store.settle().await;
}

#[tokio::test]
async fn test_stats_failure_does_not_set_error() {
    let (remote, store) = task_store_with(board()).await;

    let stats = store.fetch_stats("p1").await.unwrap();
    assert_eq!(stats.count_for("todo"), 3);
    assert_eq!(store.stats(), Some(stats));

    remote
        .fail_next(RemoteOp::TaskStats, ApiError::rejected("Unavailable"))
        .await;
    assert!(store.fetch_stats("p1").await.is_err());
    assert!(store.error().is_none());
    assert!(store.stats().is_some());
}

#[tokio::test]
async fn test_project_counts_and_groups() {
    let mut active = project("p2", "Active");
    active.status = ProjectStatus::InProgress;
    let mut done = project("p3", "Done");
    done.status = ProjectStatus::Done;
    let remote = Arc::new(MockRemote::with_data(
        vec![project("p1", "Todo"), active, done],
        vec![],
    ));
    let store = project_store(remote, Arc::new(MemoryStore::new()));
    store.fetch_projects().await.unwrap();

    assert_eq!(store.total_projects(), 3);
    assert_eq!(store.active_projects(), 1);
    assert_eq!(store.completed_projects(), 1);
    assert_eq!(store.projects_by_status().len(), 3);

    let stats = store.fetch_stats().await.unwrap();
    assert_eq!(stats.iter().map(|s| s.count).sum::<u64>(), 3);
}
