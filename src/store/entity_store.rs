//! The optimistic mutation protocol shared by every store

use super::collection::Collection;
use super::entity::{is_provisional, provisional_id, Entity, Resource};
use super::{StoreError, StoreResult};
use crate::api::RemoteClient;
use crate::events::{EventBus, EventEmitter, StoreAction, StoreEvent};
use chrono::Utc;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

/// Receives the whole collection after every successful fetch or confirmation
pub type SnapshotSink<E> = Arc<dyn Fn(&[E]) + Send + Sync>;

/// Everything a store holds
#[derive(Debug)]
pub struct StoreState<E> {
    pub items: Collection<E>,
    /// The single-entity slot filled by [`EntityStore::fetch_one`]
    pub current: Option<E>,
    pub loading: bool,
    /// Last failure; cleared when the next action starts
    pub error: Option<StoreError>,
}

impl<E> Default for StoreState<E> {
    fn default() -> Self {
        Self {
            items: Collection::default(),
            current: None,
            loading: false,
            error: None,
        }
    }
}

/// A collection mirrored from the server, mutated optimistically.
///
/// `create`, `update` and `delete` change local state, spawn the remote call
/// on a [`TaskTracker`] and return before it resolves. When the server
/// refuses, the change is rolled back unless the touched slots were written
/// again in the meantime. `fetch_all` and `fetch_one` await the server.
///
/// Mutations must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct EntityStore<E: Resource> {
    remote: Arc<dyn RemoteClient>,
    state: Arc<Mutex<StoreState<E>>>,
    tracker: TaskTracker,
    settling: Arc<tokio::sync::Mutex<()>>,
    events: EventBus,
    sink: Option<SnapshotSink<E>>,
}

impl<E: Resource> EntityStore<E> {
    pub fn new(remote: Arc<dyn RemoteClient>, events: EventBus) -> Self {
        Self {
            remote,
            state: Arc::new(Mutex::new(StoreState::default())),
            tracker: TaskTracker::new(),
            settling: Arc::new(tokio::sync::Mutex::new(())),
            events,
            sink: None,
        }
    }

    /// Call `sink` with the collection whenever it was confirmed by the server
    pub fn with_snapshot_sink(mut self, sink: SnapshotSink<E>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn remote(&self) -> &Arc<dyn RemoteClient> {
        &self.remote
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn lock(&self) -> MutexGuard<'_, StoreState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the state under the lock
    pub fn read<R>(&self, f: impl FnOnce(&StoreState<E>) -> R) -> R {
        f(&self.lock())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut StoreState<E>) -> R) -> R {
        f(&mut self.lock())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn items(&self) -> Vec<E> {
        self.read(|s| s.items.to_vec())
    }

    pub fn get(&self, id: &str) -> Option<E> {
        self.read(|s| s.items.get(id).cloned())
    }

    pub fn len(&self) -> usize {
        self.read(|s| s.items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn current(&self) -> Option<E> {
        self.read(|s| s.current.clone())
    }

    pub fn set_current(&self, entity: Option<E>) {
        self.write(|s| s.current = entity);
    }

    pub fn is_loading(&self) -> bool {
        self.read(|s| s.loading)
    }

    pub fn error(&self) -> Option<StoreError> {
        self.read(|s| s.error.clone())
    }

    pub fn clear_error(&self) {
        self.write(|s| s.error = None);
    }

    /// Replace the collection without touching the server, e.g. from a cache
    pub fn hydrate(&self, items: Vec<E>) {
        self.write(|s| s.items.replace_all(items));
        self.notify(StoreAction::Loaded, "", None);
    }

    // ========================================================================
    // Background work
    // ========================================================================

    /// Number of remote confirmations still in flight
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every in-flight confirmation has resolved.
    ///
    /// Concurrent callers take turns, so one caller reopening the tracker
    /// never leaves another waiting on a tracker that is open again.
    pub async fn settle(&self) {
        let _turn = self.settling.lock().await;
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task);
    }

    pub(crate) fn notify(&self, action: StoreAction, id: &str, project_id: Option<&str>) {
        let mut event = StoreEvent::new(E::KIND, action, id);
        if let Some(project_id) = project_id {
            event = event.with_project_id(project_id);
        }
        self.events.emit(event);
    }

    fn notify_entity(&self, action: StoreAction, entity: &E) {
        self.notify(action, entity.id(), entity.project_id());
    }

    pub(crate) fn persist_snapshot(&self) {
        if let Some(sink) = &self.sink {
            let items = self.items();
            sink(&items);
        }
    }

    pub(crate) fn record_failure(&self, err: StoreError) {
        self.write(|s| s.error = Some(err));
    }

    // ========================================================================
    // Fetches
    // ========================================================================

    /// Replace the collection with the server's list.
    ///
    /// On failure the collection is left as it was and the error slot is set.
    pub async fn fetch_all(&self, query: &E::Query) -> StoreResult<Vec<E>> {
        self.write(|s| {
            s.loading = true;
            s.error = None;
        });

        match E::list(self.remote.as_ref(), query).await {
            Ok(items) => {
                debug!("Fetched {} {}s", items.len(), E::KIND);
                self.write(|s| {
                    s.items.replace_all(items.clone());
                    s.loading = false;
                });
                self.notify(StoreAction::Loaded, "", None);
                self.persist_snapshot();
                Ok(items)
            }
            Err(e) => {
                error!("Failed to fetch {}s: {}", E::KIND, e);
                let err = StoreError::from(e);
                self.write(|s| {
                    s.error = Some(err.clone());
                    s.loading = false;
                });
                Err(err)
            }
        }
    }

    /// Load one entity into the current slot.
    ///
    /// A copy already in the collection is refreshed as well.
    pub async fn fetch_one(&self, id: &str) -> StoreResult<E> {
        self.write(|s| {
            s.loading = true;
            s.error = None;
        });

        match E::fetch(self.remote.as_ref(), id).await {
            Ok(entity) => {
                self.write(|s| {
                    s.items.replace(id, entity.clone());
                    s.current = Some(entity.clone());
                    s.loading = false;
                });
                self.notify_entity(StoreAction::Loaded, &entity);
                Ok(entity)
            }
            Err(e) => {
                error!("Failed to fetch {} {}: {}", E::KIND, id, e);
                let err = StoreError::from(e);
                self.write(|s| {
                    s.error = Some(err.clone());
                    s.loading = false;
                });
                Err(err)
            }
        }
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Insert a provisional entity and confirm it in the background.
    ///
    /// Returns the provisional entity. Its id starts with `temp_` until the
    /// server answers; on failure it is removed again.
    pub fn create(&self, draft: E::Draft) -> StoreResult<E> {
        E::validate(&draft).map_err(StoreError::Invalid)?;

        let now = Utc::now();
        let provisional = self.write(|s| {
            s.loading = true;
            s.error = None;
            let entity = E::provisional(provisional_id(), &draft, &s.items, now);
            if E::INSERT_FRONT {
                s.items.prepend(entity.clone());
            } else {
                s.items.push(entity.clone());
            }
            s.loading = false;
            entity
        });
        self.notify_entity(StoreAction::Inserted, &provisional);

        let store = self.clone();
        let temp_id = provisional.id().to_string();
        self.spawn(async move { store.confirm_create(temp_id, draft).await });

        Ok(provisional)
    }

    async fn confirm_create(&self, temp_id: String, draft: E::Draft) {
        match E::create(self.remote.as_ref(), &draft).await {
            Ok(confirmed) => {
                let replaced = self.write(|s| {
                    let replaced = s.items.replace(&temp_id, confirmed.clone());
                    if replaced {
                        E::normalize(&mut s.items);
                    }
                    replaced
                });
                if replaced {
                    debug!("{} {} confirmed as {}", E::KIND, temp_id, confirmed.id());
                    self.notify_entity(StoreAction::Confirmed, &confirmed);
                    self.persist_snapshot();
                } else {
                    warn!(
                        "{} {} left the collection before its create was confirmed",
                        E::KIND,
                        temp_id
                    );
                }
            }
            Err(e) => {
                error!("Failed to create {}: {}", E::KIND, e);
                let removed = self.write(|s| {
                    s.error = Some(StoreError::from(e));
                    match s.items.remove(&temp_id) {
                        Some((_, entity)) => {
                            E::detach(&mut s.items, &entity);
                            Some(entity)
                        }
                        None => None,
                    }
                });
                if let Some(entity) = removed {
                    self.notify_entity(StoreAction::RolledBack, &entity);
                }
            }
        }
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Patch an entity locally and confirm in the background.
    ///
    /// On failure the pre-patch entity is restored verbatim, unless it was
    /// written again since.
    pub fn update(&self, id: &str, patch: E::Patch) -> StoreResult<E> {
        if is_provisional(id) {
            return Err(StoreError::Pending {
                kind: E::KIND,
                id: id.to_string(),
            });
        }

        let now = Utc::now();
        let (before, updated, edit, generation) = self.write(|s| {
            let before = s
                .items
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::not_found(E::KIND, id))?;
            s.loading = true;
            s.error = None;

            s.items.update(id, |e| e.apply_patch(&patch, now));
            E::after_patch(&mut s.items, id, &before);
            let updated = s
                .items
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::not_found(E::KIND, id))?;
            if s.current.as_ref().is_some_and(|c| c.id() == id) {
                s.current = Some(updated.clone());
            }

            s.loading = false;
            Ok::<_, StoreError>((before, updated, s.items.edit(id), s.items.generation()))
        })?;
        self.notify_entity(StoreAction::Updated, &updated);

        let store = self.clone();
        let id = id.to_string();
        self.spawn(async move {
            store
                .confirm_update(id, patch, before, edit, generation)
                .await
        });

        Ok(updated)
    }

    async fn confirm_update(
        &self,
        id: String,
        patch: E::Patch,
        before: E,
        edit: Option<u64>,
        generation: u64,
    ) {
        match E::update(self.remote.as_ref(), &id, &patch).await {
            Ok(_) => {
                debug!("{} {} update confirmed", E::KIND, id);
                self.notify_entity(StoreAction::Confirmed, &before);
                self.persist_snapshot();
            }
            Err(e) => {
                error!("Failed to update {} {}: {}", E::KIND, id, e);
                // Only a later edit of the same entity blocks the rollback;
                // renumbering around it does not
                let restored = self.write(|s| {
                    s.error = Some(StoreError::from(e));
                    if s.items.generation() != generation || s.items.edit(&id) != edit {
                        return None;
                    }
                    let (index, current) = s.items.remove(&id)?;
                    let restored = E::rolled_back(&before, &current);
                    E::detach(&mut s.items, &current);
                    E::attach(&mut s.items, &restored);
                    s.items.insert(index, restored.clone());
                    E::normalize(&mut s.items);
                    if s.current.as_ref().is_some_and(|c| c.id() == id) {
                        s.current = Some(restored.clone());
                    }
                    Some(restored)
                });
                if let Some(restored) = restored {
                    self.notify_entity(StoreAction::RolledBack, &restored);
                } else {
                    warn!(
                        "Skipping rollback of {} {}: it changed after the failed update",
                        E::KIND,
                        id
                    );
                }
            }
        }
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Remove an entity locally and confirm in the background.
    ///
    /// On failure the entity is put back where it was.
    pub fn delete(&self, id: &str) -> StoreResult<()> {
        if is_provisional(id) {
            return Err(StoreError::Pending {
                kind: E::KIND,
                id: id.to_string(),
            });
        }

        let (index, removed, was_current, generation) = self.write(|s| {
            let (index, removed) = s
                .items
                .remove(id)
                .ok_or_else(|| StoreError::not_found(E::KIND, id))?;
            s.loading = true;
            s.error = None;
            E::detach(&mut s.items, &removed);
            let was_current = s.current.as_ref().is_some_and(|c| c.id() == id);
            if was_current {
                s.current = None;
            }
            s.loading = false;
            Ok::<_, StoreError>((index, removed, was_current, s.items.generation()))
        })?;
        self.notify_entity(StoreAction::Removed, &removed);

        let store = self.clone();
        self.spawn(async move {
            store
                .confirm_delete(index, removed, was_current, generation)
                .await
        });

        Ok(())
    }

    async fn confirm_delete(&self, index: usize, removed: E, was_current: bool, generation: u64) {
        match E::delete(self.remote.as_ref(), removed.id()).await {
            Ok(()) => {
                debug!("{} {} delete confirmed", E::KIND, removed.id());
                self.notify_entity(StoreAction::Confirmed, &removed);
                self.persist_snapshot();
            }
            Err(e) => {
                error!("Failed to delete {} {}: {}", E::KIND, removed.id(), e);
                let restored = self.write(|s| {
                    s.error = Some(StoreError::from(e));
                    if s.items.generation() != generation || s.items.contains(removed.id()) {
                        return false;
                    }
                    E::attach(&mut s.items, &removed);
                    s.items.insert(index, removed.clone());
                    E::normalize(&mut s.items);
                    if was_current && s.current.is_none() {
                        s.current = Some(removed.clone());
                    }
                    true
                });
                if restored {
                    self.notify_entity(StoreAction::RolledBack, &removed);
                } else {
                    warn!(
                        "Skipping restore of {} {}: the collection changed after the failed delete",
                        E::KIND,
                        removed.id()
                    );
                }
            }
        }
    }
}
