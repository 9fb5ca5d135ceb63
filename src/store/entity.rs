//! What a store needs to know about the entities it holds

use super::collection::Collection;
use crate::api::{ApiResult, FieldErrors, RemoteClient};
use crate::events::EntityType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Prefix of ids minted locally for entities the server has not confirmed
pub const PROVISIONAL_PREFIX: &str = "temp_";

static LAST_PROVISIONAL: AtomicU64 = AtomicU64::new(0);

/// Whether `id` was minted locally by [`provisional_id`]
pub fn is_provisional(id: &str) -> bool {
    id.starts_with(PROVISIONAL_PREFIX)
}

/// Mint a provisional id: `temp_` followed by the current time in
/// milliseconds, bumped so that ids are strictly increasing within a process.
pub fn provisional_id() -> String {
    let now = Utc::now().timestamp_millis().max(0) as u64;
    let mut last = LAST_PROVISIONAL.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_PROVISIONAL.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return format!("{}{}", PROVISIONAL_PREFIX, next),
            Err(actual) => last = actual,
        }
    }
}

/// A record held by an [`EntityStore`](super::EntityStore).
///
/// The hooks at the bottom let an entity keep collection-wide invariants
/// (such as the task order index) across inserts, removals and rollbacks.
/// They default to doing nothing.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Body used to create the entity
    type Draft: Clone + Send + Sync + 'static;
    /// Partial body used to update the entity
    type Patch: Clone + Send + Sync + 'static;

    const KIND: EntityType;

    /// New entities go to the front of the list instead of the back
    const INSERT_FRONT: bool = false;

    fn id(&self) -> &str;

    fn updated_at(&self) -> DateTime<Utc>;

    /// Owning project, carried on events
    fn project_id(&self) -> Option<&str> {
        None
    }

    /// Local checks run before anything is inserted
    fn validate(draft: &Self::Draft) -> Result<(), FieldErrors>;

    /// Build the local stand-in for a create that is still in flight
    fn provisional(id: String, draft: &Self::Draft, items: &Collection<Self>, now: DateTime<Utc>) -> Self;

    /// Apply `patch` in place and bump `updatedAt`
    fn apply_patch(&mut self, patch: &Self::Patch, now: DateTime<Utc>);

    /// Called after `id` was patched; `before` is the pre-patch copy
    fn after_patch(_items: &mut Collection<Self>, _id: &str, _before: &Self) {}

    /// The entity a failed update puts back, given the pre-patch copy and
    /// what the slot holds now
    fn rolled_back(before: &Self, _current: &Self) -> Self {
        before.clone()
    }

    /// Called after `removed` left the collection
    fn detach(_items: &mut Collection<Self>, _removed: &Self) {}

    /// Called right before `restored` goes back into the collection
    fn attach(_items: &mut Collection<Self>, _restored: &Self) {}

    /// Called after a confirmation or rollback rewrote the collection
    fn normalize(_items: &mut Collection<Self>) {}
}

/// Remote operations for an entity kind
#[async_trait]
pub trait Resource: Entity {
    /// Filters sent with a list request
    type Query: Clone + Send + Sync + 'static;

    async fn list(remote: &dyn RemoteClient, query: &Self::Query) -> ApiResult<Vec<Self>>;

    async fn fetch(remote: &dyn RemoteClient, id: &str) -> ApiResult<Self>;

    async fn create(remote: &dyn RemoteClient, draft: &Self::Draft) -> ApiResult<Self>;

    async fn update(remote: &dyn RemoteClient, id: &str, patch: &Self::Patch) -> ApiResult<Self>;

    async fn delete(remote: &dyn RemoteClient, id: &str) -> ApiResult<()>;
}

/// Shorthand for building a single-field error map
pub(crate) fn field_error(field: &str, message: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.insert(field.to_string(), vec![message.to_string()]);
    errors
}
