//! Optimistic client-side stores
//!
//! Every store owns a [`Collection`] mirrored from the server. Mutations are
//! applied locally and returned at once; a background task confirms them
//! against the [`RemoteClient`](crate::api::RemoteClient) and rolls the local
//! change back if the server refuses it.
//!
//! - [`EntityStore`] — the generic protocol (create, update, delete, fetch)
//! - [`ProjectStore`] / [`TaskStore`] — filters, stats, persistence and derived views
//! - [`ordering`] — the dense per-status order index of tasks

mod collection;
mod entity;
mod entity_store;
pub mod filter;
pub mod ordering;
pub mod persist;
mod project_store;
mod task_store;

pub use collection::Collection;
pub use entity::{is_provisional, provisional_id, Entity, Resource, PROVISIONAL_PREFIX};
pub use entity_store::{EntityStore, SnapshotSink};
pub use filter::{AssigneeFilter, Filterable, ProjectFilters, SortValue, TaskFilters};
pub use persist::{JsonFileStore, KeyValueStore, MemoryStore};
pub use project_store::ProjectStore;
pub use task_store::TaskStore;

use crate::api::{ApiError, FieldErrors};
use crate::events::EntityType;
use thiserror::Error;

/// Errors returned synchronously by store actions, or by awaited fetches
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityType, id: String },

    /// The entity only exists locally; its create has not been confirmed yet
    #[error("{kind} {id} is still being created")]
    Pending { kind: EntityType, id: String },

    /// The draft failed local validation, nothing was changed
    #[error("validation failed: {}", describe_fields(.0))]
    Invalid(FieldErrors),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl StoreError {
    pub fn not_found(kind: EntityType, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    /// Field-level messages from local or server-side validation
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Invalid(fields) => Some(fields),
            Self::Api(err) => err.field_errors(),
            _ => None,
        }
    }
}

fn describe_fields(fields: &FieldErrors) -> String {
    fields
        .iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for store actions
pub type StoreResult<T> = std::result::Result<T, StoreError>;
