//! Store change event types

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of entity a store manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Project,
    Task,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project => write!(f, "project"),
            Self::Task => write!(f, "task"),
        }
    }
}

/// What happened to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreAction {
    /// The collection or the current slot was replaced by a fetch
    Loaded,
    /// A provisional entity was inserted locally
    Inserted,
    /// The server confirmed a local mutation
    Confirmed,
    /// An entity was patched locally
    Updated,
    /// A task changed column or position
    Reordered,
    /// An entity was removed locally
    Removed,
    /// A failed confirmation restored the previous state
    RolledBack,
}

/// A change notification emitted by a store
///
/// Must be Clone for `tokio::sync::broadcast`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEvent {
    pub entity_type: EntityType,
    pub action: StoreAction,
    /// Empty for collection-wide events such as a full fetch
    pub entity_id: String,
    /// ISO 8601 timestamp
    pub timestamp: String,
    /// Owning project, for task events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl StoreEvent {
    /// Create a new StoreEvent with the current timestamp
    pub fn new(entity_type: EntityType, action: StoreAction, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type,
            action,
            entity_id: entity_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            project_id: None,
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

/// Anything that can publish store events
///
/// Implementations must never block and never fail loudly.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: StoreEvent);

    fn emit_action(&self, entity_type: EntityType, action: StoreAction, entity_id: &str) {
        self.emit(StoreEvent::new(entity_type, action, entity_id));
    }
}
