//! Store change notifications
//!
//! This module provides:
//! - `StoreEvent` — emitted after every local mutation, confirmation and rollback
//! - `EventBus` — broadcast channel a UI layer subscribes to

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{EntityType, EventEmitter, StoreAction, StoreEvent};
