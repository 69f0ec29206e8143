//! Realtime mood and message synchronization.
//!
//! # Architecture
//!
//! ```text
//! DataLayer change feed (moods)    ──┐
//!                                    ├─> callback ─> mpsc ─> refresh task
//! DataLayer change feed (messages) ──┘                          │
//!                                                  full re-read of the resource
//!                                                               │
//!                                            Snapshot (RwLock) + watch version
//! ```
//!
//! Notifications carry no row data. Each one triggers a full re-read of
//! the resource it names, without filtering or debouncing.

pub mod data_layer;
pub mod memory;
pub mod models;
pub mod view;

use thiserror::Error;

pub use data_layer::{
    ChangeCallback, DataLayer, DataLayerError, Record, Resource, SortDirection,
    SubscriptionHandle, CREATED_AT,
};
pub use memory::InMemoryDataLayer;
pub use models::{Message, MoodEntry, NewMessage, NewMoodEntry, Role};
pub use view::{Snapshot, SyncedView};

/// Errors from the write side of the synced view.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Input rejected before reaching the datastore.
    #[error("invalid input: {0}")]
    Invalid(String),
    /// The datastore failed the request.
    #[error(transparent)]
    DataLayer(#[from] DataLayerError),
    /// A stored row did not match the expected record shape.
    #[error("malformed record: {0}")]
    Decode(#[from] serde_json::Error),
}
