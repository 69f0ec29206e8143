//! Capabilities the synced view needs from the realtime datastore.
//!
//! The hosted datastore offers ordered reads and per-table change feeds.
//! Change callbacks carry no payload: subscribers are expected to re-read.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// A datastore row as a JSON object.
pub type Record = serde_json::Value;

/// Callback fired on any insert, update or delete of a resource.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Column every resource is ordered by.
pub const CREATED_AT: &str = "created_at";

/// A table in the datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Mood entries.
    Moods,
    /// Chat messages.
    Messages,
}

impl Resource {
    /// Every resource, in a fixed order.
    pub const ALL: [Self; 2] = [Self::Moods, Self::Messages];

    /// Table name in the datastore.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Moods => "moods",
            Self::Messages => "messages",
        }
    }

    /// How the view lists this resource: mood history newest first, chat
    /// oldest first.
    pub fn default_order(self) -> SortDirection {
        match self {
            Self::Moods => SortDirection::Descending,
            Self::Messages => SortDirection::Ascending,
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction for ordered reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Handle returned by [`DataLayer::subscribe_to_changes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// Errors reported by a data layer.
#[derive(Debug, Error)]
pub enum DataLayerError {
    /// Rows must be JSON objects.
    #[error("record for {0} must be a JSON object")]
    NotAnObject(Resource),
    /// No row with that id.
    #[error("no {resource} record with id {id}")]
    NotFound {
        /// Resource searched.
        resource: Resource,
        /// Missing id.
        id: String,
    },
    /// The backing datastore rejected or failed the request.
    #[error("datastore request failed: {0}")]
    Backend(String),
}

/// Realtime datastore capability.
#[async_trait]
pub trait DataLayer: Send + Sync {
    /// Fetch all current records of `resource` sorted by `order_field`.
    async fn read_ordered(
        &self,
        resource: Resource,
        order_field: &str,
        direction: SortDirection,
    ) -> Result<Vec<Record>, DataLayerError>;

    /// Append a record; the datastore assigns `id` and `created_at`.
    async fn insert(&self, resource: Resource, record: Record) -> Result<Record, DataLayerError>;

    /// Register `on_any_change` for every change to `resource`.
    fn subscribe_to_changes(
        &self,
        resource: Resource,
        on_any_change: ChangeCallback,
    ) -> SubscriptionHandle;

    /// Release a subscription. Unknown handles are ignored.
    fn unsubscribe(&self, handle: SubscriptionHandle);
}
