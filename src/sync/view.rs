//! Live view over mood history and chat.

// Rust guideline compliant 2026-02

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::data_layer::{ChangeCallback, DataLayer, Record, Resource, SubscriptionHandle, CREATED_AT};
use super::models::{Message, MoodEntry, NewMessage, NewMoodEntry};
use super::SyncError;

/// Current contents of both collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Mood history, newest first.
    pub moods: Vec<MoodEntry>,
    /// Chat messages, oldest first.
    pub messages: Vec<Message>,
}

/// Mood and message collections kept current from the datastore's change feeds.
///
/// Dropping the view releases both subscriptions.
pub struct SyncedView {
    data: Arc<dyn DataLayer>,
    snapshot: Arc<RwLock<Snapshot>>,
    handles: Vec<SubscriptionHandle>,
    version: watch::Receiver<u64>,
    refresher: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SyncedView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncedView")
            .field("handles", &self.handles)
            .field("version", &*self.version.borrow())
            .finish_non_exhaustive()
    }
}

impl SyncedView {
    /// Subscribe to both resources, load them, and start the refresh task.
    ///
    /// A failed initial read leaves that collection empty until the next
    /// change notification succeeds.
    pub async fn start(data: Arc<dyn DataLayer>) -> Self {
        let snapshot = Arc::new(RwLock::new(Snapshot::default()));
        let (version_tx, version_rx) = watch::channel(0u64);
        let (change_tx, change_rx) = mpsc::unbounded_channel();

        // Subscribe before the first read so no change falls between them.
        let handles = Resource::ALL
            .into_iter()
            .map(|resource| {
                let tx = change_tx.clone();
                let on_change: ChangeCallback = Arc::new(move || {
                    // Receiver is gone only after stop(); nothing left to refresh.
                    let _ = tx.send(resource);
                });
                data.subscribe_to_changes(resource, on_change)
            })
            .collect();
        drop(change_tx);

        for resource in Resource::ALL {
            refresh(data.as_ref(), &snapshot, resource).await;
        }

        let refresher = tokio::spawn(refresh_loop(
            Arc::clone(&data),
            Arc::clone(&snapshot),
            change_rx,
            version_tx,
        ));

        log::info!("[Sync] View started");
        Self {
            data,
            snapshot,
            handles,
            version: version_rx,
            refresher: Some(refresher),
        }
    }

    /// Copy of both collections.
    pub fn snapshot(&self) -> Snapshot {
        self.read().clone()
    }

    /// Mood history, newest first.
    pub fn moods(&self) -> Vec<MoodEntry> {
        self.read().moods.clone()
    }

    /// Chat messages, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.read().messages.clone()
    }

    /// Receiver whose value counts snapshot updates applied since start.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.version.clone()
    }

    /// Log a mood. The view picks it up through the change feed.
    pub async fn log_mood(&self, entry: NewMoodEntry) -> Result<MoodEntry, SyncError> {
        let stored = self
            .data
            .insert(Resource::Moods, serde_json::to_value(&entry)?)
            .await?;
        Ok(serde_json::from_value(stored)?)
    }

    /// Send a chat message. The view picks it up through the change feed.
    pub async fn send_message(&self, message: NewMessage) -> Result<Message, SyncError> {
        let stored = self
            .data
            .insert(Resource::Messages, serde_json::to_value(&message)?)
            .await?;
        Ok(serde_json::from_value(stored)?)
    }

    /// Release both subscriptions and stop refreshing. Idempotent.
    pub fn stop(&mut self) {
        for handle in self.handles.drain(..) {
            self.data.unsubscribe(handle);
        }
        if let Some(refresher) = self.refresher.take() {
            refresher.abort();
            log::info!("[Sync] View stopped");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SyncedView {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Re-read one resource per notification until every feed is released.
async fn refresh_loop(
    data: Arc<dyn DataLayer>,
    snapshot: Arc<RwLock<Snapshot>>,
    mut changes: mpsc::UnboundedReceiver<Resource>,
    version: watch::Sender<u64>,
) {
    while let Some(resource) = changes.recv().await {
        if refresh(data.as_ref(), &snapshot, resource).await {
            version.send_modify(|v| *v += 1);
        }
    }
    log::debug!("[Sync] Change feeds closed, refresh task exiting");
}

/// Full re-read of `resource`. On any failure the previous collection stays.
async fn refresh(data: &dyn DataLayer, snapshot: &RwLock<Snapshot>, resource: Resource) -> bool {
    let rows = match data
        .read_ordered(resource, CREATED_AT, resource.default_order())
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            log::warn!("[Sync] Re-read of {resource} failed, keeping previous snapshot: {e}");
            return false;
        }
    };

    let count = rows.len();
    let applied = match resource {
        Resource::Moods => decode_rows(rows).map(|moods| write(snapshot).moods = moods),
        Resource::Messages => decode_rows(rows).map(|messages| write(snapshot).messages = messages),
    };

    match applied {
        Ok(()) => {
            log::debug!("[Sync] Reloaded {count} {resource} record(s)");
            true
        }
        Err(e) => {
            log::warn!("[Sync] Malformed {resource} record, keeping previous snapshot: {e}");
            false
        }
    }
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Record>) -> Result<Vec<T>, serde_json::Error> {
    rows.into_iter().map(serde_json::from_value).collect()
}

fn write(snapshot: &RwLock<Snapshot>) -> RwLockWriteGuard<'_, Snapshot> {
    snapshot.write().unwrap_or_else(PoisonError::into_inner)
}
