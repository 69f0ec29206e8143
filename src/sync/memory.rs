//! Process-local [`DataLayer`] for tests and local development.
//!
//! Rows live in memory only. Ordering follows the datastore's defaults:
//! nulls sort last ascending and first descending, RFC 3339 timestamps
//! compare as instants, ties keep insertion order.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::data_layer::{
    ChangeCallback, DataLayer, DataLayerError, Record, Resource, SortDirection,
    SubscriptionHandle, CREATED_AT,
};

#[derive(Default)]
struct Inner {
    rows: HashMap<Resource, Vec<Record>>,
    subscriptions: HashMap<SubscriptionHandle, (Resource, ChangeCallback)>,
    next_handle: u64,
}

/// In-memory realtime datastore.
#[derive(Default)]
pub struct InMemoryDataLayer {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for InMemoryDataLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("InMemoryDataLayer")
            .field("moods", &inner.rows.get(&Resource::Moods).map_or(0, Vec::len))
            .field("messages", &inner.rows.get(&Resource::Messages).map_or(0, Vec::len))
            .field("subscriptions", &inner.subscriptions.len())
            .finish()
    }
}

impl InMemoryDataLayer {
    /// Create an empty datastore.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge `patch` into the row with `id`.
    pub fn update(
        &self,
        resource: Resource,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Record, DataLayerError> {
        let updated = {
            let mut inner = self.lock();
            let row = inner
                .rows
                .entry(resource)
                .or_default()
                .iter_mut()
                .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
                .ok_or_else(|| DataLayerError::NotFound {
                    resource,
                    id: id.to_string(),
                })?;
            if let Value::Object(fields) = row {
                fields.extend(patch);
            }
            row.clone()
        };
        self.notify(resource);
        Ok(updated)
    }

    /// Remove the row with `id`.
    pub fn delete(&self, resource: Resource, id: &str) -> Result<(), DataLayerError> {
        {
            let mut inner = self.lock();
            let rows = inner.rows.entry(resource).or_default();
            let before = rows.len();
            rows.retain(|row| row.get("id").and_then(Value::as_str) != Some(id));
            if rows.len() == before {
                return Err(DataLayerError::NotFound {
                    resource,
                    id: id.to_string(),
                });
            }
        }
        self.notify(resource);
        Ok(())
    }

    /// Number of live subscriptions across all resources.
    pub fn subscription_count(&self) -> usize {
        self.lock().subscriptions.len()
    }

    /// Fire every callback registered for `resource`.
    ///
    /// Callbacks run after the lock is released so they may call back in.
    fn notify(&self, resource: Resource) {
        let callbacks: Vec<ChangeCallback> = self
            .lock()
            .subscriptions
            .values()
            .filter(|(r, _)| *r == resource)
            .map(|(_, cb)| std::sync::Arc::clone(cb))
            .collect();
        log::trace!("[Sync] {} change, notifying {} subscriber(s)", resource, callbacks.len());
        for callback in callbacks {
            callback();
        }
    }
}

#[async_trait]
impl DataLayer for InMemoryDataLayer {
    async fn read_ordered(
        &self,
        resource: Resource,
        order_field: &str,
        direction: SortDirection,
    ) -> Result<Vec<Record>, DataLayerError> {
        let mut rows = self.lock().rows.get(&resource).cloned().unwrap_or_default();
        rows.sort_by(|a, b| {
            let ordering = compare_field(a.get(order_field), b.get(order_field));
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
        Ok(rows)
    }

    async fn insert(&self, resource: Resource, record: Record) -> Result<Record, DataLayerError> {
        let Value::Object(mut fields) = record else {
            return Err(DataLayerError::NotAnObject(resource));
        };
        fields
            .entry("id")
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
        fields.entry(CREATED_AT).or_insert_with(|| {
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        });

        let stored = Value::Object(fields);
        self.lock()
            .rows
            .entry(resource)
            .or_default()
            .push(stored.clone());
        self.notify(resource);
        Ok(stored)
    }

    fn subscribe_to_changes(
        &self,
        resource: Resource,
        on_any_change: ChangeCallback,
    ) -> SubscriptionHandle {
        let mut inner = self.lock();
        inner.next_handle += 1;
        let handle = SubscriptionHandle(inner.next_handle);
        inner.subscriptions.insert(handle, (resource, on_any_change));
        log::debug!("[Sync] Subscribed {:?} to {}", handle, resource);
        handle
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if self.lock().subscriptions.remove(&handle).is_some() {
            log::debug!("[Sync] Unsubscribed {:?}", handle);
        }
    }
}

/// Ascending comparison of two optional column values, nulls last.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare_values(a, b),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, ChangeCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&count);
        let callback: ChangeCallback = Arc::new(move || {
            hits.fetch_add(1, AtomicOrdering::SeqCst);
        });
        (count, callback)
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamp() {
        let store = InMemoryDataLayer::new();
        let stored = store
            .insert(Resource::Messages, json!({"role": "boy", "content": "hi"}))
            .await
            .unwrap();
        assert!(uuid::Uuid::parse_str(stored["id"].as_str().unwrap()).is_ok());
        assert!(DateTime::parse_from_rfc3339(stored[CREATED_AT].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_insert_rejects_non_objects() {
        let store = InMemoryDataLayer::new();
        let err = store.insert(Resource::Moods, json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, DataLayerError::NotAnObject(Resource::Moods)));
    }

    #[tokio::test]
    async fn test_read_ordered_by_timestamp_both_directions() {
        let store = InMemoryDataLayer::new();
        for (id, at) in [
            ("b", "2026-01-02T00:00:00Z"),
            ("a", "2026-01-01T00:00:00Z"),
            ("c", "2026-01-01T23:00:00-02:00"),
        ] {
            store
                .insert(Resource::Moods, json!({"id": id, "created_at": at}))
                .await
                .unwrap();
        }

        let ids = |rows: Vec<Record>| -> Vec<String> {
            rows.iter().map(|r| r["id"].as_str().unwrap().to_string()).collect()
        };

        // "c" is 2026-01-02T01:00Z once the offset is applied
        let asc = store
            .read_ordered(Resource::Moods, CREATED_AT, SortDirection::Ascending)
            .await
            .unwrap();
        assert_eq!(ids(asc), ["a", "b", "c"]);

        let desc = store
            .read_ordered(Resource::Moods, CREATED_AT, SortDirection::Descending)
            .await
            .unwrap();
        assert_eq!(ids(desc), ["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_nulls_last_ascending_first_descending() {
        let store = InMemoryDataLayer::new();
        store.insert(Resource::Moods, json!({"id": "x", "rank": null})).await.unwrap();
        store.insert(Resource::Moods, json!({"id": "y", "rank": 2})).await.unwrap();
        store.insert(Resource::Moods, json!({"id": "z", "rank": 1})).await.unwrap();

        let asc = store
            .read_ordered(Resource::Moods, "rank", SortDirection::Ascending)
            .await
            .unwrap();
        assert_eq!(asc[0]["id"], "z");
        assert_eq!(asc[2]["id"], "x");

        let desc = store
            .read_ordered(Resource::Moods, "rank", SortDirection::Descending)
            .await
            .unwrap();
        assert_eq!(desc[0]["id"], "x");
        assert_eq!(desc[1]["id"], "y");
    }

    #[tokio::test]
    async fn test_callbacks_fire_per_resource_until_unsubscribed() {
        let store = InMemoryDataLayer::new();
        let (mood_hits, on_mood) = counter();
        let (message_hits, on_message) = counter();
        let mood_handle = store.subscribe_to_changes(Resource::Moods, on_mood);
        store.subscribe_to_changes(Resource::Messages, on_message);
        assert_eq!(store.subscription_count(), 2);

        store.insert(Resource::Moods, json!({"id": "m1"})).await.unwrap();
        store.update(Resource::Moods, "m1", Map::from_iter([("notes".to_string(), json!("x"))])).unwrap();
        store.delete(Resource::Moods, "m1").unwrap();
        assert_eq!(mood_hits.load(AtomicOrdering::SeqCst), 3);
        assert_eq!(message_hits.load(AtomicOrdering::SeqCst), 0);

        store.unsubscribe(mood_handle);
        store.unsubscribe(mood_handle);
        store.insert(Resource::Moods, json!({"id": "m2"})).await.unwrap();
        assert_eq!(mood_hits.load(AtomicOrdering::SeqCst), 3);
        assert_eq!(store.subscription_count(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_id() {
        let store = InMemoryDataLayer::new();
        assert!(matches!(
            store.update(Resource::Messages, "nope", Map::new()),
            Err(DataLayerError::NotFound { .. })
        ));
        assert!(store.delete(Resource::Messages, "nope").is_err());
    }
}
