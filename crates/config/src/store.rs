use std::{collections::HashMap, sync::atomic::{AtomicBool, Ordering}};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::{Error, Result};

/// Map of storage keys to JSON values, the store's native shape.
pub type ValueMap = serde_json::Map<String, Value>;

/// Storage scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    /// Preferences shared across devices.
    Synced,
    /// Ephemeral, device-only data.
    Local,
}

/// One change notification: the area and the new values per changed key.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    /// Scope the change happened in.
    pub area: Area,
    /// New values, keyed by storage key.
    pub values: ValueMap,
}

/// The persistent, asynchronous key-value store the browser side exposes.
///
/// Implementations must never panic on malformed data; `get` returns only
/// the keys that exist, and callers merge over defaults.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Fetch the stored values for `keys` (missing keys are omitted).
    async fn get(&self, area: Area, keys: &[&str]) -> Result<ValueMap>;

    /// Persist `values` into `area`.
    async fn set(&self, area: Area, values: ValueMap) -> Result<()>;

    /// Remove `key` from `area`.
    async fn remove(&self, area: Area, key: &str) -> Result<()>;

    /// Subscribe to change notifications. Writes through `set` and `remove`
    /// are reported here as well, so caches see their own writes echoed.
    fn watch(&self) -> broadcast::Receiver<ChangeBatch>;
}

/// In-memory store used by tests and headless runs.
///
/// Failure injection flips reads or writes into store errors, which is how
/// the degradation paths (defaults on read, notify-once on write) get
/// exercised.
pub struct MemoryStore {
    areas: Mutex<HashMap<Area, ValueMap>>,
    tx: broadcast::Sender<ChangeBatch>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            areas: Mutex::new(HashMap::new()),
            tx,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Seed a value without emitting a change notification.
    pub fn seed(&self, area: Area, key: &str, value: Value) {
        self.areas
            .lock()
            .entry(area)
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Make subsequent reads fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Current value for a key, if stored.
    pub fn value(&self, area: Area, key: &str) -> Option<Value> {
        self.areas.lock().get(&area).and_then(|m| m.get(key)).cloned()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, area: Area, keys: &[&str]) -> Result<ValueMap> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Store("simulated read failure".into()));
        }
        let areas = self.areas.lock();
        let mut out = ValueMap::new();
        if let Some(map) = areas.get(&area) {
            for key in keys {
                if let Some(v) = map.get(*key) {
                    out.insert((*key).to_string(), v.clone());
                }
            }
        }
        Ok(out)
    }

    async fn set(&self, area: Area, values: ValueMap) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Store("simulated write failure".into()));
        }
        {
            let mut areas = self.areas.lock();
            let map = areas.entry(area).or_default();
            for (k, v) in &values {
                map.insert(k.clone(), v.clone());
            }
        }
        let _ = self.tx.send(ChangeBatch { area, values });
        Ok(())
    }

    async fn remove(&self, area: Area, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Store("simulated write failure".into()));
        }
        let removed = {
            let mut areas = self.areas.lock();
            areas.get_mut(&area).and_then(|m| m.remove(key))
        };
        if removed.is_some() {
            let mut values = ValueMap::new();
            values.insert(key.to_string(), Value::Null);
            let _ = self.tx.send(ChangeBatch { area, values });
        }
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<ChangeBatch> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_only_present_keys() {
        let store = MemoryStore::new();
        store.seed(Area::Synced, "vimEnabled", Value::Bool(false));
        let got = store
            .get(Area::Synced, &["vimEnabled", "darkMode"])
            .await
            .expect("get");
        assert_eq!(got.len(), 1);
        assert_eq!(got.get("vimEnabled"), Some(&Value::Bool(false)));
    }

    #[tokio::test]
    async fn set_echoes_a_change_batch() {
        let store = MemoryStore::new();
        let mut rx = store.watch();
        let mut values = ValueMap::new();
        values.insert("darkMode".into(), Value::Bool(false));
        store.set(Area::Synced, values).await.expect("set");
        let batch = rx.recv().await.expect("change");
        assert_eq!(batch.area, Area::Synced);
        assert_eq!(batch.values.get("darkMode"), Some(&Value::Bool(false)));
    }

    #[tokio::test]
    async fn areas_are_separate() {
        let store = MemoryStore::new();
        store.seed(Area::Local, "scrollToShortcut", Value::String("custom-1".into()));
        let synced = store
            .get(Area::Synced, &["scrollToShortcut"])
            .await
            .expect("get");
        assert!(synced.is_empty());
    }

    #[tokio::test]
    async fn failure_injection() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        let res = store.set(Area::Synced, ValueMap::new()).await;
        assert!(res.is_err());
        store.fail_reads(true);
        assert!(store.get(Area::Synced, &["x"]).await.is_err());
    }
}
