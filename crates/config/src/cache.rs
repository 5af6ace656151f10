use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    settings::{keys, Settings},
    store::{Area, SettingsStore, ValueMap},
    Result,
};

/// The single authoritative in-memory settings snapshot.
///
/// Readers grab the current `Arc<Settings>` synchronously; the snapshot is
/// replaced wholesale when the store reports changes or a write goes
/// through. Any operation spanning more than one await point must re-read
/// the snapshot rather than hold a captured copy.
pub struct SettingsCache {
    store: Arc<dyn SettingsStore>,
    current: RwLock<Arc<Settings>>,
    tx: broadcast::Sender<Arc<Settings>>,
}

impl SettingsCache {
    /// Create a cache over a store, starting from defaults.
    pub fn new(store: Arc<dyn SettingsStore>) -> Arc<Self> {
        let (tx, _) = broadcast::channel(16);
        Arc::new(Self {
            store,
            current: RwLock::new(Arc::new(Settings::default())),
            tx,
        })
    }

    /// The latest snapshot.
    pub fn snapshot(&self) -> Arc<Settings> {
        self.current.read().clone()
    }

    /// Subscribe to replacement snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Settings>> {
        self.tx.subscribe()
    }

    /// Load the snapshot from the store. A store failure keeps the last
    /// known snapshot (defaults on first load) rather than propagating.
    pub async fn load(&self) -> Arc<Settings> {
        match self.store.get(Area::Synced, keys::SYNCED).await {
            Ok(values) => self.replace(self.snapshot().merged(&values)),
            Err(e) => {
                warn!("settings load failed, keeping last known values: {}", e);
                self.snapshot()
            }
        }
    }

    /// Write `values` through to the synced area and apply them to the
    /// snapshot immediately. The store's own change echo is a no-op merge.
    pub async fn persist(&self, values: ValueMap) -> Result<()> {
        self.store.set(Area::Synced, values.clone()).await?;
        self.replace(self.snapshot().merged(&values));
        Ok(())
    }

    /// Spawn the pump that applies store change notifications.
    pub fn spawn_watch(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = self.clone();
        let mut rx = self.store.watch();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(batch) => {
                        if batch.area != Area::Synced {
                            continue;
                        }
                        debug!(keys = batch.values.len(), "settings change batch");
                        cache.replace(cache.snapshot().merged(&batch.values));
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("settings watch lagged by {} batches, reloading", n);
                        cache.load().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Stash the transient scroll-target marker in the local area.
    pub async fn set_scroll_marker(&self, id: &str) -> Result<()> {
        let mut values = ValueMap::new();
        values.insert(
            keys::SCROLL_TO_SHORTCUT.into(),
            Value::String(id.to_string()),
        );
        self.store.set(Area::Local, values).await
    }

    /// Read and clear the scroll-target marker in one step.
    pub async fn take_scroll_marker(&self) -> Option<String> {
        let values = self
            .store
            .get(Area::Local, &[keys::SCROLL_TO_SHORTCUT])
            .await
            .ok()?;
        let id = values
            .get(keys::SCROLL_TO_SHORTCUT)
            .and_then(Value::as_str)
            .map(str::to_string)?;
        if let Err(e) = self.store.remove(Area::Local, keys::SCROLL_TO_SHORTCUT).await {
            debug!("could not clear scroll marker: {}", e);
        }
        Some(id)
    }

    /// Install a new snapshot and notify subscribers.
    fn replace(&self, next: Settings) -> Arc<Settings> {
        let next = Arc::new(next);
        *self.current.write() = next.clone();
        let _ = self.tx.send(next.clone());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn load_merges_stored_values_over_defaults() {
        let store = Arc::new(MemoryStore::new());
        store.seed(Area::Synced, keys::DARK_MODE, Value::Bool(false));
        let cache = SettingsCache::new(store);
        let s = cache.load().await;
        assert!(!s.dark_mode);
        assert!(s.vim_enabled);
    }

    #[tokio::test]
    async fn load_failure_keeps_defaults() {
        let store = Arc::new(MemoryStore::new());
        store.fail_reads(true);
        let cache = SettingsCache::new(store);
        let s = cache.load().await;
        assert_eq!(*s, Settings::default());
    }

    #[tokio::test]
    async fn watch_replaces_snapshot_wholesale() {
        let store = Arc::new(MemoryStore::new());
        let cache = SettingsCache::new(store.clone());
        let _pump = cache.spawn_watch();
        let mut sub = cache.subscribe();

        let mut values = ValueMap::new();
        values.insert(keys::VIM_ENABLED.into(), Value::Bool(false));
        store
            .set(Area::Synced, values)
            .await
            .expect("store set");

        let next = sub.recv().await.expect("snapshot");
        assert!(!next.vim_enabled);
        assert!(!cache.snapshot().vim_enabled);
    }

    #[tokio::test]
    async fn persist_applies_immediately() {
        let store = Arc::new(MemoryStore::new());
        let cache = SettingsCache::new(store);
        let mut values = ValueMap::new();
        values.insert(keys::CELEBRATION.into(), Value::Bool(true));
        cache.persist(values).await.expect("persist");
        assert!(cache.snapshot().celebration);
    }

    #[tokio::test]
    async fn scroll_marker_is_take_once() {
        let store = Arc::new(MemoryStore::new());
        let cache = SettingsCache::new(store);
        cache.set_scroll_marker("custom-9").await.expect("set");
        assert_eq!(cache.take_scroll_marker().await.as_deref(), Some("custom-9"));
        assert_eq!(cache.take_scroll_marker().await, None);
    }
}
