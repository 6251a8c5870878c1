use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::TagStore;
use crate::error::{with_retry, RetryPolicy};
use crate::tags::{StoredTags, TagRegistry, TagSnapshot};

/// Loads the registry at startup and writes it back after every change.
///
/// Failures never reach the registry: a failed load leaves it empty, a failed
/// save leaves the in-memory state untouched until the next save succeeds.
pub struct TagPersistence {
    store: Arc<dyn TagStore>,
    registry: Arc<TagRegistry>,
    retry: RetryPolicy,
}

impl TagPersistence {
    pub fn new(store: Arc<dyn TagStore>, registry: Arc<TagRegistry>) -> Self {
        Self {
            store,
            registry,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Populate the registry from storage. Returns whether saved state was
    /// found and imported.
    pub async fn load(&self) -> bool {
        let store = Arc::clone(&self.store);
        let loaded = tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(|err| anyhow!("failed to join storage task: {err}"))
            .and_then(|result| result);

        match loaded {
            Ok(Some(record)) => {
                let snapshot = TagSnapshot::from_stored(record);
                let count = snapshot.tags.len();
                self.registry.import_snapshot(snapshot);
                tracing::info!(tags = count, "tags loaded from storage");
                true
            }
            Ok(None) => {
                tracing::info!("no saved tags found");
                false
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "failed to load tags from storage");
                false
            }
        }
    }

    /// Write the current registry state. Returns whether the write succeeded.
    pub async fn save(&self) -> bool {
        let record = self.registry.export_snapshot().to_stored();
        match self.write(record).await {
            Ok(()) => {
                tracing::debug!("tags saved to storage");
                true
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "failed to save tags to storage");
                false
            }
        }
    }

    async fn write(&self, record: StoredTags) -> Result<()> {
        let record = Arc::new(record);
        with_retry(&self.retry, || {
            let store = Arc::clone(&self.store);
            let record = Arc::clone(&record);
            async move {
                tokio::task::spawn_blocking(move || store.save(&record))
                    .await
                    .map_err(|err| anyhow!("failed to join storage task: {err}"))?
            }
        })
        .await
    }

    /// Wipe the stored record and every tag assignment.
    pub async fn clear(&self) -> bool {
        let store = Arc::clone(&self.store);
        let cleared = tokio::task::spawn_blocking(move || store.clear())
            .await
            .map_err(|err| anyhow!("failed to join storage task: {err}"))
            .and_then(|result| result);

        match cleared {
            Ok(()) => {
                self.registry.clear();
                tracing::info!("tags cleared from storage");
                true
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "failed to clear tags from storage");
                false
            }
        }
    }

    /// Save after every registry change notification until aborted.
    pub fn spawn_autosave(self: Arc<Self>) -> AutosaveHandle {
        let mut changes = self.registry.subscribe();
        let (settled_tx, settled_rx) = watch::channel(self.registry.generation());
        let registry = Arc::clone(&self.registry);

        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        // Collapse a burst of notifications into one save.
                        while changes.try_recv().is_ok() {}
                        let generation = self.registry.generation();
                        self.save().await;
                        settled_tx.send_replace(generation);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        AutosaveHandle {
            task,
            settled: settled_rx,
            registry,
        }
    }
}

/// Handle to the autosave task.
pub struct AutosaveHandle {
    task: JoinHandle<()>,
    settled: watch::Receiver<u64>,
    registry: Arc<TagRegistry>,
}

impl AutosaveHandle {
    /// Wait until every change made so far has been through a save attempt.
    pub async fn flush(&mut self) {
        let target = self.registry.generation();
        let _ = self.settled.wait_for(|settled| *settled >= target).await;
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::tags::TagColor;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_load_imports_record() {
        let record = StoredTags {
            tags: BTreeMap::from([("/a".to_string(), "Green".to_string())]),
            tag_names: BTreeMap::from([("Green".to_string(), "Done".to_string())]),
        };
        let store = Arc::new(MemoryStore::with_record(&record).unwrap());
        let registry = Arc::new(TagRegistry::new());
        let persistence = TagPersistence::new(store, Arc::clone(&registry));

        assert!(persistence.load().await);
        assert_eq!(registry.get_tag("/a"), Some(TagColor::Green));
        assert_eq!(registry.display_name(TagColor::Green), "Done");
        assert_eq!(registry.generation(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_registry_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set_failing(true);
        let registry = Arc::new(TagRegistry::new());
        let persistence = TagPersistence::new(store, Arc::clone(&registry));

        assert!(!persistence.load().await);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_keeps_memory_state() {
        let store = Arc::new(MemoryStore::new());
        store.set_failing(true);
        let registry = Arc::new(TagRegistry::new());
        let persistence = TagPersistence::new(store.clone(), Arc::clone(&registry))
            .with_retry(RetryPolicy::with_attempts(2));

        registry.set_tag("/a", TagColor::Red);
        assert!(!persistence.save().await);
        assert_eq!(registry.get_tag("/a"), Some(TagColor::Red));

        store.set_failing(false);
        assert!(persistence.save().await);
        assert!(store.raw().unwrap().contains("/a"));
    }

    #[tokio::test]
    async fn test_autosave_follows_changes() {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(TagRegistry::new());
        let persistence = Arc::new(TagPersistence::new(store.clone(), Arc::clone(&registry)));
        let mut autosave = persistence.spawn_autosave();

        registry.set_tag("/a", TagColor::Red);
        registry.set_tag("/b", TagColor::Blue);
        registry.set_display_name(TagColor::Blue, "Docs");
        autosave.flush().await;

        let saved = StoredTags::from_json(&store.raw().unwrap()).unwrap();
        assert_eq!(saved.tags.len(), 2);
        assert_eq!(saved.tag_names["Blue"], "Docs");
        assert!(store.save_count() >= 1);
    }

    #[tokio::test]
    async fn test_clear_wipes_store_and_registry() {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(TagRegistry::new());
        let persistence = TagPersistence::new(store.clone(), Arc::clone(&registry));

        registry.set_tag("/a", TagColor::Red);
        persistence.save().await;
        assert!(persistence.clear().await);

        assert!(registry.is_empty());
        assert_eq!(store.raw(), None);
    }
}
