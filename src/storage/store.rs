use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::Database;
use crate::tags::StoredTags;

/// Key under which the tag record is stored.
pub const STORAGE_KEY: &str = "dx-tags.data";

/// Durable home of the tag record. Implementations may block; callers run
/// them on the blocking pool.
pub trait TagStore: Send + Sync + 'static {
    fn load(&self) -> Result<Option<StoredTags>>;
    fn save(&self, record: &StoredTags) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Stores the record as a JSON blob in the workspace state database.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Result<Self> {
        db.initialize()?;
        Ok(Self { db })
    }
}

impl TagStore for SqliteStore {
    fn load(&self) -> Result<Option<StoredTags>> {
        self.db
            .get(STORAGE_KEY)?
            .map(|raw| StoredTags::from_json(&raw))
            .transpose()
    }

    fn save(&self, record: &StoredTags) -> Result<()> {
        self.db.put(STORAGE_KEY, &record.to_json()?)
    }

    fn clear(&self) -> Result<()> {
        self.db.delete(STORAGE_KEY)?;
        Ok(())
    }
}

/// In-process store, mainly for tests. Can be told to fail writes.
#[derive(Default)]
pub struct MemoryStore {
    record: Mutex<Option<String>>,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: &StoredTags) -> Result<Self> {
        let store = Self::new();
        *store.record.lock() = Some(record.to_json()?);
        Ok(store)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn raw(&self) -> Option<String> {
        self.record.lock().clone()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("memory store is unavailable"));
        }
        Ok(())
    }
}

impl TagStore for MemoryStore {
    fn load(&self) -> Result<Option<StoredTags>> {
        self.check()?;
        self.record
            .lock()
            .as_deref()
            .map(StoredTags::from_json)
            .transpose()
    }

    fn save(&self, record: &StoredTags) -> Result<()> {
        self.check()?;
        *self.record.lock() = Some(record.to_json()?);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.check()?;
        *self.record.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record() -> StoredTags {
        StoredTags {
            tags: BTreeMap::from([("/p/a.rs".to_string(), "Red".to_string())]),
            tag_names: BTreeMap::from([("Red".to_string(), "Hot".to_string())]),
        }
    }

    #[test]
    fn test_sqlite_store_round_trip() {
        let store = SqliteStore::new(Database::in_memory().unwrap()).unwrap();
        assert_eq!(store.load().unwrap(), None);

        store.save(&record()).unwrap();
        assert_eq!(store.load().unwrap(), Some(record()));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_memory_store_failure_switch() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(store.save(&record()).is_err());
        assert_eq!(store.save_count(), 0);

        store.set_failing(false);
        store.save(&record()).unwrap();
        assert_eq!(store.save_count(), 1);
        assert!(store.raw().unwrap().contains("tagNames"));
    }
}
