//! In-memory tag store.
//!
//! The registry owns two maps: tagged path -> [`TagColor`] and color ->
//! custom display name. Every mutation publishes a [`TagsChanged`]
//! notification on a broadcast channel. The notification carries no data;
//! observers re-query whatever state they need.
//!
//! Mutations that belong together (a folder rename touching many paths, a
//! sweep removing several stale entries) go through [`TagRegistry::batch`],
//! which publishes a single notification once the whole batch is applied.

use parking_lot::{RwLock, RwLockWriteGuard};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use super::{TagColor, TagSnapshot};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Fired after every registry mutation (or batch of mutations).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagsChanged;

#[derive(Debug, Clone, Copy)]
struct TagEntry {
    color: TagColor,
    /// Insertion sequence; overwriting a color keeps the original position.
    seq: u64,
    /// Bumped on every assignment, including overwrites.
    version: u64,
}

#[derive(Debug, Default)]
struct RegistryState {
    tags: HashMap<String, TagEntry>,
    names: HashMap<TagColor, String>,
    next_seq: u64,
    next_version: u64,
}

impl RegistryState {
    fn set(&mut self, path: &str, color: TagColor) {
        self.next_version += 1;
        let version = self.next_version;
        if let Some(entry) = self.tags.get_mut(path) {
            entry.color = color;
            entry.version = version;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tags
            .insert(path.to_string(), TagEntry { color, seq, version });
    }

    fn remove(&mut self, path: &str) -> Option<TagColor> {
        self.tags.remove(path).map(|entry| entry.color)
    }

    fn ordered(&self) -> Vec<(&String, TagColor)> {
        let mut entries: Vec<_> = self.tags.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.seq);
        entries
            .into_iter()
            .map(|(path, entry)| (path, entry.color))
            .collect()
    }

    fn display_name(&self, color: TagColor) -> String {
        self.names
            .get(&color)
            .cloned()
            .unwrap_or_else(|| color.default_label().to_string())
    }
}

/// Single source of truth for tag assignments and color display names.
///
/// Constructed once per session and shared by handle (`Arc<TagRegistry>`)
/// with the sync engine, the sweep, the views and persistence.
pub struct TagRegistry {
    state: RwLock<RegistryState>,
    changes: broadcast::Sender<TagsChanged>,
    generation: AtomicU64,
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagRegistry")
            .field("tags", &self.len())
            .field("generation", &self.generation())
            .finish()
    }
}

impl TagRegistry {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(RegistryState::default()),
            changes,
            generation: AtomicU64::new(0),
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<TagsChanged> {
        self.changes.subscribe()
    }

    /// Number of notifications published so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn notify(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        // No subscribers is fine: nobody needs to re-render.
        let _ = self.changes.send(TagsChanged);
    }

    /// Assign `color` to `path`, replacing any previous color.
    pub fn set_tag(&self, path: &str, color: TagColor) {
        self.state.write().set(path, color);
        self.notify();
    }

    /// Remove the tag at `path`. Notifies only when something was removed.
    pub fn remove_tag(&self, path: &str) -> bool {
        let removed = self.state.write().remove(path).is_some();
        if removed {
            self.notify();
        }
        removed
    }

    pub fn get_tag(&self, path: &str) -> Option<TagColor> {
        self.state.read().tags.get(path).map(|entry| entry.color)
    }

    pub fn has_tag(&self, path: &str) -> bool {
        self.state.read().tags.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.state.read().tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().tags.is_empty()
    }

    /// Paths bearing `color`, in insertion order.
    pub fn paths_for_color(&self, color: TagColor) -> Vec<String> {
        self.state
            .read()
            .ordered()
            .into_iter()
            .filter(|(_, tagged)| *tagged == color)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Distinct colors with at least one tagged path, in palette order.
    pub fn used_colors(&self) -> Vec<TagColor> {
        let state = self.state.read();
        TagColor::ALL
            .into_iter()
            .filter(|color| state.tags.values().any(|entry| entry.color == *color))
            .collect()
    }

    /// Set a custom display name for `color`.
    ///
    /// Always notifies, even when the name is unchanged. A blank name drops
    /// the override so the built-in label is used again.
    pub fn set_display_name(&self, color: TagColor, name: &str) {
        {
            let mut state = self.state.write();
            if name.trim().is_empty() {
                state.names.remove(&color);
            } else {
                state.names.insert(color, name.to_string());
            }
        }
        self.notify();
    }

    /// Custom name if one was set, otherwise the built-in label.
    pub fn display_name(&self, color: TagColor) -> String {
        self.state.read().display_name(color)
    }

    /// Every tagged path with its color, in insertion order.
    pub fn all_tags(&self) -> Vec<(String, TagColor)> {
        self.state
            .read()
            .ordered()
            .into_iter()
            .map(|(path, color)| (path.clone(), color))
            .collect()
    }

    /// Every tagged path with the version of its current assignment, for
    /// callers that later remove entries with [`TagBatch::remove_if_unchanged`].
    pub fn tag_versions(&self) -> Vec<(String, u64)> {
        self.state
            .read()
            .tags
            .iter()
            .map(|(path, entry)| (path.clone(), entry.version))
            .collect()
    }

    /// Effective display name of every color.
    pub fn all_tag_names(&self) -> BTreeMap<TagColor, String> {
        let state = self.state.read();
        TagColor::ALL
            .into_iter()
            .map(|color| (color, state.display_name(color)))
            .collect()
    }

    pub fn export_snapshot(&self) -> TagSnapshot {
        TagSnapshot {
            tags: self.all_tags(),
            tag_names: self.all_tag_names(),
        }
    }

    /// Replace every tag assignment with the snapshot's and merge its names.
    /// Publishes exactly one notification.
    pub fn import_snapshot(&self, snapshot: TagSnapshot) {
        {
            let mut state = self.state.write();
            state.tags.clear();
            for (path, color) in &snapshot.tags {
                state.set(path, *color);
            }
            for (color, name) in snapshot.tag_names {
                if name.trim().is_empty() || name == color.default_label() {
                    state.names.remove(&color);
                } else {
                    state.names.insert(color, name);
                }
            }
        }
        self.notify();
    }

    /// Remove every tag assignment. Display names are kept.
    pub fn clear(&self) {
        self.state.write().tags.clear();
        self.notify();
    }

    /// Apply several mutations under one write lock, publishing a single
    /// notification afterwards if any of them changed the registry.
    pub fn batch<R>(&self, f: impl FnOnce(&mut TagBatch<'_>) -> R) -> R {
        let mut batch = TagBatch {
            state: self.state.write(),
            changed: false,
        };
        let result = f(&mut batch);
        let changed = batch.changed;
        drop(batch);

        if changed {
            self.notify();
        }
        result
    }
}

/// Write access handed out by [`TagRegistry::batch`].
pub struct TagBatch<'a> {
    state: RwLockWriteGuard<'a, RegistryState>,
    changed: bool,
}

impl TagBatch<'_> {
    pub fn set_tag(&mut self, path: &str, color: TagColor) {
        self.state.set(path, color);
        self.changed = true;
    }

    pub fn remove_tag(&mut self, path: &str) -> Option<TagColor> {
        let removed = self.state.remove(path);
        if removed.is_some() {
            self.changed = true;
        }
        removed
    }

    pub fn get_tag(&self, path: &str) -> Option<TagColor> {
        self.state.tags.get(path).map(|entry| entry.color)
    }

    /// Remove the tag at `path` only if it has not been reassigned since
    /// `version` was observed.
    pub fn remove_if_unchanged(&mut self, path: &str, version: u64) -> Option<TagColor> {
        let unchanged = self
            .state
            .tags
            .get(path)
            .map(|entry| entry.version == version)
            .unwrap_or(false);
        if !unchanged {
            return None;
        }
        self.remove_tag(path)
    }

    /// Copy of the current assignments, taken before further mutation.
    pub fn tagged_paths(&self) -> Vec<(String, TagColor)> {
        self.state
            .ordered()
            .into_iter()
            .map(|(path, color)| (path.clone(), color))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_set_wins() {
        let registry = TagRegistry::new();
        registry.set_tag("/a", TagColor::Red);
        registry.set_tag("/a", TagColor::Blue);
        registry.set_tag("/a", TagColor::Green);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_tag("/a"), Some(TagColor::Green));
        assert_eq!(registry.used_colors(), vec![TagColor::Green]);
    }

    #[test]
    fn test_remove_missing_does_not_notify() {
        let registry = TagRegistry::new();
        registry.set_tag("/a", TagColor::Red);
        let before = registry.generation();

        assert!(!registry.remove_tag("/missing"));
        assert_eq!(registry.generation(), before);
        assert_eq!(registry.used_colors(), vec![TagColor::Red]);

        assert!(registry.remove_tag("/a"));
        assert_eq!(registry.generation(), before + 1);
        assert!(registry.used_colors().is_empty());
    }

    #[test]
    fn test_overwrite_keeps_insertion_position() {
        let registry = TagRegistry::new();
        registry.set_tag("/one", TagColor::Red);
        registry.set_tag("/two", TagColor::Red);
        registry.set_tag("/three", TagColor::Red);
        registry.set_tag("/one", TagColor::Red);

        assert_eq!(registry.paths_for_color(TagColor::Red), vec!["/one", "/two", "/three"]);

        registry.remove_tag("/one");
        registry.set_tag("/one", TagColor::Red);
        assert_eq!(registry.paths_for_color(TagColor::Red), vec!["/two", "/three", "/one"]);
    }

    #[test]
    fn test_display_name_fallback() {
        let registry = TagRegistry::new();
        assert_eq!(registry.display_name(TagColor::Purple), "Purple");

        registry.set_display_name(TagColor::Purple, "Review");
        registry.set_display_name(TagColor::Purple, "Later");
        assert_eq!(registry.display_name(TagColor::Purple), "Later");
        assert_eq!(registry.display_name(TagColor::Red), "Red");

        registry.set_display_name(TagColor::Purple, "   ");
        assert_eq!(registry.display_name(TagColor::Purple), "Purple");
    }

    #[test]
    fn test_set_display_name_always_notifies() {
        let registry = TagRegistry::new();
        registry.set_display_name(TagColor::Red, "Hot");
        registry.set_display_name(TagColor::Red, "Hot");
        assert_eq!(registry.generation(), 2);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let registry = TagRegistry::new();
        registry.set_tag("/a", TagColor::Red);
        registry.set_tag("/b", TagColor::Blue);
        registry.set_display_name(TagColor::Blue, "Docs");
        let snapshot = registry.export_snapshot();

        let restored = TagRegistry::new();
        restored.import_snapshot(snapshot.clone());

        assert_eq!(restored.generation(), 1);
        assert_eq!(restored.export_snapshot().tag_map(), snapshot.tag_map());
        assert_eq!(restored.all_tag_names(), snapshot.tag_names);
    }

    #[test]
    fn test_import_replaces_paths_wholesale() {
        let registry = TagRegistry::new();
        registry.set_tag("/stale", TagColor::Gray);

        registry.import_snapshot(TagSnapshot {
            tags: vec![("/fresh".to_string(), TagColor::Yellow)],
            tag_names: BTreeMap::new(),
        });

        assert!(!registry.has_tag("/stale"));
        assert_eq!(registry.get_tag("/fresh"), Some(TagColor::Yellow));
    }

    #[test]
    fn test_clear_keeps_names() {
        let registry = TagRegistry::new();
        registry.set_tag("/a", TagColor::Red);
        registry.set_display_name(TagColor::Red, "Hot");
        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(registry.display_name(TagColor::Red), "Hot");
    }

    #[test]
    fn test_batch_notifies_once() {
        let registry = TagRegistry::new();
        registry.batch(|batch| {
            batch.set_tag("/a", TagColor::Red);
            batch.set_tag("/b", TagColor::Red);
            batch.remove_tag("/a");
        });
        assert_eq!(registry.generation(), 1);

        registry.batch(|batch| {
            batch.remove_tag("/nothing");
        });
        assert_eq!(registry.generation(), 1);
    }

    #[test]
    fn test_remove_if_unchanged_skips_reassigned_paths() {
        let registry = TagRegistry::new();
        registry.set_tag("/a", TagColor::Red);
        registry.set_tag("/b", TagColor::Red);
        let seen: HashMap<String, u64> = registry.tag_versions().into_iter().collect();

        // Same color again still counts as a new assignment.
        registry.set_tag("/b", TagColor::Red);

        let removed = registry.batch(|batch| {
            (
                batch.remove_if_unchanged("/a", seen["/a"]),
                batch.remove_if_unchanged("/b", seen["/b"]),
            )
        });

        assert_eq!(removed, (Some(TagColor::Red), None));
        assert_eq!(registry.all_tags(), vec![("/b".to_string(), TagColor::Red)]);
    }

    #[tokio::test]
    async fn test_subscribers_receive_notifications() {
        let registry = TagRegistry::new();
        let mut rx = registry.subscribe();

        registry.set_tag("/a", TagColor::Red);

        assert_eq!(rx.recv().await.unwrap(), TagsChanged);
    }
}
