use std::path::MAIN_SEPARATOR;
use std::sync::Arc;
use std::time::Duration;

use super::{RecentlyHandled, RefreshScheduler};
use crate::tags::{TagBatch, TagColor, TagRegistry};

/// Where a file-operation notification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// High-level file operation performed through the workspace host.
    Host,
    /// Lower-level filesystem watcher.
    Watcher,
}

/// What one rename or delete notification did to the registry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Tags moved to a new path.
    pub moved: usize,
    /// Tags dropped because their path is gone.
    pub removed: usize,
    /// Paths ignored because the host already handled them.
    pub suppressed: usize,
}

impl SyncOutcome {
    pub fn changed(&self) -> bool {
        self.moved > 0 || self.removed > 0
    }
}

/// Keeps registry entries pointing at valid paths while files are renamed,
/// moved and deleted.
///
/// A rename of a directory cascades to every tagged descendant; a delete of a
/// directory drops every tagged descendant. Each notification is applied as a
/// single registry batch, so observers see one change per notification and
/// never a state where a moved tag exists at neither its old nor new path.
pub struct PathSyncEngine {
    registry: Arc<TagRegistry>,
    refresh: Arc<RefreshScheduler>,
    recent: RecentlyHandled,
    separator: char,
}

impl std::fmt::Debug for PathSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathSyncEngine")
            .field("registry", &self.registry)
            .field("recent", &self.recent.len())
            .field("separator", &self.separator)
            .finish()
    }
}

impl PathSyncEngine {
    pub fn new(
        registry: Arc<TagRegistry>,
        refresh: Arc<RefreshScheduler>,
        suppression_window: Duration,
    ) -> Self {
        Self {
            registry,
            refresh,
            recent: RecentlyHandled::new(suppression_window),
            separator: MAIN_SEPARATOR,
        }
    }

    /// Override the path separator used for descendant matching.
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn registry(&self) -> &Arc<TagRegistry> {
        &self.registry
    }

    pub fn refresh(&self) -> &Arc<RefreshScheduler> {
        &self.refresh
    }

    pub fn recent(&self) -> &RecentlyHandled {
        &self.recent
    }

    /// Host rename notification: one or more `(old, new)` pairs from a single
    /// user-level move.
    pub fn handle_renames<I, S>(&self, renames: I) -> SyncOutcome
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        self.apply_renames(EventSource::Host, renames)
    }

    /// Host delete notification.
    pub fn handle_deletes<I, S>(&self, paths: I) -> SyncOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.apply_deletes(EventSource::Host, paths)
    }

    /// Host create notification. New entries never carry tags, but they may
    /// show up under a tagged folder, so the view is refreshed.
    pub fn handle_creates<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let count = paths.into_iter().count();
        tracing::debug!(count, "paths created");
        self.refresh.schedule();
    }

    pub fn apply_renames<I, S>(&self, source: EventSource, renames: I) -> SyncOutcome
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut outcome = SyncOutcome::default();
        let mut handled = Vec::new();

        self.registry.batch(|batch| {
            for (old, new) in renames {
                let (old, new) = (old.as_ref(), new.as_ref());
                if source == EventSource::Watcher
                    && (self.recent.contains(old) || self.recent.contains(new))
                {
                    tracing::debug!(%old, %new, "rename already handled by host, ignoring");
                    outcome.suppressed += 1;
                    continue;
                }

                handled.push(old.to_string());
                handled.push(new.to_string());
                for (from, to, _) in rename_in(batch, old, new, self.separator) {
                    outcome.moved += 1;
                    handled.push(from);
                    handled.push(to);
                }
            }
        });

        self.finish(source, "rename", outcome, handled)
    }

    pub fn apply_deletes<I, S>(&self, source: EventSource, paths: I) -> SyncOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outcome = SyncOutcome::default();
        let mut handled = Vec::new();

        self.registry.batch(|batch| {
            for path in paths {
                let path = path.as_ref();
                if source == EventSource::Watcher && self.recent.contains(path) {
                    tracing::debug!(%path, "delete already handled by host, ignoring");
                    outcome.suppressed += 1;
                    continue;
                }

                handled.push(path.to_string());
                for (removed, _) in delete_in(batch, path, self.separator) {
                    outcome.removed += 1;
                    handled.push(removed);
                }
            }
        });

        self.finish(source, "delete", outcome, handled)
    }

    fn finish(
        &self,
        source: EventSource,
        kind: &'static str,
        outcome: SyncOutcome,
        handled: Vec<String>,
    ) -> SyncOutcome {
        if source == EventSource::Host {
            for path in &handled {
                self.recent.mark(path);
            }
        }

        if !handled.is_empty() {
            tracing::debug!(
                kind,
                ?source,
                moved = outcome.moved,
                removed = outcome.removed,
                suppressed = outcome.suppressed,
                "applied file operation"
            );
            self.refresh.schedule();
        }
        outcome
    }
}

/// Remainder of `path` below `ancestor`: empty when they are equal, starting
/// with `separator` when `path` is a strict descendant.
pub fn relative_suffix<'a>(path: &'a str, ancestor: &str, separator: char) -> Option<&'a str> {
    if path == ancestor {
        return Some("");
    }
    let base = ancestor.strip_suffix(separator).unwrap_or(ancestor);
    let rest = path.strip_prefix(base)?;
    rest.starts_with(separator).then_some(rest)
}

fn rebase(new_root: &str, suffix: &str, separator: char) -> String {
    if suffix.is_empty() {
        return new_root.to_string();
    }
    let base = new_root.strip_suffix(separator).unwrap_or(new_root);
    format!("{base}{suffix}")
}

/// Move the tag at `old` and every tag below it to the matching path under
/// `new`. Returns `(from, to, color)` for each moved tag.
fn rename_in(
    batch: &mut TagBatch<'_>,
    old: &str,
    new: &str,
    separator: char,
) -> Vec<(String, String, TagColor)> {
    if old == new {
        return Vec::new();
    }

    // Plan every move against the state before this rename, then remove all
    // sources before inserting any target.
    let moves: Vec<(String, String, TagColor)> = batch
        .tagged_paths()
        .into_iter()
        .filter_map(|(path, color)| {
            let target = rebase(new, relative_suffix(&path, old, separator)?, separator);
            Some((path, target, color))
        })
        .collect();

    for (from, _, _) in &moves {
        batch.remove_tag(from);
    }
    for (_, to, color) in &moves {
        batch.set_tag(to, *color);
    }
    moves
}

/// Drop the tag at `deleted` and every tag below it.
fn delete_in(batch: &mut TagBatch<'_>, deleted: &str, separator: char) -> Vec<(String, TagColor)> {
    let doomed: Vec<(String, TagColor)> = batch
        .tagged_paths()
        .into_iter()
        .filter(|(path, _)| relative_suffix(path, deleted, separator).is_some())
        .collect();

    for (path, _) in &doomed {
        batch.remove_tag(path);
    }
    doomed
}
