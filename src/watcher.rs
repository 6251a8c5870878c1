//! Lower-level filesystem watcher.
//!
//! The host reports the file operations it performs itself (see
//! [`PathSyncEngine::handle_renames`]). Everything else is picked up here
//! through notify and fed to the engine as [`EventSource::Watcher`] events,
//! which the engine drops when the host already handled the same path.

use anyhow::{Context as _, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::storage::state_dir;
use crate::sync::{EventSource, PathSyncEngine, SyncOutcome};

/// Filesystem change relevant to tag paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsChange {
    Created(PathBuf),
    Removed(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

/// Recursive notify watcher over a workspace root.
pub struct WorkspaceWatcher {
    root: PathBuf,
    debouncer: Option<Debouncer<RecommendedWatcher, RecommendedCache>>,
}

impl WorkspaceWatcher {
    /// Create a watcher; changes arrive on the returned receiver once
    /// [`watch`](Self::watch) is called.
    pub fn new(
        root: impl Into<PathBuf>,
        delay: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<FsChange>)> {
        let root = root.into();
        let ignored = state_dir(&root);
        let (change_tx, change_rx) = mpsc::unbounded_channel();

        let debouncer = new_debouncer(delay, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for debounced in events {
                        for change in translate(&debounced.event, &ignored) {
                            if change_tx.send(change).is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        tracing::warn!(error = %error, "filesystem watcher error");
                    }
                }
            }
        })?;

        Ok((
            Self {
                root,
                debouncer: Some(debouncer),
            },
            change_rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start watching the root recursively.
    pub fn watch(&mut self) -> Result<()> {
        if let Some(debouncer) = &mut self.debouncer {
            debouncer
                .watch(&self.root, RecursiveMode::Recursive)
                .with_context(|| format!("Failed to watch: {}", self.root.display()))?;
            tracing::info!(root = %self.root.display(), "filesystem watcher started");
        }
        Ok(())
    }

    /// Stop watching; the change receiver closes once pending events drain.
    pub fn stop(&mut self) {
        if self.debouncer.take().is_some() {
            tracing::info!(root = %self.root.display(), "filesystem watcher stopped");
        }
    }
}

/// Map a notify event to tag-relevant changes, skipping anything inside
/// `ignored` (our own state directory).
pub fn translate(event: &notify::Event, ignored: &Path) -> Vec<FsChange> {
    let relevant = |path: &PathBuf| !path.starts_with(ignored);

    match &event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter(|p| relevant(*p))
            .map(|p| FsChange::Created(p.clone()))
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .filter(|p| relevant(*p))
            .map(|p| FsChange::Removed(p.clone()))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() >= 2 => {
            let (from, to) = (&event.paths[0], &event.paths[1]);
            match (relevant(from), relevant(to)) {
                (true, true) => vec![FsChange::Renamed {
                    from: from.clone(),
                    to: to.clone(),
                }],
                (true, false) => vec![FsChange::Removed(from.clone())],
                (false, true) => vec![FsChange::Created(to.clone())],
                (false, false) => Vec::new(),
            }
        }
        // Unpaired halves of a rename: the source is gone, the target is new.
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .filter(|p| relevant(*p))
            .map(|p| FsChange::Removed(p.clone()))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .filter(|p| relevant(*p))
            .map(|p| FsChange::Created(p.clone()))
            .collect(),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .filter(|p| relevant(*p))
            .map(|p| {
                if p.exists() {
                    FsChange::Created(p.clone())
                } else {
                    FsChange::Removed(p.clone())
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Apply one watcher change through the engine.
pub fn apply(engine: &PathSyncEngine, change: &FsChange) -> SyncOutcome {
    match change {
        FsChange::Renamed { from, to } => engine.apply_renames(
            EventSource::Watcher,
            [(path_key(from), path_key(to))],
        ),
        FsChange::Removed(path) => engine.apply_deletes(EventSource::Watcher, [path_key(path)]),
        FsChange::Created(path) => {
            engine.handle_creates([path_key(path)]);
            SyncOutcome::default()
        }
    }
}

/// Drain watcher changes into the engine until the channel closes.
pub async fn forward(mut changes: mpsc::UnboundedReceiver<FsChange>, engine: Arc<PathSyncEngine>) {
    while let Some(change) = changes.recv().await {
        let outcome = apply(&engine, &change);
        if outcome.changed() {
            tracing::info!(
                ?change,
                moved = outcome.moved,
                removed = outcome.removed,
                "tags updated from filesystem change"
            );
        }
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
