//! Session wiring: one registry, constructed at startup and handed to every
//! collaborator that needs it.

use anyhow::Result;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::commands::TagCommands;
use crate::config::TagsConfig;
use crate::error::RetryPolicy;
use crate::reconcile::Reconciler;
use crate::storage::{self, AutosaveHandle, TagPersistence, TagStore};
use crate::sync::{PathSyncEngine, RefreshScheduler, RefreshSink};
use crate::tags::TagRegistry;
use crate::view::{DecorationProvider, TagTree};
use crate::watcher::{FsChange, WorkspaceWatcher};

pub struct TagWorkspace {
    root: PathBuf,
    config: TagsConfig,
    registry: Arc<TagRegistry>,
    tree: Arc<TagTree>,
    decorations: DecorationProvider,
    engine: Arc<PathSyncEngine>,
    reconciler: Arc<Reconciler>,
    persistence: Arc<TagPersistence>,
    commands: TagCommands,
    autosave: AutosaveHandle,
}

impl TagWorkspace {
    /// Open the workspace at `root` with its own config and state database.
    pub async fn open_default(root: &Path) -> Result<Self> {
        let root = canonical_root(root);
        let config = TagsConfig::load(&root)?;
        Self::open_with_config(root, config).await
    }

    /// Open the workspace state database under an already-resolved `root`
    /// with a config the caller has loaded.
    pub async fn open_with_config(root: PathBuf, config: TagsConfig) -> Result<Self> {
        let store = storage::open(&root).await?;
        Ok(Self::open(root, config, Arc::new(store)).await)
    }

    /// Build every collaborator around a fresh registry, load saved tags and
    /// start saving on change.
    pub async fn open(root: PathBuf, config: TagsConfig, store: Arc<dyn TagStore>) -> Self {
        let registry = Arc::new(TagRegistry::new());
        let tree = Arc::new(TagTree::new(Arc::clone(&registry)));
        let decorations = DecorationProvider::new(Arc::clone(&registry), config.decorations_enabled);

        let sink: Arc<dyn RefreshSink> = tree.clone();
        let refresh = Arc::new(RefreshScheduler::new(sink, config.refresh_delay()));
        let engine = Arc::new(PathSyncEngine::new(
            Arc::clone(&registry),
            Arc::clone(&refresh),
            config.suppression_window(),
        ));
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&registry), refresh));
        let commands = TagCommands::new(Arc::clone(&engine), Arc::clone(&reconciler));

        let persistence = Arc::new(
            TagPersistence::new(store, Arc::clone(&registry))
                .with_retry(RetryPolicy::with_attempts(config.save_attempts)),
        );
        persistence.load().await;
        let autosave = Arc::clone(&persistence).spawn_autosave();

        Self {
            root,
            config,
            registry,
            tree,
            decorations,
            engine,
            reconciler,
            persistence,
            commands,
            autosave,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &TagsConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TagRegistry> {
        &self.registry
    }

    pub fn tree(&self) -> &Arc<TagTree> {
        &self.tree
    }

    pub fn decorations(&self) -> &DecorationProvider {
        &self.decorations
    }

    pub fn engine(&self) -> &Arc<PathSyncEngine> {
        &self.engine
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn persistence(&self) -> &Arc<TagPersistence> {
        &self.persistence
    }

    pub fn commands(&self) -> &TagCommands {
        &self.commands
    }

    /// Filesystem watcher over the workspace root.
    pub fn watcher(&self) -> Result<(WorkspaceWatcher, mpsc::UnboundedReceiver<FsChange>)> {
        WorkspaceWatcher::new(&self.root, self.config.watch_debounce())
    }

    /// Wait until every change so far has been saved (or the save failed).
    pub async fn flush(&mut self) {
        self.autosave.flush().await;
    }

    /// Resolve a user-supplied path to the absolute key used in the registry.
    pub fn resolve(&self, path: &Path) -> String {
        resolve_path(path).to_string_lossy().into_owned()
    }
}

/// Workspace root as used for registry keys, config and state.
pub fn canonical_root(root: &Path) -> PathBuf {
    root.canonicalize().unwrap_or_else(|_| absolute_path(root))
}

/// Absolute form of `path`, following symlinks for the parts that exist so
/// keys match what the filesystem watcher reports.
pub fn resolve_path(path: &Path) -> PathBuf {
    let absolute = absolute_path(path);
    if let Ok(canonical) = absolute.canonicalize() {
        return canonical;
    }
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|parent| parent.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}

/// Lexically absolute form of `path` against the current directory.
pub fn absolute_path(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
