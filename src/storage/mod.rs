pub mod db;
pub mod persistence;
pub mod store;

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

pub use db::Database;
pub use persistence::{AutosaveHandle, TagPersistence};
pub use store::{MemoryStore, SqliteStore, TagStore, STORAGE_KEY};

const STATE_DIR: &str = ".dx/tags";

/// Per-workspace state directory.
pub fn state_dir(workspace: &Path) -> PathBuf {
    workspace.join(STATE_DIR)
}

/// Create the state directory if needed and open the workspace store.
pub async fn open(workspace: &Path) -> Result<SqliteStore> {
    let dir = state_dir(workspace);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    tokio::task::spawn_blocking(move || SqliteStore::new(Database::new(&dir)?))
        .await
        .context("failed to join storage task")?
}
