//! User-facing tag and file operations.
//!
//! Input validation happens here, before anything reaches the registry. File
//! operations are performed on disk and then reported to the sync engine as
//! host events, the same way an editor reports its own renames and deletes.

use anyhow::{Context as _, Result};
use std::path::Path;
use std::sync::Arc;

use crate::error::TagError;
use crate::reconcile::Reconciler;
use crate::sync::PathSyncEngine;
use crate::tags::{TagColor, TagRegistry};

pub struct TagCommands {
    registry: Arc<TagRegistry>,
    engine: Arc<PathSyncEngine>,
    reconciler: Arc<Reconciler>,
}

impl TagCommands {
    pub fn new(engine: Arc<PathSyncEngine>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            registry: Arc::clone(engine.registry()),
            engine,
            reconciler,
        }
    }

    pub fn registry(&self) -> &Arc<TagRegistry> {
        &self.registry
    }

    /// Tag the selected file or folder.
    pub fn add_tag(&self, selection: Option<&str>, color: TagColor) -> Result<String, TagError> {
        let path = selected(selection)?;
        self.registry.set_tag(path, color);
        Ok(path.to_string())
    }

    /// Untag the selected file or folder.
    pub fn remove_tag(&self, selection: Option<&str>) -> Result<String, TagError> {
        let path = selected(selection)?;
        if !self.registry.remove_tag(path) {
            return Err(TagError::NotTagged(path.to_string()));
        }
        Ok(path.to_string())
    }

    /// Rename a color. Returns the trimmed name that was stored.
    pub fn set_tag_name(&self, color: TagColor, name: &str) -> Result<String, TagError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TagError::EmptyName);
        }
        self.registry.set_display_name(color, name);
        Ok(name.to_string())
    }

    /// Remove every tag of `color`, returning how many were removed.
    pub fn clear_tag_group(&self, color: TagColor) -> usize {
        let paths = self.registry.paths_for_color(color);
        self.registry.batch(|batch| {
            paths
                .iter()
                .filter(|path| batch.remove_tag(path).is_some())
                .count()
        })
    }

    /// Drop tags whose paths no longer exist.
    pub async fn refresh(&self) -> usize {
        self.reconciler.sweep().await
    }

    /// Rename the selected entry within its folder. Returns the new path.
    pub async fn rename_file(&self, selection: Option<&str>, new_name: &str) -> Result<String> {
        let old = selected(selection)?;
        let new_name = validate_file_name(new_name)?;
        let old_path = Path::new(old);
        if old_path.file_name().map(|n| n == new_name).unwrap_or(false) {
            return Ok(old.to_string());
        }

        let new_path = match old_path.parent() {
            Some(parent) => parent.join(new_name),
            None => Path::new(new_name).to_path_buf(),
        };
        if tokio::fs::try_exists(&new_path).await.unwrap_or(false) {
            return Err(TagError::AlreadyExists(new_path.display().to_string()).into());
        }

        tokio::fs::rename(old_path, &new_path)
            .await
            .with_context(|| format!("Failed to rename {old}"))?;

        let new = new_path.to_string_lossy().into_owned();
        self.engine.handle_renames([(old, new.as_str())]);
        Ok(new)
    }

    /// Delete the selected file, or folder with its contents.
    pub async fn delete_file(&self, selection: Option<&str>) -> Result<()> {
        let path = selected(selection)?;

        match tokio::fs::symlink_metadata(path).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path)
                .await
                .with_context(|| format!("Failed to delete {path}"))?,
            Ok(_) => tokio::fs::remove_file(path)
                .await
                .with_context(|| format!("Failed to delete {path}"))?,
            // Already gone: still drop its tags.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("Failed to delete {path}")),
        }

        self.engine.handle_deletes([path]);
        Ok(())
    }

    /// Create an empty file inside the selected folder. Returns its path.
    pub async fn new_file(&self, folder: Option<&str>, name: &str) -> Result<String> {
        let folder = selected(folder)?;
        let name = validate_file_name(name)?;
        let path = Path::new(folder).join(name);

        tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    anyhow::Error::new(TagError::AlreadyExists(path.display().to_string()))
                }
                _ => anyhow::Error::new(e).context(format!("Failed to create {}", path.display())),
            })?;

        let created = path.to_string_lossy().into_owned();
        self.engine.handle_creates([created.as_str()]);
        Ok(created)
    }

    /// Create a folder inside the selected folder. Returns its path.
    pub async fn new_folder(&self, folder: Option<&str>, name: &str) -> Result<String> {
        let folder = selected(folder)?;
        let name = validate_file_name(name)?;
        let path = Path::new(folder).join(name);

        tokio::fs::create_dir_all(&path)
            .await
            .with_context(|| format!("Failed to create folder {}", path.display()))?;

        let created = path.to_string_lossy().into_owned();
        self.engine.handle_creates([created.as_str()]);
        self.reconciler.sweep().await;
        Ok(created)
    }
}

fn selected(selection: Option<&str>) -> Result<&str, TagError> {
    selection
        .filter(|path| !path.trim().is_empty())
        .ok_or(TagError::NoSelection)
}

/// A single path component: non-blank, without `/` or `\`.
pub fn validate_file_name(name: &str) -> Result<&str, TagError> {
    if name.trim().is_empty() || name.contains('/') || name.contains('\\') {
        return Err(TagError::InvalidFileName(name.to_string()));
    }
    Ok(name)
}
