//! On-demand reconciliation of the registry against the filesystem.
//!
//! The sync engine only sees operations performed through the host. Anything
//! else (a file removed by another process, a checkout while the workspace was
//! closed) leaves stale tags behind. [`Reconciler::sweep`] checks every tagged
//! path and drops the ones that no longer exist.

use futures::future::{join_all, BoxFuture};
use std::io;
use std::sync::Arc;

use crate::sync::RefreshScheduler;
use crate::tags::TagRegistry;

/// Asynchronous existence check for a tagged path.
pub trait ExistenceCheck: Send + Sync {
    fn exists<'a>(&'a self, path: &'a str) -> BoxFuture<'a, io::Result<bool>>;
}

/// Checks existence with `tokio::fs::metadata`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsExistence;

impl ExistenceCheck for FsExistence {
    fn exists<'a>(&'a self, path: &'a str) -> BoxFuture<'a, io::Result<bool>> {
        Box::pin(async move {
            match tokio::fs::metadata(path).await {
                Ok(_) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            }
        })
    }
}

pub struct Reconciler {
    registry: Arc<TagRegistry>,
    refresh: Arc<RefreshScheduler>,
    checker: Arc<dyn ExistenceCheck>,
}

impl Reconciler {
    pub fn new(registry: Arc<TagRegistry>, refresh: Arc<RefreshScheduler>) -> Self {
        Self::with_checker(registry, refresh, Arc::new(FsExistence))
    }

    pub fn with_checker(
        registry: Arc<TagRegistry>,
        refresh: Arc<RefreshScheduler>,
        checker: Arc<dyn ExistenceCheck>,
    ) -> Self {
        Self {
            registry,
            refresh,
            checker,
        }
    }

    /// Remove every tag whose path no longer exists and return how many were
    /// removed.
    ///
    /// Checks run concurrently and independently; a path whose existence
    /// cannot be confirmed is treated as gone. Removals are applied as one
    /// registry batch, and the view is refreshed exactly once afterwards,
    /// even when nothing was removed.
    pub async fn sweep(&self) -> usize {
        // Each path is paired with the version of its assignment so a tag
        // moved onto a checked path while the checks run is left alone.
        let entries = self.registry.tag_versions();

        let checks = entries.iter().map(|(path, version)| async move {
            let result = self.checker.exists(path).await;
            (path, *version, result)
        });

        let stale: Vec<(&String, u64)> = join_all(checks)
            .await
            .into_iter()
            .filter_map(|(path, version, result)| match result {
                Ok(true) => None,
                Ok(false) => Some((path, version)),
                Err(e) => {
                    tracing::warn!(%path, error = %e, "could not check tagged path, dropping its tag");
                    Some((path, version))
                }
            })
            .collect();

        let removed = self.registry.batch(|batch| {
            stale
                .iter()
                .filter(|(path, version)| batch.remove_if_unchanged(path, *version).is_some())
                .count()
        });

        self.refresh.refresh_now();

        tracing::info!(checked = entries.len(), removed, "tag sweep complete");
        removed
    }
}
