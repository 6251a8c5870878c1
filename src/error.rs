//! Error taxonomy and retry logic.
//!
//! Registry operations are total and never fail. What can fail lives at the
//! edges: user input handled by the command layer ([`TagError`]), and I/O
//! (persistence, filesystem checks) reported through `anyhow`.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// User-facing errors raised by the command layer before any registry
/// operation runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TagError {
    #[error("No file or folder selected")]
    NoSelection,

    #[error("Tag name cannot be empty")]
    EmptyName,

    #[error("Invalid name {0:?}: names cannot be empty or contain path separators")]
    InvalidFileName(String),

    #[error("{0} has no tag")]
    NotTagged(String),

    #[error("Unknown tag color {0:?} (expected one of Red, Orange, Yellow, Green, Blue, Purple, Gray)")]
    UnknownColor(String),

    #[error("{0} already exists")]
    AlreadyExists(String),
}

impl TagError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TagError::NoSelection => ErrorCategory::Selection,
            TagError::NotTagged(_) => ErrorCategory::Selection,
            TagError::AlreadyExists(_) => ErrorCategory::FileSystem,
            TagError::EmptyName | TagError::InvalidFileName(_) | TagError::UnknownColor(_) => {
                ErrorCategory::Validation
            }
        }
    }
}

/// Retry policy for persistence writes
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,

    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a no-retry policy
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }
}

/// Execute an async operation with retry logic
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0;
    let mut delay = policy.initial_delay;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempts >= policy.max_attempts {
                    return Err(e.context(format!("Operation failed after {} attempts", attempts)));
                }

                tracing::warn!(
                    attempt = attempts,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "attempt failed, retrying in {:?}",
                    delay
                );

                sleep(delay).await;

                // Exponential backoff
                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * policy.backoff_multiplier)
                        .min(policy.max_delay.as_secs_f64()),
                );
            }
        }
    }
}

/// Categorized error types for user-facing hints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected user input (names, colors)
    Validation,

    /// Nothing selected, or the selection has no tag
    Selection,

    /// Loading or saving tag state failed
    Persistence,

    /// File system errors
    FileSystem,

    /// Unknown errors
    Unknown,
}

impl ErrorCategory {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ErrorCategory::Validation => None,
            ErrorCategory::Selection => Some("Pass the path of a file or folder in the workspace"),
            ErrorCategory::Persistence => {
                Some("Tags are kept in memory; the next successful save will catch up")
            }
            ErrorCategory::FileSystem => Some("Check the path exists and permissions allow it"),
            ErrorCategory::Unknown => Some("Run with RUST_LOG=debug for more details"),
        }
    }
}

/// Categorize an error
pub fn categorize_error(error: &anyhow::Error) -> ErrorCategory {
    if let Some(tag_error) = error.downcast_ref::<TagError>() {
        return tag_error.category();
    }
    if error.downcast_ref::<rusqlite::Error>().is_some()
        || error.downcast_ref::<serde_json::Error>().is_some()
    {
        return ErrorCategory::Persistence;
    }
    if error.chain().any(|cause| cause.is::<std::io::Error>()) {
        return ErrorCategory::FileSystem;
    }
    ErrorCategory::Unknown
}
