//! # dx-tags - Colored tags for workspace files and folders
//!
//! Attach one of seven colors to any file or folder path and keep those tags
//! attached while the workspace changes underneath them.
//!
//! ## Features
//!
//! - **Path sync**: renames and moves carry tags along, including every
//!   tagged descendant of a renamed folder; deletes drop them
//! - **Double-event suppression**: host-reported operations win over the
//!   filesystem watcher's echo of the same change
//! - **Reconciliation**: a sweep drops tags whose paths disappeared while
//!   nothing was watching
//! - **Persistence**: tags and color names saved to SQLite after each change
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dx_tags::{TagColor, TagWorkspace};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut workspace = TagWorkspace::open_default(std::path::Path::new(".")).await?;
//!     let registry = workspace.registry();
//!
//!     registry.set_tag("/project/src", TagColor::Blue);
//!     workspace.engine().handle_renames([("/project/src", "/project/lib")]);
//!     assert_eq!(registry.get_tag("/project/lib"), Some(TagColor::Blue));
//!
//!     workspace.flush().await;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod reconcile;
pub mod storage;
pub mod sync;
pub mod tags;
pub mod view;
pub mod watcher;
pub mod workspace;

// Re-export main types for library consumers
pub use commands::TagCommands;
pub use config::TagsConfig;
pub use error::TagError;
pub use reconcile::Reconciler;
pub use storage::TagPersistence;
pub use sync::{EventSource, PathSyncEngine, RefreshScheduler};
pub use tags::{TagColor, TagRegistry, TagSnapshot, TagsChanged};
pub use workspace::TagWorkspace;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
