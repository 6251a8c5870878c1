//! Path synchronization: keeps tag assignments attached to the right paths
//! as the workspace changes underneath them.

pub mod engine;
pub mod recent;
pub mod refresh;

pub use engine::{relative_suffix, EventSource, PathSyncEngine, SyncOutcome};
pub use recent::{RecentlyHandled, DEFAULT_SUPPRESSION_WINDOW};
pub use refresh::{RefreshScheduler, RefreshSink, DEFAULT_REFRESH_DELAY};
