use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Default suppression window for double-processing.
pub const DEFAULT_SUPPRESSION_WINDOW: Duration = Duration::from_millis(200);

/// Paths recently handled through host file-operation events.
///
/// The same rename or delete can reach us twice: once as a host event and
/// once from the filesystem watcher. Low-level events for a path marked here
/// within `window` are dropped. This is a heuristic: a genuine external change
/// to the same path inside the window is dropped too. The window is tunable
/// through `suppression_window_ms`.
#[derive(Debug)]
pub struct RecentlyHandled {
    window: Duration,
    entries: DashMap<String, Instant>,
}

impl Default for RecentlyHandled {
    fn default() -> Self {
        Self::new(DEFAULT_SUPPRESSION_WINDOW)
    }
}

impl RecentlyHandled {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: DashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn mark(&self, path: &str) {
        self.entries.insert(path.to_string(), Instant::now());
    }

    /// True if `path` was marked less than one window ago.
    pub fn contains(&self, path: &str) -> bool {
        let now = Instant::now();
        self.prune(now);
        self.entries
            .get(path)
            .map(|marked| now.duration_since(*marked) < self.window)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune(&self, now: Instant) {
        self.entries
            .retain(|_, marked| now.duration_since(*marked) < self.window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_window() {
        let recent = RecentlyHandled::new(Duration::from_millis(200));
        recent.mark("/proj/a.txt");

        assert!(recent.contains("/proj/a.txt"));
        assert!(!recent.contains("/proj/b.txt"));

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(recent.contains("/proj/a.txt"));

        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(!recent.contains("/proj/a.txt"));
        assert!(recent.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_again_extends_window() {
        let recent = RecentlyHandled::new(Duration::from_millis(200));
        recent.mark("/a");
        tokio::time::advance(Duration::from_millis(150)).await;
        recent.mark("/a");
        tokio::time::advance(Duration::from_millis(150)).await;

        assert!(recent.contains("/a"));
    }
}
