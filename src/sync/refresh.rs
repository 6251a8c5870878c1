use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default delay before a coalesced refresh fires.
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(100);

/// Something that re-renders when the workspace view may be stale.
pub trait RefreshSink: Send + Sync + 'static {
    fn refresh(&self);
}

impl<F> RefreshSink for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn refresh(&self) {
        self()
    }
}

/// Debounced, cancellable view refresh.
///
/// Every [`schedule`](Self::schedule) call cancels the pending refresh and
/// starts a new timer, so a burst of file operations yields one refresh after
/// the burst settles. Must be used from within a Tokio runtime.
pub struct RefreshScheduler {
    delay: Duration,
    sink: Arc<dyn RefreshSink>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl RefreshScheduler {
    pub fn new(sink: Arc<dyn RefreshSink>, delay: Duration) -> Self {
        Self {
            delay,
            sink,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)start the refresh timer.
    pub fn schedule(&self) {
        let mut pending = self.pending.lock();
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let sink = Arc::clone(&self.sink);
        let delay = self.delay;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::trace!("debounced refresh fired");
            sink.refresh();
        }));
    }

    /// Refresh immediately, dropping any pending timer.
    pub fn refresh_now(&self) {
        self.cancel();
        self.sink.refresh();
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}
