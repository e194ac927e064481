use std::sync::Arc;
use tokio::sync::Notify;

/// Ctrl+C watcher used by the binary's main loop.
pub struct ShutdownHandler {
    notify: Arc<Notify>,
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandler {
    pub fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
        }
    }

    /// Install the signal listener. Must be called inside a tokio runtime.
    pub fn install(self) -> Self {
        let notify = self.notify.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
                return;
            }
            notify.notify_waiters();
        });
        self
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    /// Request shutdown programmatically (used by tests and teardown paths).
    pub fn trigger(&self) {
        self.notify.notify_waiters();
    }
}
