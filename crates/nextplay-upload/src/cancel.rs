//! Cooperative cancellation.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable trigger for aborting whatever the orchestrator is awaiting.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Arm for a new operation.
    pub(crate) fn reset(&self) {
        self.tx.send_replace(false);
    }
}

/// Resolves once the flag is raised; pends forever if the sender is gone.
pub async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|c| *c).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Race `fut` against cancellation. `None` means cancelled.
pub async fn cancellable<F: Future>(rx: &mut watch::Receiver<bool>, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancelled(rx) => None,
        out = fut => Some(out),
    }
}

/// Sleep that returns false if cancelled first.
pub async fn cancellable_sleep(rx: &mut watch::Receiver<bool>, duration: std::time::Duration) -> bool {
    cancellable(rx, tokio::time::sleep(duration)).await.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancellable_completes() {
        let handle = CancelHandle::new();
        let mut rx = handle.subscribe();
        assert_eq!(cancellable(&mut rx, async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn test_cancel_aborts_pending_future() {
        let handle = CancelHandle::new();
        let mut rx = handle.subscribe();
        let trigger = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let out = cancellable(&mut rx, std::future::pending::<()>()).await;
        assert!(out.is_none());
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_reset_rearms() {
        let handle = CancelHandle::new();
        handle.cancel();
        handle.reset();
        let mut rx = handle.subscribe();
        assert!(cancellable_sleep(&mut rx, Duration::from_millis(1)).await);
    }
}
