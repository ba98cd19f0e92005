//! Liveness tokens for asynchronous continuations.
//!
//! A component hands a [`LivenessToken`] to every asynchronous operation whose result it will
//! apply to its own state. When the component is torn down it cancels the token, and any
//! result that arrives afterwards is dropped instead of being applied.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone, Debug)]
pub struct LivenessToken {
    cancelled: Arc<watch::Sender<bool>>,
}

impl Default for LivenessToken {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessToken {
    pub fn new() -> Self {
        let (cancelled, _) = watch::channel(false);
        Self {
            cancelled: Arc::new(cancelled),
        }
    }

    /// Marks the owner as gone. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.subscribe();
        // The sender lives as long as `self`, so `wait_for` cannot observe a closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Awaits `fut` and returns its output only if the token is still live afterwards.
    pub async fn guard<F: Future>(&self, fut: F) -> Option<F::Output> {
        let output = fut.await;
        if self.is_cancelled() {
            tracing::debug!("discarding result for a cancelled component");
            return None;
        }
        Some(output)
    }
}
