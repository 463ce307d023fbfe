//! Cooperative cancellation for job waits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{PrinterError, Result};

/// Shared flag that interrupts the sequencer's sleeps.
///
/// Clones observe the same flag; cancelling is permanent.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Request cancellation of every wait using this token.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender gone: nobody can cancel any more
            std::future::pending::<()>().await;
        }
    }

    /// Sleep for `duration` unless cancelled first.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        if self.is_cancelled() {
            return Err(PrinterError::Cancelled);
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancelled() => Err(PrinterError::Cancelled),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_completes() {
        let token = CancelToken::new();
        assert!(token.sleep(Duration::from_millis(1)).await.is_ok());
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_before_sleep() {
        let token = CancelToken::new();
        token.clone().cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.sleep(Duration::ZERO).await, Err(PrinterError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let token = CancelToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result = token.sleep(Duration::from_secs(30)).await;
        assert!(matches!(result, Err(PrinterError::Cancelled)));
    }
}
