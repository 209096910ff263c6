//! Shutdown Coordination
//!
//! One-shot, clonable shutdown signal shared by the transport supervisor
//! and the process signal handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shutdown coordinator.
///
/// Firing it is idempotent; every clone observes the same state.
#[derive(Clone)]
pub struct ShutdownController {
    /// Whether shutdown has been initiated
    shutdown_initiated: Arc<AtomicBool>,
    /// Broadcast channel for shutdown signal
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Subscribe to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Initiate shutdown. Only the first call has an effect.
    pub fn shutdown(&self) {
        if !self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            tracing::debug!("shutdown signalled");
            let _ = self.shutdown_tx.send(());
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been initiated, including before the call.
    pub async fn cancelled(&self) {
        // Subscribe before checking the flag so a concurrent shutdown is not missed
        let mut rx = self.subscribe();
        if self.is_shutdown() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for Ctrl+C or SIGTERM, then fire `controller`.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn shutdown_signal(controller: ShutdownController) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }

    controller.shutdown();
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_shutdown_controller_new() {
        let controller = ShutdownController::new();
        assert!(!controller.is_shutdown());
    }

    #[test]
    fn test_shutdown_controller_default() {
        let controller = ShutdownController::default();
        assert!(!controller.is_shutdown());
    }

    #[test]
    fn test_shutdown_initiates_once() {
        let controller = ShutdownController::new();
        let mut rx = controller.subscribe();

        controller.shutdown();
        controller.shutdown();

        assert!(controller.is_shutdown());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancelled_after_shutdown_returns_immediately() {
        let controller = ShutdownController::new();
        controller.shutdown();

        let result = tokio::time::timeout(Duration::from_millis(100), controller.cancelled()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_on_shutdown() {
        let controller = ShutdownController::new();
        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        controller.shutdown();
        let result = tokio::time::timeout(Duration::from_millis(200), waiter).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_pending_without_shutdown() {
        let controller = ShutdownController::new();
        let result = tokio::time::timeout(Duration::from_millis(50), controller.cancelled()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_clone_shares_state() {
        let controller = ShutdownController::new();
        let cloned = controller.clone();

        cloned.shutdown();
        assert!(controller.is_shutdown());
    }
}
