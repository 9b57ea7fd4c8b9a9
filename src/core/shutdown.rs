//! Cooperative shutdown token, replacing the module-level mutable flag the
//! original implementation used. Every suspension point in the enrichment
//! engine's task loop and every chunk boundary in the orchestrators checks
//! this before starting new work; in-flight work always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Default)]
pub struct ShutdownToken(Arc<AtomicBool>);

impl ShutdownToken {
    pub fn new() -> Self {
        ShutdownToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Spawns a task that sets the token on SIGINT/SIGTERM (or Ctrl-C on
    /// non-unix platforms). Returns immediately; the token flips once the
    /// signal arrives.
    pub fn install_signal_handler(&self) {
        let token = self.clone();
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            info!("shutdown signal received, finishing in-flight work before exit");
            token.request();
        });
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_not_requested_and_flips_once() {
        let token = ShutdownToken::new();
        assert!(!token.is_requested());
        token.request();
        assert!(token.is_requested());
    }

    #[test]
    fn clones_share_state() {
        let token = ShutdownToken::new();
        let clone = token.clone();
        clone.request();
        assert!(token.is_requested());
    }
}
