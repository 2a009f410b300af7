//! Process shutdown plumbing.
//!
//! The controller owns a `watch` channel holding "has shutdown begun".
//! Subsystems take a [`ShutdownSignal`] and await [`ShutdownSignal::triggered`]
//! alongside their main loop. Because the flag is state rather than an event,
//! a signal taken after shutdown already began still resolves immediately.

use tokio::signal;
use tokio::sync::watch;

/// Resolves once shutdown begins. Cheap to clone, one per subsystem.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Completes when shutdown has been triggered, immediately if it
    /// already was. A dropped controller counts as shutdown.
    pub async fn triggered(mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Begin shutdown programmatically.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Wait for SIGINT or SIGTERM, then begin shutdown.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(err) => {
                    tracing::warn!(%err, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
            _ = terminate => { tracing::info!("received SIGTERM, shutting down"); }
        }

        self.trigger();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
