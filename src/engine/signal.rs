//! Interrupt handling for an in-flight run.
//!
//! A single listener task races OS termination signals against a
//! completion channel. Exactly one side wins: normal completion disarms
//! the listener, while a signal clears credentials and terminates the
//! process without unwinding. The run lock is deliberately left behind on
//! the signal path; the next run reclaims it through the staleness check.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::credentials;

/// Conventional exit status for an interrupted run (128 + SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

pub struct ShutdownListener {
    done_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ShutdownListener {
    /// Arm the listener. Dropping the returned value (e.g. on an error
    /// return) closes the completion channel, which also ends the task.
    pub fn arm() -> Self {
        let (done_tx, mut done_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            tokio::select! {
                () = termination_signal() => {
                    credentials::clear();
                    warn!("Interrupted; credentials cleared, exiting");
                    std::process::exit(EXIT_INTERRUPTED);
                }
                _ = done_rx.changed() => {}
            }
        });

        Self { done_tx, handle }
    }

    /// Disarm on normal completion and wait for the task to finish.
    pub async fn disarm(self) {
        let _ = self.done_tx.send(true);
        let _ = self.handle.await;
    }
}

/// Resolve when SIGINT (Ctrl-C) or, on Unix, SIGTERM arrives.
async fn termination_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
