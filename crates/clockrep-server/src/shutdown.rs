//! Ctrl-C to shutdown fan-out for the server and the scheduler

use std::future::Future;
use std::io;

use tokio::sync::watch;
use tracing::{error, info};

/// Flip `tx` once `signal` fires. If the signal handler cannot be installed
/// the error is logged and `tx` is held forever, so nothing shuts down.
pub async fn forward_signal(signal: impl Future<Output = io::Result<()>>, tx: watch::Sender<bool>) {
    match signal.await {
        Ok(()) => {
            info!("Ctrl-C received, shutting down");
            let _ = tx.send(true);
        }
        Err(err) => {
            error!(error = %err, "Unable to listen for Ctrl-C; stop the process another way");
            std::future::pending::<()>().await;
            drop(tx);
        }
    }
}

/// Resolves once shutdown has been requested
pub async fn requested(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
