//! OS shutdown signals as a cancellation source.
//!
//! Services never listen for signals themselves; they only watch the token
//! they are run with. Binaries that want SIGTERM / Ctrl-C to stop them wire
//! the two together here.

use std::io;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available.
///
/// Fails only if a signal handler cannot be installed.
pub async fn shutdown_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv()  => info!("received SIGINT"),
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("received Ctrl-C");
        Ok(())
    }
}

/// Cancels `token` on the first shutdown signal.
///
/// If the handlers cannot be installed the token is left alone and the error
/// comes back through the handle; cancelling would stop the service for no
/// reason.
pub fn cancel_on_shutdown_signal(token: CancellationToken) -> JoinHandle<io::Result<()>> {
    tokio::spawn(async move {
        shutdown_signal().await?;
        token.cancel();
        Ok(())
    })
}
