//! OS signal handling.
//!
//! SIGINT (Ctrl+C) and SIGTERM both request a graceful shutdown.

use tokio::signal;

/// Resolve once the process is asked to stop.
pub async fn wait_for_shutdown() -> std::io::Result<()> {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())?
            .recv()
            .await;
        Ok::<_, std::io::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<std::io::Result<()>>();

    tokio::select! {
        res = ctrl_c => {
            res?;
            tracing::info!("SIGINT received");
        }
        res = terminate => {
            res?;
            tracing::info!("SIGTERM received");
        }
    }

    Ok(())
}
