//! Server lifecycle: bind, serve, shut down on signal.

use crate::routes::create_router;
use crate::state::AppState;
use localrouter_core::{GatewayError, GatewayResult};
use tokio::signal;
use tracing::info;

/// Bind the listener and serve until a shutdown signal arrives.
///
/// # Errors
/// Returns a configuration error when the address cannot be bound, and an
/// I/O error if the server fails while running.
pub async fn serve(host: &str, port: u16, state: AppState) -> GatewayResult<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::configuration(format!("failed to bind {addr}: {e}")))?;

    info!(addr = %addr, "starting edge gateway");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gateway stopped");
    Ok(())
}

/// Resolves when ctrl-c or SIGTERM arrives.
///
/// # Panics
/// Panics if signal handlers cannot be installed.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("received shutdown signal");
}
