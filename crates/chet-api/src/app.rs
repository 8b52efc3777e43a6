//! Application builder: wires the hub, router and server together.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use chet_core::config::AppConfig;
use chet_core::error::AppError;
use chet_realtime::{ChatHub, SystemClock};

use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    build_router(state)
}

/// Builds a hub backed by the wall clock.
pub fn build_hub(config: &AppConfig) -> ChatHub {
    ChatHub::new(config.hub.clone(), Arc::new(SystemClock))
}

/// Runs the hub server until Ctrl-C.
pub async fn run_server(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Chet hub...");

    let hub = build_hub(&config);
    let addr = config.bind_address();
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let app = build_app(AppState::new(config, hub.clone()));

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Chet hub listening on {}", addr);

    serve(listener, app, hub, shutdown_signal(), grace).await
}

/// Serves `app` on `listener` until `shutdown` resolves.
///
/// On shutdown every Session is closed; connections still open after
/// `grace` are abandoned.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    hub: ChatHub,
    shutdown: F,
    grace: Duration,
) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let stopping = CancellationToken::new();
    let trigger = stopping.clone();
    let closing_hub = hub.clone();

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        closing_hub.shutdown();
        trigger.cancel();
    })
    .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|e| AppError::internal(format!("Server error: {}", e)))?;
        }
        _ = async {
            stopping.cancelled().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(
                connections = hub.connection_count(),
                "Graceful shutdown timed out"
            );
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
