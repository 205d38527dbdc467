pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod points;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod validation;

pub use config::{CliArgs, ServerConfig};
pub use error::{ApiError, ErrorCode};
pub use logging::{LoggingConfig, init_logging};
pub use model::{Item, Receipt, ReceiptError, ReceiptId};
pub use points::{PointsBreakdown, compute};
pub use shutdown::{ShutdownConfig, ShutdownCoordinator};
pub use state::AppState;
pub use validation::{SchemaError, ValidateResult, validate_item, validate_receipt};

use anyhow::{Context, Result};
use shutdown::{CompositeShutdownHandler, StoreShutdownHandler, TelemetryShutdownHandler};
use std::{future::IntoFuture, sync::Arc};
use tokio::net::TcpListener;

pub async fn run_server(config: ServerConfig) -> Result<()> {
    let config = Arc::new(config);
    let state = Arc::new(AppState::new(config.clone()));

    let listener = TcpListener::bind(config.http_bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.http_bind_address))?;

    serve(listener, state).await
}

/// Serve the application on `listener` until shutdown completes.
///
/// Shutdown starts on SIGINT, SIGTERM or [`ShutdownCoordinator::trigger`]
/// on the state's coordinator.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let coordinator = state.shutdown();

    let mut handlers = CompositeShutdownHandler::new();
    handlers.add_handler(Box::new(StoreShutdownHandler::new(state.clone())));
    handlers.add_handler(Box::new(TelemetryShutdownHandler));

    let actual_addr = listener.local_addr()?;
    tracing::info!(
        bind = %actual_addr,
        max_body_bytes = state.config().max_body_bytes,
        "receipt service listening"
    );

    let signal_coordinator = coordinator.clone();
    let server_future = axum::serve(listener, server::router(state))
        .with_graceful_shutdown(async move {
            signal_coordinator.wait_for_signal().await;
        })
        .into_future();

    // Open connections get the full shutdown budget to finish.
    let drain_limit = coordinator.config().total_timeout;
    let token = coordinator.token();
    let drain_deadline = async move {
        token.cancelled().await;
        tokio::time::sleep(drain_limit).await;
    };

    let server_result = tokio::select! {
        result = server_future => result.map_err(anyhow::Error::from),
        _ = drain_deadline => {
            tracing::warn!(
                timeout_secs = drain_limit.as_secs(),
                "connections still open at shutdown timeout, closing"
            );
            Ok(())
        }
    };

    tracing::info!("server stopped, running shutdown handlers");
    coordinator.shutdown(&handlers).await?;

    server_result
}
