//! Graceful shutdown coordination.
//!
//! On SIGINT or SIGTERM the coordinator cancels its token, which stops the
//! HTTP listener and flips readiness to "not ready". Shutdown then proceeds
//! in two phases, each bounded by a timeout:
//!
//! 1. **Draining**: wait for in-flight requests to finish
//! 2. **Flushing**: run the registered [`ShutdownHandler`]s
//!
//! # Example
//!
//! ```rust,no_run
//! use receipt_points::shutdown::{CompositeShutdownHandler, ShutdownConfig, ShutdownCoordinator};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let coordinator = ShutdownCoordinator::new(ShutdownConfig::default());
//! let handlers = CompositeShutdownHandler::new();
//!
//! coordinator.wait_for_signal().await;
//! coordinator.shutdown(&handlers).await?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::state::ReceiptStore;

#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Upper bound on waiting for in-flight requests
    pub in_flight_timeout: Duration,

    /// Upper bound on running shutdown handlers
    pub flush_timeout: Duration,

    /// Total time allowed from signal to exit
    pub total_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            in_flight_timeout: Duration::from_secs(30),
            flush_timeout: Duration::from_secs(5),
            total_timeout: Duration::from_secs(30),
        }
    }
}

impl ShutdownConfig {
    /// Bound the whole sequence, clamping the phase timeouts to fit.
    pub fn with_total_timeout(mut self, timeout_secs: u64) -> Self {
        self.total_timeout = Duration::from_secs(timeout_secs);
        self.in_flight_timeout = self.in_flight_timeout.min(self.total_timeout);
        self.flush_timeout = self.flush_timeout.min(self.total_timeout);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    Draining,
    Flushing,
    Complete,
    /// A phase ran out of time
    Forced,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownPhase::Running => write!(f, "running"),
            ShutdownPhase::Draining => write!(f, "draining"),
            ShutdownPhase::Flushing => write!(f, "flushing"),
            ShutdownPhase::Complete => write!(f, "complete"),
            ShutdownPhase::Forced => write!(f, "forced"),
        }
    }
}

pub struct ShutdownCoordinator {
    config: ShutdownConfig,
    phase: RwLock<ShutdownPhase>,
    shutdown_token: CancellationToken,
    active_requests: Arc<AtomicU64>,
}

impl ShutdownCoordinator {
    pub fn new(config: ShutdownConfig) -> Self {
        Self {
            config,
            phase: RwLock::new(ShutdownPhase::Running),
            shutdown_token: CancellationToken::new(),
            active_requests: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &ShutdownConfig {
        &self.config
    }

    /// Token cancelled once shutdown begins.
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub async fn phase(&self) -> ShutdownPhase {
        *self.phase.read().await
    }

    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Begin shutdown without waiting for a signal.
    pub fn trigger(&self) {
        if !self.shutdown_token.is_cancelled() {
            info!("shutdown triggered");
            self.shutdown_token.cancel();
        }
    }

    /// Count a request as in flight until the returned guard drops.
    pub fn track_request(&self) -> RequestGuard {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
        RequestGuard {
            active_requests: self.active_requests.clone(),
        }
    }

    pub fn active_request_count(&self) -> u64 {
        self.active_requests.load(Ordering::Relaxed)
    }

    /// Resolve on SIGINT, SIGTERM or an explicit [`trigger`](Self::trigger),
    /// cancelling the shutdown token in every case.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("received SIGINT (Ctrl+C), initiating graceful shutdown");
            },
            _ = terminate => {
                info!("received SIGTERM, initiating graceful shutdown");
            },
            _ = self.shutdown_token.cancelled() => {
                debug!("shutdown token cancelled");
            },
        }

        self.trigger();
    }

    /// Drain in-flight requests, then run `handler`.
    ///
    /// Phases that run out of time are abandoned and the final phase is
    /// [`ShutdownPhase::Forced`]; that is logged, not returned as an error.
    pub async fn shutdown(&self, handler: &dyn ShutdownHandler) -> Result<()> {
        self.trigger();
        info!("starting graceful shutdown sequence");

        *self.phase.write().await = ShutdownPhase::Draining;
        let drained = self.wait_in_flight().await;

        *self.phase.write().await = ShutdownPhase::Flushing;
        info!("running shutdown handlers");
        let flushed = match timeout(self.config.flush_timeout, handler.shutdown()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!("shutdown handler error: {}", e);
                true
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.flush_timeout.as_millis() as u64,
                    "shutdown handlers timed out"
                );
                false
            }
        };

        let final_phase = if drained && flushed {
            info!("graceful shutdown completed");
            ShutdownPhase::Complete
        } else {
            warn!("graceful shutdown forced");
            ShutdownPhase::Forced
        };
        *self.phase.write().await = final_phase;
        Ok(())
    }

    async fn wait_in_flight(&self) -> bool {
        let deadline = tokio::time::Instant::now() + self.config.in_flight_timeout;

        loop {
            let active = self.active_request_count();
            if active == 0 {
                debug!("no requests in flight");
                return true;
            }

            if tokio::time::Instant::now() >= deadline {
                warn!(
                    remaining_requests = active,
                    "in-flight timeout reached with {} active requests", active
                );
                return false;
            }

            debug!(active_requests = active, "waiting for requests to complete");
            sleep(Duration::from_millis(20)).await;
        }
    }
}

/// Decrements the in-flight count on drop.
pub struct RequestGuard {
    active_requests: Arc<AtomicU64>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.active_requests.fetch_sub(1, Ordering::Relaxed);
    }
}

/// A component with work to do before the process exits.
#[async_trait::async_trait]
pub trait ShutdownHandler: Send + Sync {
    async fn shutdown(&self) -> Result<()>;
}

/// Reports what the receipt store held when the server stopped.
///
/// Receipts live only in memory, so this is the last record of them.
pub struct StoreShutdownHandler {
    state: Arc<crate::state::AppState>,
}

impl StoreShutdownHandler {
    pub fn new(state: Arc<crate::state::AppState>) -> Self {
        Self { state }
    }

    fn store(&self) -> &ReceiptStore {
        self.state.store()
    }
}

#[async_trait::async_trait]
impl ShutdownHandler for StoreShutdownHandler {
    async fn shutdown(&self) -> Result<()> {
        let stats = self.store().stats();
        info!(
            receipts = stats.receipts,
            lookups = stats.lookups,
            misses = stats.misses,
            "discarding in-memory receipts"
        );
        Ok(())
    }
}

/// Flushes buffered spans to the OTLP collector.
///
/// The exporter flush blocks, so it runs on the blocking pool where the flush
/// timeout can abandon it.
pub struct TelemetryShutdownHandler;

#[async_trait::async_trait]
impl ShutdownHandler for TelemetryShutdownHandler {
    async fn shutdown(&self) -> Result<()> {
        tokio::task::spawn_blocking(crate::logging::shutdown_telemetry).await?;
        Ok(())
    }
}

/// Runs handlers in registration order; one failing does not stop the rest.
#[derive(Default)]
pub struct CompositeShutdownHandler {
    handlers: Vec<Box<dyn ShutdownHandler>>,
}

impl CompositeShutdownHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&mut self, handler: Box<dyn ShutdownHandler>) {
        self.handlers.push(handler);
    }
}

#[async_trait::async_trait]
impl ShutdownHandler for CompositeShutdownHandler {
    async fn shutdown(&self) -> Result<()> {
        for (idx, handler) in self.handlers.iter().enumerate() {
            if let Err(e) = handler.shutdown().await {
                error!(handler_index = idx, "shutdown handler error: {}", e);
            }
        }
        Ok(())
    }
}
