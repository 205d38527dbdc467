//! Server lifecycle: serving on a real listener and stopping on request.

use receipt_points::shutdown::{
    CompositeShutdownHandler, ShutdownHandler, ShutdownPhase, StoreShutdownHandler,
};
use receipt_points::{AppState, Receipt, ServerConfig, serve};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;

fn state_with_timeout(secs: u64) -> Arc<AppState> {
    let config = ServerConfig {
        http_bind_address: "127.0.0.1:0".parse().expect("bind"),
        graceful_shutdown_timeout_secs: secs,
        ..ServerConfig::default()
    };
    Arc::new(AppState::new(Arc::new(config)))
}

#[tokio::test]
async fn serve_stops_after_trigger() {
    let state = state_with_timeout(2);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let server = tokio::spawn(serve(listener, state.clone()));

    // Let the server reach its accept loop.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(state.shutdown().phase().await, ShutdownPhase::Running);

    state.shutdown().trigger();

    timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop within the timeout")
        .expect("server task should not panic")
        .expect("server should exit cleanly");
    assert_eq!(state.shutdown().phase().await, ShutdownPhase::Complete);
}

#[tokio::test]
async fn store_handler_runs_with_receipts_present() {
    let state = state_with_timeout(1);
    let receipt = Receipt::from_json(json!({
        "retailer": "Target",
        "purchaseDate": "2022-01-01",
        "purchaseTime": "13:01",
        "total": "6.49",
        "items": [{ "shortDescription": "Mountain Dew 12PK", "price": "6.49" }]
    }))
    .expect("valid receipt");
    state.store().insert(receipt);

    let mut handlers = CompositeShutdownHandler::new();
    handlers.add_handler(Box::new(StoreShutdownHandler::new(state.clone())));
    handlers.shutdown().await.expect("handlers succeed");

    state
        .shutdown()
        .shutdown(&handlers)
        .await
        .expect("shutdown completes");
    assert_eq!(state.shutdown().phase().await, ShutdownPhase::Complete);
    assert_eq!(state.store().len(), 1);
}

#[tokio::test]
async fn in_flight_requests_delay_completion() {
    let state = state_with_timeout(2);
    let coordinator = state.shutdown();
    let guard = coordinator.track_request();

    let releaser = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(guard);
    });

    coordinator
        .shutdown(&CompositeShutdownHandler::new())
        .await
        .expect("shutdown completes");
    releaser.await.expect("releaser task");

    assert_eq!(coordinator.active_request_count(), 0);
    assert_eq!(coordinator.phase().await, ShutdownPhase::Complete);
}
