//! HTTP routes.

use crate::error::ApiError;
use crate::health::{self, HealthChecker};
use crate::logging::{receipt_span, request_span};
use crate::metrics::{METRICS, RequestMetrics};
use crate::model::{PointsResponse, ProcessReceiptResponse, Receipt, ReceiptError};
use crate::points::PointsBreakdown;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const INDEX_PAGE: &str = include_str!("../static/index.html");
const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Build the full application router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.config().max_body_bytes;
    let health_checker = Arc::new(HealthChecker::new(state.clone()));

    let health_routes = Router::new()
        .route("/health", get(health::liveness_handler))
        .route("/ready", get(health::readiness_handler))
        .route("/health/components", get(health::components_handler))
        .with_state(health_checker);

    Router::new()
        .route("/", get(index))
        .route("/receipts/process", post(process_receipt))
        .route("/receipts/{id}/points", get(get_points))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .merge(health_routes)
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

async fn index() -> Html<&'static str> {
    RequestMetrics::new("index").finish(StatusCode::OK);
    Html(INDEX_PAGE)
}

async fn metrics_handler() -> impl IntoResponse {
    let guard = RequestMetrics::new("metrics");
    let body = METRICS.encode();
    guard.finish(StatusCode::OK);
    ([(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body)
}

async fn process_receipt(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ProcessReceiptResponse>, ApiError> {
    let guard = RequestMetrics::new("process_receipt");
    let _in_flight = state.shutdown().track_request();

    let result = request_span("process_receipt")
        .in_scope(|| store_receipt(&state, payload))
        .map_err(|error| error.for_operation("process_receipt"));
    guard.finish(response_status(&result));
    result.map(Json)
}

fn store_receipt(
    state: &AppState,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<ProcessReceiptResponse, ApiError> {
    let Json(value) = payload?;

    let receipt = Receipt::from_json(value).map_err(|error| {
        if matches!(error, ReceiptError::Schema(_)) {
            METRICS.record_receipt_rejected();
        }
        ApiError::from(error)
    })?;

    let store = state.store();
    let id = store.insert(receipt);
    METRICS.record_receipt_stored(store.len());
    Ok(ProcessReceiptResponse { id })
}

async fn get_points(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PointsResponse>, ApiError> {
    let guard = RequestMetrics::new("get_points");
    let _in_flight = state.shutdown().track_request();

    let result = receipt_span(&id)
        .in_scope(|| points_for(&state, &id))
        .map_err(|error| error.for_operation("get_points"));
    guard.finish(response_status(&result));
    result.map(Json)
}

fn points_for(state: &AppState, id: &str) -> Result<PointsResponse, ApiError> {
    let receipt = state.store().lookup(id)?;
    let breakdown = PointsBreakdown::for_receipt(&receipt);
    let points = breakdown.total();

    debug!(?breakdown, points, "points computed");
    METRICS.record_points(points);
    Ok(PointsResponse { points })
}

fn response_status<T>(result: &Result<T, ApiError>) -> StatusCode {
    match result {
        Ok(_) => StatusCode::OK,
        Err(error) => error.code.status(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(Arc::new(ServerConfig::default())))
    }

    fn corner_market() -> Value {
        json!({
            "retailer": "M&M Corner Market",
            "purchaseDate": "2022-03-20",
            "purchaseTime": "14:33",
            "items": [
                { "shortDescription": "Gatorade", "price": "2.25" },
                { "shortDescription": "Gatorade", "price": "2.25" },
                { "shortDescription": "Gatorade", "price": "2.25" },
                { "shortDescription": "Gatorade", "price": "2.25" }
            ],
            "total": "9.00"
        })
    }

    #[test]
    fn stored_receipt_scores() {
        let state = state();
        let response = store_receipt(&state, Ok(Json(corner_market()))).expect("stored");
        let points = points_for(&state, &response.id.to_string()).expect("points");
        assert_eq!(points.points, 109);
    }

    #[test]
    fn schema_failure_is_not_stored() {
        let state = state();
        let mut receipt = corner_market();
        receipt["items"] = json!([]);

        let error = store_receipt(&state, Ok(Json(receipt))).expect_err("empty items");
        assert_eq!(error.code, ErrorCode::SchemaError);
        assert_eq!(error.message, "property 'items': can not be empty");
        assert!(state.store().is_empty());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let error = points_for(&state(), "missing").expect_err("unknown id");
        assert_eq!(error.code, ErrorCode::ReceiptNotFound);
        assert_eq!(response_status::<()>(&Err(error)), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn handler_errors_name_their_operation() {
        let state = state();

        let error = get_points(State(state.clone()), Path("missing".to_string()))
            .await
            .expect_err("unknown id");
        assert_eq!(error.operation.as_deref(), Some("get_points"));

        let error = process_receipt(State(state), Ok(Json(json!({ "retailer": "x" }))))
            .await
            .expect_err("incomplete receipt");
        assert_eq!(error.operation.as_deref(), Some("process_receipt"));
        assert_eq!(error.message, "property 'purchaseDate' is wrong or missing");
    }
}
