use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use property_ledger::allocation::{
    allocation_router, AllocationService, ExpenseTypeLookup, OwnershipCheck, RuleRepository,
    TransactionRepository,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_allocation_routes<O, R, T, E>(
    service: Arc<AllocationService<O, R, T, E>>,
) -> axum::Router
where
    O: OwnershipCheck + 'static,
    R: RuleRepository + 'static,
    T: TransactionRepository + 'static,
    E: ExpenseTypeLookup + 'static,
{
    allocation_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let (status, label) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "initializing")
    };

    (status, Json(json!({ "status": label })))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
