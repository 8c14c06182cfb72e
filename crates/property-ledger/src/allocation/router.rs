use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    AllocationRuleUpdate, NewAllocationRule, PropertyId, RuleId, TransactionId, UserId,
};
use super::repository::{ExpenseTypeLookup, OwnershipCheck, RuleRepository, TransactionRepository};
use super::service::{AllocationError, AllocationService};
use crate::error::AppError;

pub const USER_HEADER: &str = "x-user-id";

type SharedService<O, R, T, E> = Arc<AllocationService<O, R, T, E>>;

/// Router builder exposing rule management and batch allocation endpoints.
pub fn allocation_router<O, R, T, E>(service: SharedService<O, R, T, E>) -> Router
where
    O: OwnershipCheck + 'static,
    R: RuleRepository + 'static,
    T: TransactionRepository + 'static,
    E: ExpenseTypeLookup + 'static,
{
    Router::new()
        .route(
            "/api/v1/properties/:property_id/allocation-rules",
            get(list_rules_handler::<O, R, T, E>).post(create_rule_handler::<O, R, T, E>),
        )
        .route(
            "/api/v1/properties/:property_id/allocation-rules/reorder",
            post(reorder_rules_handler::<O, R, T, E>),
        )
        .route(
            "/api/v1/properties/:property_id/allocation-rules/apply",
            post(apply_handler::<O, R, T, E>),
        )
        .route(
            "/api/v1/properties/:property_id/allocation-rules/preview",
            post(preview_handler::<O, R, T, E>),
        )
        .route(
            "/api/v1/allocation-rules/:rule_id",
            get(find_rule_handler::<O, R, T, E>)
                .put(update_rule_handler::<O, R, T, E>)
                .delete(delete_rule_handler::<O, R, T, E>),
        )
        .with_state(service)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub transaction_ids: Vec<TransactionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderRequest {
    pub rule_ids: Vec<RuleId>,
}

fn caller(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(USER_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .map(UserId)
}

fn unauthenticated() -> Response {
    let payload = json!({ "error": format!("missing or invalid {USER_HEADER} header") });
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

fn error_response(error: AllocationError) -> Response {
    AppError::from(error).into_response()
}

fn respond<V: Serialize>(status: StatusCode, outcome: Result<V, AllocationError>) -> Response {
    match outcome {
        Ok(value) => (status, Json(value)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn apply_handler<O, R, T, E>(
    State(service): State<SharedService<O, R, T, E>>,
    headers: HeaderMap,
    Path(property_id): Path<i64>,
    Json(request): Json<ApplyRequest>,
) -> Response
where
    O: OwnershipCheck + 'static,
    R: RuleRepository + 'static,
    T: TransactionRepository + 'static,
    E: ExpenseTypeLookup + 'static,
{
    let Some(user) = caller(&headers) else {
        return unauthenticated();
    };
    respond(
        StatusCode::OK,
        service.apply(&user, PropertyId(property_id), &request.transaction_ids),
    )
}

pub(crate) async fn preview_handler<O, R, T, E>(
    State(service): State<SharedService<O, R, T, E>>,
    headers: HeaderMap,
    Path(property_id): Path<i64>,
    Json(request): Json<ApplyRequest>,
) -> Response
where
    O: OwnershipCheck + 'static,
    R: RuleRepository + 'static,
    T: TransactionRepository + 'static,
    E: ExpenseTypeLookup + 'static,
{
    let Some(user) = caller(&headers) else {
        return unauthenticated();
    };
    respond(
        StatusCode::OK,
        service.preview(&user, PropertyId(property_id), &request.transaction_ids),
    )
}

pub(crate) async fn list_rules_handler<O, R, T, E>(
    State(service): State<SharedService<O, R, T, E>>,
    headers: HeaderMap,
    Path(property_id): Path<i64>,
) -> Response
where
    O: OwnershipCheck + 'static,
    R: RuleRepository + 'static,
    T: TransactionRepository + 'static,
    E: ExpenseTypeLookup + 'static,
{
    let Some(user) = caller(&headers) else {
        return unauthenticated();
    };
    respond(
        StatusCode::OK,
        service.find_rules_by_property(&user, PropertyId(property_id)),
    )
}

pub(crate) async fn create_rule_handler<O, R, T, E>(
    State(service): State<SharedService<O, R, T, E>>,
    headers: HeaderMap,
    Path(property_id): Path<i64>,
    Json(input): Json<NewAllocationRule>,
) -> Response
where
    O: OwnershipCheck + 'static,
    R: RuleRepository + 'static,
    T: TransactionRepository + 'static,
    E: ExpenseTypeLookup + 'static,
{
    let Some(user) = caller(&headers) else {
        return unauthenticated();
    };
    respond(
        StatusCode::CREATED,
        service.create_rule(&user, PropertyId(property_id), input),
    )
}

pub(crate) async fn reorder_rules_handler<O, R, T, E>(
    State(service): State<SharedService<O, R, T, E>>,
    headers: HeaderMap,
    Path(property_id): Path<i64>,
    Json(request): Json<ReorderRequest>,
) -> Response
where
    O: OwnershipCheck + 'static,
    R: RuleRepository + 'static,
    T: TransactionRepository + 'static,
    E: ExpenseTypeLookup + 'static,
{
    let Some(user) = caller(&headers) else {
        return unauthenticated();
    };
    respond(
        StatusCode::OK,
        service.reorder_rules(&user, PropertyId(property_id), &request.rule_ids),
    )
}

pub(crate) async fn find_rule_handler<O, R, T, E>(
    State(service): State<SharedService<O, R, T, E>>,
    headers: HeaderMap,
    Path(rule_id): Path<i64>,
) -> Response
where
    O: OwnershipCheck + 'static,
    R: RuleRepository + 'static,
    T: TransactionRepository + 'static,
    E: ExpenseTypeLookup + 'static,
{
    let Some(user) = caller(&headers) else {
        return unauthenticated();
    };
    respond(StatusCode::OK, service.find_rule(&user, RuleId(rule_id)))
}

pub(crate) async fn update_rule_handler<O, R, T, E>(
    State(service): State<SharedService<O, R, T, E>>,
    headers: HeaderMap,
    Path(rule_id): Path<i64>,
    Json(update): Json<AllocationRuleUpdate>,
) -> Response
where
    O: OwnershipCheck + 'static,
    R: RuleRepository + 'static,
    T: TransactionRepository + 'static,
    E: ExpenseTypeLookup + 'static,
{
    let Some(user) = caller(&headers) else {
        return unauthenticated();
    };
    respond(
        StatusCode::OK,
        service.update_rule(&user, RuleId(rule_id), update),
    )
}

pub(crate) async fn delete_rule_handler<O, R, T, E>(
    State(service): State<SharedService<O, R, T, E>>,
    headers: HeaderMap,
    Path(rule_id): Path<i64>,
) -> Response
where
    O: OwnershipCheck + 'static,
    R: RuleRepository + 'static,
    T: TransactionRepository + 'static,
    E: ExpenseTypeLookup + 'static,
{
    let Some(user) = caller(&headers) else {
        return unauthenticated();
    };
    match service.delete_rule(&user, RuleId(rule_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}
