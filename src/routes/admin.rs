// Admin routes: lifecycle commands, finalize retry, dispute resolution and reads.
// Every handler authorizes from headers before touching the engine.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app_state::SharedState;
use crate::audit::audit_log;
use crate::error::EngineError;
use crate::settlement::disputes::{DisputeDecision, DisputeStatus};
use crate::settlement::finalize::FinalizeStatus;
use crate::settlement::SettleRequest;

type ApiResult = Result<Json<Value>, EngineError>;

// ===== REQUEST TYPES =====

#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub status: Option<FinalizeStatus>,
}

#[derive(Debug, Deserialize)]
pub struct DisputesQuery {
    pub status: Option<DisputeStatus>,
    pub proposition_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveDisputeRequest {
    pub decision: DisputeDecision,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub proposition_id: Option<Uuid>,
}

// ===== COMMANDS =====

/// POST /admin/propositions/:id/close
pub async fn close(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    body: Option<Json<ReasonRequest>>,
) -> ApiResult {
    let actor = state.authorizer.from_headers(&headers)?;
    let Json(request) = body.unwrap_or_default();
    let proposition = state.engine.close(&actor, id, request.reason.as_deref())?;
    Ok(Json(json!({ "success": true, "proposition": proposition })))
}

/// POST /admin/propositions/:id/void
pub async fn void(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    body: Option<Json<ReasonRequest>>,
) -> ApiResult {
    let actor = state.authorizer.from_headers(&headers)?;
    let Json(request) = body.unwrap_or_default();
    let outcome = state.engine.void(&actor, id, request.reason.as_deref())?;
    Ok(Json(json!({
        "success": true,
        "proposition": outcome.proposition,
        "refunded_entries": outcome.refunded_entries,
        "refunded_amount": outcome.refunded_amount,
    })))
}

/// POST /admin/propositions/:id/cancel
pub async fn cancel(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    body: Option<Json<ReasonRequest>>,
) -> ApiResult {
    let actor = state.authorizer.from_headers(&headers)?;
    let Json(request) = body.unwrap_or_default();
    let proposition = state.engine.cancel(&actor, id, request.reason.as_deref())?;
    Ok(Json(json!({ "success": true, "proposition": proposition })))
}

/// POST /admin/propositions/:id/settle
pub async fn settle(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<SettleRequest>,
) -> ApiResult {
    let actor = state.authorizer.from_headers(&headers)?;
    let outcome = state.engine.settle(&actor, id, request)?;
    Ok(Json(json!({
        "success": true,
        "already_settled": outcome.already_settled,
        "fully_finalized": outcome.settlement.fully_finalized(),
        "settlement": outcome.settlement,
    })))
}

/// POST /admin/propositions/:id/reset
pub async fn reset(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    body: Option<Json<ReasonRequest>>,
) -> ApiResult {
    let actor = state.authorizer.from_headers(&headers)?;
    let Json(request) = body.unwrap_or_default();
    let outcome = state.engine.reset(&actor, id, request.reason.as_deref())?;
    Ok(Json(json!({ "success": true, "reset": outcome })))
}

/// POST /admin/settlements/:id/retry
pub async fn retry_finalize(State(state): State<SharedState>, headers: HeaderMap, Path(id): Path<Uuid>) -> ApiResult {
    let actor = state.authorizer.from_headers(&headers)?;
    let job = state.engine.retry_finalize(&actor, id)?;
    Ok(Json(json!({ "success": true, "job": job })))
}

/// POST /admin/disputes/:id/resolve
pub async fn resolve_dispute(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<ResolveDisputeRequest>,
) -> ApiResult {
    let actor = state.authorizer.from_headers(&headers)?;
    let dispute = state.engine.resolve_dispute(&actor, id, request.decision, request.reason.as_deref())?;
    Ok(Json(json!({ "success": true, "dispute": dispute })))
}

// ===== READS =====

/// GET /admin/settlements/:id
pub async fn get_settlement(State(state): State<SharedState>, headers: HeaderMap, Path(id): Path<Uuid>) -> ApiResult {
    state.authorizer.from_headers(&headers)?;
    let settlement = state.engine.settlement(id)?;
    let job = match state.engine.finalize_job(id) {
        Ok(job) => Some(job),
        Err(EngineError::JobNotFound(_)) => None,
        Err(err) => return Err(err),
    };
    Ok(Json(json!({
        "success": true,
        "fully_finalized": settlement.fully_finalized(),
        "settlement": settlement,
        "finalize_job": job,
    })))
}

/// GET /admin/finalize-jobs
pub async fn list_finalize_jobs(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<JobsQuery>,
) -> ApiResult {
    state.authorizer.from_headers(&headers)?;
    let jobs = state.engine.finalize_jobs(query.status)?;
    Ok(Json(json!({ "success": true, "count": jobs.len(), "jobs": jobs })))
}

/// GET /admin/disputes
pub async fn list_disputes(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<DisputesQuery>,
) -> ApiResult {
    state.authorizer.from_headers(&headers)?;
    let disputes = state.engine.disputes(query.status, query.proposition_id)?;
    Ok(Json(json!({ "success": true, "count": disputes.len(), "disputes": disputes })))
}

/// GET /admin/audit
pub async fn get_audit_log(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<AuditQuery>,
) -> ApiResult {
    state.authorizer.from_headers(&headers)?;
    let rows = audit_log(state.engine.store(), query.proposition_id)?;
    Ok(Json(json!({ "success": true, "count": rows.len(), "audit": rows })))
}

/// GET /admin/propositions/:id/reconcile
pub async fn reconcile(State(state): State<SharedState>, headers: HeaderMap, Path(id): Path<Uuid>) -> ApiResult {
    state.authorizer.from_headers(&headers)?;
    let report = state.engine.reconcile(id)?;
    Ok(Json(json!({ "success": true, "balanced": true, "report": report })))
}
