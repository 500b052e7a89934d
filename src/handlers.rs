// HTTP request handlers for propositions, entries and wallets

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::app_state::SharedState;
use crate::error::EngineError;
use crate::models::Rail;
use crate::propositions::entries::PlaceEntry;
use crate::propositions::status::PropositionStatus;
use crate::propositions::NewProposition;
use crate::settlement::SettleRequest;

type ApiResult = Result<Json<Value>, EngineError>;

// ===== REQUEST TYPES =====

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<PropositionStatus>,
}

#[derive(Debug, Deserialize)]
pub struct EntryRequest {
    pub user_id: String,
    pub option_id: Uuid,
    pub amount: Decimal,
    #[serde(default)]
    pub rail: Rail,
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub option_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreatorSettleRequest {
    pub creator_id: String,
    #[serde(flatten)]
    pub settle: SettleRequest,
}

#[derive(Debug, Deserialize)]
pub struct DisputeRequest {
    pub user_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    #[serde(default)]
    pub rail: Rail,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    #[serde(default)]
    pub rail: Rail,
    pub amount: Decimal,
}

// ===== HEALTH =====

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "success": true,
        "service": "propbook",
        "status": "ok",
    }))
}

// ===== PROPOSITIONS =====

/// POST /propositions
pub async fn create_proposition(
    State(state): State<SharedState>,
    Json(request): Json<NewProposition>,
) -> Result<(StatusCode, Json<Value>), EngineError> {
    let proposition = state.engine.create_proposition(request)?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "proposition": proposition }))))
}

/// GET /propositions
pub async fn list_propositions(State(state): State<SharedState>, Query(query): Query<ListQuery>) -> ApiResult {
    let propositions = state.engine.propositions(query.status)?;
    Ok(Json(json!({
        "success": true,
        "count": propositions.len(),
        "propositions": propositions,
    })))
}

/// GET /propositions/:id
pub async fn get_proposition(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult {
    let proposition = state.engine.proposition(id)?;
    let entries = state.engine.entries(id)?;
    Ok(Json(json!({
        "success": true,
        "proposition": proposition,
        "entries": entries,
    })))
}

/// POST /propositions/:id/entries
pub async fn place_entry(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(request): Json<EntryRequest>,
) -> Result<(StatusCode, Json<Value>), EngineError> {
    let receipt = state.engine.place_entry(PlaceEntry {
        user_id: request.user_id,
        proposition_id: id,
        option_id: request.option_id,
        amount: request.amount,
        rail: request.rail,
    })?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "entry": receipt.entry,
            "odds": receipt.odds,
            "pool_total": receipt.pool_total,
        })),
    ))
}

/// GET /propositions/:id/quote?option_id=..&amount=..
pub async fn quote(State(state): State<SharedState>, Path(id): Path<Uuid>, Query(query): Query<QuoteQuery>) -> ApiResult {
    let quote = state.engine.quote(id, query.option_id, query.amount)?;
    Ok(Json(json!({ "success": true, "quote": quote })))
}

/// POST /propositions/:id/settle (creator of a manual proposition)
pub async fn creator_settle(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CreatorSettleRequest>,
) -> ApiResult {
    let outcome = state.engine.settle_by_creator(&request.creator_id, id, request.settle)?;
    Ok(Json(json!({
        "success": true,
        "already_settled": outcome.already_settled,
        "settlement": outcome.settlement,
    })))
}

/// POST /propositions/:id/disputes
pub async fn file_dispute(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(request): Json<DisputeRequest>,
) -> Result<(StatusCode, Json<Value>), EngineError> {
    let dispute = state.engine.file_dispute(id, &request.user_id, request.reason.as_deref())?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "dispute": dispute }))))
}

// ===== WALLETS =====

/// GET /wallets/:user
pub async fn get_wallets(State(state): State<SharedState>, Path(user): Path<String>) -> ApiResult {
    let wallets = state.engine.wallets(&user)?;
    Ok(Json(json!({ "success": true, "user_id": user, "wallets": wallets })))
}

/// POST /wallets/:user/deposit
///
/// The demo faucet is open. Crypto deposits are custody confirmations and
/// need admin credentials.
pub async fn deposit(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(user): Path<String>,
    Json(request): Json<DepositRequest>,
) -> ApiResult {
    if request.rail == Rail::Crypto {
        let actor = state.authorizer.from_headers(&headers)?;
        info!(actor = actor.id(), user = %user, amount = ?request.amount, "crypto deposit confirmed");
    }
    let wallet = state.engine.deposit(&user, request.rail, request.amount)?;
    Ok(Json(json!({ "success": true, "wallet": wallet })))
}

/// POST /wallets/:user/withdraw (admin credentials)
pub async fn withdraw(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(user): Path<String>,
    Json(request): Json<WithdrawRequest>,
) -> ApiResult {
    let actor = state.authorizer.from_headers(&headers)?;
    info!(actor = actor.id(), user = %user, rail = %request.rail, amount = %request.amount, "withdrawal requested");
    let wallet = state.engine.withdraw(&user, request.rail, request.amount)?;
    Ok(Json(json!({ "success": true, "wallet": wallet })))
}

/// GET /wallets/:user/journal
pub async fn get_journal(State(state): State<SharedState>, Path(user): Path<String>) -> ApiResult {
    let journal = state.engine.journal(&user)?;
    Ok(Json(json!({
        "success": true,
        "user_id": user,
        "count": journal.len(),
        "transactions": journal,
    })))
}
