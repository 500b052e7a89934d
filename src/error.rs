//! Engine error taxonomy
//!
//! Every failure the engine can surface, grouped by kind so the HTTP layer can
//! map it to a status code without knowing the individual variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sled::transaction::TransactionError;
use uuid::Uuid;

use crate::propositions::status::{Command, PropositionStatus};

// ============================================================================
// ERROR KIND
// ============================================================================

/// Coarse classification used for response mapping and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input; never retried automatically
    Validation,
    /// Wrong status or wrong time for the requested action
    State,
    /// Caller lacks the funds for the action
    Resource,
    /// Settlement race or double settlement with a different outcome
    Conflict,
    NotFound,
    Unauthorized,
    Forbidden,
    /// A bug: ledger would go negative, pool diverged, storage failed
    Invariant,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::Validation | ErrorKind::State | ErrorKind::Resource => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Invariant => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ============================================================================
// ENGINE ERROR
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    Validation(String),
    StakeOutOfRange { amount: Decimal, min: Decimal, max: Option<Decimal> },
    UnknownOption(Uuid),
    ReasonTooShort { min: usize },

    NotOpen(PropositionStatus),
    DeadlinePassed,
    DuplicateEntry,
    InvalidTransition { from: PropositionStatus, command: Command },
    ResetBlocked(String),
    JobNotRetryable(String),
    NotDisputable(PropositionStatus),
    DuplicateDispute,
    DisputeClosed(String),

    InsufficientFunds { available: Decimal, requested: Decimal },

    ConflictingSettlement { settled_with: Uuid, requested: Uuid },

    PropositionNotFound(Uuid),
    SettlementNotFound(Uuid),
    JobNotFound(Uuid),
    DisputeNotFound(Uuid),

    Unauthorized,
    Forbidden(String),

    InvariantViolation(String),
    Storage(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_)
            | EngineError::StakeOutOfRange { .. }
            | EngineError::UnknownOption(_)
            | EngineError::ReasonTooShort { .. } => ErrorKind::Validation,
            EngineError::NotOpen(_)
            | EngineError::DeadlinePassed
            | EngineError::DuplicateEntry
            | EngineError::InvalidTransition { .. }
            | EngineError::ResetBlocked(_)
            | EngineError::JobNotRetryable(_)
            | EngineError::NotDisputable(_)
            | EngineError::DuplicateDispute
            | EngineError::DisputeClosed(_) => ErrorKind::State,
            EngineError::InsufficientFunds { .. } => ErrorKind::Resource,
            EngineError::ConflictingSettlement { .. } => ErrorKind::Conflict,
            EngineError::PropositionNotFound(_)
            | EngineError::SettlementNotFound(_)
            | EngineError::JobNotFound(_)
            | EngineError::DisputeNotFound(_) => ErrorKind::NotFound,
            EngineError::Unauthorized => ErrorKind::Unauthorized,
            EngineError::Forbidden(_) => ErrorKind::Forbidden,
            EngineError::InvariantViolation(_) | EngineError::Storage(_) => ErrorKind::Invariant,
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        EngineError::InvariantViolation(msg.into())
    }

    /// Message safe to show an end user. Invariant details stay in the logs.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Invariant => "Internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "Invalid request: {}", msg),
            EngineError::StakeOutOfRange { amount, min, max } => {
                if amount < min {
                    write!(f, "Minimum stake is {}", min)
                } else if let Some(max) = max {
                    write!(f, "Maximum stake is {}", max)
                } else {
                    write!(f, "Stake {} is out of range", amount)
                }
            }
            EngineError::UnknownOption(id) => write!(f, "Option {} does not belong to this proposition", id),
            EngineError::ReasonTooShort { min } => write!(f, "Reason must be at least {} characters", min),
            EngineError::NotOpen(status) => write!(f, "Proposition is not open for entries (status: {})", status),
            EngineError::DeadlinePassed => write!(f, "Entry deadline has passed"),
            EngineError::DuplicateEntry => write!(f, "You already have an active entry on this option"),
            EngineError::InvalidTransition { from, command } => {
                write!(f, "Cannot {} a proposition that is {}", command, from)
            }
            EngineError::ResetBlocked(msg) => write!(f, "Cannot reset: {}", msg),
            EngineError::JobNotRetryable(status) => write!(f, "Cannot retry job with status '{}'", status),
            EngineError::NotDisputable(status) => {
                write!(f, "Only settled propositions can be disputed (status: {})", status)
            }
            EngineError::DuplicateDispute => write!(f, "You already have an open dispute on this proposition"),
            EngineError::DisputeClosed(status) => write!(f, "Dispute is already {}", status),
            EngineError::InsufficientFunds { available, requested } => {
                write!(f, "Insufficient funds: have {}, need {}", available, requested)
            }
            EngineError::ConflictingSettlement { settled_with, .. } => {
                write!(f, "Proposition already settled with option {}", settled_with)
            }
            EngineError::PropositionNotFound(id) => write!(f, "Proposition not found: {}", id),
            EngineError::SettlementNotFound(id) => write!(f, "Settlement not found for proposition {}", id),
            EngineError::JobNotFound(id) => write!(f, "No finalize job found for proposition {}", id),
            EngineError::DisputeNotFound(id) => write!(f, "Dispute not found: {}", id),
            EngineError::Unauthorized => write!(f, "Admin credentials required"),
            EngineError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            EngineError::InvariantViolation(msg) => write!(f, "Invariant violation: {}", msg),
            EngineError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<sled::Error> for EngineError {
    fn from(err: sled::Error) -> Self {
        EngineError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Storage(format!("record codec: {}", err))
    }
}

impl From<TransactionError<EngineError>> for EngineError {
    fn from(err: TransactionError<EngineError>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => EngineError::Storage(e.to_string()),
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if kind == ErrorKind::Invariant {
            tracing::error!(error = %self, "engine invariant failure");
        }
        let body = Json(json!({
            "success": false,
            "error": self.public_message(),
            "code": kind,
        }));
        (kind.status_code(), body).into_response()
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
