use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::store::{Store, StoreTx, TxResult, AUDIT};

/// Admin command recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    Close,
    Void,
    Cancel,
    Settle,
    Reset,
    RetryFinalize,
    ResolveDispute,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub actor_id: String,
    pub action: AdminAction,
    pub proposition_id: Uuid,
    pub reason: Option<String>,
    pub meta: Value,
    pub at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(actor_id: &str, action: AdminAction, proposition_id: Uuid, reason: Option<&str>, meta: Value, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            actor_id: actor_id.to_string(),
            action,
            proposition_id,
            reason: reason.map(str::to_string),
            meta,
            at,
        }
    }

    /// Write inside the admin command's own transaction so a rejected
    /// command leaves no row behind
    pub fn append(&self, tx: &StoreTx<'_>) -> TxResult<()> {
        tx.put(AUDIT, self.id.as_bytes(), self)
    }
}

/// Audit rows oldest first, optionally for one proposition
pub fn audit_log(store: &Store, proposition_id: Option<Uuid>) -> EngineResult<Vec<AuditRecord>> {
    let rows: Vec<AuditRecord> = store.scan(AUDIT)?;
    Ok(match proposition_id {
        Some(pid) => rows.into_iter().filter(|r| r.proposition_id == pid).collect(),
        None => rows,
    })
}
