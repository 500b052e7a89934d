// On-chain finalize phase for crypto-rail payouts
//
// Job flow: Queued → Running → Finalized
//                        ↓
//                     Failed → (admin retry) → Queued
//
// A Running job holds a lease from `started_at`. Once the lease runs out the
// claim is presumed dead (crash, shutdown, dropped future) and the job goes
// back to Queued.
//
// The off-chain payout is already committed when a job exists. Nothing in
// this module touches wallet balances; a retry only repeats the chain call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::payout::{EntryOutcome, PayoutPlan};
use super::{save_settlement, Settlement};
use crate::audit::{AdminAction, AuditRecord};
use crate::auth::AdminActor;
use crate::chain_client::{merkle_root, ChainClient, ChainError, ChainPayout, ChainSettlement};
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::events::EngineEvent;
use crate::models::Rail;
use crate::store::{abort, StoreTx, TxResult, FINALIZE_JOBS, SETTLEMENTS};

// ============================================================================
// JOB RECORD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalizeStatus {
    Queued,
    Running,
    Finalized,
    Failed,
}

impl std::fmt::Display for FinalizeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinalizeStatus::Queued => write!(f, "queued"),
            FinalizeStatus::Running => write!(f, "running"),
            FinalizeStatus::Finalized => write!(f, "finalized"),
            FinalizeStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One job per settled proposition with crypto-rail entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeJob {
    pub proposition_id: Uuid,
    pub winning_option_id: Uuid,
    pub status: FinalizeStatus,
    /// Crypto-rail winners and their net payouts
    pub payouts: Vec<ChainPayout>,
    pub merkle_root: String,
    pub attempts: u32,
    /// Start of the current claim, set while Running
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl FinalizeJob {
    pub fn from_plan(proposition_id: Uuid, plan: &PayoutPlan, now: DateTime<Utc>) -> Self {
        let payouts: Vec<ChainPayout> = plan
            .entries
            .iter()
            .filter(|p| p.rail == Rail::Crypto)
            .filter_map(|p| match p.outcome {
                EntryOutcome::Won { net, .. } if !net.is_zero() => {
                    Some(ChainPayout { user_id: p.user_id.clone(), amount: net })
                }
                _ => None,
            })
            .collect();

        Self {
            proposition_id,
            winning_option_id: plan.winning_option_id,
            status: FinalizeStatus::Queued,
            merkle_root: merkle_root(proposition_id, &payouts),
            payouts,
            attempts: 0,
            started_at: None,
            last_error: None,
            tx_hash: None,
            created_at: now,
            updated_at: now,
            finalized_at: None,
        }
    }

    /// Running with a claim older than `lease`
    pub fn lease_expired(&self, now: DateTime<Utc>, lease: chrono::Duration) -> bool {
        self.status == FinalizeStatus::Running && self.started_at.map_or(true, |at| now - at >= lease)
    }

    pub fn chain_settlement(&self) -> ChainSettlement {
        ChainSettlement {
            proposition_id: self.proposition_id,
            winning_option_id: self.winning_option_id,
            currency: Rail::Crypto.currency().to_string(),
            payouts: self.payouts.clone(),
            merkle_root: self.merkle_root.clone(),
        }
    }
}

fn load_job(tx: &StoreTx<'_>, proposition_id: Uuid) -> TxResult<FinalizeJob> {
    match tx.get::<FinalizeJob>(FINALIZE_JOBS, proposition_id.as_bytes())? {
        Some(job) => Ok(job),
        None => abort(EngineError::JobNotFound(proposition_id)),
    }
}

/// Write the job and mirror its status onto the settlement record
fn store_job(tx: &StoreTx<'_>, job: &FinalizeJob) -> TxResult<()> {
    tx.put(FINALIZE_JOBS, job.proposition_id.as_bytes(), job)?;
    if let Some(mut settlement) = tx.get::<Settlement>(SETTLEMENTS, job.proposition_id.as_bytes())? {
        settlement.onchain_status = Some(job.status);
        save_settlement(tx, &settlement)?;
    }
    Ok(())
}

// ============================================================================
// ENGINE OPERATIONS
// ============================================================================

impl Engine {
    pub fn finalize_job(&self, proposition_id: Uuid) -> EngineResult<FinalizeJob> {
        self.store()
            .get::<FinalizeJob>(FINALIZE_JOBS, proposition_id.as_bytes())?
            .ok_or(EngineError::JobNotFound(proposition_id))
    }

    pub fn finalize_jobs(&self, status: Option<FinalizeStatus>) -> EngineResult<Vec<FinalizeJob>> {
        let mut jobs: Vec<FinalizeJob> = self
            .store()
            .scan::<FinalizeJob>(FINALIZE_JOBS)?
            .into_iter()
            .filter(|j| status.map_or(true, |s| j.status == s))
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    /// Move a failed job, or a running job whose lease has expired, back to
    /// the queue. Only the chain leg is repeated.
    pub fn retry_finalize(&self, actor: &AdminActor, proposition_id: Uuid) -> EngineResult<FinalizeJob> {
        let now = self.now();
        let lease = self.settings().finalize_lease;
        let job = self.store().transaction(|tx| {
            let mut job = load_job(tx, proposition_id)?;
            let previous = job.status;
            if previous != FinalizeStatus::Failed && !job.lease_expired(now, lease) {
                warn!(proposition = %proposition_id, actor = actor.id(), status = %job.status, "retry refused");
                return abort(EngineError::JobNotRetryable(job.status.to_string()));
            }
            job.status = FinalizeStatus::Queued;
            job.started_at = None;
            job.updated_at = now;
            store_job(tx, &job)?;

            let meta = json!({ "attempts": job.attempts, "last_error": job.last_error, "previous_status": previous });
            AuditRecord::new(actor.id(), AdminAction::RetryFinalize, proposition_id, None, meta, now).append(tx)?;
            Ok(job)
        })?;

        info!(proposition = %proposition_id, actor = actor.id(), attempts = job.attempts, "finalize requeued");
        self.publish_finalize(&job);
        Ok(job)
    }

    /// Claim a queued job. Returns None if another worker got there first.
    fn claim_job(&self, proposition_id: Uuid) -> EngineResult<Option<FinalizeJob>> {
        let now = self.now();
        self.store().transaction(|tx| {
            let mut job = match tx.get::<FinalizeJob>(FINALIZE_JOBS, proposition_id.as_bytes())? {
                Some(job) if job.status == FinalizeStatus::Queued => job,
                _ => return Ok(None),
            };
            job.status = FinalizeStatus::Running;
            job.attempts += 1;
            job.started_at = Some(now);
            job.updated_at = now;
            store_job(tx, &job)?;
            Ok(Some(job))
        })
    }

    /// Store the chain result for the claim `attempt`. Returns None when the
    /// claim was lost to lease recovery in the meantime; the result is dropped.
    fn record_finalize(
        &self,
        proposition_id: Uuid,
        attempt: u32,
        result: &Result<String, ChainError>,
    ) -> EngineResult<Option<FinalizeJob>> {
        let now = self.now();
        self.store().transaction(|tx| {
            let mut job = match tx.get::<FinalizeJob>(FINALIZE_JOBS, proposition_id.as_bytes())? {
                Some(job) if job.status == FinalizeStatus::Running && job.attempts == attempt => job,
                _ => return Ok(None),
            };
            job.started_at = None;
            match result {
                Ok(hash) => {
                    job.status = FinalizeStatus::Finalized;
                    job.tx_hash = Some(hash.clone());
                    job.last_error = None;
                    job.finalized_at = Some(now);
                }
                Err(err) => {
                    job.status = FinalizeStatus::Failed;
                    job.last_error = Some(err.to_string());
                }
            }
            job.updated_at = now;
            store_job(tx, &job)?;
            Ok(Some(job))
        })
    }

    /// Requeue running jobs whose claim is older than `lease`. At startup no
    /// claim can be alive, so callers pass a zero lease there.
    pub fn recover_stale_jobs(&self, lease: chrono::Duration) -> EngineResult<usize> {
        let now = self.now();
        let mut recovered = 0;
        for stale in self.finalize_jobs(Some(FinalizeStatus::Running))? {
            if !stale.lease_expired(now, lease) {
                continue;
            }
            let job = self.store().transaction(|tx| {
                let mut job = match tx.get::<FinalizeJob>(FINALIZE_JOBS, stale.proposition_id.as_bytes())? {
                    Some(job) if job.lease_expired(now, lease) => job,
                    _ => return Ok(None),
                };
                job.status = FinalizeStatus::Queued;
                job.last_error = Some(format!("claim from attempt {} expired", job.attempts));
                job.started_at = None;
                job.updated_at = now;
                store_job(tx, &job)?;
                Ok(Some(job))
            })?;
            if let Some(job) = job {
                warn!(proposition = %job.proposition_id, attempts = job.attempts, "stale finalize claim requeued");
                self.publish_finalize(&job);
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    /// Drive every queued job through the chain once. Stale claims are
    /// requeued first. The chain call runs outside any store transaction and
    /// is cut off at the lease length.
    pub async fn run_finalize_once(&self, chain: &dyn ChainClient) -> EngineResult<usize> {
        let lease = self.settings().finalize_lease;
        self.recover_stale_jobs(lease)?;
        let call_limit = lease.to_std().unwrap_or(Duration::ZERO);

        let queued = self.finalize_jobs(Some(FinalizeStatus::Queued))?;
        let mut processed = 0;

        for queued_job in queued {
            let Some(job) = self.claim_job(queued_job.proposition_id)? else {
                continue;
            };

            let settlement = job.chain_settlement();
            let result = match tokio::time::timeout(call_limit, chain.submit_settlement(&settlement)).await {
                Ok(result) => result,
                Err(_) => Err(ChainError::RequestFailed(format!("no response within {}ms", lease.num_milliseconds()))),
            };
            let Some(job) = self.record_finalize(job.proposition_id, job.attempts, &result)? else {
                warn!(proposition = %job.proposition_id, attempt = job.attempts, "finalize claim lost, result dropped");
                continue;
            };
            match &result {
                Ok(hash) => info!(proposition = %job.proposition_id, tx_hash = %hash, payouts = job.payouts.len(), "finalized on-chain"),
                Err(err) => warn!(proposition = %job.proposition_id, attempts = job.attempts, error = %err, "finalize failed"),
            }
            self.publish_finalize(&job);
            processed += 1;
        }
        Ok(processed)
    }

    fn publish_finalize(&self, job: &FinalizeJob) {
        let finalized = job.status == FinalizeStatus::Finalized;
        self.events().publish(EngineEvent::FinalizeUpdated {
            proposition_id: job.proposition_id,
            rail: Rail::Crypto,
            finalized,
        });
        if finalized {
            self.events().publish(EngineEvent::SettlementComplete {
                proposition_id: job.proposition_id,
                winning_option_id: job.winning_option_id,
                fully_finalized: true,
            });
        }
    }
}

// ============================================================================
// BACKGROUND WORKER
// ============================================================================

/// Polls for queued finalize jobs and persists lazy deadline closes
pub struct FinalizeWorker {
    engine: Engine,
    chain: Arc<dyn ChainClient>,
    poll: Duration,
}

impl FinalizeWorker {
    pub fn new(engine: Engine, chain: Arc<dyn ChainClient>, poll: Duration) -> Self {
        Self { engine, chain, poll }
    }

    pub async fn tick(&self) {
        if let Err(err) = self.engine.sweep_expired() {
            error!(error = %err, "deadline sweep failed");
        }
        match self.engine.run_finalize_once(self.chain.as_ref()).await {
            Ok(0) => {}
            Ok(n) => info!(jobs = n, "finalize pass complete"),
            Err(err) => error!(error = %err, "finalize pass failed"),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.tick().await;
            }
        })
    }
}
