//! Proposition lifecycle
//!
//! Creation, admin close/void/cancel, the lazy deadline close and the
//! read side. Entry placement lives in [`entries`], settlement and reset in
//! `crate::settlement`.

pub mod entries;
pub mod status;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{AdminAction, AuditRecord};
use crate::auth::AdminActor;
use crate::engine::{check_user_id, Engine};
use crate::error::{EngineError, EngineResult};
use crate::events::EngineEvent;
use crate::ledger::{Cause, LedgerTx, TxReason};
use crate::models::{Entry, EntryStatus, Proposition, PropositionOption, SettlementMethod};
use crate::odds::{self, StakeQuote};
use crate::store::{abort, key, StoreTx, TxResult, ACTIVE_STAKES, ENTRIES, ENTRY_INDEX, PROPOSITIONS};

use status::{transition, Command, PropositionStatus};

/// Fees above this share of a payout are refused at creation
const MAX_FEE_PCT: Decimal = dec!(50);

// ============================================================================
// REQUEST / REPORT TYPES
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewProposition {
    pub creator_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub options: Vec<String>,
    pub stake_min: Decimal,
    #[serde(default)]
    pub stake_max: Option<Decimal>,
    pub entry_deadline: DateTime<Utc>,
    #[serde(default)]
    pub settlement_method: SettlementMethod,
    #[serde(default)]
    pub platform_fee_percentage: Option<Decimal>,
    #[serde(default)]
    pub creator_fee_percentage: Option<Decimal>,
}

fn default_category() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub proposition_id: Uuid,
    pub pool_total: Decimal,
    pub options_total: Decimal,
    pub entries_total: Decimal,
    pub entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoidOutcome {
    pub proposition: Proposition,
    pub refunded_entries: usize,
    pub refunded_amount: Decimal,
}

// ============================================================================
// STORAGE HELPERS
// ============================================================================

pub(crate) fn stake_key(proposition_id: Uuid, option_id: Uuid, user_id: &str) -> Vec<u8> {
    key(&[&proposition_id.to_string(), &option_id.to_string(), user_id])
}

pub(crate) fn load(tx: &StoreTx<'_>, proposition_id: Uuid) -> TxResult<Proposition> {
    match tx.get::<Proposition>(PROPOSITIONS, proposition_id.as_bytes())? {
        Some(prop) => Ok(prop),
        None => abort(EngineError::PropositionNotFound(proposition_id)),
    }
}

pub(crate) fn save(tx: &StoreTx<'_>, prop: &Proposition) -> TxResult<()> {
    tx.put(PROPOSITIONS, prop.id.as_bytes(), prop)
}

pub(crate) fn save_entry(tx: &StoreTx<'_>, entry: &Entry) -> TxResult<()> {
    tx.put(ENTRIES, entry.id.as_bytes(), entry)
}

pub(crate) fn entry_ids(tx: &StoreTx<'_>, proposition_id: Uuid) -> TxResult<Vec<Uuid>> {
    Ok(tx.get::<Vec<Uuid>>(ENTRY_INDEX, proposition_id.as_bytes())?.unwrap_or_default())
}

/// Entries in placement order
pub(crate) fn load_entries(tx: &StoreTx<'_>, proposition_id: Uuid) -> TxResult<Vec<Entry>> {
    let mut entries = Vec::new();
    for id in entry_ids(tx, proposition_id)? {
        match tx.get::<Entry>(ENTRIES, id.as_bytes())? {
            Some(entry) => entries.push(entry),
            None => return abort(EngineError::invariant(format!("entry {} indexed but missing", id))),
        }
    }
    Ok(entries)
}

/// Status check against the transition table using the effective status
pub(crate) fn apply_transition(prop: &Proposition, command: Command, now: DateTime<Utc>) -> EngineResult<PropositionStatus> {
    let from = prop.effective_status(now);
    transition(from, command).ok_or(EngineError::InvalidTransition { from, command })
}

/// `pool_total == Σ option.total_staked`
pub(crate) fn check_pool(prop: &Proposition) -> EngineResult<()> {
    let options_total = prop.options_total();
    if prop.pool_total != options_total {
        error!(
            proposition = %prop.id,
            pool_total = %prop.pool_total,
            %options_total,
            "pool total diverged from option totals"
        );
        return Err(EngineError::invariant(format!(
            "proposition {} pool {} != options {}",
            prop.id, prop.pool_total, options_total
        )));
    }
    Ok(())
}

fn validate(req: &NewProposition, now: DateTime<Utc>) -> EngineResult<()> {
    let invalid = |msg: &str| -> EngineResult<()> { Err(EngineError::Validation(msg.to_string())) };

    if req.title.trim().is_empty() {
        return invalid("title is required");
    }
    check_user_id(&req.creator_id)?;
    let labels: Vec<String> = req.options.iter().map(|o| o.trim().to_lowercase()).collect();
    if labels.len() < 2 {
        return invalid("at least two options are required");
    }
    if labels.iter().any(|l| l.is_empty()) {
        return invalid("option labels cannot be empty");
    }
    if labels.iter().collect::<HashSet<_>>().len() != labels.len() {
        return invalid("option labels must be distinct");
    }
    if req.stake_min <= Decimal::ZERO {
        return invalid("minimum stake must be positive");
    }
    if matches!(req.stake_max, Some(max) if max < req.stake_min) {
        return invalid("maximum stake is below minimum stake");
    }
    if req.entry_deadline <= now {
        return invalid("entry deadline must be in the future");
    }
    for pct in [req.platform_fee_percentage, req.creator_fee_percentage].into_iter().flatten() {
        if pct < Decimal::ZERO || pct > MAX_FEE_PCT {
            return invalid("fee percentages must be between 0 and 50");
        }
    }
    Ok(())
}

// ============================================================================
// ENGINE OPERATIONS
// ============================================================================

impl Engine {
    pub fn create_proposition(&self, req: NewProposition) -> EngineResult<Proposition> {
        let now = self.now();
        validate(&req, now)?;
        let defaults = self.settings().default_fees;

        let mut prop = Proposition {
            id: Uuid::new_v4(),
            creator_id: req.creator_id.clone(),
            title: req.title.trim().to_string(),
            description: req.description,
            category: req.category,
            options: req.options.iter().map(|l| PropositionOption::new(l.trim().to_string())).collect(),
            stake_min: req.stake_min,
            stake_max: req.stake_max,
            entry_deadline: req.entry_deadline,
            settlement_method: req.settlement_method,
            status: PropositionStatus::Pending,
            pool_total: Decimal::ZERO,
            winning_option_id: None,
            platform_fee_percentage: req.platform_fee_percentage.unwrap_or(defaults.platform_pct),
            creator_fee_percentage: req.creator_fee_percentage.unwrap_or(defaults.creator_pct),
            status_reason: None,
            created_at: now,
            updated_at: now,
            settled_at: None,
        };
        // Options are inline, so persisting the record persists them
        prop.status = apply_transition(&prop, Command::Open, now)?;

        let prop = self.store().transaction(|tx| {
            save(tx, &prop)?;
            tx.put(ENTRY_INDEX, prop.id.as_bytes(), &Vec::<Uuid>::new())?;
            Ok(prop.clone())
        })?;

        info!(proposition = %prop.id, creator = %prop.creator_id, options = prop.options.len(), "proposition opened");
        self.publish_status(&prop);
        Ok(prop)
    }

    /// Proposition as observed now (lazy deadline close applied)
    pub fn proposition(&self, proposition_id: Uuid) -> EngineResult<Proposition> {
        let mut prop = self
            .store()
            .get::<Proposition>(PROPOSITIONS, proposition_id.as_bytes())?
            .ok_or(EngineError::PropositionNotFound(proposition_id))?;
        prop.status = prop.effective_status(self.now());
        Ok(prop)
    }

    pub fn propositions(&self, status: Option<PropositionStatus>) -> EngineResult<Vec<Proposition>> {
        let now = self.now();
        let mut props: Vec<Proposition> = self
            .store()
            .scan::<Proposition>(PROPOSITIONS)?
            .into_iter()
            .map(|mut p| {
                p.status = p.effective_status(now);
                p
            })
            .filter(|p| status.map_or(true, |s| p.status == s))
            .collect();
        props.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(props)
    }

    pub fn entries(&self, proposition_id: Uuid) -> EngineResult<Vec<Entry>> {
        self.proposition(proposition_id)?;
        self.store().transaction(|tx| load_entries(tx, proposition_id))
    }

    pub fn quote(&self, proposition_id: Uuid, option_id: Uuid, amount: Decimal) -> EngineResult<StakeQuote> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::Validation("amount must be positive".into()));
        }
        let prop = self.proposition(proposition_id)?;
        let option = prop.option(option_id).ok_or(EngineError::UnknownOption(option_id))?;
        Ok(odds::quote(prop.pool_total, option.total_staked, amount))
    }

    /// Admin close early. Does not touch the ledger.
    pub fn close(&self, actor: &AdminActor, proposition_id: Uuid, reason: Option<&str>) -> EngineResult<Proposition> {
        let now = self.now();
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());

        let prop = self.store().transaction(|tx| {
            let mut prop = load(tx, proposition_id)?;
            prop.status = self.checked(&prop, Command::Close, now, actor.id())?;
            prop.status_reason = reason.map(str::to_string);
            prop.updated_at = now;
            save(tx, &prop)?;
            AuditRecord::new(actor.id(), AdminAction::Close, prop.id, reason, json!({}), now).append(tx)?;
            Ok(prop)
        })?;

        info!(proposition = %prop.id, actor = actor.id(), "proposition closed");
        self.publish_status(&prop);
        Ok(prop)
    }

    /// Refund every active entry and make the proposition terminal
    pub fn void(&self, actor: &AdminActor, proposition_id: Uuid, reason: Option<&str>) -> EngineResult<VoidOutcome> {
        let reason = self.require_reason(reason)?;
        let now = self.now();

        let (outcome, touched) = self.store().transaction(|tx| {
            let mut prop = load(tx, proposition_id)?;
            prop.status = self.checked(&prop, Command::Void, now, actor.id())?;

            let ledger = LedgerTx::new(tx, now);
            let mut refunded_entries = 0;
            let mut refunded_amount = Decimal::ZERO;
            for mut entry in load_entries(tx, proposition_id)? {
                if entry.status != EntryStatus::Active {
                    continue;
                }
                ledger.unlock(
                    &entry.user_id,
                    entry.rail.currency(),
                    entry.amount,
                    Cause::entry(TxReason::Refund, prop.id, entry.id),
                )?;
                entry.status = EntryStatus::Refunded;
                entry.updated_at = now;
                save_entry(tx, &entry)?;
                tx.remove(ACTIVE_STAKES, &stake_key(prop.id, entry.option_id, &entry.user_id))?;
                refunded_entries += 1;
                refunded_amount += entry.amount;
            }

            prop.status_reason = Some(reason.to_string());
            prop.updated_at = now;
            save(tx, &prop)?;

            let meta = json!({ "refunded_entries": refunded_entries, "refunded_amount": refunded_amount });
            AuditRecord::new(actor.id(), AdminAction::Void, prop.id, Some(reason), meta, now).append(tx)?;

            Ok((VoidOutcome { proposition: prop, refunded_entries, refunded_amount }, ledger.touched()))
        })?;

        info!(
            proposition = %proposition_id,
            actor = actor.id(),
            refunded = outcome.refunded_entries,
            amount = %outcome.refunded_amount,
            "proposition voided"
        );
        self.publish_status(&outcome.proposition);
        self.events().wallets_updated(touched);
        Ok(outcome)
    }

    /// Terminal without refund; stakes stay locked for review
    pub fn cancel(&self, actor: &AdminActor, proposition_id: Uuid, reason: Option<&str>) -> EngineResult<Proposition> {
        let reason = self.require_reason(reason)?;
        let now = self.now();

        let prop = self.store().transaction(|tx| {
            let mut prop = load(tx, proposition_id)?;
            prop.status = self.checked(&prop, Command::Cancel, now, actor.id())?;
            prop.status_reason = Some(reason.to_string());
            prop.updated_at = now;
            save(tx, &prop)?;
            AuditRecord::new(actor.id(), AdminAction::Cancel, prop.id, Some(reason), json!({}), now).append(tx)?;
            Ok(prop)
        })?;

        info!(proposition = %prop.id, actor = actor.id(), "proposition cancelled, stakes held");
        self.publish_status(&prop);
        Ok(prop)
    }

    /// Persist the deadline close for every open proposition past its deadline
    pub fn sweep_expired(&self) -> EngineResult<usize> {
        let now = self.now();
        let expired: Vec<Uuid> = self
            .store()
            .scan::<Proposition>(PROPOSITIONS)?
            .into_iter()
            .filter(|p| p.status == PropositionStatus::Open && p.deadline_passed(now))
            .map(|p| p.id)
            .collect();

        let mut closed = 0;
        for id in expired {
            let updated = self.store().transaction(|tx| {
                let mut prop = load(tx, id)?;
                // Re-check: an admin command may have won the race
                if prop.status != PropositionStatus::Open || !prop.deadline_passed(now) {
                    return Ok(None);
                }
                prop.status = PropositionStatus::Closed;
                prop.status_reason = Some("entry deadline reached".to_string());
                prop.updated_at = now;
                save(tx, &prop)?;
                Ok(Some(prop))
            })?;
            if let Some(prop) = updated {
                info!(proposition = %prop.id, "deadline reached, proposition closed");
                self.publish_status(&prop);
                closed += 1;
            }
        }
        Ok(closed)
    }

    /// Recompute the pool from options and entries
    pub fn reconcile(&self, proposition_id: Uuid) -> EngineResult<Reconciliation> {
        let (prop, entries) = self
            .store()
            .transaction(|tx| Ok((load(tx, proposition_id)?, load_entries(tx, proposition_id)?)))?;

        check_pool(&prop)?;
        let entries_total: Decimal = entries.iter().map(|e| e.amount).sum();
        if entries_total != prop.pool_total {
            error!(
                proposition = %prop.id,
                pool_total = %prop.pool_total,
                %entries_total,
                "pool total diverged from entry amounts"
            );
            return Err(EngineError::invariant(format!(
                "proposition {} pool {} != entries {}",
                prop.id, prop.pool_total, entries_total
            )));
        }

        Ok(Reconciliation {
            proposition_id,
            pool_total: prop.pool_total,
            options_total: prop.options_total(),
            entries_total,
            entries: entries.len(),
        })
    }

    /// Transition check that logs rejected commands
    pub(crate) fn checked(
        &self,
        prop: &Proposition,
        command: Command,
        now: DateTime<Utc>,
        actor_id: &str,
    ) -> TxResult<PropositionStatus> {
        match apply_transition(prop, command, now) {
            Ok(next) => Ok(next),
            Err(err) => {
                warn!(proposition = %prop.id, actor = actor_id, %command, error = %err, "command rejected");
                abort(err)
            }
        }
    }

    pub(crate) fn publish_status(&self, prop: &Proposition) {
        self.events().publish(EngineEvent::PropositionUpdated {
            proposition_id: prop.id,
            status: prop.effective_status(self.now()),
        });
    }
}
