//! Settlement engine
//!
//! `settle` applies a [`payout::PayoutPlan`] to the ledger in one store
//! transaction. The settlements tree is keyed by proposition id, so a second
//! settle sees the first one's record inside its own transaction and either
//! returns it untouched or fails with a conflict. `reset` applies the exact
//! inverse of the stored plan.

pub mod disputes;
pub mod finalize;
pub mod payout;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{AdminAction, AuditRecord};
use crate::auth::AdminActor;
use crate::engine::{check_user_id, Engine};
use crate::error::{EngineError, EngineResult};
use crate::events::EngineEvent;
use crate::ledger::{Cause, LedgerTx, TxReason};
use crate::models::{Entry, EntryStatus, Rail, SettlementMethod};
use crate::propositions::status::{Command, PropositionStatus};
use crate::propositions::{load, load_entries, save, save_entry, stake_key};
use crate::store::{abort, OrAbort, StoreTx, TxResult, ACTIVE_STAKES, ENTRIES, FINALIZE_JOBS, SETTLEMENTS};

use finalize::{FinalizeJob, FinalizeStatus};
use payout::{plan_payouts, EntryOutcome, FeeRates, PayoutPlan};

// ============================================================================
// SETTLEMENT RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub proposition_id: Uuid,
    pub winning_option_id: Uuid,
    pub actor_id: String,
    pub resolution_reason: Option<String>,
    pub resolution_source_url: Option<String>,
    pub entries_processed: usize,
    pub winners: usize,
    pub losers: usize,
    pub refunded: usize,
    /// Receives platform fees and rounding residue
    pub platform_account_id: String,
    /// Receives creator fees
    pub creator_id: String,
    pub plan: PayoutPlan,
    /// None when no crypto-rail entry took part
    pub onchain_status: Option<FinalizeStatus>,
    pub settled_at: DateTime<Utc>,
}

impl Settlement {
    pub fn platform_fees(&self, rail: Rail) -> Decimal {
        self.plan.rail(rail).map_or(Decimal::ZERO, |r| r.platform_fees)
    }

    pub fn creator_fees(&self, rail: Rail) -> Decimal {
        self.plan.rail(rail).map_or(Decimal::ZERO, |r| r.creator_fees)
    }

    /// Off-chain payout done and, if needed, mirrored on-chain
    pub fn fully_finalized(&self) -> bool {
        matches!(self.onchain_status, None | Some(FinalizeStatus::Finalized))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettleRequest {
    pub winning_option_id: Uuid,
    #[serde(default)]
    pub resolution_reason: Option<String>,
    #[serde(default)]
    pub resolution_source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettleOutcome {
    pub settlement: Settlement,
    pub already_settled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResetOutcome {
    pub proposition_id: Uuid,
    pub entries_restored: usize,
    pub cancelled_job: Option<FinalizeStatus>,
}

pub(crate) fn save_settlement(tx: &StoreTx<'_>, settlement: &Settlement) -> TxResult<()> {
    tx.put(SETTLEMENTS, settlement.proposition_id.as_bytes(), settlement)
}

// ============================================================================
// SETTLE / RESET
// ============================================================================

impl Engine {
    pub fn settlement(&self, proposition_id: Uuid) -> EngineResult<Settlement> {
        self.store()
            .get::<Settlement>(SETTLEMENTS, proposition_id.as_bytes())?
            .ok_or(EngineError::SettlementNotFound(proposition_id))
    }

    pub fn settle(&self, actor: &AdminActor, proposition_id: Uuid, req: SettleRequest) -> EngineResult<SettleOutcome> {
        self.settle_as(actor.id(), false, proposition_id, req)
    }

    /// Creators resolve their own `manual` propositions. Auto-settled ones
    /// stay with operators.
    pub fn settle_by_creator(&self, creator_id: &str, proposition_id: Uuid, req: SettleRequest) -> EngineResult<SettleOutcome> {
        check_user_id(creator_id)?;
        // Creator and settlement method never change after creation
        let prop = self.proposition(proposition_id)?;
        if prop.creator_id != creator_id {
            warn!(proposition = %proposition_id, caller = creator_id, "settle attempted by non-creator");
            return Err(EngineError::Forbidden("only the creator can settle this proposition".into()));
        }
        if prop.settlement_method != SettlementMethod::Manual {
            return Err(EngineError::Forbidden("auto-settled propositions are resolved by operators".into()));
        }
        self.settle_as(creator_id, true, proposition_id, req)
    }

    fn settle_as(&self, actor_id: &str, by_creator: bool, proposition_id: Uuid, req: SettleRequest) -> EngineResult<SettleOutcome> {
        let now = self.now();
        let platform_account = self.settings().platform_account_id.clone();
        let winner = req.winning_option_id;

        let (outcome, touched) = self.store().transaction(|tx| {
            if let Some(existing) = tx.get::<Settlement>(SETTLEMENTS, proposition_id.as_bytes())? {
                if existing.winning_option_id == winner {
                    return Ok((SettleOutcome { settlement: existing, already_settled: true }, Vec::new()));
                }
                return abort(EngineError::ConflictingSettlement {
                    settled_with: existing.winning_option_id,
                    requested: winner,
                });
            }

            let mut prop = load(tx, proposition_id)?;
            let next = self.checked(&prop, Command::Settle, now, actor_id)?;
            if prop.option(winner).is_none() {
                return abort(EngineError::UnknownOption(winner));
            }

            let entries = load_entries(tx, proposition_id)?;
            let rates = FeeRates {
                platform_pct: prop.platform_fee_percentage,
                creator_pct: prop.creator_fee_percentage,
            };
            let plan = plan_payouts(&entries, winner, rates).or_abort()?;

            let planned_pool: Decimal = plan.rails.iter().map(|r| r.pool).sum();
            if planned_pool != prop.pool_total {
                error!(proposition = %prop.id, %planned_pool, pool_total = %prop.pool_total, "settlement pool mismatch");
                return abort(EngineError::invariant(format!(
                    "active entries {} != pool {} for {}",
                    planned_pool, prop.pool_total, prop.id
                )));
            }

            let ledger = LedgerTx::new(tx, now);
            for payout in &plan.entries {
                let currency = payout.rail.currency();
                let pool_cause = Cause::entry(TxReason::PoolContribution, prop.id, payout.entry_id);
                match &payout.outcome {
                    EntryOutcome::Won { net, .. } => {
                        ledger.unlock(&payout.user_id, currency, payout.amount, pool_cause)?;
                        ledger.debit(&payout.user_id, currency, payout.amount, pool_cause)?;
                        if !net.is_zero() {
                            let cause = Cause::entry(TxReason::Payout, prop.id, payout.entry_id);
                            ledger.credit(&payout.user_id, currency, *net, cause)?;
                        }
                    }
                    EntryOutcome::Lost => {
                        ledger.unlock(&payout.user_id, currency, payout.amount, pool_cause)?;
                        ledger.debit(&payout.user_id, currency, payout.amount, pool_cause)?;
                    }
                    EntryOutcome::Refunded => {
                        let cause = Cause::entry(TxReason::Refund, prop.id, payout.entry_id);
                        ledger.unlock(&payout.user_id, currency, payout.amount, cause)?;
                    }
                }

                let mut entry = match tx.get::<Entry>(ENTRIES, payout.entry_id.as_bytes())? {
                    Some(entry) => entry,
                    None => return abort(EngineError::invariant(format!("entry {} vanished", payout.entry_id))),
                };
                entry.status = payout.outcome.entry_status();
                entry.actual_payout = match payout.outcome {
                    EntryOutcome::Refunded => None,
                    _ => Some(payout.outcome.net()),
                };
                entry.updated_at = now;
                save_entry(tx, &entry)?;
                tx.remove(ACTIVE_STAKES, &stake_key(prop.id, entry.option_id, &entry.user_id))?;
            }

            for rail in plan.rails.iter().filter(|r| !r.refunded) {
                let currency = rail.rail.currency();
                let take = rail.platform_take();
                if take > Decimal::ZERO {
                    let cause = Cause::proposition(TxReason::PlatformFee, prop.id);
                    ledger.credit(&platform_account, currency, take, cause)?;
                }
                if rail.creator_fees > Decimal::ZERO {
                    let cause = Cause::proposition(TxReason::CreatorFee, prop.id);
                    ledger.credit(&prop.creator_id, currency, rail.creator_fees, cause)?;
                }
            }

            let onchain_status = if plan.has_crypto() {
                let job = FinalizeJob::from_plan(prop.id, &plan, now);
                tx.put(FINALIZE_JOBS, prop.id.as_bytes(), &job)?;
                Some(job.status)
            } else {
                None
            };

            let settlement = Settlement {
                id: Uuid::new_v4(),
                proposition_id: prop.id,
                winning_option_id: winner,
                actor_id: actor_id.to_string(),
                resolution_reason: req.resolution_reason.clone(),
                resolution_source_url: req.resolution_source_url.clone(),
                entries_processed: plan.entries.len(),
                winners: plan.winners(),
                losers: plan.losers(),
                refunded: plan.refunded(),
                platform_account_id: platform_account.clone(),
                creator_id: prop.creator_id.clone(),
                plan: plan.clone(),
                onchain_status,
                settled_at: now,
            };
            save_settlement(tx, &settlement)?;

            prop.status = next;
            prop.winning_option_id = Some(winner);
            prop.settled_at = Some(now);
            prop.updated_at = now;
            save(tx, &prop)?;

            let meta = json!({
                "winning_option_id": winner,
                "entries": settlement.entries_processed,
                "source_url": req.resolution_source_url,
                "by_creator": by_creator,
            });
            AuditRecord::new(actor_id, AdminAction::Settle, prop.id, req.resolution_reason.as_deref(), meta, now)
                .append(tx)?;

            Ok((SettleOutcome { settlement, already_settled: false }, ledger.touched()))
        })?;

        let settlement = &outcome.settlement;
        if outcome.already_settled {
            info!(proposition = %proposition_id, actor = actor_id, "settle repeated with same winner, no-op");
            return Ok(outcome);
        }

        info!(
            proposition = %proposition_id,
            actor = actor_id,
            by_creator,
            winner = %settlement.winning_option_id,
            winners = settlement.winners,
            losers = settlement.losers,
            refunded = settlement.refunded,
            onchain = ?settlement.onchain_status,
            "proposition settled"
        );
        self.events().publish(EngineEvent::PropositionUpdated {
            proposition_id,
            status: PropositionStatus::Settled,
        });
        self.events().publish(EngineEvent::SettlementComplete {
            proposition_id,
            winning_option_id: settlement.winning_option_id,
            fully_finalized: settlement.fully_finalized(),
        });
        self.events().wallets_updated(touched);
        Ok(outcome)
    }

    /// Undo a settlement: inverse ledger moves in reverse order, entries back
    /// to active, settlement record removed, proposition reopened.
    pub fn reset(&self, actor: &AdminActor, proposition_id: Uuid, reason: Option<&str>) -> EngineResult<ResetOutcome> {
        let now = self.now();
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());

        let (outcome, prop, touched) = self.store().transaction(|tx| {
            let mut prop = load(tx, proposition_id)?;
            let next = self.checked(&prop, Command::Reset, now, actor.id())?;

            let settlement = match tx.get::<Settlement>(SETTLEMENTS, proposition_id.as_bytes())? {
                Some(s) => s,
                None => {
                    return abort(EngineError::invariant(format!("settled proposition {} has no settlement", proposition_id)))
                }
            };

            let cancelled_job = match tx.get::<FinalizeJob>(FINALIZE_JOBS, proposition_id.as_bytes())? {
                Some(job) if job.status == FinalizeStatus::Running => {
                    return abort(EngineError::ResetBlocked("on-chain finalize is running".into()));
                }
                Some(job) if job.status == FinalizeStatus::Finalized => {
                    return abort(EngineError::ResetBlocked("payouts are already finalized on-chain".into()));
                }
                Some(job) => {
                    tx.remove(FINALIZE_JOBS, proposition_id.as_bytes())?;
                    Some(job.status)
                }
                None => None,
            };

            let ledger = LedgerTx::new(tx, now);
            ensure_reversible(&ledger, &settlement)?;

            for rail in settlement.plan.rails.iter().filter(|r| !r.refunded).rev() {
                let currency = rail.rail.currency();
                let cause = Cause::proposition(TxReason::SettlementReversal, prop.id);
                if rail.creator_fees > Decimal::ZERO {
                    ledger.debit(&settlement.creator_id, currency, rail.creator_fees, cause)?;
                }
                if rail.platform_take() > Decimal::ZERO {
                    ledger.debit(&settlement.platform_account_id, currency, rail.platform_take(), cause)?;
                }
            }

            for payout in settlement.plan.entries.iter().rev() {
                let currency = payout.rail.currency();
                let cause = Cause::entry(TxReason::SettlementReversal, prop.id, payout.entry_id);
                match &payout.outcome {
                    EntryOutcome::Won { net, .. } => {
                        if !net.is_zero() {
                            ledger.debit(&payout.user_id, currency, *net, cause)?;
                        }
                        ledger.credit(&payout.user_id, currency, payout.amount, cause)?;
                        ledger.lock(&payout.user_id, currency, payout.amount, cause)?;
                    }
                    EntryOutcome::Lost => {
                        ledger.credit(&payout.user_id, currency, payout.amount, cause)?;
                        ledger.lock(&payout.user_id, currency, payout.amount, cause)?;
                    }
                    EntryOutcome::Refunded => {
                        ledger.lock(&payout.user_id, currency, payout.amount, cause)?;
                    }
                }

                let mut entry = match tx.get::<Entry>(ENTRIES, payout.entry_id.as_bytes())? {
                    Some(entry) => entry,
                    None => return abort(EngineError::invariant(format!("entry {} vanished", payout.entry_id))),
                };
                entry.status = EntryStatus::Active;
                entry.actual_payout = None;
                entry.updated_at = now;
                save_entry(tx, &entry)?;
                tx.put(ACTIVE_STAKES, &stake_key(prop.id, entry.option_id, &entry.user_id), &entry.id)?;
            }

            tx.remove(SETTLEMENTS, proposition_id.as_bytes())?;

            prop.status = next;
            prop.winning_option_id = None;
            prop.settled_at = None;
            prop.status_reason = reason.map(str::to_string);
            prop.updated_at = now;
            save(tx, &prop)?;

            let meta = json!({
                "previous_winner": settlement.winning_option_id,
                "entries_restored": settlement.plan.entries.len(),
                "cancelled_job": cancelled_job,
            });
            AuditRecord::new(actor.id(), AdminAction::Reset, prop.id, reason, meta, now).append(tx)?;

            let outcome = ResetOutcome {
                proposition_id,
                entries_restored: settlement.plan.entries.len(),
                cancelled_job,
            };
            Ok((outcome, prop, ledger.touched()))
        })?;

        info!(
            proposition = %proposition_id,
            actor = actor.id(),
            entries = outcome.entries_restored,
            "settlement reset"
        );
        self.publish_status(&prop);
        self.events().wallets_updated(touched);
        Ok(outcome)
    }
}

/// Every account that received money must still hold it
fn ensure_reversible(ledger: &LedgerTx<'_, '_>, settlement: &Settlement) -> TxResult<()> {
    let mut owed: BTreeMap<(String, &'static str), Decimal> = BTreeMap::new();
    for payout in &settlement.plan.entries {
        // Refunds are re-locked on reset, so the refunded stake must still be there
        let received = match payout.outcome {
            EntryOutcome::Refunded => payout.amount,
            _ => payout.outcome.net(),
        };
        if received > Decimal::ZERO {
            *owed.entry((payout.user_id.clone(), payout.rail.currency())).or_default() += received;
        }
    }
    for rail in settlement.plan.rails.iter().filter(|r| !r.refunded) {
        let currency = rail.rail.currency();
        *owed.entry((settlement.platform_account_id.clone(), currency)).or_default() += rail.platform_take();
        *owed.entry((settlement.creator_id.clone(), currency)).or_default() += rail.creator_fees;
    }

    for ((user, currency), amount) in owed {
        let available = ledger.available(&user, currency)?;
        if available < amount {
            warn!(user = %user, currency, %available, %amount, "reset blocked, payout already spent");
            return abort(EngineError::ResetBlocked(format!(
                "{} has {} {} available but {} must be reversed",
                user, available, currency, amount
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::engine::test_support::*;
    use crate::models::{Proposition, SettlementMethod};
    use crate::propositions::entries::PlaceEntry;
    use crate::propositions::NewProposition;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn market(engine: &Engine, now: DateTime<Utc>) -> Proposition {
        engine
            .create_proposition(NewProposition {
                creator_id: "creator".into(),
                title: "Does the launch slip?".into(),
                description: String::new(),
                category: "tech".into(),
                options: vec!["A".into(), "B".into()],
                stake_min: dec!(1),
                stake_max: None,
                entry_deadline: now + Duration::hours(1),
                settlement_method: SettlementMethod::Manual,
                platform_fee_percentage: None,
                creator_fee_percentage: None,
            })
            .unwrap()
    }

    fn stake(engine: &Engine, prop: &Proposition, user: &str, option: usize, amount: Decimal, rail: Rail) {
        engine.deposit(user, rail, Some(amount)).unwrap();
        engine
            .place_entry(PlaceEntry {
                user_id: user.into(),
                proposition_id: prop.id,
                option_id: prop.options[option].id,
                amount,
                rail,
            })
            .unwrap();
    }

    fn winner(prop: &Proposition, option: usize) -> SettleRequest {
        SettleRequest { winning_option_id: prop.options[option].id, ..Default::default() }
    }

    #[test]
    fn settle_requires_closed() {
        let clock = fixed_clock();
        let engine = engine_at(clock.clone());
        let prop = market(&engine, clock.now());
        let err = engine.settle(&admin(), prop.id, winner(&prop, 0)).unwrap_err();
        assert_eq!(err, EngineError::InvalidTransition { from: PropositionStatus::Open, command: Command::Settle });
    }

    #[test]
    fn open_past_deadline_can_be_settled() {
        let clock = fixed_clock();
        let engine = engine_at(clock.clone());
        let prop = market(&engine, clock.now());
        stake(&engine, &prop, "alice", 0, dec!(60), Rail::Demo);
        stake(&engine, &prop, "bob", 1, dec!(40), Rail::Demo);
        clock.advance(Duration::hours(2));

        let outcome = engine.settle(&admin(), prop.id, winner(&prop, 0)).unwrap();
        assert!(!outcome.already_settled);
        assert_eq!(engine.balance("alice", Rail::Demo).unwrap().available, dec!(96.50));
        assert_eq!(engine.balance("bob", Rail::Demo).unwrap().total(), Decimal::ZERO);
        assert_eq!(engine.balance("platform", Rail::Demo).unwrap().available, dec!(2.50));
        assert_eq!(engine.balance("creator", Rail::Demo).unwrap().available, dec!(1.00));
        assert!(outcome.settlement.fully_finalized());
    }

    #[test]
    fn crypto_entries_queue_a_finalize_job() {
        let clock = fixed_clock();
        let engine = engine_at(clock.clone());
        let prop = market(&engine, clock.now());
        stake(&engine, &prop, "alice", 0, dec!(10), Rail::Crypto);
        stake(&engine, &prop, "bob", 1, dec!(10), Rail::Demo);
        engine.close(&admin(), prop.id, None).unwrap();

        let outcome = engine.settle(&admin(), prop.id, winner(&prop, 0)).unwrap();
        assert_eq!(outcome.settlement.onchain_status, Some(FinalizeStatus::Queued));
        assert!(!outcome.settlement.fully_finalized());
        // Demo rail had no stake on the winner: bob is refunded
        assert_eq!(engine.balance("bob", Rail::Demo).unwrap().available, dec!(10));
        assert_eq!(engine.finalize_job(prop.id).unwrap().payouts.len(), 1);
    }

    #[test]
    fn reset_is_blocked_once_payout_is_spent() {
        let clock = fixed_clock();
        let engine = engine_at(clock.clone());
        let prop = market(&engine, clock.now());
        stake(&engine, &prop, "alice", 0, dec!(60), Rail::Demo);
        stake(&engine, &prop, "bob", 1, dec!(40), Rail::Demo);
        engine.close(&admin(), prop.id, None).unwrap();
        engine.settle(&admin(), prop.id, winner(&prop, 0)).unwrap();

        engine.withdraw("alice", Rail::Demo, dec!(50)).unwrap();
        let err = engine.reset(&admin(), prop.id, None).unwrap_err();
        assert!(matches!(err, EngineError::ResetBlocked(_)));
        assert_eq!(engine.proposition(prop.id).unwrap().status, PropositionStatus::Settled);
    }

    #[test]
    fn reset_is_blocked_once_refund_is_withdrawn() {
        let clock = fixed_clock();
        let engine = engine_at(clock.clone());
        let prop = market(&engine, clock.now());
        stake(&engine, &prop, "alice", 0, dec!(20), Rail::Demo);
        // Nobody backed the winner on the crypto rail, so bob is refunded
        stake(&engine, &prop, "bob", 1, dec!(10), Rail::Crypto);
        engine.close(&admin(), prop.id, None).unwrap();
        engine.settle(&admin(), prop.id, winner(&prop, 0)).unwrap();
        assert_eq!(engine.balance("bob", Rail::Crypto).unwrap().available, dec!(10));

        engine.withdraw("bob", Rail::Crypto, dec!(10)).unwrap();
        let err = engine.reset(&admin(), prop.id, None).unwrap_err();
        assert!(matches!(err, EngineError::ResetBlocked(_)), "{:?}", err);
        assert_eq!(err.kind(), crate::error::ErrorKind::State);
        assert_eq!(engine.proposition(prop.id).unwrap().status, PropositionStatus::Settled);
    }

    #[test]
    fn reset_of_unsettled_proposition_is_rejected() {
        let clock = fixed_clock();
        let engine = engine_at(clock.clone());
        let prop = market(&engine, clock.now());
        let err = engine.reset(&admin(), prop.id, None).unwrap_err();
        assert_eq!(err, EngineError::InvalidTransition { from: PropositionStatus::Open, command: Command::Reset });
    }

    #[test]
    fn creator_settles_own_manual_proposition() {
        let clock = fixed_clock();
        let engine = engine_at(clock.clone());
        let prop = market(&engine, clock.now());
        stake(&engine, &prop, "alice", 0, dec!(60), Rail::Demo);
        stake(&engine, &prop, "bob", 1, dec!(40), Rail::Demo);
        engine.close(&admin(), prop.id, None).unwrap();

        let err = engine.settle_by_creator("bob", prop.id, winner(&prop, 1)).unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));

        let outcome = engine.settle_by_creator("creator", prop.id, winner(&prop, 0)).unwrap();
        assert_eq!(outcome.settlement.actor_id, "creator");
        assert_eq!(engine.balance("alice", Rail::Demo).unwrap().available, dec!(96.50));

        let rows = crate::audit::audit_log(engine.store(), Some(prop.id)).unwrap();
        let settled = rows.iter().find(|r| r.action == AdminAction::Settle).unwrap();
        assert_eq!(settled.actor_id, "creator");
        assert_eq!(settled.meta["by_creator"], true);
    }

    #[test]
    fn auto_propositions_are_not_creator_settled() {
        let clock = fixed_clock();
        let engine = engine_at(clock.clone());
        let prop = engine
            .create_proposition(NewProposition {
                creator_id: "creator".into(),
                title: "Does the feed report rain?".into(),
                description: String::new(),
                category: "weather".into(),
                options: vec!["Yes".into(), "No".into()],
                stake_min: dec!(1),
                stake_max: None,
                entry_deadline: clock.now() + Duration::hours(1),
                settlement_method: SettlementMethod::Auto,
                platform_fee_percentage: None,
                creator_fee_percentage: None,
            })
            .unwrap();
        engine.close(&admin(), prop.id, None).unwrap();

        let err = engine.settle_by_creator("creator", prop.id, winner(&prop, 0)).unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
        assert_eq!(engine.proposition(prop.id).unwrap().status, PropositionStatus::Closed);
    }
}
