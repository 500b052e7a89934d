// Entry placement
//
// One sled transaction per stake: preconditions, ledger lock, option and pool
// totals, odds, the entry row and its uniqueness key all commit together.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::status::PropositionStatus;
use super::{check_pool, entry_ids, load, save, save_entry, stake_key};
use crate::engine::{check_user_id, Engine};
use crate::error::{EngineError, EngineResult};
use crate::ledger::{Cause, LedgerTx, TxReason};
use crate::models::{Entry, EntryStatus, Proposition, Rail};
use crate::odds::{odds, potential_payout, round_odds};
use crate::store::{abort, OrAbort, ACTIVE_STAKES, ENTRY_INDEX};

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceEntry {
    pub user_id: String,
    pub proposition_id: Uuid,
    pub option_id: Uuid,
    pub amount: Decimal,
    #[serde(default)]
    pub rail: Rail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryReceipt {
    pub entry: Entry,
    /// Option odds after this stake landed
    pub odds: Decimal,
    pub pool_total: Decimal,
}

impl Engine {
    /// Stake `amount` on one option.
    ///
    /// Checks run in a fixed order and the first failure wins: not open,
    /// deadline passed, stake out of range, unknown option, duplicate entry,
    /// insufficient funds.
    pub fn place_entry(&self, req: PlaceEntry) -> EngineResult<EntryReceipt> {
        let now = self.now();
        let user_id = req.user_id.as_str();
        check_user_id(user_id)?;

        let (receipt, prop) = self.store().transaction(|tx| {
            let mut prop = load(tx, req.proposition_id)?;

            if prop.status != PropositionStatus::Open {
                return abort(EngineError::NotOpen(prop.status));
            }
            if prop.deadline_passed(now) {
                return abort(EngineError::DeadlinePassed);
            }
            if out_of_range(&prop, req.amount) {
                return abort(EngineError::StakeOutOfRange {
                    amount: req.amount,
                    min: prop.stake_min,
                    max: prop.stake_max,
                });
            }
            if prop.option(req.option_id).is_none() {
                return abort(EngineError::UnknownOption(req.option_id));
            }
            let stake = stake_key(prop.id, req.option_id, user_id);
            if tx.contains(ACTIVE_STAKES, &stake)? {
                return abort(EngineError::DuplicateEntry);
            }

            let entry_id = Uuid::new_v4();
            let ledger = LedgerTx::new(tx, now);
            ledger.lock(
                user_id,
                req.rail.currency(),
                req.amount,
                Cause::entry(TxReason::Stake, prop.id, entry_id),
            )?;

            // Totals first, then odds from the post-stake pool
            prop.pool_total += req.amount;
            let pool_total = prop.pool_total;
            let option_odds = match prop.option_mut(req.option_id) {
                Some(option) => {
                    option.total_staked += req.amount;
                    option.current_odds = round_odds(odds(pool_total, option.total_staked));
                    option.current_odds
                }
                None => return abort(EngineError::UnknownOption(req.option_id)),
            };
            prop.updated_at = now;
            check_pool(&prop).or_abort()?;

            let entry = Entry {
                id: entry_id,
                user_id: user_id.to_string(),
                proposition_id: prop.id,
                option_id: req.option_id,
                amount: req.amount,
                potential_payout: potential_payout(req.amount, option_odds),
                actual_payout: None,
                status: EntryStatus::Active,
                rail: req.rail,
                created_at: now,
                updated_at: now,
            };

            let mut index = entry_ids(tx, prop.id)?;
            index.push(entry.id);
            tx.put(ENTRY_INDEX, prop.id.as_bytes(), &index)?;
            tx.put(ACTIVE_STAKES, &stake, &entry.id)?;
            save_entry(tx, &entry)?;
            save(tx, &prop)?;

            debug!(entry = %entry.id, odds = %option_odds, pool = %pool_total, "entry recorded");
            Ok((EntryReceipt { entry, odds: option_odds, pool_total }, prop))
        })?;

        info!(
            proposition = %prop.id,
            user = %receipt.entry.user_id,
            option = %receipt.entry.option_id,
            amount = %receipt.entry.amount,
            rail = %receipt.entry.rail,
            "entry placed"
        );
        self.publish_status(&prop);
        self.events().wallets_updated([receipt.entry.user_id.clone()]);
        Ok(receipt)
    }
}

fn out_of_range(prop: &Proposition, amount: Decimal) -> bool {
    amount < prop.stake_min || prop.stake_max.map_or(false, |max| amount > max)
}
