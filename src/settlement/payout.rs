//! Payout planning
//!
//! Turns the active entries of a closed proposition plus a winning option
//! into a per-entry plan. Nothing here touches storage; the settlement
//! transaction applies the plan and reset applies its inverse.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{Entry, EntryStatus, Rail};
use crate::odds::{floor_money, odds, round_money, round_odds};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Fee percentages in percentage points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeRates {
    pub platform_pct: Decimal,
    pub creator_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum EntryOutcome {
    Won {
        gross: Decimal,
        platform_fee: Decimal,
        creator_fee: Decimal,
        net: Decimal,
    },
    Lost,
    /// Rail had no stake on the winning option
    Refunded,
}

impl EntryOutcome {
    pub fn entry_status(&self) -> EntryStatus {
        match self {
            EntryOutcome::Won { .. } => EntryStatus::Won,
            EntryOutcome::Lost => EntryStatus::Lost,
            EntryOutcome::Refunded => EntryStatus::Refunded,
        }
    }

    pub fn net(&self) -> Decimal {
        match self {
            EntryOutcome::Won { net, .. } => *net,
            EntryOutcome::Lost => Decimal::ZERO,
            EntryOutcome::Refunded => Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPayout {
    pub entry_id: Uuid,
    pub user_id: String,
    pub option_id: Uuid,
    pub rail: Rail,
    pub amount: Decimal,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

/// One rail's pool. Each rail pays its own winners in its own currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RailPlan {
    pub rail: Rail,
    pub pool: Decimal,
    pub winning_stake: Decimal,
    pub final_odds: Decimal,
    pub net_paid: Decimal,
    pub platform_fees: Decimal,
    pub creator_fees: Decimal,
    /// Cents left over after flooring gross payouts; goes to the platform
    pub rounding_residue: Decimal,
    pub refunded: bool,
}

impl RailPlan {
    /// Everything leaving the pool toward the platform account
    pub fn platform_take(&self) -> Decimal {
        self.platform_fees + self.rounding_residue
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutPlan {
    pub winning_option_id: Uuid,
    pub rails: Vec<RailPlan>,
    pub entries: Vec<EntryPayout>,
}

impl PayoutPlan {
    pub fn winners(&self) -> usize {
        self.count(EntryStatus::Won)
    }

    pub fn losers(&self) -> usize {
        self.count(EntryStatus::Lost)
    }

    pub fn refunded(&self) -> usize {
        self.count(EntryStatus::Refunded)
    }

    pub fn has_crypto(&self) -> bool {
        self.entries.iter().any(|e| e.rail == Rail::Crypto)
    }

    pub fn rail(&self, rail: Rail) -> Option<&RailPlan> {
        self.rails.iter().find(|r| r.rail == rail)
    }

    fn count(&self, status: EntryStatus) -> usize {
        self.entries.iter().filter(|e| e.outcome.entry_status() == status).count()
    }
}

/// Plan payouts for every active entry.
///
/// Per rail: `gross = floor(amount * pool / winning_stake)` to the cent,
/// fees are rounded percentages of gross, `net = gross - fees`. The plan
/// always satisfies `Σnet + fees + residue == pool` for each rail.
pub fn plan_payouts(entries: &[Entry], winning_option_id: Uuid, rates: FeeRates) -> EngineResult<PayoutPlan> {
    let mut by_rail: BTreeMap<Rail, Vec<&Entry>> = BTreeMap::new();
    for entry in entries.iter().filter(|e| e.status == EntryStatus::Active) {
        by_rail.entry(entry.rail).or_default().push(entry);
    }

    let mut rails = Vec::with_capacity(by_rail.len());
    let mut payouts = Vec::new();

    for (rail, rail_entries) in by_rail {
        let pool: Decimal = rail_entries.iter().map(|e| e.amount).sum();
        let winning_stake: Decimal = rail_entries
            .iter()
            .filter(|e| e.option_id == winning_option_id)
            .map(|e| e.amount)
            .sum();

        let mut plan = RailPlan {
            rail,
            pool,
            winning_stake,
            final_odds: round_odds(odds(pool, winning_stake)),
            net_paid: Decimal::ZERO,
            platform_fees: Decimal::ZERO,
            creator_fees: Decimal::ZERO,
            rounding_residue: Decimal::ZERO,
            refunded: winning_stake.is_zero(),
        };

        let mut gross_total = Decimal::ZERO;
        for entry in rail_entries {
            let outcome = if plan.refunded {
                EntryOutcome::Refunded
            } else if entry.option_id == winning_option_id {
                let gross = floor_money(entry.amount * pool / winning_stake);
                let platform_fee = round_money(gross * rates.platform_pct / HUNDRED);
                let creator_fee = round_money(gross * rates.creator_pct / HUNDRED);
                let net = gross - platform_fee - creator_fee;
                if net < Decimal::ZERO {
                    return Err(EngineError::invariant(format!(
                        "fees {} + {} exceed gross payout {}",
                        platform_fee, creator_fee, gross
                    )));
                }
                gross_total += gross;
                plan.platform_fees += platform_fee;
                plan.creator_fees += creator_fee;
                plan.net_paid += net;
                EntryOutcome::Won { gross, platform_fee, creator_fee, net }
            } else {
                EntryOutcome::Lost
            };

            payouts.push(EntryPayout {
                entry_id: entry.id,
                user_id: entry.user_id.clone(),
                option_id: entry.option_id,
                rail,
                amount: entry.amount,
                outcome,
            });
        }

        if !plan.refunded {
            plan.rounding_residue = pool - gross_total;
            if plan.rounding_residue < Decimal::ZERO {
                return Err(EngineError::invariant(format!(
                    "{} payouts {} exceed pool {}",
                    rail, gross_total, pool
                )));
            }
        }
        rails.push(plan);
    }

    Ok(PayoutPlan { winning_option_id, rails, entries: payouts })
}
