// Data models for propositions, options and entries

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::propositions::status::PropositionStatus;

// ============================================================================
// RAIL
// ============================================================================

/// Custody domain of an entry's funds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rail {
    /// Platform demo credit, settled only in the internal ledger
    Demo,
    /// Custodied stablecoin, settled internally then mirrored on-chain
    Crypto,
}

impl Rail {
    /// Ledger currency the rail's funds are held in
    pub fn currency(&self) -> &'static str {
        match self {
            Rail::Demo => "DEMO",
            Rail::Crypto => "USDC",
        }
    }

    pub fn needs_onchain_finalize(&self) -> bool {
        matches!(self, Rail::Crypto)
    }
}

impl Default for Rail {
    fn default() -> Self {
        Rail::Demo
    }
}

impl fmt::Display for Rail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rail::Demo => write!(f, "demo"),
            Rail::Crypto => write!(f, "crypto"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementMethod {
    Manual,
    Auto,
}

impl Default for SettlementMethod {
    fn default() -> Self {
        SettlementMethod::Manual
    }
}

// ============================================================================
// PROPOSITION
// ============================================================================

/// One selectable outcome; totals move only through entry placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropositionOption {
    pub id: Uuid,
    pub label: String,
    pub total_staked: Decimal,
    pub current_odds: Decimal,
}

impl PropositionOption {
    pub fn new(label: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            label,
            total_staked: Decimal::ZERO,
            current_odds: Decimal::ONE,
        }
    }
}

/// A user-created question. Options are stored inline so the pool total and
/// the option totals always change in the same record write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposition {
    pub id: Uuid,
    pub creator_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub options: Vec<PropositionOption>,
    pub stake_min: Decimal,
    pub stake_max: Option<Decimal>,
    pub entry_deadline: DateTime<Utc>,
    pub settlement_method: SettlementMethod,
    pub status: PropositionStatus,
    pub pool_total: Decimal,
    pub winning_option_id: Option<Uuid>,
    /// Percentage points, e.g. 2.5 means 2.5%
    pub platform_fee_percentage: Decimal,
    pub creator_fee_percentage: Decimal,
    /// Free text from the last close/void/cancel command
    pub status_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Proposition {
    pub fn option(&self, option_id: Uuid) -> Option<&PropositionOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    pub fn option_mut(&mut self, option_id: Uuid) -> Option<&mut PropositionOption> {
        self.options.iter_mut().find(|o| o.id == option_id)
    }

    pub fn options_total(&self) -> Decimal {
        self.options.iter().map(|o| o.total_staked).sum()
    }

    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        now >= self.entry_deadline
    }

    /// Status as observed at `now`: an open proposition past its deadline is
    /// closed even if the stored row has not caught up yet.
    pub fn effective_status(&self, now: DateTime<Utc>) -> PropositionStatus {
        if self.status == PropositionStatus::Open && self.deadline_passed(now) {
            PropositionStatus::Closed
        } else {
            self.status
        }
    }
}

// ============================================================================
// ENTRY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Active,
    Won,
    Lost,
    Refunded,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryStatus::Active => "active",
            EntryStatus::Won => "won",
            EntryStatus::Lost => "lost",
            EntryStatus::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}

/// A user's stake on one option. Only status and payout fields change after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub user_id: String,
    pub proposition_id: Uuid,
    pub option_id: Uuid,
    pub amount: Decimal,
    pub potential_payout: Decimal,
    pub actual_payout: Option<Decimal>,
    pub status: EntryStatus,
    pub rail: Rail,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
