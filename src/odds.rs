//! Pool odds arithmetic
//!
//! Pure functions over staked totals. Odds are decimal multipliers: a stake of
//! `s` on an option with odds `o` pays `s * o` gross if that option wins.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Money is kept to cents
pub const MONEY_DP: u32 = 2;

/// Odds are stored to four places for display
pub const ODDS_DP: u32 = 4;

/// `max(1, pool_total / option_staked)`. An empty pool or option carries no
/// information and yields exactly 1.
pub fn odds(pool_total: Decimal, option_staked: Decimal) -> Decimal {
    if pool_total <= Decimal::ZERO || option_staked <= Decimal::ZERO {
        return Decimal::ONE;
    }
    (pool_total / option_staked).max(Decimal::ONE)
}

pub fn potential_payout(stake: Decimal, odds: Decimal) -> Decimal {
    round_money(stake * odds)
}

/// Odds an option shows once `stake` is included on it
pub fn post_stake_odds(pool_total: Decimal, option_staked: Decimal, stake: Decimal) -> Decimal {
    odds(pool_total + stake, option_staked + stake)
}

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Cents rounded toward zero, so shares of a pool never sum past it
pub fn floor_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DP, RoundingStrategy::ToZero)
}

pub fn round_odds(odds: Decimal) -> Decimal {
    odds.round_dp_with_strategy(ODDS_DP, RoundingStrategy::MidpointAwayFromZero)
}

// ============================================================================
// STAKE QUOTE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteSide {
    pub odds: Decimal,
    pub est_payout: Decimal,
}

/// What a prospective stake would see before and after it lands
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeQuote {
    pub amount: Decimal,
    pub current: QuoteSide,
    pub after: QuoteSide,
}

pub fn quote(pool_total: Decimal, option_staked: Decimal, amount: Decimal) -> StakeQuote {
    let current = odds(pool_total, option_staked);
    let after = post_stake_odds(pool_total, option_staked, amount);
    StakeQuote {
        amount,
        current: QuoteSide {
            odds: round_odds(current),
            est_payout: potential_payout(amount, current),
        },
        after: QuoteSide {
            odds: round_odds(after),
            est_payout: potential_payout(amount, after),
        },
    }
}
