use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// PROPOSITION LIFECYCLE STATUS
// ============================================================================

/// Proposition lifecycle status
///
/// Flow: Pending → Open → Closed → Settled
///                   ↓       ↓        ↓ (reset)
///                Voided / Cancelled  Open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropositionStatus {
    /// Created, options not yet persisted
    Pending,
    /// Accepting entries until the deadline
    Open,
    /// No new entries, outcome not decided
    Closed,
    /// Winning option picked, payouts credited
    Settled,
    /// Every active stake refunded, no fees
    Voided,
    /// Stakes stay locked for manual review
    Cancelled,
}

impl PropositionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PropositionStatus::Voided | PropositionStatus::Cancelled)
    }

    pub fn accepts_entries(&self) -> bool {
        matches!(self, PropositionStatus::Open)
    }
}

impl fmt::Display for PropositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_str = match self {
            PropositionStatus::Pending => "pending",
            PropositionStatus::Open => "open",
            PropositionStatus::Closed => "closed",
            PropositionStatus::Settled => "settled",
            PropositionStatus::Voided => "voided",
            PropositionStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", status_str)
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

/// Everything that can move a proposition between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Open,
    Close,
    Void,
    Cancel,
    Settle,
    Reset,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Command::Open => "open",
            Command::Close => "close",
            Command::Void => "void",
            Command::Cancel => "cancel",
            Command::Settle => "settle",
            Command::Reset => "reset",
        };
        write!(f, "{}", s)
    }
}

/// The transition table. Anything not listed is rejected.
///
/// `from` must be the effective status, so an open proposition past its
/// deadline arrives here as `Closed`.
pub fn transition(from: PropositionStatus, command: Command) -> Option<PropositionStatus> {
    use Command as C;
    use PropositionStatus as S;

    match (from, command) {
        (S::Pending, C::Open) => Some(S::Open),
        (S::Open, C::Close) => Some(S::Closed),
        (S::Open | S::Closed, C::Void) => Some(S::Voided),
        (S::Open | S::Closed, C::Cancel) => Some(S::Cancelled),
        (S::Closed, C::Settle) => Some(S::Settled),
        (S::Settled, C::Reset) => Some(S::Open),
        _ => None,
    }
}
