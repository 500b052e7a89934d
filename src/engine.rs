//! Engine handle
//!
//! Cheap to clone. Proposition, entry, settlement and finalize operations are
//! implemented as `impl Engine` blocks in their own modules; this file holds
//! the shared plumbing and the wallet surface.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::events::EventBus;
use crate::ledger::{Ledger, Transaction, WalletRow};
use crate::models::Rail;
use crate::settlement::payout::FeeRates;
use crate::store::Store;

const DEFAULT_FINALIZE_LEASE_SECS: i64 = 120;
const MAX_USER_ID_LEN: usize = 128;

/// User ids are storage key segments: non-empty, unpadded, no control
/// characters (the key separator is NUL).
pub fn check_user_id(user_id: &str) -> EngineResult<()> {
    let invalid = |msg: &str| Err(EngineError::Validation(format!("user id {}", msg)));
    if user_id.trim().is_empty() {
        return invalid("is required");
    }
    if user_id.trim() != user_id {
        return invalid("has surrounding whitespace");
    }
    if user_id.chars().any(char::is_control) {
        return invalid("contains control characters");
    }
    if user_id.chars().count() > MAX_USER_ID_LEN {
        return invalid("is too long");
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub platform_account_id: String,
    pub default_fees: FeeRates,
    pub min_reason_len: usize,
    pub demo_starting_balance: Decimal,
    /// Bound on one chain call; a running job older than this is stale
    pub finalize_lease: Duration,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            platform_account_id: config.platform_account_id.clone(),
            default_fees: config.default_fees,
            min_reason_len: config.min_reason_len,
            demo_starting_balance: config.demo_starting_balance,
            finalize_lease: Duration::from_std(config.finalize_lease)
                .unwrap_or_else(|_| Duration::seconds(DEFAULT_FINALIZE_LEASE_SECS)),
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    store: Store,
    ledger: Ledger,
    clock: Arc<dyn Clock>,
    events: EventBus,
    settings: Arc<EngineSettings>,
}

impl Engine {
    pub fn new(store: Store, clock: Arc<dyn Clock>, settings: EngineSettings) -> Self {
        Self {
            ledger: Ledger::new(store.clone()),
            store,
            clock,
            events: EventBus::new(),
            settings: Arc::new(settings),
        }
    }

    /// Open the on-disk store named by the config, wall clock time
    pub fn open(config: &Config) -> EngineResult<Self> {
        let store = Store::open(&config.data_dir)?;
        info!(path = %config.data_dir, "store opened");
        Ok(Self::new(store, Arc::new(SystemClock), EngineSettings::from(config)))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Void and cancel must carry a reason of at least the configured length
    pub fn require_reason<'r>(&self, reason: Option<&'r str>) -> EngineResult<&'r str> {
        let reason = reason.map(str::trim).unwrap_or_default();
        if reason.chars().count() < self.settings.min_reason_len {
            return Err(EngineError::ReasonTooShort { min: self.settings.min_reason_len });
        }
        Ok(reason)
    }

    // ========================================================================
    // WALLETS
    // ========================================================================

    pub fn balance(&self, user_id: &str, rail: Rail) -> EngineResult<WalletRow> {
        self.ledger.balance(user_id, rail.currency())
    }

    pub fn wallets(&self, user_id: &str) -> EngineResult<Vec<WalletRow>> {
        self.ledger.wallets_for(user_id)
    }

    pub fn journal(&self, user_id: &str) -> EngineResult<Vec<Transaction>> {
        self.ledger.journal_for(user_id)
    }

    /// Credit a deposit. Demo deposits without an amount use the faucet size.
    pub fn deposit(&self, user_id: &str, rail: Rail, amount: Option<Decimal>) -> EngineResult<WalletRow> {
        check_user_id(user_id)?;
        let amount = match (rail, amount) {
            (_, Some(amount)) => amount,
            (Rail::Demo, None) => self.settings.demo_starting_balance,
            (Rail::Crypto, None) => {
                return Err(EngineError::Validation("crypto deposits need an amount".into()));
            }
        };
        let row = self.ledger.deposit(user_id, rail.currency(), amount, self.now())?;
        info!(user = user_id, %rail, %amount, "deposit");
        self.events.wallets_updated([user_id.to_string()]);
        Ok(row)
    }

    pub fn withdraw(&self, user_id: &str, rail: Rail, amount: Decimal) -> EngineResult<WalletRow> {
        check_user_id(user_id)?;
        let row = self.ledger.withdraw(user_id, rail.currency(), amount, self.now())?;
        info!(user = user_id, %rail, %amount, "withdrawal");
        self.events.wallets_updated([user_id.to_string()]);
        Ok(row)
    }
}
