/// Wallet Ledger
///
/// Per (user, currency) balance split into an available and a locked
/// partition. Every mutation is one of four moves:
/// - lock:   available → locked   (stake placed)
/// - unlock: locked → available   (stake released)
/// - credit: outside → available  (deposit, payout, fee)
/// - debit:  available → outside  (stake consumed into a pool)
///
/// Each successful move writes exactly one journal record in the same
/// transaction as the balance row.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeSet;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::store::{abort, key, prefix, Store, StoreTx, TxResult, JOURNAL, WALLETS};

// ============================================================================
// CORE TYPES
// ============================================================================

/// Balance row for one user in one currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRow {
    pub user_id: String,
    pub currency: String,
    /// Spendable balance
    pub available: Decimal,
    /// Amount held by active entries
    pub locked: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl WalletRow {
    pub fn empty(user_id: &str, currency: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            currency: currency.to_string(),
            available: Decimal::ZERO,
            locked: Decimal::ZERO,
            updated_at: now,
        }
    }

    pub fn total(&self) -> Decimal {
        self.available + self.locked
    }
}

/// Ledger move types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Lock,
    Unlock,
    Credit,
    Debit,
}

/// Why a move happened
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxReason {
    Deposit,
    Withdrawal,
    Stake,
    Refund,
    /// Stake released from lock and consumed into the settlement pool
    PoolContribution,
    Payout,
    PlatformFee,
    CreatorFee,
    /// Inverse move written by an admin reset
    SettlementReversal,
}

/// Causal reference carried by every journal record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cause {
    pub reason: TxReason,
    pub proposition_id: Option<Uuid>,
    pub entry_id: Option<Uuid>,
}

impl Cause {
    pub fn new(reason: TxReason) -> Self {
        Self { reason, proposition_id: None, entry_id: None }
    }

    pub fn proposition(reason: TxReason, proposition_id: Uuid) -> Self {
        Self { reason, proposition_id: Some(proposition_id), entry_id: None }
    }

    pub fn entry(reason: TxReason, proposition_id: Uuid, entry_id: Uuid) -> Self {
        Self { reason, proposition_id: Some(proposition_id), entry_id: Some(entry_id) }
    }
}

/// Immutable journal record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub tx_type: TxType,
    pub reason: TxReason,
    pub user_id: String,
    pub currency: String,
    pub amount: Decimal,
    /// Signed change to the available partition
    pub available_delta: Decimal,
    /// Signed change to the locked partition
    pub locked_delta: Decimal,
    pub proposition_id: Option<Uuid>,
    pub entry_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// TRANSACTIONAL LEDGER
// ============================================================================

/// Ledger moves bound to an open store transaction
pub struct LedgerTx<'a, 'b> {
    tx: &'a StoreTx<'b>,
    now: DateTime<Utc>,
    touched: RefCell<BTreeSet<String>>,
}

impl<'a, 'b> LedgerTx<'a, 'b> {
    pub fn new(tx: &'a StoreTx<'b>, now: DateTime<Utc>) -> Self {
        Self { tx, now, touched: RefCell::new(BTreeSet::new()) }
    }

    pub fn row(&self, user_id: &str, currency: &str) -> TxResult<WalletRow> {
        let row = self.tx.get::<WalletRow>(WALLETS, &key(&[user_id, currency]))?;
        Ok(row.unwrap_or_else(|| WalletRow::empty(user_id, currency, self.now)))
    }

    pub fn available(&self, user_id: &str, currency: &str) -> TxResult<Decimal> {
        Ok(self.row(user_id, currency)?.available)
    }

    /// available → locked. Fails with `InsufficientFunds`.
    pub fn lock(&self, user_id: &str, currency: &str, amount: Decimal, cause: Cause) -> TxResult<Transaction> {
        let mut row = self.row(user_id, currency)?;
        check_amount(amount)?;
        if row.available < amount {
            return abort(EngineError::InsufficientFunds { available: row.available, requested: amount });
        }
        row.available -= amount;
        row.locked += amount;
        self.commit(row, TxType::Lock, amount, -amount, amount, cause)
    }

    /// locked → available
    pub fn unlock(&self, user_id: &str, currency: &str, amount: Decimal, cause: Cause) -> TxResult<Transaction> {
        let mut row = self.row(user_id, currency)?;
        check_amount(amount)?;
        if row.locked < amount {
            return abort(negative(&row, "locked", amount));
        }
        row.locked -= amount;
        row.available += amount;
        self.commit(row, TxType::Unlock, amount, amount, -amount, cause)
    }

    pub fn credit(&self, user_id: &str, currency: &str, amount: Decimal, cause: Cause) -> TxResult<Transaction> {
        let mut row = self.row(user_id, currency)?;
        check_amount(amount)?;
        row.available += amount;
        self.commit(row, TxType::Credit, amount, amount, Decimal::ZERO, cause)
    }

    pub fn debit(&self, user_id: &str, currency: &str, amount: Decimal, cause: Cause) -> TxResult<Transaction> {
        let mut row = self.row(user_id, currency)?;
        check_amount(amount)?;
        if row.available < amount {
            return abort(negative(&row, "available", amount));
        }
        row.available -= amount;
        self.commit(row, TxType::Debit, amount, -amount, Decimal::ZERO, cause)
    }

    /// Users whose rows this transaction changed
    pub fn touched(&self) -> Vec<String> {
        self.touched.borrow().iter().cloned().collect()
    }

    fn commit(
        &self,
        mut row: WalletRow,
        tx_type: TxType,
        amount: Decimal,
        available_delta: Decimal,
        locked_delta: Decimal,
        cause: Cause,
    ) -> TxResult<Transaction> {
        row.updated_at = self.now;
        self.tx.put(WALLETS, &key(&[&row.user_id, &row.currency]), &row)?;

        let record = Transaction {
            id: Uuid::now_v7(),
            tx_type,
            reason: cause.reason,
            user_id: row.user_id.clone(),
            currency: row.currency.clone(),
            amount,
            available_delta,
            locked_delta,
            proposition_id: cause.proposition_id,
            entry_id: cause.entry_id,
            created_at: self.now,
        };
        let id = record.id.to_string();
        self.tx.put(JOURNAL, &key(&[&row.user_id, &id]), &record)?;
        self.touched.borrow_mut().insert(row.user_id.clone());

        debug!(
            user = %row.user_id,
            currency = %row.currency,
            tx_type = ?tx_type,
            reason = ?cause.reason,
            %amount,
            "ledger move"
        );
        Ok(record)
    }
}

fn check_amount(amount: Decimal) -> TxResult<()> {
    if amount <= Decimal::ZERO {
        return abort(EngineError::Validation(format!("ledger amount must be positive, got {}", amount)));
    }
    Ok(())
}

fn negative(row: &WalletRow, partition: &str, amount: Decimal) -> EngineError {
    error!(
        user = %row.user_id,
        currency = %row.currency,
        available = %row.available,
        locked = %row.locked,
        %amount,
        partition,
        "ledger move would drive balance negative"
    );
    EngineError::invariant(format!(
        "{} balance of {}/{} would go negative ({} - {})",
        partition,
        row.user_id,
        row.currency,
        if partition == "locked" { row.locked } else { row.available },
        amount
    ))
}

// ============================================================================
// LEDGER
// ============================================================================

/// Standalone ledger access; each call is its own atomic unit
#[derive(Clone)]
pub struct Ledger {
    store: Store,
}

impl Ledger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn balance(&self, user_id: &str, currency: &str) -> EngineResult<WalletRow> {
        let row = self.store.get::<WalletRow>(WALLETS, &key(&[user_id, currency]))?;
        Ok(row.unwrap_or_else(|| WalletRow::empty(user_id, currency, Utc::now())))
    }

    /// Every currency row held by a user
    pub fn wallets_for(&self, user_id: &str) -> EngineResult<Vec<WalletRow>> {
        self.store.scan_prefix(WALLETS, &prefix(&[user_id]))
    }

    /// Journal for one user, newest first
    pub fn journal_for(&self, user_id: &str) -> EngineResult<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self.store.scan_prefix(JOURNAL, &prefix(&[user_id]))?;
        rows.reverse();
        Ok(rows)
    }

    /// Journal rows caused by one proposition, oldest first
    pub fn journal_for_proposition(&self, proposition_id: Uuid) -> EngineResult<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self
            .store
            .scan::<Transaction>(JOURNAL)?
            .into_iter()
            .filter(|t| t.proposition_id == Some(proposition_id))
            .collect();
        rows.sort_by_key(|t| t.id);
        Ok(rows)
    }

    pub fn deposit(&self, user_id: &str, currency: &str, amount: Decimal, now: DateTime<Utc>) -> EngineResult<WalletRow> {
        self.run(now, |ledger| {
            ledger.credit(user_id, currency, amount, Cause::new(TxReason::Deposit))?;
            ledger.row(user_id, currency)
        })
    }

    pub fn withdraw(&self, user_id: &str, currency: &str, amount: Decimal, now: DateTime<Utc>) -> EngineResult<WalletRow> {
        self.run(now, |ledger| {
            let available = ledger.available(user_id, currency)?;
            if available < amount {
                return abort(EngineError::InsufficientFunds { available, requested: amount });
            }
            ledger.debit(user_id, currency, amount, Cause::new(TxReason::Withdrawal))?;
            ledger.row(user_id, currency)
        })
    }

    pub fn lock(&self, user_id: &str, currency: &str, amount: Decimal, cause: Cause, now: DateTime<Utc>) -> EngineResult<Transaction> {
        self.run(now, |ledger| ledger.lock(user_id, currency, amount, cause))
    }

    pub fn unlock(&self, user_id: &str, currency: &str, amount: Decimal, cause: Cause, now: DateTime<Utc>) -> EngineResult<Transaction> {
        self.run(now, |ledger| ledger.unlock(user_id, currency, amount, cause))
    }

    pub fn credit(&self, user_id: &str, currency: &str, amount: Decimal, cause: Cause, now: DateTime<Utc>) -> EngineResult<Transaction> {
        self.run(now, |ledger| ledger.credit(user_id, currency, amount, cause))
    }

    pub fn debit(&self, user_id: &str, currency: &str, amount: Decimal, cause: Cause, now: DateTime<Utc>) -> EngineResult<Transaction> {
        self.run(now, |ledger| ledger.debit(user_id, currency, amount, cause))
    }

    fn run<T, F>(&self, now: DateTime<Utc>, f: F) -> EngineResult<T>
    where
        F: Fn(&LedgerTx<'_, '_>) -> TxResult<T>,
    {
        self.store.transaction(|tx| {
            let ledger = LedgerTx::new(tx, now);
            f(&ledger)
        })
    }
}
