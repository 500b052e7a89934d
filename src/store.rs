//! Durable storage for the engine
//!
//! A single sled database with one tree per record kind. Every multi-row
//! mutation goes through [`Store::transaction`], which runs the closure as a
//! serializable sled transaction across all trees: concurrent writers that
//! touch the same keys are retried by sled, and an aborted closure leaves no
//! trace.

use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree};
use sled::{Db, Transactional, Tree};
use std::path::Path;

use crate::error::{EngineError, EngineResult};

pub const WALLETS: &str = "wallets";
pub const JOURNAL: &str = "journal";
pub const PROPOSITIONS: &str = "propositions";
pub const ENTRIES: &str = "entries";
pub const ENTRY_INDEX: &str = "entry_index";
pub const ACTIVE_STAKES: &str = "active_stakes";
pub const SETTLEMENTS: &str = "settlements";
pub const FINALIZE_JOBS: &str = "finalize_jobs";
pub const AUDIT: &str = "audit";
pub const DISPUTES: &str = "disputes";
/// (proposition, user) pairs with a dispute still open
pub const OPEN_DISPUTES: &str = "open_disputes";

/// Tree order inside the transaction view
const TREE_NAMES: [&str; 11] = [
    WALLETS,
    JOURNAL,
    PROPOSITIONS,
    ENTRIES,
    ENTRY_INDEX,
    ACTIVE_STAKES,
    SETTLEMENTS,
    FINALIZE_JOBS,
    AUDIT,
    DISPUTES,
    OPEN_DISPUTES,
];

pub type TxResult<T> = ConflictableTransactionResult<T, EngineError>;

/// Abort the enclosing transaction with an engine error
pub fn abort<T>(err: EngineError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

/// Lift an engine result into a transaction result
pub trait OrAbort<T> {
    fn or_abort(self) -> TxResult<T>;
}

impl<T> OrAbort<T> for EngineResult<T> {
    fn or_abort(self) -> TxResult<T> {
        self.map_err(ConflictableTransactionError::Abort)
    }
}

// ============================================================================
// KEYS
// ============================================================================

/// Composite key of string parts joined by NUL
pub fn key(parts: &[&str]) -> Vec<u8> {
    parts.join("\u{0}").into_bytes()
}

/// Prefix matching every key that starts with `parts`
pub fn prefix(parts: &[&str]) -> Vec<u8> {
    let mut k = key(parts);
    k.push(0);
    k
}

// ============================================================================
// CODEC
// ============================================================================

pub fn encode<T: Serialize>(value: &T) -> EngineResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> EngineResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

// ============================================================================
// STORE
// ============================================================================

#[derive(Clone)]
pub struct Store {
    db: Db,
    trees: Vec<Tree>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory database removed on drop
    pub fn temporary() -> EngineResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> EngineResult<Self> {
        let trees = TREE_NAMES
            .iter()
            .map(|name| db.open_tree(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { db, trees })
    }

    pub fn tree(&self, name: &str) -> &Tree {
        let idx = TREE_NAMES
            .iter()
            .position(|n| *n == name)
            .unwrap_or_else(|| panic!("unknown tree {}", name));
        &self.trees[idx]
    }

    pub fn get<T: DeserializeOwned>(&self, tree: &str, k: &[u8]) -> EngineResult<Option<T>> {
        match self.tree(tree).get(k)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All records in a tree, in key order
    pub fn scan<T: DeserializeOwned>(&self, tree: &str) -> EngineResult<Vec<T>> {
        self.tree(tree)
            .iter()
            .map(|item| {
                let (_, bytes) = item?;
                decode(&bytes)
            })
            .collect()
    }

    pub fn scan_prefix<T: DeserializeOwned>(&self, tree: &str, p: &[u8]) -> EngineResult<Vec<T>> {
        self.tree(tree)
            .scan_prefix(p)
            .map(|item| {
                let (_, bytes) = item?;
                decode(&bytes)
            })
            .collect()
    }

    /// Run `f` atomically across every tree.
    ///
    /// The closure may run more than once when sled detects a conflict, so it
    /// must not have side effects outside the transaction view.
    pub fn transaction<F, T>(&self, f: F) -> EngineResult<T>
    where
        F: Fn(&StoreTx<'_>) -> TxResult<T>,
    {
        let result = self.trees.as_slice().transaction(|views: &Vec<TransactionalTree>| {
            let tx = StoreTx { views };
            f(&tx)
        });
        result.map_err(EngineError::from)
    }

    pub async fn flush(&self) -> EngineResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

// ============================================================================
// TRANSACTION VIEW
// ============================================================================

pub struct StoreTx<'a> {
    views: &'a Vec<TransactionalTree>,
}

impl<'a> StoreTx<'a> {
    pub fn tree(&self, name: &str) -> &'a TransactionalTree {
        let idx = TREE_NAMES
            .iter()
            .position(|n| *n == name)
            .unwrap_or_else(|| panic!("unknown tree {}", name));
        &self.views[idx]
    }

    pub fn get<T: DeserializeOwned>(&self, tree: &str, k: &[u8]) -> TxResult<Option<T>> {
        match self.tree(tree).get(k)? {
            Some(bytes) => Ok(Some(decode(&bytes).or_abort()?)),
            None => Ok(None),
        }
    }

    pub fn put<T: Serialize>(&self, tree: &str, k: &[u8], value: &T) -> TxResult<()> {
        let bytes = encode(value).or_abort()?;
        self.tree(tree).insert(k, bytes)?;
        Ok(())
    }

    pub fn remove(&self, tree: &str, k: &[u8]) -> TxResult<()> {
        self.tree(tree).remove(k)?;
        Ok(())
    }

    pub fn contains(&self, tree: &str, k: &[u8]) -> TxResult<bool> {
        Ok(self.tree(tree).get(k)?.is_some())
    }
}
