/// Propbook: prediction lifecycle and settlement engine
/// Exports all modules for use as a library crate

pub mod app_state;
pub mod audit;
pub mod auth;
pub mod chain_client;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod odds;
pub mod propositions;
pub mod routes;
pub mod settlement;
pub mod store;

pub use app_state::{AppState, SharedState};
pub use audit::{AdminAction, AuditRecord};
pub use auth::{AdminActor, Authorizer};
pub use chain_client::{ChainClient, ChainError, ChainPayout, ChainSettlement, RpcChainClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use engine::{Engine, EngineSettings};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use events::{EngineEvent, EventBus};
pub use ledger::{Ledger, Transaction, TxReason, TxType, WalletRow};
pub use models::{Entry, EntryStatus, Proposition, PropositionOption, Rail, SettlementMethod};
pub use odds::{QuoteSide, StakeQuote};
pub use propositions::entries::{EntryReceipt, PlaceEntry};
pub use propositions::status::{Command, PropositionStatus};
pub use propositions::{NewProposition, Reconciliation, VoidOutcome};
pub use routes::build_router;
pub use settlement::disputes::{Dispute, DisputeDecision, DisputeStatus};
pub use settlement::finalize::{FinalizeJob, FinalizeStatus, FinalizeWorker};
pub use settlement::payout::{EntryOutcome, EntryPayout, FeeRates, PayoutPlan, RailPlan};
pub use settlement::{ResetOutcome, SettleOutcome, SettleRequest, Settlement};
pub use store::Store;
