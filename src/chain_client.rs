/// On-chain settlement relay
///
/// HTTP client that mirrors crypto-rail payouts on-chain.
/// Runs in mock mode when no RPC URL is configured.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default timeout for chain RPC calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChainError {
    /// HTTP request failed
    RequestFailed(String),
    /// Chain answered with something we could not read
    InvalidResponse(String),
    /// Chain accepted the call but refused the settlement
    Rejected(String),
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::RequestFailed(msg) => write!(f, "chain request failed: {}", msg),
            ChainError::InvalidResponse(msg) => write!(f, "invalid chain response: {}", msg),
            ChainError::Rejected(msg) => write!(f, "chain rejected settlement: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

// ============================================================================
// REQUEST/RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainPayout {
    pub user_id: String,
    pub amount: Decimal,
}

/// Settlement payload recorded on-chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSettlement {
    pub proposition_id: Uuid,
    pub winning_option_id: Uuid,
    pub currency: String,
    pub payouts: Vec<ChainPayout>,
    pub merkle_root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSettlementResponse {
    pub recorded: bool,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
}

// ============================================================================
// CLIENT TRAIT
// ============================================================================

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Submit a settlement and return the chain transaction hash
    async fn submit_settlement(&self, settlement: &ChainSettlement) -> Result<String, ChainError>;

    fn is_mock(&self) -> bool {
        false
    }
}

/// SHA-256 merkle root over `proposition|user|amount` leaves.
/// An odd node at any level is paired with itself.
pub fn merkle_root(proposition_id: Uuid, payouts: &[ChainPayout]) -> String {
    let mut level: Vec<[u8; 32]> = payouts
        .iter()
        .map(|p| {
            let leaf = format!("{}|{}|{}", proposition_id, p.user_id, p.amount.normalize());
            Sha256::digest(leaf.as_bytes()).into()
        })
        .collect();

    if level.is_empty() {
        return hex::encode([0u8; 32]);
    }

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let mut hasher = Sha256::new();
                hasher.update(pair[0]);
                hasher.update(pair.get(1).unwrap_or(&pair[0]));
                hasher.finalize().into()
            })
            .collect();
    }
    hex::encode(level[0])
}

// ============================================================================
// RPC CLIENT
// ============================================================================

pub struct RpcChainClient {
    endpoint_url: Option<String>,
    client: Client,
}

impl RpcChainClient {
    pub fn new(endpoint_url: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { endpoint_url, client }
    }

    /// Log connection status (call on startup)
    pub fn log_status(&self) {
        match &self.endpoint_url {
            Some(url) => info!(%url, "chain relay connected"),
            None => warn!("chain relay in mock mode (CHAIN_RPC_URL not set)"),
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn submit_settlement(&self, settlement: &ChainSettlement) -> Result<String, ChainError> {
        let Some(endpoint) = &self.endpoint_url else {
            // Mock mode: a deterministic hash standing in for the tx
            let digest = Sha256::digest(format!("mock|{}", settlement.merkle_root).as_bytes());
            return Ok(format!("0x{}", hex::encode(digest)));
        };

        let url = format!("{}/rpc/settlements", endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(settlement)
            .send()
            .await
            .map_err(|e| ChainError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChainError::RequestFailed(format!("chain returned status {}", response.status())));
        }

        let result: ChainSettlementResponse = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;

        match (result.recorded, result.tx_hash) {
            (true, Some(hash)) => Ok(hash),
            (true, None) => Err(ChainError::InvalidResponse("recorded without tx hash".into())),
            (false, _) => Err(ChainError::Rejected(result.error.unwrap_or_else(|| "no reason given".into()))),
        }
    }

    fn is_mock(&self) -> bool {
        self.endpoint_url.is_none()
    }
}
