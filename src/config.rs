// Runtime configuration from the environment (.env honoured via dotenv)

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::settlement::payout::FeeRates;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub data_dir: String,
    pub admin_api_key: Option<String>,
    pub admin_actor_ids: Vec<String>,
    /// Receives platform fees and rounding residue
    pub platform_account_id: String,
    pub default_fees: FeeRates,
    pub min_reason_len: usize,
    /// None = mock chain
    pub chain_rpc_url: Option<String>,
    pub finalize_poll: Duration,
    /// How long a claimed finalize job may run before it is requeued
    pub finalize_lease: Duration,
    /// Demo credit granted by the faucet deposit when no amount is given
    pub demo_starting_balance: Decimal,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            bind_addr: parse_var("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 1234)))?,
            data_dir: var("DATA_DIR").unwrap_or_else(|| "data/propbook.sled".to_string()),
            admin_api_key: var("ADMIN_API_KEY"),
            admin_actor_ids: var("ADMIN_ACTOR_IDS")
                .map(|ids| {
                    ids.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            platform_account_id: var("PLATFORM_ACCOUNT_ID").unwrap_or_else(|| "platform".to_string()),
            default_fees: FeeRates {
                platform_pct: parse_var("DEFAULT_PLATFORM_FEE_PCT", dec!(2.5))?,
                creator_pct: parse_var("DEFAULT_CREATOR_FEE_PCT", dec!(1.0))?,
            },
            min_reason_len: parse_var("MIN_REASON_LEN", 5)?,
            chain_rpc_url: var("CHAIN_RPC_URL"),
            finalize_poll: Duration::from_secs(parse_var("FINALIZE_POLL_SECS", 5)?),
            finalize_lease: Duration::from_secs(parse_var("FINALIZE_LEASE_SECS", 120)?),
            demo_starting_balance: parse_var("DEMO_STARTING_BALANCE", dec!(1000))?,
        })
    }

    /// Deterministic settings for tests: temporary storage, mock chain
    pub fn for_tests() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_dir: String::new(),
            admin_api_key: Some("test-admin-key".to_string()),
            admin_actor_ids: vec!["ops".to_string()],
            platform_account_id: "platform".to_string(),
            default_fees: FeeRates { platform_pct: dec!(2.5), creator_pct: dec!(1.0) },
            min_reason_len: 5,
            chain_rpc_url: None,
            finalize_poll: Duration::from_millis(50),
            finalize_lease: Duration::from_secs(30),
            demo_starting_balance: dec!(1000),
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|e| format!("{}={:?}: {}", name, raw, e)),
        None => Ok(default),
    }
}
