//! Configuration loader and application settings.

use crate::decimal::{self, Decimal};
use crate::errors::{AppError, Result};
use crate::models::TradeCandidate;
use ethers::types::{Address, U256};
use serde::Deserialize;
use std::str::FromStr;

/// Consolidated application configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// WebSocket RPC endpoint for block subscription and contract calls.
    pub rpc_url: String,
    /// Hex-encoded signing key for bundle submission.
    pub private_key: String,
    /// Oracle price feed contract.
    pub oracle_address: Address,
    /// AMM pair contract for the traded pair.
    pub pool_address: Address,
    /// Settlement (redemption) protocol contract.
    pub settlement_address: Address,
    /// Bundler contract that executes both legs atomically.
    pub bundler_address: Address,
    /// Ordered candidate trade sizes in base-asset units.
    pub candidate_sizes: Vec<TradeCandidate>,
    /// Minimum absolute profit (base asset) required to submit.
    pub min_profit: Decimal,
    /// Fixed AMM trading fee, e.g. 0.003 for a 30 bps pool.
    pub pool_fee: Decimal,
    /// Fixed buffer added on top of the quoted settlement fee.
    pub slippage_tolerance: Decimal,
    /// Smallest settlement amount the protocol accepts.
    pub min_settlement: Decimal,
    /// Gas limit attached to every built bundle.
    pub gas_limit: u64,
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct CandidateList(Vec<String>);

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        let rpc_url = require("RPC_WS_URL")?;
        let private_key = require("ETHEREUM_PRIVATE_KEY")?;
        let oracle_address = address_var("ORACLE_FEED_ADDRESS")?;
        let pool_address = address_var("POOL_ADDRESS")?;
        let settlement_address = address_var("SETTLEMENT_ADDRESS")?;
        let bundler_address = address_var("BUNDLER_ADDRESS")?;

        let candidate_sizes =
            parse_candidate_sizes(&env_or("SWAP_AMOUNTS", r#"["0.5", "1", "5", "10"]"#))?;
        let min_profit: Decimal = env_or("MIN_PROFIT", "0.02").parse()?;
        let pool_fee = pool_fee_from_bps(&env_or("POOL_FEE_BPS", "30"))?;
        let slippage_tolerance: Decimal = env_or("SLIPPAGE_TOLERANCE", "0.005").parse()?;
        let min_settlement: Decimal = env_or("MIN_SETTLEMENT", "0").parse()?;
        let gas_limit = env_or("GAS_LIMIT", "700000")
            .parse::<u64>()
            .map_err(|e| AppError::Config(format!("GAS_LIMIT: {e}")))?;

        // The fixed-point layer is compiled for 18 fractional digits; the
        // variable exists so a mismatched deployment fails loudly.
        let working_decimals = env_or("WORKING_DECIMALS", "18")
            .parse::<u32>()
            .map_err(|e| AppError::Config(format!("WORKING_DECIMALS: {e}")))?;
        if working_decimals != decimal::PRECISION {
            return Err(AppError::Config(format!(
                "WORKING_DECIMALS must be {}, got {working_decimals}",
                decimal::PRECISION
            )));
        }

        Ok(Self {
            rpc_url,
            private_key,
            oracle_address,
            pool_address,
            settlement_address,
            bundler_address,
            candidate_sizes,
            min_profit,
            pool_fee,
            slippage_tolerance,
            min_settlement,
            gas_limit,
        })
    }
}

fn require(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| AppError::Config(format!("set the {key} env var")))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn address_var(key: &str) -> Result<Address> {
    Address::from_str(&require(key)?)
        .map_err(|e| AppError::Config(format!("{key} is not a valid address: {e}")))
}

/// Parse the JSON array of candidate sizes, preserving its order.
fn parse_candidate_sizes(raw: &str) -> Result<Vec<TradeCandidate>> {
    let list: CandidateList = serde_json::from_str(raw)?;
    if list.0.is_empty() {
        return Err(AppError::Config(
            "SWAP_AMOUNTS must name at least one candidate size".into(),
        ));
    }
    list.0
        .iter()
        .map(|s| Ok(TradeCandidate(s.parse::<Decimal>()?)))
        .collect()
}

fn pool_fee_from_bps(raw: &str) -> Result<Decimal> {
    let bps = raw
        .parse::<u64>()
        .map_err(|e| AppError::Config(format!("POOL_FEE_BPS: {e}")))?;
    if bps >= 10_000 {
        return Err(AppError::Config(format!(
            "POOL_FEE_BPS must be below 10000, got {bps}"
        )));
    }
    // bps / 10^4 at 18-decimal scale
    Ok(Decimal::from_raw(U256::from(bps) * U256::exp10(14)))
}
