//! Oracle/AMM redemption arbitrage bot.
//!
//! Per block tick: fetch the oracle reference price and one consistent AMM
//! reserve snapshot, compare, evaluate a fixed set of candidate trade sizes
//! concurrently, pick the best fee-adjusted profit, and submit one atomic
//! bundle when it clears the profit threshold.

pub mod chain;
pub mod config;
pub mod controller;
pub mod decimal;
pub mod errors;
pub mod models;
pub mod oracle;
pub mod pool;
pub mod profit;
pub mod selector;
pub mod settlement;
pub mod utils;
