//! Shared value types for one decision cycle.
//!
//! Everything here is constructed fresh per block tick and discarded when
//! the cycle's decision has been consumed; nothing is shared across ticks.

use crate::decimal::Decimal;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Bytes, I256};

/// Reference price in quote units per base unit, 18-decimal fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Price(pub Decimal);

/// One consistent AMM reserve snapshot, both sides read in a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReserves {
    pub base: Decimal,
    pub quote: Decimal,
}

impl PoolReserves {
    /// Marginal spot price implied by the snapshot (quote per base).
    pub fn spot_price(&self) -> Option<Price> {
        self.quote.checked_div(self.base).map(Price)
    }
}

/// One candidate input size (base asset) from the configured ordered set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeCandidate(pub Decimal);

/// Pure numeric result of evaluating one candidate, before any
/// transaction building. Deterministic for frozen inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfitQuote {
    pub candidate: TradeCandidate,
    /// Quote-asset amount the AMM leg yields, net of the pool trading fee.
    pub amm_out: Decimal,
    /// Marginal settlement fee rate applied to `amm_out`, in [0, 1].
    pub fee_rate: Decimal,
    /// `amm_out * (1 - fee_rate)`.
    pub net_settlement: Decimal,
    /// Base-asset amount actually redeemed at the oracle price.
    pub redeemed_base: Decimal,
    /// `redeemed_base - candidate`; may be negative.
    pub profit: I256,
}

/// A fully evaluated candidate with both prebuilt calldata legs.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub quote: ProfitQuote,
    pub swap_leg: Bytes,
    pub settlement_leg: Bytes,
}

/// Outcome of one block tick's selection step: the winning evaluation (if
/// any), its prebuilt atomic bundle, and whether the profit threshold
/// gates it in for submission.
#[derive(Debug, Clone)]
pub struct CycleDecision {
    pub best: Option<Evaluation>,
    pub bundle: Option<TypedTransaction>,
    pub submit: bool,
}

impl CycleDecision {
    /// No viable candidate this cycle.
    pub fn skip() -> Self {
        CycleDecision {
            best: None,
            bundle: None,
            submit: false,
        }
    }
}
