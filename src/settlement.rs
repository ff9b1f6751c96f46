//! Settlement protocol collaborator and the marginal fee model.

use crate::decimal::Decimal;
use crate::errors::{CandidateError, FetchError};
use async_trait::async_trait;
use ethers::types::Bytes;

/// Per-cycle snapshot of the protocol's fee state, read once before the
/// candidate fan-out so every candidate prices against the same state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSnapshot {
    /// Current decayed base rate of the protocol.
    pub base_rate: Decimal,
    /// Total outstanding debt the settlement draws against.
    pub total_debt: Decimal,
}

#[async_trait]
pub trait SettlementProtocol: Send + Sync {
    async fn fee_snapshot(&self) -> Result<FeeSnapshot, FetchError>;

    /// Calldata for the settlement leg. Fails when `amount` is below the
    /// protocol minimum; such failures exclude one candidate only.
    async fn build_settlement_tx(&self, amount: Decimal) -> Result<Bytes, CandidateError>;
}

/// Marginal settlement fee: base rate plus half the settled fraction of
/// total debt, plus a fixed slippage buffer, hard-capped at 1.0.
#[derive(Debug, Clone, Copy)]
pub struct FeeModel {
    base_rate: Decimal,
    slippage_tolerance: Decimal,
}

impl FeeModel {
    pub fn new(base_rate: Decimal, slippage_tolerance: Decimal) -> Self {
        Self {
            base_rate,
            slippage_tolerance,
        }
    }

    /// Always in [0, 1]. A zero `total_debt` or a ratio too large to
    /// represent clamps to exactly 1: the fee can never exceed the full
    /// settled amount.
    pub fn marginal_fee(&self, amount: Decimal, total_debt: Decimal) -> Decimal {
        let fraction = match amount.checked_div(total_debt) {
            Some(f) => f,
            None => return Decimal::ONE,
        };
        self.base_rate
            .saturating_add(fraction.half())
            .saturating_add(self.slippage_tolerance)
            .min(Decimal::ONE)
    }
}
