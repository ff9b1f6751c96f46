//! AMM pool client: atomic reserve snapshots and constant-product math.

use crate::decimal::Decimal;
use crate::errors::{CandidateError, FetchError};
use crate::models::PoolReserves;
use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use std::sync::Arc;

/// Constant-product pair collaborator. `reserves` must return both sides
/// from a single call so the snapshot is internally consistent.
#[async_trait]
pub trait AmmPool: Send + Sync {
    /// (base reserve, quote reserve) in 18-decimal raw units.
    async fn reserves(&self) -> Result<(U256, U256), FetchError>;

    /// Calldata for the swap leg. The input amount is delivered by the
    /// bundle itself; the call names the minimum acceptable output and the
    /// recipient of the quote asset.
    async fn build_swap_tx(
        &self,
        amount_in: Decimal,
        amount_out_min: Decimal,
        recipient: Address,
    ) -> Result<Bytes, CandidateError>;
}

/// Validating wrapper over the pair collaborator.
pub struct PoolClient {
    pool: Arc<dyn AmmPool>,
}

impl PoolClient {
    pub fn new(pool: Arc<dyn AmmPool>) -> Self {
        Self { pool }
    }

    /// Fails with `PoolDataInvalid` when either side of the snapshot is
    /// zero; a drained or unseeded pool has no meaningful price.
    pub async fn fetch_reserves(&self) -> Result<PoolReserves, FetchError> {
        let (base, quote) = self.pool.reserves().await?;
        if base.is_zero() || quote.is_zero() {
            return Err(FetchError::PoolDataInvalid(
                "zero reserve in snapshot".into(),
            ));
        }
        Ok(PoolReserves {
            base: Decimal::from_raw(base),
            quote: Decimal::from_raw(quote),
        })
    }
}

/// Constant-product output for `amount_in` of the base asset, net of the
/// pool's fixed trading fee:
/// `out = reserve_quote * in_net / (reserve_base + in_net)` with
/// `in_net = amount_in * (1 - pool_fee)`. Truncates toward zero.
pub fn constant_product_out(
    reserves: &PoolReserves,
    amount_in: Decimal,
    pool_fee: Decimal,
) -> Option<Decimal> {
    let in_net = amount_in.checked_mul(pool_fee.complement())?;
    let denom = reserves.base.checked_add(in_net)?;
    reserves.quote.mul_div(in_net, denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserves(base: u64, quote: u64) -> PoolReserves {
        PoolReserves {
            base: Decimal::from_whole(base),
            quote: Decimal::from_whole(quote),
        }
    }

    #[test]
    fn output_matches_reference_formula() {
        let r = reserves(1000, 2_000_000);
        let fee: Decimal = "0.003".parse().expect("literal");
        let out = constant_product_out(&r, Decimal::from_whole(1), fee).expect("output");
        // 2_000_000 * 0.997 / 1000.997, truncated
        let reference = 2_000_000.0 * 0.997 / 1000.997;
        let got = out.to_f64_lossy();
        assert!((got - reference).abs() < 1e-6, "got {got}, want {reference}");
        assert!(out < r.quote);
    }

    #[test]
    fn zero_input_yields_zero_output() {
        let r = reserves(1000, 2_000_000);
        let fee: Decimal = "0.003".parse().expect("literal");
        let out = constant_product_out(&r, Decimal::ZERO, fee).expect("output");
        assert!(out.is_zero());
    }

    #[test]
    fn output_is_monotonic_in_input() {
        let r = reserves(1000, 2_000_000);
        let fee: Decimal = "0.003".parse().expect("literal");
        let small = constant_product_out(&r, Decimal::from_whole(1), fee).expect("output");
        let large = constant_product_out(&r, Decimal::from_whole(10), fee).expect("output");
        assert!(large > small);
    }

    #[test]
    fn spot_price_is_quote_over_base() {
        let r = reserves(1000, 2_000_000);
        let spot = r.spot_price().expect("price");
        assert_eq!(spot.0, Decimal::from_whole(2000));
    }

    struct FixedPool {
        base: U256,
        quote: U256,
    }

    #[async_trait]
    impl AmmPool for FixedPool {
        async fn reserves(&self) -> Result<(U256, U256), FetchError> {
            Ok((self.base, self.quote))
        }

        async fn build_swap_tx(
            &self,
            _amount_in: Decimal,
            _amount_out_min: Decimal,
            _recipient: Address,
        ) -> Result<Bytes, CandidateError> {
            Ok(Bytes::new())
        }
    }

    #[tokio::test]
    async fn zero_reserve_is_invalid_data() {
        let client = PoolClient::new(Arc::new(FixedPool {
            base: U256::zero(),
            quote: U256::from(1u8),
        }));
        let err = client.fetch_reserves().await.unwrap_err();
        assert!(matches!(err, FetchError::PoolDataInvalid(_)));
    }

    #[tokio::test]
    async fn valid_snapshot_passes_through() {
        let client = PoolClient::new(Arc::new(FixedPool {
            base: Decimal::from_whole(1000).raw(),
            quote: Decimal::from_whole(2_000_000).raw(),
        }));
        let r = client.fetch_reserves().await.expect("reserves");
        assert_eq!(r.base, Decimal::from_whole(1000));
        assert_eq!(r.quote, Decimal::from_whole(2_000_000));
    }
}
