//! Fee-adjusted profit evaluation for a single candidate size.
//!
//! This is the numerically sensitive heart of the pipeline. Every step is
//! 18-decimal fixed point with truncation toward zero, so two evaluations
//! of the same frozen inputs produce bit-identical results.

use crate::decimal::Decimal;
use crate::errors::CandidateError;
use crate::models::{PoolReserves, Price, ProfitQuote, TradeCandidate};
use crate::pool::constant_product_out;
use crate::settlement::FeeModel;
use ethers::types::I256;

/// Evaluate one candidate against a frozen cycle snapshot.
///
/// The settlement fee is applied before the conversion back to base units,
/// so the fee reduces the base amount actually redeemed:
/// `redeemed = amm_out * (1 - fee) / oracle_price`.
pub fn evaluate(
    candidate: TradeCandidate,
    reserves: &PoolReserves,
    oracle_price: Price,
    fee_model: &FeeModel,
    total_debt: Decimal,
    pool_fee: Decimal,
) -> Result<ProfitQuote, CandidateError> {
    let amm_out = constant_product_out(reserves, candidate.0, pool_fee)
        .ok_or(CandidateError::Numeric)?;
    let fee_rate = fee_model.marginal_fee(amm_out, total_debt);
    let net_settlement = amm_out
        .checked_mul(fee_rate.complement())
        .ok_or(CandidateError::Numeric)?;
    let redeemed_base = net_settlement
        .checked_div(oracle_price.0)
        .ok_or(CandidateError::Numeric)?;
    let profit = signed(redeemed_base)?
        .checked_sub(signed(candidate.0)?)
        .ok_or(CandidateError::Numeric)?;
    Ok(ProfitQuote {
        candidate,
        amm_out,
        fee_rate,
        net_settlement,
        redeemed_base,
        profit,
    })
}

fn signed(value: Decimal) -> Result<I256, CandidateError> {
    I256::try_from(value.raw()).map_err(|_| CandidateError::Numeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserves() -> PoolReserves {
        PoolReserves {
            base: Decimal::from_whole(1000),
            quote: Decimal::from_whole(2_000_000),
        }
    }

    fn fee_model() -> FeeModel {
        FeeModel::new(
            "0.005".parse().expect("literal"),
            "0.005".parse().expect("literal"),
        )
    }

    fn eval(candidate: u64, oracle: u64) -> ProfitQuote {
        evaluate(
            TradeCandidate(Decimal::from_whole(candidate)),
            &reserves(),
            Price(Decimal::from_whole(oracle)),
            &fee_model(),
            Decimal::from_whole(1_000_000_000),
            "0.003".parse().expect("literal"),
        )
        .expect("evaluates")
    }

    /// Recompute the whole pipeline in f64 and check the profit sign and
    /// rough magnitude agree with the fixed-point result.
    fn reference_profit(candidate: f64, oracle: f64) -> f64 {
        let in_net = candidate * 0.997;
        let amm_out = 2_000_000.0 * in_net / (1000.0 + in_net);
        let fee = 0.005 + (amm_out / 1_000_000_000.0) / 2.0 + 0.005;
        let redeemed = amm_out * (1.0 - fee) / oracle;
        redeemed - candidate
    }

    #[test]
    fn profit_sign_matches_reference_recomputation() {
        for (candidate, oracle) in [(1u64, 1900u64), (10, 1900), (1, 2100), (100, 1990)] {
            let quote = eval(candidate, oracle);
            let reference = reference_profit(candidate as f64, oracle as f64);
            assert_eq!(
                quote.profit.is_negative(),
                reference < 0.0,
                "sign mismatch for candidate {candidate} at oracle {oracle}"
            );
            let got = crate::decimal::format_signed(quote.profit)
                .parse::<f64>()
                .expect("renders as a number");
            assert!(
                (got - reference).abs() < 1e-6,
                "candidate {candidate}: got {got}, reference {reference}"
            );
        }
    }

    #[test]
    fn amm_price_above_oracle_yields_positive_profit() {
        // Pool price 2000 vs oracle 1900: the edge exceeds both fees.
        let quote = eval(1, 1900);
        assert!(!quote.profit.is_negative());
        assert!(quote.profit > I256::zero());
    }

    #[test]
    fn oracle_above_amm_price_yields_negative_profit() {
        let quote = eval(1, 2100);
        assert!(quote.profit.is_negative());
    }

    #[test]
    fn fee_is_applied_before_base_conversion() {
        let quote = eval(1, 1900);
        let unfee_redeemed = quote
            .amm_out
            .checked_div(Decimal::from_whole(1900))
            .expect("divides");
        assert!(quote.redeemed_base < unfee_redeemed);
        assert_eq!(
            quote.net_settlement,
            quote
                .amm_out
                .checked_mul(quote.fee_rate.complement())
                .expect("multiplies")
        );
    }

    #[test]
    fn evaluation_is_bit_identical_on_frozen_inputs() {
        let a = eval(5, 1900);
        let b = eval(5, 1900);
        assert_eq!(a, b);
    }

    #[test]
    fn zero_oracle_price_is_a_numeric_error() {
        let err = evaluate(
            TradeCandidate(Decimal::from_whole(1)),
            &reserves(),
            Price(Decimal::ZERO),
            &fee_model(),
            Decimal::from_whole(1_000_000_000),
            "0.003".parse().expect("literal"),
        )
        .unwrap_err();
        assert!(matches!(err, CandidateError::Numeric));
    }
}
