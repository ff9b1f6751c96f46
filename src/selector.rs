//! Concurrent candidate fan-out and best-candidate reduction.

use crate::decimal::{Decimal, format_signed};
use crate::errors::CandidateError;
use crate::models::{CycleDecision, Evaluation, PoolReserves, Price, TradeCandidate};
use crate::pool::AmmPool;
use crate::profit;
use crate::settlement::{FeeModel, FeeSnapshot, SettlementProtocol};
use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, I256};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Combines both calldata legs into one atomic transaction seeded with
/// `initial` base units.
#[async_trait]
pub trait TransactionBundler: Send + Sync {
    async fn build_bundle(
        &self,
        initial: Decimal,
        legs: [Bytes; 2],
    ) -> Result<TypedTransaction, CandidateError>;
}

/// Inputs frozen for one cycle's fan-out. Constructed fresh per tick.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext {
    pub reserves: PoolReserves,
    pub oracle_price: Price,
    pub fee_snapshot: FeeSnapshot,
    pub pool_fee: Decimal,
    pub slippage_tolerance: Decimal,
    /// Recipient of the AMM leg's output: the bundler contract.
    pub recipient: Address,
}

/// Per-candidate result. Exclusions are expected and non-fatal; they carry
/// a typed reason so tests and logs can tell why a size dropped out.
#[derive(Debug)]
pub enum CandidateOutcome {
    Evaluated(Evaluation),
    Excluded {
        candidate: TradeCandidate,
        reason: CandidateError,
    },
}

pub struct CandidateSelector {
    pool: Arc<dyn AmmPool>,
    settlement: Arc<dyn SettlementProtocol>,
    bundler: Arc<dyn TransactionBundler>,
}

impl CandidateSelector {
    pub fn new(
        pool: Arc<dyn AmmPool>,
        settlement: Arc<dyn SettlementProtocol>,
        bundler: Arc<dyn TransactionBundler>,
    ) -> Self {
        Self {
            pool,
            settlement,
            bundler,
        }
    }

    /// Evaluate all candidates concurrently, keep the first-seen strict
    /// maximum positive profit, and build the winner's bundle.
    ///
    /// Only candidates with both legs built are eligible, whatever their
    /// raw profit. If the winner's bundle fails to build, the cycle
    /// reports no opportunity rather than submitting unbuildable data.
    pub async fn select_best(
        &self,
        candidates: &[TradeCandidate],
        ctx: &SelectionContext,
        min_profit: Decimal,
    ) -> CycleDecision {
        // join_all keeps candidate-list order, so ties resolve to the
        // first-seen maximum deterministically.
        let outcomes = join_all(
            candidates
                .iter()
                .map(|candidate| self.evaluate_candidate(*candidate, ctx)),
        )
        .await;

        let mut best: Option<Evaluation> = None;
        let mut best_profit = I256::zero();
        for outcome in outcomes {
            match outcome {
                CandidateOutcome::Evaluated(eval) => {
                    let q = &eval.quote;
                    debug!(
                        initial = %q.candidate.0,
                        amm_out = %q.amm_out,
                        fee_rate = %q.fee_rate,
                        net_settlement = %q.net_settlement,
                        redeemed = %q.redeemed_base,
                        profit = %format_signed(q.profit),
                        "[SELECT] candidate evaluated"
                    );
                    if q.profit > best_profit {
                        best_profit = q.profit;
                        best = Some(eval);
                    }
                }
                CandidateOutcome::Excluded { candidate, reason } => {
                    debug!(
                        initial = %candidate.0,
                        reason = %reason,
                        "[SELECT] candidate excluded"
                    );
                }
            }
        }

        let Some(best) = best else {
            return CycleDecision::skip();
        };

        let bundle = match self
            .bundler
            .build_bundle(
                best.quote.candidate.0,
                [best.swap_leg.clone(), best.settlement_leg.clone()],
            )
            .await
        {
            Ok(tx) => tx,
            Err(e) => {
                warn!(error = %e, "[SELECT] winning bundle failed to build");
                return CycleDecision::skip();
            }
        };

        let threshold = I256::try_from(min_profit.raw()).unwrap_or(I256::MAX);
        let submit = best.quote.profit > threshold;
        CycleDecision {
            best: Some(best),
            bundle: Some(bundle),
            submit,
        }
    }

    async fn evaluate_candidate(
        &self,
        candidate: TradeCandidate,
        ctx: &SelectionContext,
    ) -> CandidateOutcome {
        let fee_model = FeeModel::new(ctx.fee_snapshot.base_rate, ctx.slippage_tolerance);
        let quote = match profit::evaluate(
            candidate,
            &ctx.reserves,
            ctx.oracle_price,
            &fee_model,
            ctx.fee_snapshot.total_debt,
            ctx.pool_fee,
        ) {
            Ok(q) => q,
            Err(reason) => return CandidateOutcome::Excluded { candidate, reason },
        };

        // The quoted output is the minimum acceptable fill: a worse fill
        // than the one priced here is a worse trade than evaluated.
        let swap_leg = match self
            .pool
            .build_swap_tx(candidate.0, quote.amm_out, ctx.recipient)
            .await
        {
            Ok(data) => data,
            Err(reason) => return CandidateOutcome::Excluded { candidate, reason },
        };

        let settlement_leg = match self.settlement.build_settlement_tx(quote.amm_out).await {
            Ok(data) => data,
            Err(reason) => return CandidateOutcome::Excluded { candidate, reason },
        };

        CandidateOutcome::Evaluated(Evaluation {
            quote,
            swap_leg,
            settlement_leg,
        })
    }
}
