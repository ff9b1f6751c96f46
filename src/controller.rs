//! Per-block orchestration: fetch, compare, evaluate, decide, submit.

use crate::config::AppConfig;
use crate::decimal::{Decimal, format_signed};
use crate::errors::{FetchError, SubmissionError};
use crate::models::{Price, TradeCandidate};
use crate::oracle::OracleClient;
use crate::pool::PoolClient;
use crate::selector::{CandidateSelector, SelectionContext};
use crate::settlement::SettlementProtocol;
use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, I256, TxHash};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Submits a signed transaction to the network.
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn send(&self, tx: TypedTransaction) -> Result<TxHash, SubmissionError>;
}

/// Phase of one block-tick cycle. Traced at debug level so an operator can
/// follow the Idle → Fetching → … → Idle progression per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Fetching,
    Comparing,
    Evaluating,
    Deciding,
    Submitting,
}

/// Distinct outcome of one cycle. Every variant is reported differently so
/// "market had no edge" is never mistaken for "system malfunctioned".
#[derive(Debug)]
pub enum CycleOutcome {
    /// Oracle or pool data could not be fetched; this block is skipped.
    FetchFailed(FetchError),
    /// AMM price does not exceed the oracle price; nothing to arbitrage.
    NoDirection {
        amm_price: Price,
        oracle_price: Price,
    },
    /// No candidate produced a positive profit with buildable legs.
    NoViableCandidate,
    /// The best candidate did not clear the absolute profit threshold.
    BelowThreshold { profit: I256 },
    /// The bundle was dispatched.
    Submitted { tx_hash: TxHash, profit: I256 },
    /// The wallet or network rejected the bundle.
    SubmissionFailed(SubmissionError),
}

/// Per-cycle knobs carved out of `AppConfig`.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub candidates: Vec<TradeCandidate>,
    pub min_profit: Decimal,
    pub pool_fee: Decimal,
    pub slippage_tolerance: Decimal,
    /// Recipient of the AMM leg output: the bundler contract.
    pub recipient: Address,
}

impl ControllerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            candidates: config.candidate_sizes.clone(),
            min_profit: config.min_profit,
            pool_fee: config.pool_fee,
            slippage_tolerance: config.slippage_tolerance,
            recipient: config.bundler_address,
        }
    }
}

pub struct ArbitrageController {
    oracle: OracleClient,
    pool: PoolClient,
    settlement: Arc<dyn SettlementProtocol>,
    selector: CandidateSelector,
    wallet: Arc<dyn Wallet>,
    settings: ControllerSettings,
}

impl ArbitrageController {
    pub fn new(
        oracle: OracleClient,
        pool: PoolClient,
        settlement: Arc<dyn SettlementProtocol>,
        selector: CandidateSelector,
        wallet: Arc<dyn Wallet>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            oracle,
            pool,
            settlement,
            selector,
            wallet,
            settings,
        }
    }

    /// Run one full cycle on fresh per-cycle state and return its outcome.
    /// Never fails: every error is folded into a cycle-scoped outcome so a
    /// bad block cannot stop future ticks.
    pub async fn run_cycle(&self) -> CycleOutcome {
        // Fetching. Oracle first: a dead feed must not cost a pool call.
        debug!(phase = ?CyclePhase::Fetching, "[CYCLE] fetching prices");
        let oracle_price = match self.oracle.fetch_reference_price().await {
            Ok(p) => p,
            Err(e) => return CycleOutcome::FetchFailed(e),
        };
        let reserves = match self.pool.fetch_reserves().await {
            Ok(r) => r,
            Err(e) => return CycleOutcome::FetchFailed(e),
        };

        // Comparing. The edge runs base→quote on the AMM, so it only
        // exists when the AMM pays more quote per base than the oracle.
        debug!(phase = ?CyclePhase::Comparing, "[CYCLE] comparing prices");
        let amm_price = match reserves.spot_price() {
            Some(p) => p,
            None => {
                return CycleOutcome::FetchFailed(FetchError::PoolDataInvalid(
                    "reserves admit no spot price".into(),
                ));
            }
        };
        if amm_price <= oracle_price {
            return CycleOutcome::NoDirection {
                amm_price,
                oracle_price,
            };
        }

        // Evaluating. Snapshot the fee state once, then fan out.
        debug!(phase = ?CyclePhase::Evaluating, "[CYCLE] evaluating candidates");
        let fee_snapshot = match self.settlement.fee_snapshot().await {
            Ok(s) => s,
            Err(e) => return CycleOutcome::FetchFailed(e),
        };
        let ctx = SelectionContext {
            reserves,
            oracle_price,
            fee_snapshot,
            pool_fee: self.settings.pool_fee,
            slippage_tolerance: self.settings.slippage_tolerance,
            recipient: self.settings.recipient,
        };
        let decision = self
            .selector
            .select_best(&self.settings.candidates, &ctx, self.settings.min_profit)
            .await;

        // Deciding.
        debug!(phase = ?CyclePhase::Deciding, submit = decision.submit, "[CYCLE] deciding");
        let Some(best) = decision.best else {
            return CycleOutcome::NoViableCandidate;
        };
        let profit = best.quote.profit;
        if !decision.submit {
            return CycleOutcome::BelowThreshold { profit };
        }
        let Some(bundle) = decision.bundle else {
            // select_best only gates in decisions that carry a bundle.
            return CycleOutcome::NoViableCandidate;
        };

        // Submitting. Errors are reported, never retried within the cycle.
        debug!(phase = ?CyclePhase::Submitting, "[CYCLE] submitting bundle");
        match self.wallet.send(bundle).await {
            Ok(tx_hash) => CycleOutcome::Submitted { tx_hash, profit },
            Err(e) => CycleOutcome::SubmissionFailed(e),
        }
    }

    /// Run one cycle for a block tick and report the outcome. Infallible
    /// by design; the tick loop keeps running whatever happened here.
    pub async fn on_block(&self, block: u64) {
        let outcome = self.run_cycle().await;
        match &outcome {
            CycleOutcome::FetchFailed(e) => {
                warn!(block, error = %e, "[CYCLE] fetch failed, skipping block");
            }
            CycleOutcome::NoDirection {
                amm_price,
                oracle_price,
            } => {
                info!(
                    block,
                    amm = %amm_price.0,
                    oracle = %oracle_price.0,
                    "[CYCLE] no arbitrage direction"
                );
            }
            CycleOutcome::NoViableCandidate => {
                info!(block, "[CYCLE] no profitable opportunities found");
            }
            CycleOutcome::BelowThreshold { profit } => {
                info!(
                    block,
                    profit = %format_signed(*profit),
                    "[CYCLE] best candidate below profit threshold"
                );
            }
            CycleOutcome::Submitted { tx_hash, profit } => {
                info!(
                    block,
                    hash = %tx_hash,
                    profit = %format_signed(*profit),
                    "[CYCLE] submitted arbitrage bundle"
                );
            }
            CycleOutcome::SubmissionFailed(e) => {
                warn!(block, error = %e, "[CYCLE] bundle submission failed");
            }
        }
        debug!(block, phase = ?CyclePhase::Idle, "[CYCLE] cycle complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CandidateError;
    use crate::oracle::OracleFeed;
    use crate::pool::AmmPool;
    use crate::selector::TransactionBundler;
    use crate::settlement::{FeeSnapshot, SettlementProtocol};
    use ethers::types::{Bytes, U256};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubFeed {
        price_whole: u64,
        fail: bool,
    }

    #[async_trait]
    impl OracleFeed for StubFeed {
        async fn latest_round(&self) -> Result<(U256, u8, u64), FetchError> {
            if self.fail {
                return Err(FetchError::OracleUnavailable("stub feed down".into()));
            }
            // 8-decimal feed, the normalization path stays exercised
            Ok((
                U256::from(self.price_whole) * U256::exp10(8),
                8,
                1_700_000_000,
            ))
        }
    }

    struct StubPool {
        touched: Arc<AtomicBool>,
    }

    #[async_trait]
    impl AmmPool for StubPool {
        async fn reserves(&self) -> Result<(U256, U256), FetchError> {
            self.touched.store(true, Ordering::SeqCst);
            Ok((
                Decimal::from_whole(1000).raw(),
                Decimal::from_whole(2_000_000).raw(),
            ))
        }

        async fn build_swap_tx(
            &self,
            _amount_in: Decimal,
            _amount_out_min: Decimal,
            _recipient: Address,
        ) -> Result<Bytes, CandidateError> {
            Ok(Bytes::from(vec![0x01]))
        }
    }

    struct StubSettlement;

    #[async_trait]
    impl SettlementProtocol for StubSettlement {
        async fn fee_snapshot(&self) -> Result<FeeSnapshot, FetchError> {
            Ok(FeeSnapshot {
                base_rate: "0.005".parse().expect("literal"),
                total_debt: Decimal::from_whole(1_000_000_000),
            })
        }

        async fn build_settlement_tx(&self, _amount: Decimal) -> Result<Bytes, CandidateError> {
            Ok(Bytes::from(vec![0x02]))
        }
    }

    struct StubBundler;

    #[async_trait]
    impl TransactionBundler for StubBundler {
        async fn build_bundle(
            &self,
            _initial: Decimal,
            _legs: [Bytes; 2],
        ) -> Result<TypedTransaction, CandidateError> {
            Ok(TypedTransaction::Legacy(Default::default()))
        }
    }

    struct RecordingWallet {
        sends: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Wallet for RecordingWallet {
        async fn send(&self, _tx: TypedTransaction) -> Result<TxHash, SubmissionError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SubmissionError("stub network rejected".into()));
            }
            Ok(TxHash::zero())
        }
    }

    struct Harness {
        controller: ArbitrageController,
        pool_touched: Arc<AtomicBool>,
        sends: Arc<AtomicUsize>,
    }

    fn harness(oracle_price: u64, oracle_fails: bool, min_profit: &str, wallet_fails: bool) -> Harness {
        let pool_touched = Arc::new(AtomicBool::new(false));
        let sends = Arc::new(AtomicUsize::new(0));
        let pool: Arc<dyn AmmPool> = Arc::new(StubPool {
            touched: pool_touched.clone(),
        });
        let settlement: Arc<dyn SettlementProtocol> = Arc::new(StubSettlement);
        let controller = ArbitrageController::new(
            OracleClient::new(Arc::new(StubFeed {
                price_whole: oracle_price,
                fail: oracle_fails,
            })),
            PoolClient::new(pool.clone()),
            settlement.clone(),
            CandidateSelector::new(pool, settlement, Arc::new(StubBundler)),
            Arc::new(RecordingWallet {
                sends: sends.clone(),
                fail: wallet_fails,
            }),
            ControllerSettings {
                candidates: vec![TradeCandidate(Decimal::from_whole(1))],
                min_profit: min_profit.parse().expect("literal"),
                pool_fee: "0.003".parse().expect("literal"),
                slippage_tolerance: "0.005".parse().expect("literal"),
                recipient: Address::zero(),
            },
        );
        Harness {
            controller,
            pool_touched,
            sends,
        }
    }

    #[tokio::test]
    async fn amm_above_oracle_evaluates_and_submits() {
        // Scenario A: pool 1000/2,000,000 prices at 2000 vs oracle 1900.
        let h = harness(1900, false, "0.02", false);
        let outcome = h.controller.run_cycle().await;
        assert!(
            matches!(outcome, CycleOutcome::Submitted { .. }),
            "expected submission, got {outcome:?}"
        );
        assert_eq!(h.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn oracle_above_amm_ends_at_comparing() {
        // Scenario B: oracle 2100 beats the pool's 2000, no direction.
        let h = harness(2100, false, "0.02", false);
        let outcome = h.controller.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::NoDirection { .. }));
        assert_eq!(h.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn below_threshold_does_not_submit() {
        // Scenario C: the single candidate clears ~0.038 profit, which a
        // 1-unit threshold gates out.
        let h = harness(1900, false, "1", false);
        let outcome = h.controller.run_cycle().await;
        let CycleOutcome::BelowThreshold { profit } = outcome else {
            panic!("expected below-threshold, got {outcome:?}");
        };
        assert!(profit > I256::zero());
        assert_eq!(h.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oracle_failure_aborts_before_the_pool_client() {
        // Scenario D: a dead feed skips the block without a pool call.
        let h = harness(1900, true, "0.02", false);
        let outcome = h.controller.run_cycle().await;
        assert!(matches!(
            outcome,
            CycleOutcome::FetchFailed(FetchError::OracleUnavailable(_))
        ));
        assert!(!h.pool_touched.load(Ordering::SeqCst));
        assert_eq!(h.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submission_failure_is_reported_not_retried() {
        let h = harness(1900, false, "0.02", true);
        let outcome = h.controller.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::SubmissionFailed(_)));
        assert_eq!(h.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn equal_amm_and_oracle_price_is_no_direction() {
        let h = harness(2000, false, "0.02", false);
        let outcome = h.controller.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::NoDirection { .. }));
    }
}
