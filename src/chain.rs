//! On-chain implementations of the collaborator traits.
//!
//! Everything network-facing lives here: the oracle feed proxy, the AMM
//! pair, the redemption engine and the bundler contract, plus the signing
//! wallet. The decision pipeline itself only ever sees the traits.

use crate::config::AppConfig;
use crate::controller::Wallet;
use crate::decimal::Decimal;
use crate::errors::{CandidateError, FetchError, Result, SubmissionError};
use crate::oracle::OracleFeed;
use crate::pool::AmmPool;
use crate::selector::TransactionBundler;
use crate::settlement::{FeeSnapshot, SettlementProtocol};
use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Middleware, Provider, Ws};
use ethers::signers::LocalWallet;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TxHash, U256};
use std::sync::Arc;

abigen!(
    AggregatorFeed,
    r#"[
        function latestRoundData() view returns (uint80 roundId, int256 answer, uint256 startedAt, uint256 updatedAt, uint80 answeredInRound)
        function decimals() view returns (uint8)
    ]"#,
);

abigen!(
    ConstantProductPair,
    r#"[
        function getReserves() view returns (uint256 reserve0, uint256 reserve1, uint32 blockTimestampLast)
        function swap(uint256 amount0Out, uint256 amount1Out, address to, bytes data)
    ]"#,
);

abigen!(
    RedemptionEngine,
    r#"[
        function baseRate() view returns (uint256)
        function getEntireSystemDebt() view returns (uint256)
        function redeemCollateral(uint256 amount, uint256 maxFeePercentage)
    ]"#,
);

abigen!(
    BundleExecutor,
    r#"[
        function makeCalls(uint256 initialAmount, bytes[] calls)
    ]"#,
);

type Client = Arc<Provider<Ws>>;

/// Chainlink-style aggregator proxy. Decimals are read once at startup;
/// a proxy never changes its scale mid-flight.
pub struct ChainlinkFeed {
    feed: AggregatorFeed<Provider<Ws>>,
    decimals: u8,
}

impl ChainlinkFeed {
    pub async fn connect(address: Address, client: Client) -> Result<Self> {
        let feed = AggregatorFeed::new(address, client);
        let decimals = feed.decimals().call().await?;
        Ok(Self { feed, decimals })
    }
}

#[async_trait]
impl OracleFeed for ChainlinkFeed {
    async fn latest_round(&self) -> std::result::Result<(U256, u8, u64), FetchError> {
        let (_, answer, _, updated_at, _) = self
            .feed
            .latest_round_data()
            .call()
            .await
            .map_err(|e| FetchError::OracleUnavailable(e.to_string()))?;
        if answer.is_negative() {
            return Err(FetchError::OracleUnavailable(
                "feed returned a negative answer".into(),
            ));
        }
        Ok((answer.into_raw(), self.decimals, updated_at.as_u64()))
    }
}

/// Constant-product pair with the base asset as token0. `getReserves`
/// returns both sides in one call, which is what makes the snapshot
/// atomic.
pub struct PairPool {
    pair: ConstantProductPair<Provider<Ws>>,
}

impl PairPool {
    pub async fn connect(address: Address, client: Client) -> Result<Self> {
        let pair = ConstantProductPair::new(address, client);
        pair.get_reserves().call().await?; // sanity-check
        Ok(Self { pair })
    }
}

#[async_trait]
impl AmmPool for PairPool {
    async fn reserves(&self) -> std::result::Result<(U256, U256), FetchError> {
        let (reserve0, reserve1, _) = self
            .pair
            .get_reserves()
            .call()
            .await
            .map_err(|e| FetchError::PoolDataInvalid(e.to_string()))?;
        Ok((reserve0, reserve1))
    }

    async fn build_swap_tx(
        &self,
        _amount_in: Decimal,
        amount_out_min: Decimal,
        recipient: Address,
    ) -> std::result::Result<Bytes, CandidateError> {
        // The input amount arrives via the bundle's seeded transfer; the
        // pair call only names the quote-side output and its recipient.
        self.pair
            .swap(U256::zero(), amount_out_min.raw(), recipient, Bytes::new())
            .calldata()
            .ok_or_else(|| CandidateError::SwapBuild("pair swap encoded no calldata".into()))
    }
}

/// Liquity-style redemption engine.
pub struct RedemptionClient {
    engine: RedemptionEngine<Provider<Ws>>,
    /// Ceiling passed on-chain; the fee model's own cap is what gates
    /// candidates, this just mirrors it into the call.
    max_fee_percentage: Decimal,
    /// Smallest amount the protocol accepts; smaller candidates are
    /// excluded client-side instead of reverting on-chain.
    min_settlement: Decimal,
}

impl RedemptionClient {
    pub fn new(address: Address, client: Client, min_settlement: Decimal) -> Self {
        Self {
            engine: RedemptionEngine::new(address, client),
            max_fee_percentage: Decimal::ONE,
            min_settlement,
        }
    }
}

#[async_trait]
impl SettlementProtocol for RedemptionClient {
    async fn fee_snapshot(&self) -> std::result::Result<FeeSnapshot, FetchError> {
        // The call builders must outlive the futures that borrow them.
        let base_rate_call = self.engine.base_rate();
        let total_debt_call = self.engine.get_entire_system_debt();
        let (base_rate, total_debt) =
            tokio::try_join!(base_rate_call.call(), total_debt_call.call())
                .map_err(|e| FetchError::ProtocolStateUnavailable(e.to_string()))?;
        Ok(FeeSnapshot {
            base_rate: Decimal::from_raw(base_rate),
            total_debt: Decimal::from_raw(total_debt),
        })
    }

    async fn build_settlement_tx(
        &self,
        amount: Decimal,
    ) -> std::result::Result<Bytes, CandidateError> {
        if amount < self.min_settlement {
            return Err(CandidateError::SettlementBuild(
                "amount below protocol minimum".into(),
            ));
        }
        self.engine
            .redeem_collateral(amount.raw(), self.max_fee_percentage.raw())
            .calldata()
            .ok_or_else(|| {
                CandidateError::SettlementBuild("redemption encoded no calldata".into())
            })
    }
}

/// Bundler contract that runs both legs in one atomic transaction.
pub struct CallBundler {
    executor: BundleExecutor<Provider<Ws>>,
    gas_limit: U256,
}

impl CallBundler {
    pub fn new(address: Address, client: Client, gas_limit: u64) -> Self {
        Self {
            executor: BundleExecutor::new(address, client),
            gas_limit: U256::from(gas_limit),
        }
    }
}

#[async_trait]
impl TransactionBundler for CallBundler {
    async fn build_bundle(
        &self,
        initial: Decimal,
        legs: [Bytes; 2],
    ) -> std::result::Result<TypedTransaction, CandidateError> {
        let [swap_leg, settlement_leg] = legs;
        let call = self
            .executor
            .make_calls(initial.raw(), vec![swap_leg, settlement_leg]);
        let mut tx = call.tx;
        tx.set_gas(self.gas_limit);
        Ok(tx)
    }
}

/// Signing wallet over the shared provider connection (read-only from the
/// pipeline's perspective; submission is its only mutation).
pub struct SignerWallet {
    inner: Arc<SignerMiddleware<Provider<Ws>, LocalWallet>>,
}

impl SignerWallet {
    pub fn new(inner: Arc<SignerMiddleware<Provider<Ws>, LocalWallet>>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Wallet for SignerWallet {
    async fn send(&self, tx: TypedTransaction) -> std::result::Result<TxHash, SubmissionError> {
        let pending = self
            .inner
            .send_transaction(tx, None)
            .await
            .map_err(|e| SubmissionError(e.to_string()))?;
        Ok(pending.tx_hash())
    }
}

/// Wire every collaborator against one provider and build the controller
/// inputs from configuration.
pub struct ChainClients {
    pub oracle: Arc<ChainlinkFeed>,
    pub pool: Arc<PairPool>,
    pub settlement: Arc<RedemptionClient>,
    pub bundler: Arc<CallBundler>,
    pub wallet: Arc<SignerWallet>,
}

impl ChainClients {
    pub async fn connect(
        config: &AppConfig,
        provider: Client,
        signer: Arc<SignerMiddleware<Provider<Ws>, LocalWallet>>,
    ) -> Result<Self> {
        let oracle = Arc::new(ChainlinkFeed::connect(config.oracle_address, provider.clone()).await?);
        let pool = Arc::new(PairPool::connect(config.pool_address, provider.clone()).await?);
        let settlement = Arc::new(RedemptionClient::new(
            config.settlement_address,
            provider.clone(),
            config.min_settlement,
        ));
        let bundler = Arc::new(CallBundler::new(
            config.bundler_address,
            provider,
            config.gas_limit,
        ));
        let wallet = Arc::new(SignerWallet::new(signer));
        Ok(Self {
            oracle,
            pool,
            settlement,
            bundler,
            wallet,
        })
    }
}
