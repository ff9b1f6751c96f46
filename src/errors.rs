use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Startup and wiring failures. Cycle-scoped failures have their own types
/// below and never terminate the controller loop.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("Decimal parse error: {0}")]
    ParseDecimal(#[from] crate::decimal::ParseDecimalError),

    #[error("Serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    Provider(#[from] ethers::providers::ProviderError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] ethers::signers::WalletError),

    #[error("Contract error: {0}")]
    Contract(
        #[from]
        ethers::contract::ContractError<ethers::providers::Provider<ethers::providers::Ws>>,
    ),

    #[error("Other: {0}")]
    Other(String),
}

/// Price or protocol-state fetch failure. Aborts the current cycle only;
/// the next block tick starts fresh.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("pool data invalid: {0}")]
    PoolDataInvalid(String),

    #[error("settlement protocol state unavailable: {0}")]
    ProtocolStateUnavailable(String),
}

/// A single candidate could not be evaluated or its legs could not be
/// built. Excludes that candidate only; the rest of the cycle proceeds.
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("settlement leg build failed: {0}")]
    SettlementBuild(String),

    #[error("swap leg build failed: {0}")]
    SwapBuild(String),

    #[error("bundle build failed: {0}")]
    BundleBuild(String),

    #[error("numeric overflow while evaluating candidate")]
    Numeric,
}

/// The wallet or network rejected the bundle. Reported, never retried
/// within the same cycle.
#[derive(Debug, Error)]
#[error("transaction submission failed: {0}")]
pub struct SubmissionError(pub String);
