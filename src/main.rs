use anyhow::Result;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Middleware, Provider, Ws};
use ethers::signers::{LocalWallet, Signer};
use futures::StreamExt;
use redemption_arb::{
    chain::ChainClients,
    config::AppConfig,
    controller::{ArbitrageController, ControllerSettings},
    oracle::OracleClient,
    pool::PoolClient,
    selector::CandidateSelector,
    utils,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let config = AppConfig::load()?;
    tracing::info!(
        candidates = config.candidate_sizes.len(),
        min_profit = %config.min_profit,
        pool_fee = %config.pool_fee,
        "[INIT] redemption-arb starting"
    );

    let provider = Arc::new(Provider::<Ws>::connect(&config.rpc_url).await?);
    let chain_id = provider.get_chainid().await?.as_u64();
    let signer: LocalWallet = config.private_key.parse::<LocalWallet>()?;
    let signer = Arc::new(SignerMiddleware::new(
        provider.as_ref().clone(),
        signer.with_chain_id(chain_id),
    ));

    let clients = ChainClients::connect(&config, provider.clone(), signer).await?;
    let controller = Arc::new(ArbitrageController::new(
        OracleClient::new(clients.oracle.clone()),
        PoolClient::new(clients.pool.clone()),
        clients.settlement.clone(),
        CandidateSelector::new(
            clients.pool.clone(),
            clients.settlement.clone(),
            clients.bundler.clone(),
        ),
        clients.wallet.clone(),
        ControllerSettings::from_config(&config),
    ));
    tracing::info!(chain_id, "[INIT] collaborators connected, watching blocks");

    // One cycle per block tick. Each cycle owns its own task so a slow
    // Submitting phase never blocks the next tick's Fetching; an in-flight
    // cycle completes on its own stale-but-consistent snapshot.
    let mut blocks = provider.subscribe_blocks().await?;
    while let Some(block) = blocks.next().await {
        let number = block.number.map(|n| n.as_u64()).unwrap_or_default();
        let controller = controller.clone();
        tokio::spawn(async move {
            controller.on_block(number).await;
        });
    }

    tracing::warn!("[SHUTDOWN] block subscription ended");
    Ok(())
}
