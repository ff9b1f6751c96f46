//! Reference-price client over an external oracle feed.

use crate::decimal::Decimal;
use crate::errors::FetchError;
use crate::models::Price;
use async_trait::async_trait;
use ethers::types::U256;
use std::sync::Arc;

/// Raw round data from the backing feed, in the feed's native scale.
#[async_trait]
pub trait OracleFeed: Send + Sync {
    /// Latest round: (answer, feed decimals, updated-at unix time).
    async fn latest_round(&self) -> Result<(U256, u8, u64), FetchError>;
}

/// Fetches the reference price and normalizes it to the working precision.
pub struct OracleClient {
    feed: Arc<dyn OracleFeed>,
}

impl OracleClient {
    pub fn new(feed: Arc<dyn OracleFeed>) -> Self {
        Self { feed }
    }

    /// Fails with `OracleUnavailable` on a failed call or a zero/unset
    /// round; a bad round must never reach the comparison step.
    pub async fn fetch_reference_price(&self) -> Result<Price, FetchError> {
        let (answer, decimals, updated_at) = self.feed.latest_round().await?;
        if answer.is_zero() {
            return Err(FetchError::OracleUnavailable(
                "feed returned a zero round".into(),
            ));
        }
        if updated_at == 0 {
            return Err(FetchError::OracleUnavailable(
                "feed round has never been set".into(),
            ));
        }
        let normalized = Decimal::normalize(answer, decimals).ok_or_else(|| {
            FetchError::OracleUnavailable("feed answer does not fit working precision".into())
        })?;
        Ok(Price(normalized))
    }
}
