pub mod coinbase;

use async_trait::async_trait;

/// Source of one price per tick.
///
/// Implementations absorb every failure: they log it and return `None`.
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    async fn fetch(&self) -> Option<f64>;
}
