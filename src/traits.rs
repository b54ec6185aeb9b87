// src/traits.rs

use crate::error::Result;
use crate::models::{BlockId, BlockRecord, PriceLookup};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// Source of block metadata (hash, time, minter, neighbours).
/// Implementations hide how the fields are obtained; callers see only the record.
#[async_trait]
pub trait BlockInfoProvider: Send + Sync {
    async fn fetch_block(&self, id: &BlockId) -> Result<BlockRecord>;
}

/// Source of market close prices.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Lightweight reachability probe. Does not need to return data.
    async fn ping(&self) -> Result<()>;

    /// Close price of the candle starting at 00:00 UTC on `date`.
    async fn fetch_close_price(&self, symbol: &str, date: NaiveDate) -> Result<PriceLookup>;
}

pub type SharedBlockProvider = Arc<dyn BlockInfoProvider>;
pub type SharedPriceOracle = Arc<dyn PriceOracle>;
