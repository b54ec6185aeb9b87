// src/connectors/mock.rs
//
// In-memory providers for tests and offline runs. No network access.

use crate::error::{LottoError, Result};
use crate::models::{BlockId, BlockRecord, PriceLookup, PriceQuote};
use crate::traits::{BlockInfoProvider, PriceOracle, SharedBlockProvider, SharedPriceOracle};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// --- 1. Mock Chain ---

/// A synthetic chain keyed by block id. Blocks reachable by hash can be
/// registered under an alias.
#[derive(Default)]
pub struct MockChain {
    blocks: Mutex<HashMap<BlockId, BlockRecord>>,
    heights: Mutex<BTreeMap<u64, BlockId>>,
    fetches: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedBlockProvider {
        Arc::new(self)
    }

    /// Inserts a block as given, without touching its links.
    pub fn insert(&self, record: BlockRecord) {
        if let Some(height) = record.id.height() {
            lock(&self.heights).insert(height, record.id.clone());
        }
        lock(&self.blocks).insert(record.id.clone(), record);
    }

    /// Inserts a block at `height` with placeholder hash and minter. Call
    /// [`MockChain::link`] once all blocks are in.
    pub fn push_block(&self, height: u64, timestamp: NaiveDateTime) {
        self.insert(BlockRecord {
            id: BlockId::from(height),
            hash: format!("{:064x}", height),
            timestamp,
            minter: format!("8Mminter{:06}", height),
            previous: None,
            next: None,
        });
    }

    /// Rewrites `previous`/`next` of every numbered block from height order.
    pub fn link(&self) {
        let heights: Vec<BlockId> = lock(&self.heights).values().cloned().collect();
        let mut blocks = lock(&self.blocks);
        for (idx, id) in heights.iter().enumerate() {
            if let Some(record) = blocks.get_mut(id) {
                record.previous = idx.checked_sub(1).map(|p| heights[p].clone());
                record.next = heights.get(idx + 1).cloned();
            }
        }
    }

    /// Makes the block at `target` also reachable as `alias` (e.g. its hash).
    pub fn alias(&self, alias: &str, target: &BlockId) {
        let mut blocks = lock(&self.blocks);
        if let Some(record) = blocks.get(target).cloned() {
            blocks.insert(BlockId::from(alias), record);
        }
    }

    /// Edits a stored block in place.
    pub fn update<F: FnOnce(&mut BlockRecord)>(&self, id: &BlockId, f: F) {
        if let Some(record) = lock(&self.blocks).get_mut(id) {
            f(record);
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockInfoProvider for MockChain {
    async fn fetch_block(&self, id: &BlockId) -> Result<BlockRecord> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        lock(&self.blocks)
            .get(id)
            .cloned()
            .ok_or_else(|| LottoError::unavailable(format!("block {} not found", id)))
    }
}

// --- 2. Mock Oracle ---

/// A price oracle answering from a fixed table. Symbols without an entry are
/// reported as unavailable.
#[derive(Default)]
pub struct MockOracle {
    prices: Mutex<HashMap<String, f64>>,
    unreachable: bool,
    calls: AtomicUsize,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// An oracle whose every call fails with a connectivity error.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_price(self, symbol: &str, price: f64) -> Self {
        lock(&self.prices).insert(symbol.to_string(), price);
        self
    }

    pub fn shared(self) -> SharedPriceOracle {
        Arc::new(self)
    }

    /// Number of calls made, pings included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(LottoError::Connectivity("mock oracle is unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PriceOracle for MockOracle {
    async fn ping(&self) -> Result<()> {
        self.check_reachable()
    }

    async fn fetch_close_price(&self, symbol: &str, date: NaiveDate) -> Result<PriceLookup> {
        self.check_reachable()?;
        Ok(match lock(&self.prices).get(symbol) {
            Some(&price) => PriceLookup::Available(PriceQuote {
                symbol: symbol.to_string(),
                date,
                price,
            }),
            None => PriceLookup::Unavailable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_link_sets_neighbours() {
        let chain = MockChain::new();
        let ts = NaiveDate::from_ymd_opt(2022, 2, 5).unwrap().and_hms_opt(0, 0, 0).unwrap();
        chain.push_block(10, ts);
        chain.push_block(11, ts);
        chain.push_block(12, ts);
        chain.link();

        let middle = chain.fetch_block(&BlockId::from(11)).await.unwrap();
        assert_eq!(middle.previous, Some(BlockId::from(10)));
        assert_eq!(middle.next, Some(BlockId::from(12)));

        let first = chain.fetch_block(&BlockId::from(10)).await.unwrap();
        assert_eq!(first.previous, None);
        assert_eq!(chain.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_block_is_unavailable() {
        let chain = MockChain::new();
        let err = chain.fetch_block(&BlockId::from(1)).await.unwrap_err();
        assert!(matches!(err, LottoError::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn test_oracle_unavailable_symbol() {
        let oracle = MockOracle::new().with_price("BTC-USDT", 41603.4);
        let date = NaiveDate::from_ymd_opt(2022, 2, 5).unwrap();
        assert_eq!(
            oracle.fetch_close_price("BTC-USDT", date).await.unwrap().price(),
            Some(41603.4)
        );
        assert_eq!(
            oracle.fetch_close_price("DFI-USDT", date).await.unwrap(),
            PriceLookup::Unavailable
        );
        assert_eq!(oracle.call_count(), 2);
    }
}
