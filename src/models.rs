// src/models.rs

use crate::error::{LottoError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Blocks
// =============================================================================

/// A block identifier as accepted by the explorer: either a height ("1598835")
/// or a block hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        BlockId(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric height if this id is a decimal block number.
    pub fn height(&self) -> Option<u64> {
        if self.0.is_empty() || !self.0.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.0.parse().ok()
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        BlockId::new(s)
    }
}

impl From<u64> for BlockId {
    fn from(height: u64) -> Self {
        BlockId(height.to_string())
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One block as reported by a block-info provider. Fetched fresh per use;
/// the links to adjacent blocks are taken on trust.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: BlockId,
    /// Block hash as a hex string
    pub hash: String,
    /// Block time as rendered by the explorer (no timezone attached)
    pub timestamp: NaiveDateTime,
    /// Address credited with minting the block
    pub minter: String,
    /// None at genesis
    pub previous: Option<BlockId>,
    /// None at the chain tip
    pub next: Option<BlockId>,
}

impl BlockRecord {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Day-of-month of the block time.
    pub fn day(&self) -> u32 {
        self.timestamp.day()
    }

    pub fn hash_suffix(&self) -> String {
        last_chars(&self.hash, SUFFIX_LEN)
    }

    pub fn minter_suffix(&self) -> String {
        last_chars(&self.minter, SUFFIX_LEN)
    }
}

/// Number of trailing characters taken from the block hash and minter.
pub const SUFFIX_LEN: usize = 4;

/// Last `n` characters of `s`, or all of `s` when it is shorter.
pub fn last_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}

// =============================================================================
// Prices
// =============================================================================

/// A market close price at a known instant. Transient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub date: NaiveDate,
    pub price: f64,
}

/// Outcome of a price lookup. `Unavailable` is an explicit answer, not an error:
/// the provider was reachable but had no candle at the requested instant.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceLookup {
    Available(PriceQuote),
    Unavailable,
}

impl PriceLookup {
    pub fn price(&self) -> Option<f64> {
        match self {
            PriceLookup::Available(quote) => Some(quote.price),
            PriceLookup::Unavailable => None,
        }
    }
}

/// The two market symbols a draw prices against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketPair {
    pub btc: String,
    pub dfi: String,
}

impl MarketPair {
    pub fn production() -> Self {
        Self {
            btc: "BTC-USDT".to_string(),
            dfi: "DFI-USDT".to_string(),
        }
    }

    /// The sandbox has no DFI market, so ETH stands in for it.
    pub fn sandbox() -> Self {
        Self {
            btc: "BTC-USDT".to_string(),
            dfi: "ETH-USDT".to_string(),
        }
    }

    pub fn for_mode(debug: bool) -> Self {
        if debug {
            Self::sandbox()
        } else {
            Self::production()
        }
    }
}

// =============================================================================
// Derivation
// =============================================================================

/// Everything the ticket derivation folds together.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivationInputs {
    pub btc_price: f64,
    pub dfi_price: f64,
    pub block_number: u64,
    pub block_hash_suffix: String,
    pub minter_suffix: String,
    pub total_tickets: u64,
}

impl DerivationInputs {
    /// Assembles inputs from resolved prices and the first block of the day.
    /// The block must be identified by its numeric height.
    pub fn from_block(
        btc_price: f64,
        dfi_price: f64,
        block: &BlockRecord,
        total_tickets: u64,
    ) -> Result<Self> {
        let block_number = block.id.height().ok_or_else(|| {
            LottoError::malformed(format!("block number '{}' is not numeric", block.id))
        })?;
        Ok(Self {
            btc_price,
            dfi_price,
            block_number,
            block_hash_suffix: block.hash_suffix(),
            minter_suffix: block.minter_suffix(),
            total_tickets,
        })
    }
}

/// Every intermediate value of a derivation, kept for the audit record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivationResult {
    pub price_product: i64,
    pub first_concat: String,
    /// 64 lowercase hex characters
    pub sha256_digest: String,
    /// First 5 + last 5 hex characters of the digest
    pub second_concat: String,
    pub decimal_fraction: f64,
    /// Nominally in [0, total_tickets]; the upper bound is reachable.
    pub winning_ticket: u64,
}
