// src/connectors/defiscan.rs
//
// Block info scraped from the defiscan.live block page.
// The page has no stable API, so field extraction is position- and class-based.
// All of that knowledge lives in `BlockPageLayout`; when the markup changes,
// add a new layout version instead of touching callers.

use crate::error::{LottoError, Result};
use crate::models::{BlockId, BlockRecord};
use crate::traits::BlockInfoProvider;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use log::debug;
use regex::Regex;
use std::time::Duration;

pub const DEFISCAN_BLOCKS_URL: &str = "https://defiscan.live/blocks/";

/// Timestamp renderings seen on the block page, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%b %d, %Y, %I:%M:%S %p",
    "%m/%d/%Y, %I:%M:%S %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d %b %Y, %H:%M:%S",
];

/// Field contract for one revision of the block page markup.
///
/// Detail cells share one CSS class and are addressed by position: the block
/// time is the third cell, the previous and next block links the last two.
pub struct BlockPageLayout {
    pub version: &'static str,
    hash: Regex,
    minter: Regex,
    detail_cell: Regex,
    block_link: Regex,
    tag: Regex,
    timestamp_cell: usize,
}

impl BlockPageLayout {
    pub fn v1() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| LottoError::Configuration(format!("invalid layout pattern: {}", e)))
        };
        Ok(Self {
            version: "defiscan-block-page/v1",
            hash: compile(r#"class="ml-1 text-lg break-all"[^>]*>\s*([^<]+?)\s*<"#)?,
            minter: compile(
                r#"class="hover:underline text-blue-500 cursor-pointer break-all"[^>]*>\s*<[^>]*>\s*([^<]+?)\s*<"#,
            )?,
            detail_cell: compile(
                r#"(?s)<div class="table-cell px-4 md:px-6 py-3 text-gray-600 align-middle"[^>]*>(.*?)</div>"#,
            )?,
            block_link: compile(r"#(\d+)")?,
            tag: compile(r"<[^>]*>")?,
            timestamp_cell: 2,
        })
    }

    /// Extracts a block record from page markup. `id` is the identifier the
    /// page was requested with.
    pub fn parse(&self, id: &BlockId, html: &str) -> Result<BlockRecord> {
        let missing = |field: &str| {
            LottoError::unavailable(format!(
                "block {}: field '{}' not found ({})",
                id, field, self.version
            ))
        };

        let hash = capture(&self.hash, html).ok_or_else(|| missing("hash"))?;
        let minter = capture(&self.minter, html).ok_or_else(|| missing("minter"))?;

        let cells: Vec<&str> = self
            .detail_cell
            .captures_iter(html)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        if cells.len() < self.timestamp_cell + 3 {
            return Err(missing("detail cells"));
        }

        let timestamp_text = self.tag.replace_all(cells[self.timestamp_cell], "");
        let timestamp_text = timestamp_text.trim();
        let timestamp = parse_block_timestamp(timestamp_text).ok_or_else(|| {
            LottoError::unavailable(format!(
                "block {}: unrecognised timestamp '{}'",
                id, timestamp_text
            ))
        })?;

        let previous = capture(&self.block_link, cells[cells.len() - 2]).map(BlockId::new);
        let next = capture(&self.block_link, cells[cells.len() - 1]).map(BlockId::new);

        debug!("#### {} #### : block_hash : {}", id, hash);
        debug!("#### {} #### : timestamp  : {}", id, timestamp);
        debug!("#### {} #### : prev_block : {:?}", id, previous);
        debug!("#### {} #### : next_block : {:?}", id, next);
        debug!("#### {} #### : minter     : {}", id, minter);

        Ok(BlockRecord {
            id: id.clone(),
            hash,
            timestamp,
            minter,
            previous,
            next,
        })
    }
}

fn capture(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parses a block time as rendered on the page. RFC 3339 values keep their
/// local wall-clock reading.
pub fn parse_block_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

pub struct DefiscanProvider {
    http_client: reqwest::Client,
    base_url: String,
    layout: BlockPageLayout,
}

impl DefiscanProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LottoError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            http_client,
            base_url,
            layout: BlockPageLayout::v1()?,
        })
    }

    pub fn layout_version(&self) -> &str {
        self.layout.version
    }
}

#[async_trait]
impl BlockInfoProvider for DefiscanProvider {
    async fn fetch_block(&self, id: &BlockId) -> Result<BlockRecord> {
        let url = format!("{}{}", self.base_url, id);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| LottoError::unavailable(format!("HTTP request failed for {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(LottoError::unavailable(format!(
                "fetching block info from {} returned {}",
                url,
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| LottoError::unavailable(format!("Failed to read {}: {}", url, e)))?;

        self.layout.parse(id, &html)
    }
}
