// src/locator.rs
//
// Finds the first block of a calendar day by walking backwards from any block
// known to be on that day. Each step depends on the previous fetch, so the walk
// is strictly sequential.

use crate::error::{LottoError, Result};
use crate::models::{BlockId, BlockRecord};
use crate::traits::SharedBlockProvider;
use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use std::collections::HashSet;

/// Default cap on backward steps. A day holds roughly 2,900 blocks at 30s spacing.
pub const DEFAULT_MAX_STEPS: usize = 5_000;

pub struct BlockDayLocator {
    provider: SharedBlockProvider,
    max_steps: usize,
}

impl BlockDayLocator {
    pub fn new(provider: SharedBlockProvider) -> Self {
        Self::with_max_steps(provider, DEFAULT_MAX_STEPS)
    }

    pub fn with_max_steps(provider: SharedBlockProvider, max_steps: usize) -> Self {
        Self { provider, max_steps }
    }

    /// Returns the id of the first block on `target_date`.
    ///
    /// The starting block must fall on `target_date`. The walk then follows
    /// `previous` links until it meets a block whose day-of-month equals
    /// `target_date.day() - 1`, and answers with that block's `next` link.
    ///
    /// Only the day-of-month is compared during the walk, not the full date.
    /// On the 1st of a month the boundary day is 0, which no block matches, so
    /// the walk runs until the step limit.
    pub async fn locate_first_block_of_day(
        &self,
        known: &BlockId,
        target_date: NaiveDate,
    ) -> Result<BlockId> {
        let start = self.provider.fetch_block(known).await?;
        if start.date() != target_date {
            return Err(LottoError::locator(
                known,
                format!(
                    "starting block not on target date ({} vs {})",
                    start.date(),
                    target_date
                ),
            ));
        }
        info!("Examining block #{}: {}", start.id, start.timestamp);

        let boundary_day = target_date.day() - 1;
        let mut visited: HashSet<BlockId> = HashSet::new();
        visited.insert(start.id.clone());

        let mut current = start;
        for step in 0..self.max_steps {
            let previous = self.fetch_previous(&current).await?;
            info!("Examining block #{}: {}", previous.id, previous.timestamp);

            if previous.day() == boundary_day {
                let first = previous.next.clone().ok_or_else(|| {
                    LottoError::locator(&previous.id, "boundary block has no next block")
                })?;
                debug!("Day boundary found after {} steps", step + 1);
                info!("first_block_of_target_day: {}", first);
                return Ok(first);
            }

            if !visited.insert(previous.id.clone()) {
                return Err(LottoError::locator(&previous.id, "block revisited, chain links form a cycle"));
            }
            current = previous;
        }

        Err(LottoError::locator(
            &current.id,
            format!("day boundary not found within depth limit ({} steps)", self.max_steps),
        ))
    }

    async fn fetch_previous(&self, block: &BlockRecord) -> Result<BlockRecord> {
        let previous = block
            .previous
            .as_ref()
            .ok_or_else(|| LottoError::locator(&block.id, "reached the start of the chain"))?;
        self.provider.fetch_block(previous).await
    }
}
