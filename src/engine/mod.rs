// src/engine/mod.rs
//
// Sequences one draw: connectivity check, price resolution with the degrade
// policy, first-block search, derivation. Returns the finished record; nothing
// is emitted here, so an aborted run leaves no partial output.

use crate::error::{LottoError, Result};
use crate::locator::BlockDayLocator;
use crate::models::{BlockId, DerivationInputs, MarketPair};
use crate::output::DrawRecord;
use crate::ticket;
use crate::traits::{SharedBlockProvider, SharedPriceOracle};
use chrono::NaiveDate;
use log::{info, warn};

/// Price used in debug mode when no real price can be found.
pub const DEBUG_FALLBACK_PRICE: f64 = 1.0;

/// Run-wide settings.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Sandbox mode: permits fallback prices
    pub debug: bool,
    pub max_steps: usize,
    pub pair: MarketPair,
}

impl EngineSettings {
    pub fn new(debug: bool, max_steps: usize) -> Self {
        Self {
            debug,
            max_steps,
            pair: MarketPair::for_mode(debug),
        }
    }
}

/// Inputs of a single draw.
#[derive(Debug, Clone)]
pub struct DrawRequest {
    pub total_tickets: i64,
    pub target_date: NaiveDate,
    /// Any block believed to be on `target_date`
    pub block: BlockId,
    pub btc_price: Option<f64>,
    pub dfi_price: Option<f64>,
    /// The current calendar date; prices are only looked up for today
    pub today: NaiveDate,
}

/// Where a price that did not come from the oracle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstitutionSource {
    /// The caller supplied it explicitly
    ExplicitInput,
    /// Debug-mode default
    DebugDefault,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSubstitution {
    pub symbol: String,
    pub price: f64,
    pub source: SubstitutionSource,
}

#[derive(Debug, Clone)]
pub struct DrawOutcome {
    pub record: DrawRecord,
    pub substitutions: Vec<PriceSubstitution>,
}

/// Decides the price for one leg after an oracle lookup came back empty or
/// failed. `oracle_price` is the lookup result, if any.
pub fn settle_price(
    symbol: &str,
    date: NaiveDate,
    oracle_price: Option<f64>,
    explicit: Option<f64>,
    debug: bool,
) -> Result<(f64, Option<PriceSubstitution>)> {
    if let Some(price) = oracle_price {
        return Ok((price, None));
    }
    let (price, source) = match (explicit, debug) {
        (Some(price), _) => {
            warn!(
                "WARNING! No {} price at midnight of {}, using supplied {}",
                symbol, date, price
            );
            (price, SubstitutionSource::ExplicitInput)
        }
        (None, true) => {
            warn!(
                "WARNING! Could not determine proper {} price, using {:?}",
                symbol, DEBUG_FALLBACK_PRICE
            );
            (DEBUG_FALLBACK_PRICE, SubstitutionSource::DebugDefault)
        }
        (None, false) => {
            return Err(LottoError::unavailable(format!(
                "Could not determine {} price at midnight of {}",
                symbol, date
            )))
        }
    };
    Ok((
        price,
        Some(PriceSubstitution {
            symbol: symbol.to_string(),
            price,
            source,
        }),
    ))
}

/// A request that passed validation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ValidRequest {
    total_tickets: u64,
    /// (btc, dfi) to use as-is; set when the target date is not today
    fixed_prices: Option<(f64, f64)>,
}

fn validate_request(request: &DrawRequest) -> Result<ValidRequest> {
    if request.total_tickets < 1 {
        return Err(LottoError::malformed(format!(
            "total tickets must be a positive integer, got {}",
            request.total_tickets
        )));
    }
    if request.block.as_str().is_empty() {
        return Err(LottoError::malformed("block id from target date is empty"));
    }
    for (name, price) in [("btc", request.btc_price), ("dfi", request.dfi_price)] {
        if let Some(p) = price {
            if !p.is_finite() || p <= 0.0 {
                return Err(LottoError::malformed(format!(
                    "{} price must be a positive number, got {}",
                    name, p
                )));
            }
        }
    }
    let fixed_prices = if request.target_date == request.today {
        None
    } else {
        match (request.btc_price, request.dfi_price) {
            (Some(btc), Some(dfi)) => Some((btc, dfi)),
            _ => {
                return Err(LottoError::malformed(format!(
                    "target date {} is not today ({}); btc and dfi prices must be supplied",
                    request.target_date, request.today
                )))
            }
        }
    };
    Ok(ValidRequest {
        total_tickets: request.total_tickets as u64,
        fixed_prices,
    })
}

pub struct DrawEngine {
    blocks: SharedBlockProvider,
    oracle: SharedPriceOracle,
    settings: EngineSettings,
}

impl DrawEngine {
    pub fn new(blocks: SharedBlockProvider, oracle: SharedPriceOracle, settings: EngineSettings) -> Self {
        Self {
            blocks,
            oracle,
            settings,
        }
    }

    /// Runs one draw end to end. Any error aborts the run.
    pub async fn run(&self, request: &DrawRequest) -> Result<DrawOutcome> {
        let valid = validate_request(request)?;
        let total_tickets = valid.total_tickets;
        let mut substitutions = Vec::new();

        let (btc_price, dfi_price) = self
            .resolve_prices(request, valid.fixed_prices, &mut substitutions)
            .await?;
        info!("dfi_at_midnight: {:?}", dfi_price);
        info!("btc_at_midnight: {:?}", btc_price);

        info!(
            "############# Determining first block of {}, starting from block #{} #############",
            request.target_date, request.block
        );
        let locator = BlockDayLocator::with_max_steps(self.blocks.clone(), self.settings.max_steps);
        let first_block = locator
            .locate_first_block_of_day(&request.block, request.target_date)
            .await?;
        let block = self.blocks.fetch_block(&first_block).await?;

        let inputs = DerivationInputs::from_block(btc_price, dfi_price, &block, total_tickets)?;
        info!("last_4_digits_of_block_hash: {}", inputs.block_hash_suffix);
        info!("last_4_digits_of_block_minter: {}", inputs.minter_suffix);

        let result = ticket::derive(&inputs)?;
        info!("first_concat: {}", result.first_concat);
        info!("sha256_result: {}", result.sha256_digest);
        info!("second_concat: {}", result.second_concat);
        info!("decimal_result: {:?}", result.decimal_fraction);
        info!("!!!!!!!!! winning_ticket: {} !!!!!!!!!", result.winning_ticket);
        if result.winning_ticket >= total_tickets {
            warn!(
                "winning ticket {} is outside 0..{}; interpret per draw rules",
                result.winning_ticket, total_tickets
            );
        }

        Ok(DrawOutcome {
            record: DrawRecord {
                target_date: request.target_date,
                dfi_price,
                btc_price,
                first_block: block.id.clone(),
                block_hash_suffix: inputs.block_hash_suffix,
                minter_suffix: inputs.minter_suffix,
                result,
            },
            substitutions,
        })
    }

    /// Returns (btc, dfi). `fixed_prices` bypasses the oracle lookups.
    async fn resolve_prices(
        &self,
        request: &DrawRequest,
        fixed_prices: Option<(f64, f64)>,
        substitutions: &mut Vec<PriceSubstitution>,
    ) -> Result<(f64, f64)> {
        let use_oracle = fixed_prices.is_none();
        let explicit_covers = request.btc_price.is_some() && request.dfi_price.is_some();

        info!("Testing KuCoin connection...");
        let oracle_reachable = match self.oracle.ping().await {
            Ok(()) => {
                info!("SUCCESS!");
                true
            }
            Err(e) if !use_oracle || explicit_covers || self.settings.debug => {
                warn!("Price provider unreachable, continuing without it: {}", e);
                false
            }
            Err(e) => return Err(e),
        };

        if let Some(prices) = fixed_prices {
            warn!(
                "target_date ({}) is not today ({}), using supplied prices",
                request.target_date, request.today
            );
            return Ok(prices);
        }

        info!(
            "############# Fetching {} & {} prices at midnight of {} #############",
            self.settings.pair.dfi, self.settings.pair.btc, request.target_date
        );
        let btc = self
            .resolve_leg(&self.settings.pair.btc, request, request.btc_price, oracle_reachable, substitutions)
            .await?;
        let dfi = self
            .resolve_leg(&self.settings.pair.dfi, request, request.dfi_price, oracle_reachable, substitutions)
            .await?;
        Ok((btc, dfi))
    }

    async fn resolve_leg(
        &self,
        symbol: &str,
        request: &DrawRequest,
        explicit: Option<f64>,
        oracle_reachable: bool,
        substitutions: &mut Vec<PriceSubstitution>,
    ) -> Result<f64> {
        let fallback_allowed = explicit.is_some() || self.settings.debug;
        let fetched = if oracle_reachable {
            match self.oracle.fetch_close_price(symbol, request.target_date).await {
                Ok(lookup) => lookup.price(),
                Err(e) if fallback_allowed => {
                    warn!("{} price lookup failed: {}", symbol, e);
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let (price, substitution) =
            settle_price(symbol, request.target_date, fetched, explicit, self.settings.debug)?;
        substitutions.extend(substitution);
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feb5() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 2, 5).unwrap()
    }

    fn make_request() -> DrawRequest {
        DrawRequest {
            total_tickets: 60,
            target_date: feb5(),
            block: BlockId::from("1598840"),
            btc_price: None,
            dfi_price: None,
            today: feb5(),
        }
    }

    #[test]
    fn test_settle_prefers_oracle() {
        let (price, sub) = settle_price("BTC-USDT", feb5(), Some(41603.4), Some(1.0), true).unwrap();
        assert_eq!(price, 41603.4);
        assert!(sub.is_none());
    }

    #[test]
    fn test_settle_explicit_fallback() {
        let (price, sub) = settle_price("DFI-USDT", feb5(), None, Some(2.793), false).unwrap();
        assert_eq!(price, 2.793);
        assert_eq!(sub.unwrap().source, SubstitutionSource::ExplicitInput);
    }

    #[test]
    fn test_settle_debug_default() {
        let (price, sub) = settle_price("ETH-USDT", feb5(), None, None, true).unwrap();
        assert_eq!(price, DEBUG_FALLBACK_PRICE);
        let sub = sub.unwrap();
        assert_eq!(sub.source, SubstitutionSource::DebugDefault);
        assert_eq!(sub.symbol, "ETH-USDT");
    }

    #[test]
    fn test_settle_fatal_outside_debug() {
        let err = settle_price("DFI-USDT", feb5(), None, None, false).unwrap_err();
        assert!(matches!(err, LottoError::DataUnavailable(_)));
    }

    #[test]
    fn test_validate_rejects_non_positive_tickets() {
        let mut request = make_request();
        request.total_tickets = 0;
        assert!(matches!(validate_request(&request), Err(LottoError::MalformedInput(_))));
        request.total_tickets = -3;
        assert!(matches!(validate_request(&request), Err(LottoError::MalformedInput(_))));
    }

    #[test]
    fn test_validate_requires_prices_for_past_dates() {
        let mut request = make_request();
        request.today = NaiveDate::from_ymd_opt(2022, 2, 9).unwrap();
        request.btc_price = Some(41603.4);
        assert!(matches!(validate_request(&request), Err(LottoError::MalformedInput(_))));
        request.dfi_price = Some(2.793);
        let valid = validate_request(&request).unwrap();
        assert_eq!(valid.total_tickets, 60);
        assert_eq!(valid.fixed_prices, Some((41603.4, 2.793)));
    }

    #[test]
    fn test_validate_today_leaves_prices_to_oracle() {
        let mut request = make_request();
        request.btc_price = Some(41603.4);
        request.dfi_price = Some(2.793);
        assert_eq!(validate_request(&request).unwrap().fixed_prices, None);
    }

    #[test]
    fn test_validate_rejects_bad_explicit_price() {
        let mut request = make_request();
        request.dfi_price = Some(-1.0);
        assert!(matches!(validate_request(&request), Err(LottoError::MalformedInput(_))));
    }
}
