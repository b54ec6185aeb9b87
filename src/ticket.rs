// src/ticket.rs
//
// Deterministic ticket derivation. Pure: no I/O, inputs are only borrowed.
// Third parties re-run this pipeline to audit a draw, so every step (rounding
// mode, concatenation order, hex slicing) must stay bit-exact.

use crate::error::{LottoError, Result};
use crate::models::{DerivationInputs, DerivationResult};
use sha2::{Digest, Sha256};

/// Hex characters taken from each end of the digest.
const DIGEST_EDGE_LEN: usize = 5;

/// 16^10, the size of the space spanned by the 10-hex-digit second concatenation.
const SECOND_CONCAT_SPACE: f64 = 1_099_511_627_776.0;

/// Derives the winning ticket from prices and first-block data.
///
/// Steps:
/// 1. `price_product = round_half_even(btc * dfi)`
/// 2. `first_concat = price_product ++ block_number ++ hash_suffix ++ minter_suffix`
/// 3. `sha256_digest = hex(sha256(first_concat))`
/// 4. `second_concat = digest[..5] ++ digest[59..]`
/// 5. `decimal_fraction = hex_value(second_concat) / 16^10`
/// 6. `winning_ticket = round_half_even(decimal_fraction * total_tickets)`
///
/// The result is not clamped: a fraction close enough to 1 yields
/// `winning_ticket == total_tickets`.
pub fn derive(inputs: &DerivationInputs) -> Result<DerivationResult> {
    validate(inputs)?;

    let price_product = (inputs.btc_price * inputs.dfi_price).round_ties_even() as i64;

    let first_concat = format!(
        "{}{}{}{}",
        price_product, inputs.block_number, inputs.block_hash_suffix, inputs.minter_suffix
    );

    let sha256_digest = format!("{:x}", Sha256::digest(first_concat.as_bytes()));

    let second_concat = format!(
        "{}{}",
        &sha256_digest[..DIGEST_EDGE_LEN],
        &sha256_digest[sha256_digest.len() - DIGEST_EDGE_LEN..]
    );

    let decimal_fraction = hex_fraction(&second_concat)?;
    let winning_ticket = ticket_index(decimal_fraction, inputs.total_tickets);

    Ok(DerivationResult {
        price_product,
        first_concat,
        sha256_digest,
        second_concat,
        decimal_fraction,
        winning_ticket,
    })
}

fn validate(inputs: &DerivationInputs) -> Result<()> {
    if inputs.total_tickets == 0 {
        return Err(LottoError::malformed("total tickets must be at least 1"));
    }
    if inputs.block_hash_suffix.is_empty() {
        return Err(LottoError::malformed("block hash suffix is empty"));
    }
    if inputs.minter_suffix.is_empty() {
        return Err(LottoError::malformed("minter suffix is empty"));
    }
    for (name, price) in [("btc", inputs.btc_price), ("dfi", inputs.dfi_price)] {
        if !price.is_finite() || price <= 0.0 {
            return Err(LottoError::malformed(format!(
                "{} price must be a positive number, got {}",
                name, price
            )));
        }
    }
    Ok(())
}

/// Maps a 10-hex-digit string onto [0, 1).
fn hex_fraction(second_concat: &str) -> Result<f64> {
    let value = u64::from_str_radix(second_concat, 16)
        .map_err(|e| LottoError::malformed(format!("invalid hex '{}': {}", second_concat, e)))?;
    Ok(value as f64 / SECOND_CONCAT_SPACE)
}

/// Scales a fraction in [0, 1) onto the ticket range, rounding half to even.
/// Not clamped to `total - 1`.
fn ticket_index(fraction: f64, total: u64) -> u64 {
    (fraction * total as f64).round_ties_even() as u64
}
