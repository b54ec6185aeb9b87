// src/error.rs
//
// Error taxonomy for a single draw run. Every variant is terminal for the run;
// nothing is retried automatically.

use crate::models::BlockId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LottoError {
    /// Required credentials or settings are missing or unreadable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The price provider could not be reached.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// A price or block lookup returned no usable match.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// The day-boundary search could not produce an answer.
    #[error("locator error at block {block}: {reason}")]
    Locator { block: BlockId, reason: String },

    /// Caller-supplied input failed validation.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl LottoError {
    pub fn locator(block: &BlockId, reason: impl Into<String>) -> Self {
        LottoError::Locator {
            block: block.clone(),
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        LottoError::MalformedInput(reason.into())
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        LottoError::DataUnavailable(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, LottoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_error_names_block() {
        let err = LottoError::locator(&BlockId::from("1598835"), "starting block not on target date");
        assert_eq!(
            err.to_string(),
            "locator error at block 1598835: starting block not on target date"
        );
    }
}
