// src/connectors/mod.rs

pub mod defiscan;
pub mod kucoin;
pub mod mock;

pub use defiscan::DefiscanProvider;
pub use kucoin::{KucoinCredentials, KucoinOracle};
