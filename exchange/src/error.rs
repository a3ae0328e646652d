use cache::CacheError;
use thiserror::Error;

use crate::types::{AssetId, ChainId};

/// Failures raised by an exchange backend.
#[derive(Debug, Error, Clone)]
pub enum ExchangeError {
    #[error("not enough liquidity in the pool to fill the requested amount")]
    InsufficientLiquidity,

    #[error("no route from {from} to {to}")]
    NoRoute { from: AssetId, to: AssetId },

    #[error("swap amount must be greater than zero")]
    ZeroAmount,

    #[error("exchange on {expected} cannot swap assets of {actual}")]
    CrossChain { expected: ChainId, actual: ChainId },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("submission error: {0}")]
    Submission(String),
}

/// Failures while resolving the exchange serving a chain.
#[derive(Debug, Error, Clone)]
pub enum RegistryError {
    #[error("no exchange available for chain {0}")]
    NoExchangeForChain(ChainId),

    #[error(transparent)]
    Cache(#[from] CacheError),
}
