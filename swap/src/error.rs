use cache::CacheError;
use exchange::{ChainId, ExchangeError, RegistryError};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SwapError {
    #[error("no exchange available for chain {0}")]
    NoExchangeForChain(ChainId),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<RegistryError> for SwapError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NoExchangeForChain(chain_id) => SwapError::NoExchangeForChain(chain_id),
            RegistryError::Cache(err) => SwapError::Cache(err),
        }
    }
}
