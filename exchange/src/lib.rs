//! Exchange backends and the cross-chain views built on top of them.
//!
//! - [`registry::ExchangeRegistry`] maps every swap-capable chain to its
//!   [`backend::AssetExchange`].
//! - [`directions::DirectionGraphAggregator`] merges the direction graphs of
//!   all exchanges into one shared stream.
//! - [`asset_conversion`] is the constant-product pool backend.

pub mod asset_conversion;
pub mod backend;
pub mod directions;
pub mod error;
pub mod memory;
pub mod model;
pub mod percent;
pub mod registry;
pub mod types;

pub use backend::{
    AssetExchange, ChainRegistry, ExchangeFactory, ExtrinsicSubmitter, PoolReserves, PoolSource,
    SwapCall,
};
pub use directions::{DIRECTIONS_CACHE_KEY, DirectionGraphAggregator};
pub use error::{ExchangeError, RegistryError};
pub use model::{
    AssetExchangeQuote, ExtrinsicSubmission, SlippageCheck, SlippageConfig, SwapExecuteArgs,
    SwapFee, SwapLimit, SwapQuote, SwapQuoteArgs,
};
pub use percent::{Perbill, Percent};
pub use registry::{EXCHANGES_CACHE_KEY, ExchangeMap, ExchangeRegistry};
pub use types::{AssetId, Balance, Chain, ChainAsset, ChainId, DirectionGraph, SwapDirection, SwapType, Token};
