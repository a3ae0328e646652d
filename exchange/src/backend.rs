//! The exchange backend seam and the collaborators backends are built on.

use std::sync::Arc;

use async_trait::async_trait;
use cache::ComputationScope;
use futures::stream::BoxStream;

use crate::error::ExchangeError;
use crate::model::{
    AssetExchangeQuote, ExtrinsicSubmission, SlippageConfig, SwapExecuteArgs, SwapFee,
    SwapLimit, SwapQuoteArgs,
};
use crate::types::{AssetId, Balance, Chain, ChainAsset, ChainId, DirectionGraph};

/// One on-chain exchange serving a single chain.
///
/// Instances live as long as the scope they were created with; once it is
/// cancelled their streams end.
#[async_trait]
pub trait AssetExchange: Send + Sync {
    fn chain_id(&self) -> &ChainId;

    /// Whether fees can be paid in `asset` instead of the utility asset.
    async fn can_pay_fee_in_non_utility_token(
        &self,
        asset: &ChainAsset,
    ) -> Result<bool, ExchangeError>;

    /// Swap directions this exchange currently offers, re-emitted on change.
    fn available_swap_directions(
        &self,
    ) -> BoxStream<'static, Result<DirectionGraph, ExchangeError>>;

    async fn quote(&self, args: &SwapQuoteArgs) -> Result<AssetExchangeQuote, ExchangeError>;

    async fn estimate_fee(&self, args: &SwapExecuteArgs) -> Result<SwapFee, ExchangeError>;

    async fn swap(&self, args: &SwapExecuteArgs) -> Result<ExtrinsicSubmission, ExchangeError>;

    async fn slippage_config(&self) -> SlippageConfig;
}

/// Source of chain configuration.
#[async_trait]
pub trait ChainRegistry: Send + Sync {
    async fn find_chains(
        &self,
        predicate: &(dyn for<'c> Fn(&'c Chain) -> bool + Send + Sync),
    ) -> anyhow::Result<Vec<Chain>>;
}

/// Builds the exchange for a chain, if the chain has one.
#[async_trait]
pub trait ExchangeFactory: Send + Sync {
    async fn create(
        &self,
        chain: &Chain,
        scope: &ComputationScope,
    ) -> Option<Arc<dyn AssetExchange>>;
}

/// Reserves of one liquidity pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReserves {
    pub asset_a: AssetId,
    pub asset_b: AssetId,
    pub reserve_a: Balance,
    pub reserve_b: Balance,
}

impl PoolReserves {
    /// Reserves oriented as `(reserve of from, reserve of to)`, if this pool
    /// trades the pair.
    pub fn oriented(&self, from: &AssetId, to: &AssetId) -> Option<(&Balance, &Balance)> {
        if &self.asset_a == from && &self.asset_b == to {
            Some((&self.reserve_a, &self.reserve_b))
        } else if &self.asset_b == from && &self.asset_a == to {
            Some((&self.reserve_b, &self.reserve_a))
        } else {
            None
        }
    }

    pub fn counterpart(&self, asset: &AssetId) -> Option<&AssetId> {
        if &self.asset_a == asset {
            Some(&self.asset_b)
        } else if &self.asset_b == asset {
            Some(&self.asset_a)
        } else {
            None
        }
    }
}

/// Decoded pool storage of a chain.
#[async_trait]
pub trait PoolSource: Send + Sync {
    async fn pools(&self, chain_id: &ChainId) -> anyhow::Result<Vec<PoolReserves>>;

    /// Current pools, then every update.
    fn subscribe_pools(
        &self,
        chain_id: &ChainId,
    ) -> BoxStream<'static, anyhow::Result<Vec<PoolReserves>>>;
}

/// The call a backend hands to the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCall {
    pub chain_id: ChainId,
    pub origin: String,
    pub route: Vec<AssetId>,
    pub limit: SwapLimit,
    /// `None` pays in the utility asset.
    pub fee_asset: Option<AssetId>,
}

/// Signs, estimates and submits extrinsics.
#[async_trait]
pub trait ExtrinsicSubmitter: Send + Sync {
    /// Network fee in the chain's utility asset.
    async fn estimate_fee(&self, call: &SwapCall) -> anyhow::Result<Balance>;

    async fn existential_deposit(&self, asset: &AssetId) -> anyhow::Result<Balance>;

    async fn submit(&self, call: &SwapCall) -> anyhow::Result<ExtrinsicSubmission>;
}
