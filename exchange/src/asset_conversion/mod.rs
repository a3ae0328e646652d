//! Asset-conversion backend: constant-product pools where any pair of assets
//! can have a pool, and pools against the utility asset act as a routing hub.

pub mod math;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use cache::ComputationScope;
use futures::stream::{BoxStream, StreamExt};
use num_traits::Zero;
use tracing::{debug, instrument};

use crate::backend::{
    AssetExchange, ExchangeFactory, ExtrinsicSubmitter, PoolReserves, PoolSource, SwapCall,
};
use crate::error::ExchangeError;
use crate::model::{
    AssetExchangeQuote, ExtrinsicSubmission, SlippageConfig, SwapExecuteArgs, SwapFee,
    SwapQuoteArgs,
};
use crate::types::{AssetId, Balance, Chain, ChainAsset, ChainId, DirectionGraph, SwapDirection, SwapType};

use math::{in_given_out, out_given_in};

/// 0.3%
pub const DEFAULT_LP_FEE_PERMILLE: u32 = 3;

pub struct AssetConversionExchange {
    chain: Chain,
    pools: Arc<dyn PoolSource>,
    submitter: Arc<dyn ExtrinsicSubmitter>,
    lp_fee_permille: u32,
    scope: ComputationScope,
}

impl AssetConversionExchange {
    pub fn new(
        chain: Chain,
        pools: Arc<dyn PoolSource>,
        submitter: Arc<dyn ExtrinsicSubmitter>,
        lp_fee_permille: u32,
        scope: ComputationScope,
    ) -> Self {
        Self {
            chain,
            pools,
            submitter,
            lp_fee_permille: lp_fee_permille.min(math::FEE_DENOMINATOR - 1),
            scope,
        }
    }

    fn utility_id(&self) -> Option<AssetId> {
        self.chain.utility_asset().map(ChainAsset::full_id)
    }

    fn ensure_on_chain(&self, asset: &AssetId) -> Result<(), ExchangeError> {
        if asset.chain_id == self.chain.id {
            Ok(())
        } else {
            Err(ExchangeError::CrossChain {
                expected: self.chain.id.clone(),
                actual: asset.chain_id.clone(),
            })
        }
    }

    async fn load_pools(&self) -> Result<Vec<PoolReserves>, ExchangeError> {
        self.pools
            .pools(&self.chain.id)
            .await
            .map_err(|e| ExchangeError::Storage(e.to_string()))
    }

    fn route_for(
        &self,
        pools: &[PoolReserves],
        from: &AssetId,
        to: &AssetId,
    ) -> Result<Vec<AssetId>, ExchangeError> {
        find_route(pools, from, to, self.utility_id().as_ref()).ok_or_else(|| {
            ExchangeError::NoRoute {
                from: from.clone(),
                to: to.clone(),
            }
        })
    }

    /// Prices `amount` along `route` in the given direction.
    fn price(
        &self,
        pools: &[PoolReserves],
        route: &[AssetId],
        amount: &Balance,
        direction: SwapDirection,
    ) -> Result<Balance, ExchangeError> {
        let hops: Vec<(&Balance, &Balance)> = route
            .windows(2)
            .map(|hop| {
                liquid_reserves(pools, &hop[0], &hop[1]).ok_or_else(|| ExchangeError::NoRoute {
                    from: hop[0].clone(),
                    to: hop[1].clone(),
                })
            })
            .collect::<Result<_, _>>()?;

        match direction {
            SwapDirection::SpecifiedIn => hops.iter().try_fold(amount.clone(), |acc, (r_in, r_out)| {
                out_given_in(&acc, r_in, r_out, self.lp_fee_permille)
            }),
            SwapDirection::SpecifiedOut => {
                hops.iter()
                    .rev()
                    .try_fold(amount.clone(), |acc, (r_in, r_out)| {
                        in_given_out(&acc, r_in, r_out, self.lp_fee_permille)
                    })
            }
        }
    }

    fn swap_call(&self, args: &SwapExecuteArgs, route: Vec<AssetId>) -> SwapCall {
        SwapCall {
            chain_id: self.chain.id.clone(),
            origin: args.origin.clone(),
            route,
            limit: args.swap_limit.clone(),
            fee_asset: args
                .custom_fee_asset
                .as_ref()
                .filter(|asset| !asset.is_utility)
                .map(ChainAsset::full_id),
        }
    }

    async fn prepare_call(&self, args: &SwapExecuteArgs) -> Result<SwapCall, ExchangeError> {
        let asset_in = args.asset_in.full_id();
        let asset_out = args.asset_out.full_id();
        self.ensure_on_chain(&asset_in)?;
        self.ensure_on_chain(&asset_out)?;

        let pools = self.load_pools().await?;
        let route = if args.route.is_empty() {
            self.route_for(&pools, &asset_in, &asset_out)?
        } else {
            self.check_route(&pools, &args.route, &asset_in, &asset_out)?;
            args.route.clone()
        };

        Ok(self.swap_call(args, route))
    }

    /// A caller-supplied route must run from `from` to `to` on this chain
    /// through liquid pools only.
    fn check_route(
        &self,
        pools: &[PoolReserves],
        route: &[AssetId],
        from: &AssetId,
        to: &AssetId,
    ) -> Result<(), ExchangeError> {
        for hop in route {
            self.ensure_on_chain(hop)?;
        }

        if route.len() < 2 || route.first() != Some(from) || route.last() != Some(to) {
            return Err(ExchangeError::NoRoute {
                from: from.clone(),
                to: to.clone(),
            });
        }

        for hop in route.windows(2) {
            if liquid_reserves(pools, &hop[0], &hop[1]).is_none() {
                return Err(ExchangeError::NoRoute {
                    from: hop[0].clone(),
                    to: hop[1].clone(),
                });
            }
        }

        Ok(())
    }
}

#[async_trait]
impl AssetExchange for AssetConversionExchange {
    fn chain_id(&self) -> &ChainId {
        &self.chain.id
    }

    async fn can_pay_fee_in_non_utility_token(
        &self,
        asset: &ChainAsset,
    ) -> Result<bool, ExchangeError> {
        let Some(utility) = self.utility_id() else {
            return Ok(false);
        };
        let asset = asset.full_id();
        if asset == utility {
            return Ok(false);
        }

        let pools = self.load_pools().await?;
        Ok(liquid_reserves(&pools, &asset, &utility).is_some())
    }

    fn available_swap_directions(
        &self,
    ) -> BoxStream<'static, Result<DirectionGraph, ExchangeError>> {
        let utility = self.utility_id();
        let scope = self.scope.clone();

        self.pools
            .subscribe_pools(&self.chain.id)
            .map(move |update| {
                update
                    .map(|pools| directions_from_pools(&pools, utility.as_ref()))
                    .map_err(|e| ExchangeError::Storage(e.to_string()))
            })
            .take_until(async move { scope.cancelled().await })
            .boxed()
    }

    #[instrument(skip_all, fields(chain_id = %self.chain.id, direction = ?args.swap_direction), target = "exchange")]
    async fn quote(&self, args: &SwapQuoteArgs) -> Result<AssetExchangeQuote, ExchangeError> {
        let from = args.token_in.configuration.full_id();
        let to = args.token_out.configuration.full_id();
        self.ensure_on_chain(&from)?;
        self.ensure_on_chain(&to)?;

        if args.amount.is_zero() {
            return Err(ExchangeError::ZeroAmount);
        }

        let pools = self.load_pools().await?;
        let route = self.route_for(&pools, &from, &to)?;
        let quote = self.price(&pools, &route, &args.amount, args.swap_direction)?;

        debug!(hops = route.len() - 1, %quote, "asset conversion quote");
        Ok(AssetExchangeQuote { quote, route })
    }

    #[instrument(skip_all, fields(chain_id = %self.chain.id), target = "exchange")]
    async fn estimate_fee(&self, args: &SwapExecuteArgs) -> Result<SwapFee, ExchangeError> {
        let call = self.prepare_call(args).await?;
        let native_fee = self
            .submitter
            .estimate_fee(&call)
            .await
            .map_err(|e| ExchangeError::Submission(e.to_string()))?;

        let utility = self.utility_id();
        let custom = args
            .custom_fee_asset
            .as_ref()
            .filter(|asset| !asset.is_utility);

        let (Some(fee_asset), Some(utility)) = (custom, utility.clone()) else {
            return Ok(SwapFee {
                fee_asset: utility.unwrap_or_else(|| args.asset_in.full_id()),
                network_fee: native_fee,
                minimum_balance_buy_in: Balance::zero(),
            });
        };

        let fee_asset = fee_asset.full_id();
        let network_fee = if native_fee.is_zero() {
            Balance::zero()
        } else {
            let pools = self.load_pools().await?;
            let (r_in, r_out) =
                liquid_reserves(&pools, &fee_asset, &utility).ok_or_else(|| {
                    ExchangeError::NoRoute {
                        from: fee_asset.clone(),
                        to: utility.clone(),
                    }
                })?;
            in_given_out(&native_fee, r_in, r_out, self.lp_fee_permille)?
        };

        let minimum_balance_buy_in = self
            .submitter
            .existential_deposit(&fee_asset)
            .await
            .map_err(|e| ExchangeError::Submission(e.to_string()))?;

        Ok(SwapFee {
            fee_asset,
            network_fee,
            minimum_balance_buy_in,
        })
    }

    #[instrument(skip_all, fields(chain_id = %self.chain.id, origin = %args.origin), target = "exchange")]
    async fn swap(&self, args: &SwapExecuteArgs) -> Result<ExtrinsicSubmission, ExchangeError> {
        let call = self.prepare_call(args).await?;
        self.submitter
            .submit(&call)
            .await
            .map_err(|e| ExchangeError::Submission(e.to_string()))
    }

    async fn slippage_config(&self) -> SlippageConfig {
        SlippageConfig::default()
    }
}

/// Reserves of a pool trading `from → to`, if it has liquidity on both sides.
fn liquid_reserves<'a>(
    pools: &'a [PoolReserves],
    from: &AssetId,
    to: &AssetId,
) -> Option<(&'a Balance, &'a Balance)> {
    pools
        .iter()
        .filter_map(|pool| pool.oriented(from, to))
        .find(|(r_in, r_out)| !r_in.is_zero() && !r_out.is_zero())
}

/// Assets with a liquid pool against `hub`.
fn pooled_against<'a>(pools: &'a [PoolReserves], hub: &AssetId) -> HashSet<&'a AssetId> {
    pools
        .iter()
        .filter(|pool| !pool.reserve_a.is_zero() && !pool.reserve_b.is_zero())
        .filter_map(|pool| pool.counterpart(hub))
        .collect()
}

/// Every liquid pool gives both directions; assets pooled against the
/// utility asset can also reach each other through it.
pub fn directions_from_pools(pools: &[PoolReserves], utility: Option<&AssetId>) -> DirectionGraph {
    let mut graph = DirectionGraph::new();

    for pool in pools {
        if pool.reserve_a.is_zero() || pool.reserve_b.is_zero() {
            continue;
        }
        graph.insert(pool.asset_a.clone(), pool.asset_b.clone());
        graph.insert(pool.asset_b.clone(), pool.asset_a.clone());
    }

    if let Some(hub) = utility {
        let spokes = pooled_against(pools, hub);
        for from in &spokes {
            for to in &spokes {
                if from != to {
                    graph.insert((*from).clone(), (*to).clone());
                }
            }
        }
    }

    graph
}

/// Direct pool first, otherwise a two-hop route through `utility`.
pub fn find_route(
    pools: &[PoolReserves],
    from: &AssetId,
    to: &AssetId,
    utility: Option<&AssetId>,
) -> Option<Vec<AssetId>> {
    if from == to {
        return None;
    }
    if liquid_reserves(pools, from, to).is_some() {
        return Some(vec![from.clone(), to.clone()]);
    }

    let hub = utility?;
    if hub == from || hub == to {
        return None;
    }

    let first = liquid_reserves(pools, from, hub).is_some();
    let second = liquid_reserves(pools, hub, to).is_some();
    (first && second).then(|| vec![from.clone(), hub.clone(), to.clone()])
}

/// Builds an [`AssetConversionExchange`] for every chain that declares
/// asset-conversion support.
pub struct AssetConversionFactory {
    pools: Arc<dyn PoolSource>,
    submitter: Arc<dyn ExtrinsicSubmitter>,
    lp_fee_permille: u32,
}

impl AssetConversionFactory {
    pub fn new(pools: Arc<dyn PoolSource>, submitter: Arc<dyn ExtrinsicSubmitter>) -> Self {
        Self {
            pools,
            submitter,
            lp_fee_permille: DEFAULT_LP_FEE_PERMILLE,
        }
    }

    pub fn with_lp_fee(mut self, fee_permille: u32) -> Self {
        self.lp_fee_permille = fee_permille;
        self
    }
}

#[async_trait]
impl ExchangeFactory for AssetConversionFactory {
    async fn create(
        &self,
        chain: &Chain,
        scope: &ComputationScope,
    ) -> Option<Arc<dyn AssetExchange>> {
        if !chain.supports(SwapType::AssetConversion) {
            return None;
        }

        Some(Arc::new(AssetConversionExchange::new(
            chain.clone(),
            Arc::clone(&self.pools),
            Arc::clone(&self.submitter),
            self.lp_fee_permille,
            scope.clone(),
        )))
    }
}
