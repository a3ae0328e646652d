//! SwapService
//!
//! Entry point for swap quoting and execution. Every operation takes the
//! caller's `ComputationScope`; exchanges and the direction graph are built
//! lazily and shared by all callers while that scope lives.

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use cache::{ComputationScope, ComputationalCache};
use common::logger::{annotate_span, child_span, warn_if_slow};
use exchange::{
    AssetExchange, AssetId, ChainAsset, ChainId, ChainRegistry, DirectionGraphAggregator,
    ExchangeFactory, ExchangeRegistry, ExtrinsicSubmission, SlippageConfig, SwapDirection,
    SwapExecuteArgs, SwapFee, SwapQuote, SwapQuoteArgs,
};
use futures::stream::{BoxStream, StreamExt};
use tracing::{Instrument, debug};

use crate::config::SwapServiceConfig;
use crate::error::SwapError;
use crate::price_impact::price_impact;

const ALL_CHAINS: &str = "*";

pub struct SwapService {
    registry: Arc<ExchangeRegistry>,
    directions: DirectionGraphAggregator,
    config: SwapServiceConfig,
}

impl SwapService {
    pub fn new(
        cache: ComputationalCache,
        chains: Arc<dyn ChainRegistry>,
        factory: Arc<dyn ExchangeFactory>,
        config: SwapServiceConfig,
    ) -> Self {
        let registry = Arc::new(ExchangeRegistry::new(cache, chains, factory));
        Self {
            directions: DirectionGraphAggregator::new(Arc::clone(&registry)),
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &ExchangeRegistry {
        &self.registry
    }

    /// Assets that can currently be swapped from, updated as exchanges change.
    pub async fn assets_available_for_swap(
        &self,
        scope: &ComputationScope,
    ) -> Result<BoxStream<'static, HashSet<AssetId>>, SwapError> {
        self.observed("swap.assets_available", ALL_CHAINS, scope, async {
            let directions = self.directions.all_directions(scope).await?;
            Ok::<_, SwapError>(directions.subscribe().map(|graph| graph.assets()).boxed())
        })
        .await
    }

    /// Assets `asset` can be swapped into; empty while it has no direction.
    pub async fn available_swap_directions_for(
        &self,
        asset: &AssetId,
        scope: &ComputationScope,
    ) -> Result<BoxStream<'static, HashSet<AssetId>>, SwapError> {
        self.observed("swap.directions_for", asset.chain_id.as_str(), scope, async {
            let directions = self.directions.all_directions(scope).await?;
            let asset = asset.clone();
            Ok::<_, SwapError>(directions
                .subscribe()
                .map(move |graph| graph.directions_for(&asset))
                .boxed())
        })
        .await
    }

    pub async fn can_pay_fee_in_non_utility_asset(
        &self,
        asset: &ChainAsset,
        scope: &ComputationScope,
    ) -> Result<bool, SwapError> {
        self.observed("swap.can_pay_fee", asset.chain_id.as_str(), scope, async {
            let exchange = self.exchange(&asset.chain_id, scope).await?;
            if asset.is_utility {
                return Ok(false);
            }
            Ok::<_, SwapError>(exchange.can_pay_fee_in_non_utility_token(asset).await?)
        })
        .await
    }

    /// Quotes the request on the exchange of `token_in`'s chain and resolves
    /// both sides of the swap, including price impact.
    pub async fn quote(
        &self,
        args: &SwapQuoteArgs,
        scope: &ComputationScope,
    ) -> Result<SwapQuote, SwapError> {
        let chain_id = &args.token_in.configuration.chain_id;

        self.observed("swap.quote", chain_id.as_str(), scope, async {
            let exchange = self.exchange(chain_id, scope).await?;
            let quote = exchange.quote(args).await?;

            let (amount_in, amount_out) = match args.swap_direction {
                SwapDirection::SpecifiedIn => (args.amount.clone(), quote.quote),
                SwapDirection::SpecifiedOut => (quote.quote, args.amount.clone()),
            };
            let price_impact = price_impact(args, &amount_in, &amount_out);

            debug!(%amount_in, %amount_out, %price_impact, "quote resolved");

            Ok::<_, SwapError>(SwapQuote {
                asset_in: args.token_in.configuration.full_id(),
                asset_out: args.token_out.configuration.full_id(),
                amount_in,
                amount_out,
                direction: args.swap_direction,
                price_impact,
                route: quote.route,
            })
        })
        .await
    }

    pub async fn estimate_fee(
        &self,
        args: &SwapExecuteArgs,
        scope: &ComputationScope,
    ) -> Result<SwapFee, SwapError> {
        let chain_id = &args.asset_in.chain_id;

        self.observed("swap.estimate_fee", chain_id.as_str(), scope, async {
            let exchange = self.exchange(chain_id, scope).await?;
            Ok::<_, SwapError>(exchange.estimate_fee(args).await?)
        })
        .await
    }

    /// Submits the swap. Failures are returned as-is; nothing is retried.
    pub async fn swap(
        &self,
        args: &SwapExecuteArgs,
        scope: &ComputationScope,
    ) -> Result<ExtrinsicSubmission, SwapError> {
        let chain_id = &args.asset_in.chain_id;

        self.observed("swap.execute", chain_id.as_str(), scope, async {
            let exchange = self.exchange(chain_id, scope).await?;
            Ok::<_, SwapError>(exchange.swap(args).await?)
        })
        .await
    }

    /// `None` when no exchange serves the chain.
    pub async fn slippage_config(
        &self,
        chain_id: &ChainId,
        scope: &ComputationScope,
    ) -> Result<Option<SlippageConfig>, SwapError> {
        self.observed("swap.slippage_config", chain_id.as_str(), scope, async {
            let exchanges = self.registry.resolve(scope).await?;
            let Some(exchange) = exchanges.get(chain_id) else {
                return Ok(None);
            };
            Ok::<_, SwapError>(Some(exchange.slippage_config().await))
        })
        .await
    }

    async fn exchange(
        &self,
        chain_id: &ChainId,
        scope: &ComputationScope,
    ) -> Result<Arc<dyn AssetExchange>, SwapError> {
        Ok(self.registry.exchange_for(chain_id, scope).await?)
    }

    /// Runs `fut` in its own span and reports it when slow.
    async fn observed<F, T>(
        &self,
        name: &'static str,
        chain_id: &str,
        scope: &ComputationScope,
        fut: F,
    ) -> T
    where
        F: Future<Output = T>,
    {
        let threshold = self.config.slow_call_threshold;
        let scope_id = scope.id();

        async move {
            annotate_span(chain_id, Some(&scope_id as &dyn Display));
            warn_if_slow(name, threshold, fut).await
        }
        .instrument(child_span(name))
        .await
    }
}
