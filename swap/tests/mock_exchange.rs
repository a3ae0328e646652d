#![allow(dead_code)]

use std::collections::HashMap;
use std::future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use num_bigint::BigUint;

use cache::ComputationScope;
use exchange::{
    AssetExchange, AssetExchangeQuote, AssetId, Balance, Chain, ChainAsset, ChainId,
    DirectionGraph, ExchangeError, ExchangeFactory, ExtrinsicSubmission, SlippageConfig,
    SwapExecuteArgs, SwapFee, SwapQuoteArgs, SwapType,
};

/// Exchange returning canned answers.
pub struct StubExchange {
    pub chain_id: ChainId,
    pub quote: Balance,
    /// `None` makes the direction stream fail.
    pub directions: Option<DirectionGraph>,
    pub fee_payable: bool,
}

impl StubExchange {
    pub fn new(chain_id: &str, quote: u64) -> Self {
        Self {
            chain_id: ChainId::new(chain_id),
            quote: BigUint::from(quote),
            directions: Some(DirectionGraph::new()),
            fee_payable: true,
        }
    }

    pub fn with_directions(mut self, directions: DirectionGraph) -> Self {
        self.directions = Some(directions);
        self
    }

    pub fn failing(mut self) -> Self {
        self.directions = None;
        self
    }
}

#[async_trait]
impl AssetExchange for StubExchange {
    fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    async fn can_pay_fee_in_non_utility_token(
        &self,
        _asset: &ChainAsset,
    ) -> Result<bool, ExchangeError> {
        Ok(self.fee_payable)
    }

    fn available_swap_directions(
        &self,
    ) -> BoxStream<'static, Result<DirectionGraph, ExchangeError>> {
        let first = match &self.directions {
            Some(graph) => Ok(graph.clone()),
            None => Err(ExchangeError::Storage("rpc down".into())),
        };
        stream::once(future::ready(first))
            .chain(stream::pending())
            .boxed()
    }

    async fn quote(&self, args: &SwapQuoteArgs) -> Result<AssetExchangeQuote, ExchangeError> {
        Ok(AssetExchangeQuote {
            quote: self.quote.clone(),
            route: vec![
                args.token_in.configuration.full_id(),
                args.token_out.configuration.full_id(),
            ],
        })
    }

    async fn estimate_fee(&self, args: &SwapExecuteArgs) -> Result<SwapFee, ExchangeError> {
        Ok(SwapFee {
            fee_asset: args.asset_in.full_id(),
            network_fee: BigUint::from(7u32),
            minimum_balance_buy_in: BigUint::from(0u32),
        })
    }

    async fn swap(&self, args: &SwapExecuteArgs) -> Result<ExtrinsicSubmission, ExchangeError> {
        Ok(ExtrinsicSubmission {
            hash: "0xabc".into(),
            chain_id: self.chain_id.clone(),
            origin: args.origin.clone(),
        })
    }

    async fn slippage_config(&self) -> SlippageConfig {
        SlippageConfig::default()
    }
}

#[derive(Default)]
pub struct StubFactory {
    exchanges: HashMap<ChainId, Arc<StubExchange>>,
    pub created: AtomicUsize,
}

impl StubFactory {
    pub fn with(mut self, exchange: StubExchange) -> Self {
        self.exchanges
            .insert(exchange.chain_id.clone(), Arc::new(exchange));
        self
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeFactory for StubFactory {
    async fn create(
        &self,
        chain: &Chain,
        _scope: &ComputationScope,
    ) -> Option<Arc<dyn AssetExchange>> {
        let exchange = self.exchanges.get(&chain.id)?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Some(exchange.clone() as Arc<dyn AssetExchange>)
    }
}

pub const NATIVE: u32 = 0;
pub const STABLE: u32 = 1;

/// Chain with a utility asset and a stablecoin, both with zero decimals so
/// planks equal whole units.
pub fn chain(id: &str, swap: bool) -> Chain {
    Chain {
        id: ChainId::new(id),
        name: id.to_uppercase(),
        assets: vec![
            ChainAsset {
                chain_id: ChainId::new(id),
                id: NATIVE,
                symbol: "NAT".into(),
                precision: 0,
                is_utility: true,
            },
            ChainAsset {
                chain_id: ChainId::new(id),
                id: STABLE,
                symbol: "USD".into(),
                precision: 0,
                is_utility: false,
            },
        ],
        swap: if swap {
            vec![SwapType::AssetConversion]
        } else {
            vec![]
        },
    }
}

pub fn chain_asset(chain_id: &str, id: u32) -> ChainAsset {
    chain(chain_id, true).assets[id as usize].clone()
}

pub fn asset_id(chain_id: &str, id: u32) -> AssetId {
    AssetId::new(chain_id, id)
}

pub fn both_ways(chain_id: &str) -> DirectionGraph {
    [
        (asset_id(chain_id, NATIVE), asset_id(chain_id, STABLE)),
        (asset_id(chain_id, STABLE), asset_id(chain_id, NATIVE)),
    ]
    .into_iter()
    .collect()
}
