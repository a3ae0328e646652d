//! Resolves which exchange serves each chain.

use std::collections::HashMap;
use std::sync::Arc;

use cache::{ComputationScope, ComputationalCache};
use tracing::{debug, info, instrument};

use crate::backend::{AssetExchange, ChainRegistry, ExchangeFactory};
use crate::error::RegistryError;
use crate::types::{Chain, ChainId};

pub const EXCHANGES_CACHE_KEY: &str = "exchanges";

pub type ExchangeMap = HashMap<ChainId, Arc<dyn AssetExchange>>;

/// Lazily builds one exchange per swap-capable chain and keeps the mapping
/// for as long as the requesting scope lives.
#[derive(Clone)]
pub struct ExchangeRegistry {
    cache: ComputationalCache,
    chains: Arc<dyn ChainRegistry>,
    factory: Arc<dyn ExchangeFactory>,
}

impl ExchangeRegistry {
    pub fn new(
        cache: ComputationalCache,
        chains: Arc<dyn ChainRegistry>,
        factory: Arc<dyn ExchangeFactory>,
    ) -> Self {
        Self {
            cache,
            chains,
            factory,
        }
    }

    pub fn cache(&self) -> &ComputationalCache {
        &self.cache
    }

    /// Chain → exchange mapping, built once per live scope.
    #[instrument(skip_all, fields(scope_id = %scope.id()), target = "registry")]
    pub async fn resolve(&self, scope: &ComputationScope) -> Result<Arc<ExchangeMap>, RegistryError> {
        let chains = Arc::clone(&self.chains);
        let factory = Arc::clone(&self.factory);

        let exchanges = self
            .cache
            .use_cache(EXCHANGES_CACHE_KEY, scope, move |entry_scope| async move {
                let swap_capable = chains
                    .find_chains(&|chain: &Chain| !chain.swap.is_empty())
                    .await?;

                let mut exchanges = ExchangeMap::new();
                for chain in swap_capable {
                    match factory.create(&chain, &entry_scope).await {
                        Some(exchange) => {
                            exchanges.insert(chain.id.clone(), exchange);
                        }
                        None => {
                            debug!(target: "registry", chain_id = %chain.id, "no exchange for declared swap support");
                        }
                    }
                }

                info!(target: "registry", count = exchanges.len(), "exchanges resolved");
                anyhow::Ok(exchanges)
            })
            .await?;

        Ok(exchanges)
    }

    /// The exchange serving `chain_id`.
    pub async fn exchange_for(
        &self,
        chain_id: &ChainId,
        scope: &ComputationScope,
    ) -> Result<Arc<dyn AssetExchange>, RegistryError> {
        let exchanges = self.resolve(scope).await?;
        exchanges
            .get(chain_id)
            .cloned()
            .ok_or_else(|| RegistryError::NoExchangeForChain(chain_id.clone()))
    }
}
