//! Merges the swap directions of every exchange into one graph.

use std::collections::HashMap;
use std::future;
use std::sync::Arc;

use cache::{ComputationScope, ComputationalCache, SharedStream};
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{instrument, warn};

use crate::backend::AssetExchange;
use crate::error::{ExchangeError, RegistryError};
use crate::registry::{ExchangeMap, ExchangeRegistry};
use crate::types::{ChainId, DirectionGraph};

pub const DIRECTIONS_CACHE_KEY: &str = "directions";

/// Publishes the union of all exchanges' direction graphs as one shared
/// stream per scope.
///
/// A failing exchange is logged and contributes nothing; the others keep
/// publishing. Empty snapshots are held back until every exchange has
/// reported once, so subscribers do not see a transient "nothing available"
/// while exchanges are still loading.
#[derive(Clone)]
pub struct DirectionGraphAggregator {
    cache: ComputationalCache,
    registry: Arc<ExchangeRegistry>,
}

impl DirectionGraphAggregator {
    pub fn new(registry: Arc<ExchangeRegistry>) -> Self {
        Self {
            cache: registry.cache().clone(),
            registry,
        }
    }

    #[instrument(skip_all, fields(scope_id = %scope.id()), target = "directions")]
    pub async fn all_directions(
        &self,
        scope: &ComputationScope,
    ) -> Result<SharedStream<DirectionGraph>, RegistryError> {
        let registry = Arc::clone(&self.registry);

        let directions = self
            .cache
            .use_shared_stream(DIRECTIONS_CACHE_KEY, scope, move |entry_scope| async move {
                let exchanges = registry.resolve(&entry_scope).await?;
                anyhow::Ok(move || merged_directions(&exchanges))
            })
            .await?;

        Ok(directions)
    }
}

/// One merged snapshot per contribution change.
pub fn merged_directions(exchanges: &ExchangeMap) -> BoxStream<'static, DirectionGraph> {
    let expected = exchanges.len();
    if expected == 0 {
        return stream::once(future::ready(DirectionGraph::new()))
            .chain(stream::pending())
            .boxed();
    }

    let contributions = exchanges
        .iter()
        .map(|(chain_id, exchange)| isolate(chain_id.clone(), exchange));

    let mut latest: HashMap<ChainId, DirectionGraph> = HashMap::with_capacity(expected);

    stream::select_all(contributions)
        .filter_map(move |(chain_id, graph)| {
            latest.insert(chain_id, graph);

            let merged = DirectionGraph::union(latest.values());
            let warmed_up = latest.len() == expected;

            future::ready((warmed_up || !merged.is_empty()).then_some(merged))
        })
        .boxed()
}

/// Tags an exchange's updates with its chain. A failure is logged, replaced
/// by an empty contribution and ends that exchange's stream.
fn isolate(
    chain_id: ChainId,
    exchange: &Arc<dyn AssetExchange>,
) -> BoxStream<'static, (ChainId, DirectionGraph)> {
    exchange
        .available_swap_directions()
        .scan(false, move |failed, update: Result<DirectionGraph, ExchangeError>| {
            if *failed {
                return future::ready(None);
            }

            let graph = match update {
                Ok(graph) => graph,
                Err(error) => {
                    warn!(
                        target: "directions",
                        chain_id = %chain_id,
                        %error,
                        "failed to load swap directions; exchange contributes nothing"
                    );
                    *failed = true;
                    DirectionGraph::new()
                }
            };

            future::ready(Some((chain_id.clone(), graph)))
        })
        .boxed()
}
