use std::sync::Arc;

use tokio::test;

use cache::{ComputationScope, ComputationalCache};
use exchange::{AssetExchange, ChainId, EXCHANGES_CACHE_KEY, ExchangeRegistry, RegistryError};

use fixtures::{Network, plain_chain, swap_chain};

fn registry(network: &Network) -> ExchangeRegistry {
    ExchangeRegistry::new(
        ComputationalCache::new(),
        network.chains.clone(),
        network.factory.clone(),
    )
}

#[test]
async fn resolve_builds_one_exchange_per_swap_chain() -> anyhow::Result<()> {
    let network = Network::new(vec![swap_chain("hub"), plain_chain("relay")], 1_000);
    let registry = registry(&network);
    let scope = ComputationScope::new();

    let exchanges = registry.resolve(&scope).await?;

    assert_eq!(exchanges.len(), 1);
    assert!(exchanges.contains_key(&ChainId::new("hub")));
    assert!(registry.cache().contains(EXCHANGES_CACHE_KEY));

    Ok(())
}

#[test]
async fn resolve_is_memoized_per_scope() -> anyhow::Result<()> {
    let network = Network::new(vec![swap_chain("hub")], 1_000);
    let registry = registry(&network);
    let scope = ComputationScope::new();

    let (first, second) = tokio::join!(registry.resolve(&scope), registry.resolve(&scope));
    let (first, second) = (first?, second?);

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(network.factory.created(), 1);

    Ok(())
}

#[test]
async fn new_scope_generation_rebuilds_exchanges() -> anyhow::Result<()> {
    let network = Network::new(vec![swap_chain("hub")], 1_000);
    let registry = registry(&network);

    let scope = ComputationScope::new();
    let first = registry.resolve(&scope).await?;
    scope.cancel();

    let scope = ComputationScope::new();
    let second = registry.resolve(&scope).await?;

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(network.factory.created(), 2);

    Ok(())
}

#[test]
async fn missing_exchange_is_reported_per_chain() -> anyhow::Result<()> {
    let network = Network::new(vec![swap_chain("hub"), plain_chain("relay")], 1_000);
    let registry = registry(&network);
    let scope = ComputationScope::new();

    let hub = registry.exchange_for(&ChainId::new("hub"), &scope).await?;
    assert_eq!(hub.chain_id(), &ChainId::new("hub"));

    let err = match registry.exchange_for(&ChainId::new("relay"), &scope).await {
        Ok(_) => anyhow::bail!("relay chain has no exchange"),
        Err(err) => err,
    };
    assert!(matches!(err, RegistryError::NoExchangeForChain(ref chain) if chain.as_str() == "relay"));

    Ok(())
}

#[test]
async fn no_swap_chains_resolve_to_empty_mapping() -> anyhow::Result<()> {
    let network = Network::new(vec![plain_chain("relay")], 1_000);
    let registry = registry(&network);

    let exchanges = registry.resolve(&ComputationScope::new()).await?;

    assert!(exchanges.is_empty());
    assert_eq!(network.factory.created(), 0);

    Ok(())
}
