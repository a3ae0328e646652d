//! Offline network description loaded by `swapctl`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, anyhow};
use exchange::{AssetId, Chain, ChainAsset, ChainId, PoolReserves, Token};
use num_bigint::BigUint;
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct NetworkSnapshot {
    pub chains: Vec<Chain>,

    #[serde(default)]
    pub pools: Vec<PoolSnapshot>,

    /// Fiat price of one whole unit, keyed by asset symbol.
    #[serde(default)]
    pub rates: HashMap<String, Decimal>,

    /// Flat network fee in utility planks charged by the offline submitter.
    #[serde(default = "default_network_fee")]
    pub network_fee: String,
}

#[derive(Debug, Deserialize)]
pub struct PoolSnapshot {
    pub chain_id: ChainId,
    pub asset_a: u32,
    pub asset_b: u32,
    /// Planks, as a decimal string.
    pub reserve_a: String,
    pub reserve_b: String,
}

fn default_network_fee() -> String {
    "0".to_string()
}

fn parse_planks(raw: &str) -> anyhow::Result<BigUint> {
    raw.trim()
        .parse::<BigUint>()
        .with_context(|| format!("invalid planks amount `{raw}`"))
}

impl NetworkSnapshot {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read snapshot {}", path.display()))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("invalid network snapshot")
    }

    pub fn chain(&self, chain_id: &ChainId) -> anyhow::Result<&Chain> {
        self.chains
            .iter()
            .find(|chain| &chain.id == chain_id)
            .ok_or_else(|| anyhow!("unknown chain {chain_id}"))
    }

    pub fn asset(&self, chain_id: &ChainId, asset_id: u32) -> anyhow::Result<&ChainAsset> {
        self.chain(chain_id)?
            .asset(asset_id)
            .ok_or_else(|| anyhow!("unknown asset {asset_id} on {chain_id}"))
    }

    pub fn token(&self, asset: &ChainAsset) -> Token {
        Token::new(asset.clone(), self.rates.get(&asset.symbol).copied())
    }

    pub fn network_fee(&self) -> anyhow::Result<BigUint> {
        parse_planks(&self.network_fee)
    }

    /// Pool reserves grouped by chain.
    pub fn pool_reserves(&self) -> anyhow::Result<HashMap<ChainId, Vec<PoolReserves>>> {
        let mut by_chain: HashMap<ChainId, Vec<PoolReserves>> = HashMap::new();

        for pool in &self.pools {
            let reserves = PoolReserves {
                asset_a: AssetId::new(pool.chain_id.clone(), pool.asset_a),
                asset_b: AssetId::new(pool.chain_id.clone(), pool.asset_b),
                reserve_a: parse_planks(&pool.reserve_a)?,
                reserve_b: parse_planks(&pool.reserve_b)?,
            };
            by_chain
                .entry(pool.chain_id.clone())
                .or_default()
                .push(reserves);
        }

        Ok(by_chain)
    }
}
