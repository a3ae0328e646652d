//! In-memory collaborators for tests, demos and offline snapshots.

use std::collections::{HashMap, HashSet};
use std::future;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use num_traits::Zero;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use uuid::Uuid;

use crate::backend::{ChainRegistry, ExtrinsicSubmitter, PoolReserves, PoolSource, SwapCall};
use crate::model::ExtrinsicSubmission;
use crate::types::{AssetId, Balance, Chain, ChainId};

#[derive(Default)]
pub struct InMemoryChainRegistry {
    chains: RwLock<Vec<Chain>>,
}

impl InMemoryChainRegistry {
    pub fn new(chains: Vec<Chain>) -> Self {
        Self {
            chains: RwLock::new(chains),
        }
    }

    pub fn add_chain(&self, chain: Chain) {
        self.chains.write().push(chain);
    }

    pub fn chain(&self, chain_id: &ChainId) -> Option<Chain> {
        self.chains.read().iter().find(|c| &c.id == chain_id).cloned()
    }
}

#[async_trait]
impl ChainRegistry for InMemoryChainRegistry {
    async fn find_chains(
        &self,
        predicate: &(dyn for<'c> Fn(&'c Chain) -> bool + Send + Sync),
    ) -> anyhow::Result<Vec<Chain>> {
        Ok(self
            .chains
            .read()
            .iter()
            .filter(|chain| predicate(*chain))
            .cloned()
            .collect())
    }
}

type PoolMap = HashMap<ChainId, Vec<PoolReserves>>;

/// Pool reserves per chain. Updates are pushed to every subscriber; chains
/// can be marked as failing to simulate unavailable storage.
pub struct InMemoryPoolSource {
    pools: watch::Sender<PoolMap>,
    failing: Mutex<HashSet<ChainId>>,
}

impl Default for InMemoryPoolSource {
    fn default() -> Self {
        Self {
            pools: watch::Sender::new(PoolMap::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }
}

impl InMemoryPoolSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pools(&self, chain_id: ChainId, pools: Vec<PoolReserves>) {
        self.pools.send_modify(|map| {
            map.insert(chain_id, pools);
        });
    }

    pub fn add_pool(&self, chain_id: ChainId, pool: PoolReserves) {
        self.pools.send_modify(|map| {
            map.entry(chain_id).or_default().push(pool);
        });
    }

    /// Every read and subscription for `chain_id` fails from now on.
    pub fn fail_chain(&self, chain_id: ChainId) {
        self.failing.lock().insert(chain_id);
    }

    fn check(&self, chain_id: &ChainId) -> anyhow::Result<()> {
        if self.failing.lock().contains(chain_id) {
            return Err(anyhow!("storage unavailable for chain {chain_id}"));
        }
        Ok(())
    }
}

#[async_trait]
impl PoolSource for InMemoryPoolSource {
    async fn pools(&self, chain_id: &ChainId) -> anyhow::Result<Vec<PoolReserves>> {
        self.check(chain_id)?;
        Ok(self.pools.borrow().get(chain_id).cloned().unwrap_or_default())
    }

    fn subscribe_pools(
        &self,
        chain_id: &ChainId,
    ) -> BoxStream<'static, anyhow::Result<Vec<PoolReserves>>> {
        if let Err(e) = self.check(chain_id) {
            return stream::once(future::ready(Err(e)))
                .chain(stream::pending())
                .boxed();
        }

        let chain_id = chain_id.clone();
        let rx = self.pools.subscribe();

        stream::unfold((rx, true), |(mut rx, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let map = rx.borrow_and_update().clone();
            Some((map, (rx, false)))
        })
        .map(move |map| Ok(map.get(&chain_id).cloned().unwrap_or_default()))
        .boxed()
    }
}

/// Accepts every call, charging a flat fee and recording submissions.
pub struct InMemorySubmitter {
    fee: Balance,
    existential_deposits: HashMap<AssetId, Balance>,
    pub submitted: Mutex<Vec<SwapCall>>,
}

impl InMemorySubmitter {
    pub fn new(fee: Balance) -> Self {
        Self {
            fee,
            existential_deposits: HashMap::new(),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_existential_deposit(mut self, asset: AssetId, amount: Balance) -> Self {
        self.existential_deposits.insert(asset, amount);
        self
    }
}

#[async_trait]
impl ExtrinsicSubmitter for InMemorySubmitter {
    async fn estimate_fee(&self, _call: &SwapCall) -> anyhow::Result<Balance> {
        Ok(self.fee.clone())
    }

    async fn existential_deposit(&self, asset: &AssetId) -> anyhow::Result<Balance> {
        Ok(self
            .existential_deposits
            .get(asset)
            .cloned()
            .unwrap_or_else(Balance::zero))
    }

    async fn submit(&self, call: &SwapCall) -> anyhow::Result<ExtrinsicSubmission> {
        let origin = call.origin.trim();
        if origin.is_empty() {
            return Err(anyhow!("missing origin")).context("swap was not submitted");
        }

        self.submitted.lock().push(call.clone());

        Ok(ExtrinsicSubmission {
            hash: format!("0x{}", Uuid::new_v4().simple()),
            chain_id: call.chain_id.clone(),
            origin: origin.to_string(),
        })
    }
}
