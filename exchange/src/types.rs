use std::collections::{HashMap, HashSet};
use std::fmt;

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// On-chain amount in the asset's smallest unit (planks).
pub type Balance = BigUint;

const DECIMAL_MANTISSA_BITS: u64 = 96;
const DECIMAL_MAX_SCALE: u32 = 28;

/// Opaque chain identifier (usually the genesis hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub String);

impl ChainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ChainId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Asset identity across chains: `(chain, asset within chain)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId {
    pub chain_id: ChainId,
    pub asset_id: u32,
}

impl AssetId {
    pub fn new(chain_id: impl Into<ChainId>, asset_id: u32) -> Self {
        Self {
            chain_id: chain_id.into(),
            asset_id,
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.asset_id)
    }
}

/// Asset configuration as declared by the chain registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainAsset {
    pub chain_id: ChainId,
    pub id: u32,
    pub symbol: String,
    /// Number of decimals.
    pub precision: u32,
    /// The asset the chain charges transaction fees in.
    #[serde(default)]
    pub is_utility: bool,
}

impl ChainAsset {
    pub fn full_id(&self) -> AssetId {
        AssetId::new(self.chain_id.clone(), self.id)
    }
}

/// Kinds of on-chain exchange a chain can declare support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwapType {
    /// Constant-product pools keyed by asset pair.
    AssetConversion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub id: ChainId,
    pub name: String,
    pub assets: Vec<ChainAsset>,
    /// Empty when the chain has no swap support.
    #[serde(default)]
    pub swap: Vec<SwapType>,
}

impl Chain {
    pub fn utility_asset(&self) -> Option<&ChainAsset> {
        self.assets.iter().find(|a| a.is_utility)
    }

    pub fn asset(&self, id: u32) -> Option<&ChainAsset> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn supports(&self, swap_type: SwapType) -> bool {
        self.swap.contains(&swap_type)
    }
}

/// An asset together with its current fiat rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub configuration: ChainAsset,
    /// Price of one whole unit; `None` when no rate is known.
    pub rate: Option<Decimal>,
}

impl Token {
    pub fn new(configuration: ChainAsset, rate: Option<Decimal>) -> Self {
        Self {
            configuration,
            rate,
        }
    }

    /// Converts planks into whole units.
    ///
    /// Amounts wider than a `Decimal` mantissa, or precisions above its
    /// maximum scale, lose their least significant fractional digits. `None`
    /// only when the whole-unit part itself does not fit.
    pub fn amount_from_planks(&self, planks: &Balance) -> Option<Decimal> {
        let mut mantissa = planks.clone();
        let mut scale = self.configuration.precision;

        while scale > DECIMAL_MAX_SCALE || mantissa.bits() > DECIMAL_MANTISSA_BITS {
            if scale == 0 {
                return None;
            }
            mantissa /= 10u32;
            scale -= 1;
        }

        Decimal::try_from_i128_with_scale(mantissa.to_i128()?, scale).ok()
    }

    /// Fiat value of `planks`. Zero when the rate is unknown or the amount
    /// cannot be represented.
    pub fn planks_to_fiat(&self, planks: &Balance) -> Decimal {
        let Some(rate) = self.rate else {
            return Decimal::ZERO;
        };

        match self
            .amount_from_planks(planks)
            .and_then(|units| units.checked_mul(rate))
        {
            Some(fiat) => fiat,
            None => {
                debug!(
                    asset = %self.configuration.full_id(),
                    %planks,
                    %rate,
                    "fiat value out of range; treated as zero"
                );
                Decimal::ZERO
            }
        }
    }
}

/// Which side of a swap the caller fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    SpecifiedIn,
    SpecifiedOut,
}

/// Reachability map: asset → assets it can be swapped into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectionGraph {
    edges: HashMap<AssetId, HashSet<AssetId>>,
}

impl DirectionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: AssetId, to: AssetId) {
        self.edges.entry(from).or_default().insert(to);
    }

    /// Unions `other` into `self`; destination sets of shared keys are merged.
    pub fn merge(&mut self, other: &DirectionGraph) {
        for (from, targets) in &other.edges {
            self.edges
                .entry(from.clone())
                .or_default()
                .extend(targets.iter().cloned());
        }
    }

    /// Union of every graph in `graphs`.
    pub fn union<'a>(graphs: impl IntoIterator<Item = &'a DirectionGraph>) -> Self {
        let mut merged = Self::new();
        for graph in graphs {
            merged.merge(graph);
        }
        merged
    }

    /// Assets that can be swapped from.
    pub fn assets(&self) -> HashSet<AssetId> {
        self.edges.keys().cloned().collect()
    }

    /// Destinations reachable from `asset`; empty when the asset is unknown.
    pub fn directions_for(&self, asset: &AssetId) -> HashSet<AssetId> {
        self.edges.get(asset).cloned().unwrap_or_default()
    }

    pub fn contains(&self, from: &AssetId, to: &AssetId) -> bool {
        self.edges.get(from).is_some_and(|targets| targets.contains(to))
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }
}

impl FromIterator<(AssetId, AssetId)> for DirectionGraph {
    fn from_iter<I: IntoIterator<Item = (AssetId, AssetId)>>(iter: I) -> Self {
        let mut graph = Self::new();
        for (from, to) in iter {
            graph.insert(from, to);
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn dot() -> ChainAsset {
        ChainAsset {
            chain_id: "polkadot".into(),
            id: 0,
            symbol: "DOT".into(),
            precision: 10,
            is_utility: true,
        }
    }

    #[test]
    fn planks_are_scaled_by_precision() {
        let token = Token::new(dot(), Some(dec!(5)));
        let planks = BigUint::from(25_000_000_000u64);

        assert_eq!(token.amount_from_planks(&planks), Some(dec!(2.5)));
        assert_eq!(token.planks_to_fiat(&planks), dec!(12.5));
    }

    #[test]
    fn wide_amounts_keep_their_whole_units() {
        let mut token = Token::new(dot(), Some(dec!(2)));

        // 2^100 planks at 10 decimals, past the 96 bit mantissa.
        let planks = BigUint::from(1u8) << 100u32;
        let units = token.amount_from_planks(&planks).unwrap();
        assert_eq!(units.trunc(), dec!(126765060022822940149));
        assert_eq!(token.planks_to_fiat(&planks).trunc(), dec!(253530120045645880299));

        // Precision above the maximum decimal scale.
        token.configuration.precision = 30;
        let one_unit = BigUint::from(10u8).pow(30);
        assert_eq!(token.amount_from_planks(&one_unit), Some(dec!(1)));
    }

    #[test]
    fn unrepresentable_whole_units_are_worth_nothing() {
        let mut token = Token::new(dot(), Some(dec!(1)));
        token.configuration.precision = 0;

        let planks = BigUint::from(1u8) << 120u32;
        assert_eq!(token.amount_from_planks(&planks), None);
        assert_eq!(token.planks_to_fiat(&planks), Decimal::ZERO);
    }

    #[test]
    fn missing_rate_is_worth_nothing() {
        let token = Token::new(dot(), None);
        assert_eq!(token.planks_to_fiat(&BigUint::from(1u8)), Decimal::ZERO);
    }

    #[test]
    fn union_merges_destination_sets() {
        let a = AssetId::new("c", 1);
        let b = AssetId::new("c", 2);
        let c = AssetId::new("c", 3);

        let left: DirectionGraph = [(a.clone(), b.clone())].into_iter().collect();
        let right: DirectionGraph = [(a.clone(), c.clone()), (b.clone(), a.clone())]
            .into_iter()
            .collect();

        let merged = DirectionGraph::union([&left, &right]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged.directions_for(&a), HashSet::from([b.clone(), c]));
        assert!(merged.contains(&b, &a));
        assert!(merged.directions_for(&AssetId::new("c", 9)).is_empty());
    }
}
