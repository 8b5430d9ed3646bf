//! Data models for materials, producers and calculation results

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable catalog identifier for a material.
pub type MaterialId = u32;

/// Throughput multiplier per upgrade level, indexed by level - 1.
pub const LEVEL_MODIFIERS: [f64; 5] = [1.0, 1.5, 2.0, 3.0, 4.0];

/// The kind of structure that manufactures a material.
///
/// Raw materials are always harvested by extractors; everything else is
/// crafted by one of the manufacturing kinds. The kind only determines
/// which tier modifier applies to the material's base rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerKind {
    Extractor,
    Workshop,
    Furnace,
    MachineShop,
    Forge,
    IndustrialFactory,
}

impl ProducerKind {
    pub const ALL: [ProducerKind; 6] = [
        ProducerKind::Extractor,
        ProducerKind::Workshop,
        ProducerKind::Furnace,
        ProducerKind::MachineShop,
        ProducerKind::Forge,
        ProducerKind::IndustrialFactory,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProducerKind::Extractor => "extractor",
            ProducerKind::Workshop => "workshop",
            ProducerKind::Furnace => "furnace",
            ProducerKind::MachineShop => "machine_shop",
            ProducerKind::Forge => "forge",
            ProducerKind::IndustrialFactory => "industrial_factory",
        }
    }

    /// Human-readable name for tables and summaries.
    pub fn display_name(self) -> &'static str {
        match self {
            ProducerKind::Extractor => "Extractor",
            ProducerKind::Workshop => "Workshop",
            ProducerKind::Furnace => "Furnace",
            ProducerKind::MachineShop => "Machine Shop",
            ProducerKind::Forge => "Forge",
            ProducerKind::IndustrialFactory => "Industrial Factory",
        }
    }

    fn index(self) -> usize {
        match self {
            ProducerKind::Extractor => 0,
            ProducerKind::Workshop => 1,
            ProducerKind::Furnace => 2,
            ProducerKind::MachineShop => 3,
            ProducerKind::Forge => 4,
            ProducerKind::IndustrialFactory => 5,
        }
    }
}

impl FromStr for ProducerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        ProducerKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown producer kind '{s}'"))
    }
}

/// One recipe edge: an input material and how many units of it are
/// consumed per unit of output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeInput {
    pub input: MaterialId,
    pub quantity: f64,
}

/// A catalog entry.
///
/// `base_rate` is units per minute one producer yields at level 1.
/// `recipe` is ordered; the order is preserved through resolution so a
/// renderer sees children in the same sequence the catalog declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    /// Asset key (icon filename stem); not used by computation.
    pub slug: String,
    pub producer: ProducerKind,
    pub base_rate: f64,
    pub is_raw: bool,
    #[serde(default)]
    pub recipe: Vec<RecipeInput>,
}

/// Per-producer-kind throughput multipliers for one calculation run.
///
/// All materials sharing a producer kind are scaled by the same value.
#[derive(Debug, Clone)]
pub struct TierModifiers {
    values: [f64; 6],
}

impl Default for TierModifiers {
    fn default() -> Self {
        TierModifiers { values: [1.0; 6] }
    }
}

impl TierModifiers {
    pub fn get(&self, kind: ProducerKind) -> f64 {
        self.values[kind.index()]
    }

    pub fn set(&mut self, kind: ProducerKind, modifier: f64) {
        self.values[kind.index()] = modifier;
    }

    /// Reject zero, negative or non-finite modifiers before recursion can
    /// turn them into infinite or NaN producer counts.
    pub fn validate(&self) -> Result<(), CalcError> {
        for kind in ProducerKind::ALL {
            let value = self.get(kind);
            if !(value.is_finite() && value > 0.0) {
                return Err(CalcError::InvalidModifier {
                    kind: kind.name(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// One material's contribution to the chain at one point in the tree.
///
/// The same material id can appear at several independent nodes when it
/// is reachable through more than one path; each occurrence carries its
/// own rate.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub material_id: MaterialId,
    /// Units per minute demanded by the parent (or the user, at the root).
    pub rate: f64,
    /// Producers needed to sustain `rate`, rounded up to whole machines.
    pub producer_count: u64,
    /// One child per recipe input, in catalog order. Empty for raw materials.
    pub children: Vec<TreeNode>,
}

/// Result of a forward resolution: the full tree plus the cumulative
/// per-material demand summed over every node referencing that material.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub tree: TreeNode,
    pub totals: BTreeMap<MaterialId, f64>,
}

/// Result of a reverse (bottleneck) calculation.
#[derive(Debug, Clone)]
pub struct ReverseOutcome {
    /// Output rate the committed extractors can sustain, floored to two
    /// decimal places.
    pub rate: f64,
    /// The raw material limiting the chain.
    pub limiting: MaterialId,
    /// Forward resolution re-run at the achievable rate.
    pub resolution: Resolution,
}

/// Calculation and catalog validation failures.
#[derive(Debug, Error)]
pub enum CalcError {
    #[error("material {0} not found in catalog")]
    UnknownMaterial(MaterialId),

    #[error("malformed catalog: {0}")]
    MalformedCatalog(String),

    #[error("invalid tier modifier {value} for {kind}")]
    InvalidModifier { kind: &'static str, value: f64 },

    #[error("target rate must be a non-negative number, got {0}")]
    InvalidRate(f64),

    #[error("invalid extractor supply: {0}")]
    InvalidSupply(String),
}
