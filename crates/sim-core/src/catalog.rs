//! Static sector/niche/upgrade catalog. Read-only to the engines.

use crate::ids::{NicheId, SectorId, UpgradeId};
use crate::modifiers::ModifierTarget;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub id: SectorId,
    pub name: String,
}

/// How contested a niche is by non-player competitors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompetitionType {
    Fragmented,
    #[default]
    Moderate,
    Concentrated,
    Monopolistic,
}

/// Demand sub-population of a niche with its own pricing and eligibility.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NicheSegment {
    pub id: String,
    /// Share of the niche's effective demand falling in this segment.
    pub demand_share: f64,
    /// Price level buyers in this segment treat as fair.
    #[serde(default = "one")]
    pub reference_price_level: f64,
    /// Negative; larger magnitude means more price-sensitive.
    #[serde(default = "default_elasticity")]
    pub price_elasticity: f64,
    /// Companies below this effective quality are not considered.
    #[serde(default)]
    pub min_quality: f64,
    /// How well marketing reaches this segment (1.0 neutral).
    #[serde(default = "one")]
    pub reach: f64,
}

/// A business archetype within a sector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Niche {
    pub id: NicheId,
    pub sector_id: SectorId,
    pub name: String,
    /// Baseline weekly unit demand.
    pub base_demand: f64,
    /// Per-month demand multipliers.
    #[serde(default = "flat_seasonality")]
    pub seasonality: [f64; 12],
    /// Unit price at price level 1.0.
    pub base_price: f64,
    /// Variable cost per unit at creation.
    pub unit_cost: f64,
    #[serde(default)]
    pub fixed_cost_weekly: f64,
    /// Weekly wage per employee at wage index 1.0.
    #[serde(default = "default_wage")]
    pub base_wage: f64,
    #[serde(default = "half")]
    pub labour_intensity: f64,
    #[serde(default = "half")]
    pub skill_intensity: f64,
    #[serde(default)]
    pub energy_intensity: f64,
    #[serde(default = "default_elasticity")]
    pub price_elasticity: f64,
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    #[serde(default)]
    pub competition: CompetitionType,
    #[serde(default = "default_capacity")]
    pub initial_capacity: f64,
    /// When non-empty, allocation runs per segment.
    #[serde(default)]
    pub segments: Vec<NicheSegment>,
}

impl Niche {
    /// Seasonality multiplier for a month bucket, 1.0 when unset or invalid.
    pub fn season_multiplier(&self, month: usize) -> f64 {
        self.seasonality
            .get(month)
            .copied()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(1.0)
    }
}

/// Linear cost in the company's capacity: `base + per_capacity * capacity`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CostFormula {
    #[serde(default)]
    pub base: f64,
    #[serde(default)]
    pub per_capacity: f64,
}

impl CostFormula {
    pub fn eval(&self, capacity: f64) -> f64 {
        (self.base + self.per_capacity * capacity.max(0.0)).max(0.0)
    }
}

/// Effect range drawn once at purchase.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpgradeEffect {
    pub target: ModifierTarget,
    pub min: f64,
    pub max: f64,
}

/// A possible downside rolled once at purchase.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpgradeRisk {
    /// Probability in [0, 1].
    pub chance: f64,
    pub target: ModifierTarget,
    /// Magnitude applied when the risk fires (multiplier or delta per target).
    pub magnitude: f64,
}

/// A purchasable permanent modifier for companies of one niche.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NicheUpgrade {
    pub id: UpgradeId,
    pub niche_id: NicheId,
    pub code: String,
    pub name: String,
    #[serde(default = "one_u32")]
    pub tier: u32,
    #[serde(default)]
    pub capex: CostFormula,
    #[serde(default)]
    pub weekly_opex: CostFormula,
    /// Inclusive range of weeks before effects switch on.
    #[serde(default)]
    pub delay_weeks: (u32, u32),
    #[serde(default)]
    pub effects: Vec<UpgradeEffect>,
    #[serde(default)]
    pub risks: Vec<UpgradeRisk>,
}

fn one() -> f64 {
    1.0
}

fn one_u32() -> u32 {
    1
}

fn half() -> f64 {
    0.5
}

fn flat_seasonality() -> [f64; 12] {
    [1.0; 12]
}

fn default_elasticity() -> f64 {
    -1.2
}

fn default_volatility() -> f64 {
    0.1
}

fn default_wage() -> f64 {
    600.0
}

fn default_capacity() -> f64 {
    100.0
}
