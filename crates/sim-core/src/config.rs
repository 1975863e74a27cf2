//! Engine policy constants.
//!
//! Every constant the engines use lives here with its default. A YAML file may
//! override any subset of fields.

use crate::time::GameWeek;
use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub macro_econ: MacroConfig,
    pub sector: SectorConfig,
    pub market: MarketConfig,
    pub company: CompanyConfig,
    pub finance: FinanceConfig,
    pub progression: ProgressionConfig,
    pub seasons: SeasonConfig,
    pub tick: TickConfig,
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let m = &self.macro_econ;
        m.interest.validate("macro_econ.interest")?;
        m.inflation.validate("macro_econ.inflation")?;
        check_bounds("macro_econ.wage", m.wage_min, m.wage_max)?;
        check_bounds("macro_econ.demand_factor", m.demand_factor_min, m.demand_factor_max)?;
        check_bounds("macro_econ.energy", m.energy_min, m.energy_max)?;

        let s = &self.sector;
        check_bounds("sector.trend", s.trend_min, s.trend_max)?;
        check_bounds("sector.volatility", s.volatility_min, s.volatility_max)?;
        if !(s.smoothing_alpha > 0.0 && s.smoothing_alpha <= 1.0) {
            return Err(ValidationError::OutOfRange("sector.smoothing_alpha"));
        }

        let k = &self.market;
        if !(k.temperature.is_finite() && k.temperature > 0.0) {
            return Err(ValidationError::NonPositive("market.temperature"));
        }
        check_bounds("market.utility", k.utility_min, k.utility_max)?;
        if !(1..=MAX_SEGMENT_ROUNDS).contains(&k.max_segment_rounds) {
            return Err(ValidationError::OutOfRange("market.max_segment_rounds"));
        }

        let mut last_max = f64::NEG_INFINITY;
        for b in &self.company.refund_brackets {
            let ordered = b.quality_min < b.quality_max && b.quality_min >= last_max;
            let rates_ok = (0.0..=1.0).contains(&b.rate_at_min) && (0.0..=1.0).contains(&b.rate_at_max);
            if !ordered || !rates_ok {
                return Err(ValidationError::InvalidRefundBrackets);
            }
            last_max = b.quality_max;
        }

        if !(0.0..=1.0).contains(&self.finance.corporate_tax_rate) {
            return Err(ValidationError::OutOfRange("finance.corporate_tax_rate"));
        }
        let p = &self.progression;
        if p.xp_base <= 0.0 || p.max_level == 0 {
            return Err(ValidationError::NonPositive("progression.xp_base"));
        }
        if p.max_weekly_gain < 0.0 || p.max_weekly_loss < 0.0 {
            return Err(ValidationError::OutOfRange("progression.weekly caps"));
        }
        Ok(())
    }
}

fn check_bounds(field: &'static str, lo: f64, hi: f64) -> Result<(), ValidationError> {
    if !(lo.is_finite() && hi.is_finite()) {
        return Err(ValidationError::NonFinite);
    }
    if lo > hi {
        return Err(ValidationError::InvertedBounds(field));
    }
    Ok(())
}

/// Mean-reverting indicator parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub target: f64,
    pub reversion: f64,
    pub noise: f64,
    pub min: f64,
    pub max: f64,
}

impl IndicatorConfig {
    fn validate(&self, field: &'static str) -> Result<(), ValidationError> {
        check_bounds(field, self.min, self.max)?;
        if !(self.min..=self.max).contains(&self.target) {
            return Err(ValidationError::OutOfRange(field));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroConfig {
    pub base_volatility: f64,
    pub interest: IndicatorConfig,
    pub inflation: IndicatorConfig,
    pub wage_noise: f64,
    pub wage_factor_noise: f64,
    pub wage_factor_min: f64,
    pub wage_factor_max: f64,
    pub wage_min: f64,
    pub wage_max: f64,
    pub demand_interest_sensitivity: f64,
    pub demand_inflation_sensitivity: f64,
    pub demand_factor_min: f64,
    pub demand_factor_max: f64,
    pub energy_step: f64,
    pub energy_min: f64,
    pub energy_max: f64,
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            base_volatility: 0.3,
            interest: IndicatorConfig {
                target: 0.05,
                reversion: 0.05,
                noise: 0.004,
                min: 0.0,
                max: 0.5,
            },
            inflation: IndicatorConfig {
                target: 0.02,
                reversion: 0.04,
                noise: 0.006,
                min: -0.25,
                max: 1.0,
            },
            wage_noise: 0.01,
            wage_factor_noise: 0.01,
            wage_factor_min: 0.98,
            wage_factor_max: 1.02,
            wage_min: 0.5,
            wage_max: 5.0,
            demand_interest_sensitivity: 1.5,
            demand_inflation_sensitivity: 0.5,
            demand_factor_min: 0.7,
            demand_factor_max: 1.3,
            energy_step: 0.02,
            energy_min: 0.7,
            energy_max: 1.6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorConfig {
    pub weekly_trend_rate: f64,
    pub trend_min: f64,
    pub trend_max: f64,
    pub volatility_min: f64,
    pub volatility_max: f64,
    /// Weight of the new target in exponential smoothing.
    pub smoothing_alpha: f64,
    pub demand_max: f64,
}

impl Default for SectorConfig {
    fn default() -> Self {
        Self {
            weekly_trend_rate: 0.001,
            trend_min: 0.5,
            trend_max: 2.0,
            volatility_min: 0.02,
            volatility_max: 0.5,
            smoothing_alpha: 0.3,
            demand_max: 1e9,
        }
    }
}

/// Hard ceiling on greedy reallocation rounds per segment.
pub const MAX_SEGMENT_ROUNDS: u32 = 4;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub temperature: f64,
    pub utility_min: f64,
    pub utility_max: f64,
    pub quality_weight: f64,
    pub marketing_weight: f64,
    pub reputation_weight: f64,
    pub segment_price_weight: f64,
    pub segment_quality_weight: f64,
    pub segment_marketing_weight: f64,
    pub segment_reputation_weight: f64,
    pub segment_capacity_weight: f64,
    pub max_segment_rounds: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            utility_min: 0.0,
            utility_max: 50.0,
            quality_weight: 1.0,
            marketing_weight: 0.6,
            reputation_weight: 0.5,
            segment_price_weight: 1.0,
            segment_quality_weight: 0.8,
            segment_marketing_weight: 0.5,
            segment_reputation_weight: 0.5,
            segment_capacity_weight: 0.7,
            max_segment_rounds: 4,
        }
    }
}

/// Quality band with a linearly interpolated refund rate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefundBracket {
    pub quality_min: f64,
    pub quality_max: f64,
    pub rate_at_min: f64,
    pub rate_at_max: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyConfig {
    pub marketing_reference: f64,
    pub marketing_log_scale: f64,
    pub awareness_gain: f64,
    pub awareness_max_drift: f64,
    pub awareness_decay: f64,
    pub reputation_smoothing: f64,
    pub reputation_max_step: f64,
    pub review_quality_weight: f64,
    pub review_refund_weight: f64,
    pub review_cap: f64,
    pub efficiency_smoothing: f64,
    pub efficiency_max_step: f64,
    pub efficiency_pivot: f64,
    pub efficiency_cost_slope: f64,
    pub efficiency_cost_min: f64,
    pub efficiency_cost_max: f64,
    pub inflation_pass_through: f64,
    pub refund_brackets: Vec<RefundBracket>,
}

impl Default for CompanyConfig {
    fn default() -> Self {
        Self {
            marketing_reference: 500.0,
            marketing_log_scale: 0.25,
            awareness_gain: 0.05,
            awareness_max_drift: 0.1,
            awareness_decay: 0.02,
            reputation_smoothing: 0.1,
            reputation_max_step: 0.02,
            review_quality_weight: 0.01,
            review_refund_weight: 0.05,
            review_cap: 0.01,
            efficiency_smoothing: 0.2,
            efficiency_max_step: 0.05,
            efficiency_pivot: 0.7,
            efficiency_cost_slope: 0.2,
            efficiency_cost_min: 0.9,
            efficiency_cost_max: 1.1,
            inflation_pass_through: 0.5,
            refund_brackets: vec![
                RefundBracket {
                    quality_min: 0.0,
                    quality_max: 0.5,
                    rate_at_min: 0.15,
                    rate_at_max: 0.08,
                },
                RefundBracket {
                    quality_min: 0.5,
                    quality_max: 0.9,
                    rate_at_min: 0.08,
                    rate_at_max: 0.02,
                },
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceConfig {
    pub corporate_tax_rate: f64,
    /// Added to the policy rate for new holding loans.
    pub loan_spread: f64,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            corporate_tax_rate: 0.25,
            loan_spread: 0.03,
        }
    }
}

/// Per-track XP weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackWeights {
    pub per_profitable_company: f64,
    pub profit_factor: f64,
    pub stability_bonus: f64,
    pub bankruptcy_penalty: f64,
    pub positive_event: f64,
    pub negative_event: f64,
    /// Event type substrings this track reacts to more strongly.
    pub emphasis_keywords: Vec<String>,
    pub emphasis_factor: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    pub xp_base: f64,
    pub xp_exponent: f64,
    pub max_level: u32,
    pub max_weekly_gain: f64,
    pub max_weekly_loss: f64,
    /// Profit per XP point of the magnitude bonus.
    pub profit_scale: f64,
    pub profit_cap: f64,
    pub positive_keywords: Vec<String>,
    pub negative_keywords: Vec<String>,
    pub brand: TrackWeights,
    pub credit: TrackWeights,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        let words = |ws: &[&str]| ws.iter().map(|w| w.to_string()).collect::<Vec<_>>();
        Self {
            xp_base: 100.0,
            xp_exponent: 1.5,
            max_level: 999,
            max_weekly_gain: 50.0,
            max_weekly_loss: 30.0,
            profit_scale: 1000.0,
            profit_cap: 20.0,
            positive_keywords: words(&["HYPE", "PR", "VIRAL", "AWARD", "LAUNCH", "PARTNERSHIP"]),
            negative_keywords: words(&[
                "CRISIS", "FINE", "SCANDAL", "RECALL", "LAWSUIT", "STRIKE", "DEFAULT",
            ]),
            brand: TrackWeights {
                per_profitable_company: 5.0,
                profit_factor: 0.5,
                stability_bonus: 2.0,
                bankruptcy_penalty: 15.0,
                positive_event: 4.0,
                negative_event: 3.0,
                emphasis_keywords: words(&["HYPE", "PR"]),
                emphasis_factor: 1.5,
            },
            credit: TrackWeights {
                per_profitable_company: 3.0,
                profit_factor: 1.0,
                stability_bonus: 4.0,
                bankruptcy_penalty: 25.0,
                positive_event: 2.0,
                negative_event: 5.0,
                emphasis_keywords: words(&["CRISIS", "FINE"]),
                emphasis_factor: 1.5,
            },
        }
    }
}

/// Seasonal adjustments for one quarter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalModifiers {
    pub interest_delta: f64,
    pub inflation_delta: f64,
    pub wage_delta: f64,
    pub volatility_boost: f64,
    pub volatility_factor: f64,
    pub demand_factor: f64,
}

impl Default for SeasonalModifiers {
    fn default() -> Self {
        Self {
            interest_delta: 0.0,
            inflation_delta: 0.0,
            wage_delta: 0.0,
            volatility_boost: 0.0,
            volatility_factor: 1.0,
            demand_factor: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonConfig {
    pub enabled: bool,
    /// Four entries, one per quarter.
    pub quarters: Vec<SeasonalModifiers>,
}

impl Default for SeasonConfig {
    fn default() -> Self {
        let q = |demand: f64, vol: f64| SeasonalModifiers {
            demand_factor: demand,
            volatility_factor: vol,
            ..SeasonalModifiers::default()
        };
        Self {
            enabled: true,
            quarters: vec![q(0.97, 1.0), q(1.0, 0.99), q(1.0, 1.0), q(1.04, 1.02)],
        }
    }
}

impl SeasonConfig {
    pub fn season_for(&self, week: GameWeek) -> Option<&SeasonalModifiers> {
        if !self.enabled {
            return None;
        }
        self.quarters.get(week.quarter())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// A lock older than this may be taken over by a new tick.
    pub stale_lock_secs: i64,
    /// Holding cash below which loss-making companies go bankrupt.
    pub bankruptcy_cash_floor: f64,
    /// Let bots propose decisions for their companies.
    pub bot_planning: bool,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            stale_lock_secs: 900,
            bankruptcy_cash_floor: -50_000.0,
            bot_planning: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn yaml_overrides_subset() {
        let cfg = EngineConfig::from_yaml_str(
            "finance:\n  corporate_tax_rate: 0.3\nmarket:\n  temperature: 0.8\n",
        )
        .unwrap();
        assert_eq!(cfg.finance.corporate_tax_rate, 0.3);
        assert_eq!(cfg.market.temperature, 0.8);
        assert_eq!(cfg.sector.smoothing_alpha, 0.3);
    }

    #[test]
    fn rejects_bad_values() {
        let err = EngineConfig::from_yaml_str("market:\n  temperature: 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ValidationError::NonPositive(_))));

        let mut cfg = EngineConfig::default();
        cfg.sector.trend_min = 3.0;
        assert_eq!(
            cfg.validate(),
            Err(ValidationError::InvertedBounds("sector.trend"))
        );

        let mut cfg = EngineConfig::default();
        cfg.company.refund_brackets.reverse();
        assert_eq!(cfg.validate(), Err(ValidationError::InvalidRefundBrackets));
    }

    #[test]
    fn segment_rounds_bounded() {
        for rounds in [0, MAX_SEGMENT_ROUNDS + 1, 12] {
            let mut cfg = EngineConfig::default();
            cfg.market.max_segment_rounds = rounds;
            assert_eq!(
                cfg.validate(),
                Err(ValidationError::OutOfRange("market.max_segment_rounds"))
            );
        }
        let err = EngineConfig::from_yaml_str("market:\n  max_segment_rounds: 12\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ValidationError::OutOfRange(_))));

        let mut cfg = EngineConfig::default();
        cfg.market.max_segment_rounds = 1;
        cfg.validate().unwrap();
    }

    #[test]
    fn season_lookup() {
        let cfg = SeasonConfig::default();
        let q4 = cfg.season_for(GameWeek::new(2030, 50)).unwrap();
        assert!(q4.demand_factor > 1.0);
        let off = SeasonConfig {
            enabled: false,
            ..SeasonConfig::default()
        };
        assert!(off.season_for(GameWeek::new(2030, 50)).is_none());
    }
}
