//! Market-level competitive pressure signal.

use serde::{Deserialize, Serialize};

/// Proxy for competitors that are not modelled explicitly, one per
/// (world, niche, week).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BotPressure {
    /// 0..=1, how much demand non-player competitors capture.
    pub competition_pressure: f64,
    /// -1..=1, positive when the market pushes prices down.
    pub price_pressure: f64,
    pub demand_noise: f64,
    pub volatility_boost: f64,
}

impl BotPressure {
    /// No competitors, no noise.
    pub const fn neutral() -> Self {
        Self {
            competition_pressure: 0.0,
            price_pressure: 0.0,
            demand_noise: 0.0,
            volatility_boost: 0.0,
        }
    }

    /// Multiplier on sector demand left for modelled companies.
    pub fn demand_factor(&self) -> f64 {
        let noise = crate::finite_or(self.demand_noise, 0.0)
            * (1.0 + crate::finite_or(self.volatility_boost, 0.0));
        let comp = crate::finite_or(self.competition_pressure, 0.0).clamp(0.0, 1.0);
        ((1.0 + noise) * (1.0 - comp * 0.25)).clamp(0.5, 1.5)
    }

    /// Demand penalty (or bonus) for the group's average price level under
    /// the current price pressure.
    pub fn price_demand_factor(&self, avg_price_level: f64) -> f64 {
        let p = crate::finite_or(self.price_pressure, 0.0).clamp(-1.0, 1.0);
        let avg = crate::finite_or(avg_price_level, 1.0);
        (1.0 - p * (avg - 1.0) * 0.5).clamp(0.6, 1.4)
    }
}
