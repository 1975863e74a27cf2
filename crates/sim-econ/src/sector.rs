//! Per-sector demand evolution.

use sim_core::{
    finite_or, Niche, NicheId, RandomSource, SeasonalModifiers, Sector, SectorConfig,
    WorldEconomyState, WorldSectorState,
};

/// Everything the sector engine reads for one sector.
#[derive(Debug, Clone)]
pub struct SectorInput<'a> {
    pub sector: &'a Sector,
    pub niches: Vec<&'a Niche>,
    pub previous: Option<&'a WorldSectorState>,
    pub economy: &'a WorldEconomyState,
    pub season: Option<&'a SeasonalModifiers>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectorOutcome {
    pub state: WorldSectorState,
    pub demand: f64,
    pub volatility_shock: f64,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Advance one sector by one week.
pub fn step_sector(input: &SectorInput<'_>, cfg: &SectorConfig, rng: &RandomSource) -> SectorOutcome {
    let week = rng.week();
    let month = week.month();
    let neutral = SeasonalModifiers::default();
    let season = input.season.unwrap_or(&neutral);

    let base_demand = mean(input.niches.iter().map(|n| n.base_demand.max(0.0))).unwrap_or(0.0);
    let seasonality = mean(input.niches.iter().map(|n| n.season_multiplier(month))).unwrap_or(1.0);

    let prev_trend = input.previous.map(|p| finite_or(p.trend, 1.0)).unwrap_or(1.0);
    let trend = (prev_trend * (1.0 + cfg.weekly_trend_rate)).clamp(cfg.trend_min, cfg.trend_max);

    let prev_volatility = input
        .previous
        .map(|p| finite_or(p.volatility, 0.1))
        .or_else(|| mean(input.niches.iter().map(|n| n.volatility)))
        .unwrap_or(0.1);
    let volatility = (prev_volatility * finite_or(season.volatility_factor, 1.0))
        .clamp(cfg.volatility_min, cfg.volatility_max);

    let mut stream = rng.stream(&["sector", input.sector.id.as_str()]);
    let shock = (stream.next_f64() * 2.0 - 1.0) * volatility;

    let macro_factor = finite_or(input.economy.modifiers.demand_factor, 1.0);
    let target = base_demand
        * trend
        * seasonality
        * macro_factor
        * finite_or(season.demand_factor, 1.0)
        * (1.0 + shock);

    let prev_demand = input
        .previous
        .map(|p| finite_or(p.demand, target))
        .unwrap_or(target);
    let alpha = cfg.smoothing_alpha;
    let demand = finite_or((1.0 - alpha) * prev_demand + alpha * target, 0.0).clamp(0.0, cfg.demand_max);

    SectorOutcome {
        state: WorldSectorState {
            world_id: input.economy.world_id.clone(),
            sector_id: input.sector.id.clone(),
            week,
            demand,
            trend,
            volatility,
            last_delta: demand - prev_demand,
            last_shock: shock,
        },
        demand,
        volatility_shock: shock,
    }
}

/// Fraction of a sector's demand that belongs to one niche, by base demand.
pub fn niche_demand_weight(niches: &[&Niche], niche_id: &NicheId) -> f64 {
    let total: f64 = niches.iter().map(|n| n.base_demand.max(0.0)).sum();
    let own = niches
        .iter()
        .find(|n| &n.id == niche_id)
        .map(|n| n.base_demand.max(0.0))
        .unwrap_or(0.0);
    if total > 0.0 {
        own / total
    } else if niches.is_empty() {
        0.0
    } else {
        1.0 / niches.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{CompetitionType, GameWeek, SectorId, WorldId};

    fn niche(id: &str, demand: f64) -> Niche {
        Niche {
            id: NicheId::from(id),
            sector_id: SectorId::from("auto"),
            name: id.into(),
            base_demand: demand,
            seasonality: [1.0; 12],
            base_price: 20.0,
            unit_cost: 8.0,
            fixed_cost_weekly: 0.0,
            base_wage: 600.0,
            labour_intensity: 0.5,
            skill_intensity: 0.5,
            energy_intensity: 0.0,
            price_elasticity: -1.2,
            volatility: 0.1,
            competition: CompetitionType::Moderate,
            initial_capacity: 100.0,
            segments: vec![],
        }
    }

    fn sector() -> Sector {
        Sector {
            id: SectorId::from("auto"),
            name: "Auto".into(),
        }
    }

    #[test]
    fn first_week_lands_near_base_demand() {
        let s = sector();
        let n = niche("wash", 800.0);
        let econ = sim_core::WorldEconomyState::new(WorldId::from("w1"), GameWeek::new(2030, 1));
        let input = SectorInput {
            sector: &s,
            niches: vec![&n],
            previous: None,
            economy: &econ,
            season: None,
        };
        let rng = RandomSource::new(WorldId::from("w1"), GameWeek::new(2030, 1));
        let out = step_sector(&input, &SectorConfig::default(), &rng);
        // Shock is bounded by volatility (0.1) and trend grows 0.1%.
        assert!(out.demand > 800.0 * 0.89 && out.demand < 800.0 * 1.12);
        assert!((out.state.trend - 1.001).abs() < 1e-12);
        assert!(out.volatility_shock.abs() <= 0.1);
    }

    #[test]
    fn smoothing_pulls_toward_target() {
        let s = sector();
        let n = niche("wash", 1000.0);
        let econ = sim_core::WorldEconomyState::new(WorldId::from("w1"), GameWeek::new(2030, 2));
        let prev = WorldSectorState {
            world_id: WorldId::from("w1"),
            sector_id: SectorId::from("auto"),
            week: GameWeek::new(2030, 1),
            demand: 0.0,
            trend: 1.0,
            volatility: 0.02,
            last_delta: 0.0,
            last_shock: 0.0,
        };
        let input = SectorInput {
            sector: &s,
            niches: vec![&n],
            previous: Some(&prev),
            economy: &econ,
            season: None,
        };
        let rng = RandomSource::new(WorldId::from("w1"), GameWeek::new(2030, 2));
        let out = step_sector(&input, &SectorConfig::default(), &rng);
        // alpha = 0.3 of a target near 1000.
        assert!(out.demand > 290.0 && out.demand < 320.0);
        assert!(out.state.last_delta > 0.0);
    }

    #[test]
    fn trend_is_clamped() {
        let s = sector();
        let n = niche("wash", 100.0);
        let econ = sim_core::WorldEconomyState::new(WorldId::from("w1"), GameWeek::new(2030, 2));
        let prev = WorldSectorState {
            world_id: WorldId::from("w1"),
            sector_id: SectorId::from("auto"),
            week: GameWeek::new(2030, 1),
            demand: 100.0,
            trend: 2.0,
            volatility: 0.9,
            last_delta: 0.0,
            last_shock: 0.0,
        };
        let input = SectorInput {
            sector: &s,
            niches: vec![&n],
            previous: Some(&prev),
            economy: &econ,
            season: None,
        };
        let rng = RandomSource::new(WorldId::from("w1"), GameWeek::new(2030, 2));
        let out = step_sector(&input, &SectorConfig::default(), &rng);
        assert_eq!(out.state.trend, 2.0);
        assert_eq!(out.state.volatility, 0.5);
    }

    #[test]
    fn niche_weights() {
        let a = niche("a", 300.0);
        let b = niche("b", 100.0);
        let ns = vec![&a, &b];
        assert!((niche_demand_weight(&ns, &NicheId::from("a")) - 0.75).abs() < 1e-12);
        assert_eq!(niche_demand_weight(&ns, &NicheId::from("zzz")), 0.0);
    }
}
