//! World-level macro indicators: interest, inflation, wage index.

use sim_core::{
    finite_or, IndicatorConfig, MacroConfig, MacroModifiers, Mulberry32, RandomSource,
    SeasonalModifiers, WorldEconomyState,
};

fn step_indicator(
    current: f64,
    cfg: &IndicatorConfig,
    volatility: f64,
    seasonal_delta: f64,
    rng: &mut Mulberry32,
) -> f64 {
    let current = finite_or(current, cfg.target);
    let drift = (cfg.target - current) * cfg.reversion;
    let noise = rng.jitter() * cfg.noise * volatility;
    finite_or(current + drift + noise + seasonal_delta, cfg.target).clamp(cfg.min, cfg.max)
}

/// Next week's economy. Pure: the lock and clock fields are copied through.
pub fn step_macro(
    economy: &WorldEconomyState,
    season: Option<&SeasonalModifiers>,
    cfg: &MacroConfig,
    rng: &RandomSource,
) -> WorldEconomyState {
    let neutral = SeasonalModifiers::default();
    let season = season.unwrap_or(&neutral);
    let volatility = (cfg.base_volatility + season.volatility_boost).clamp(0.0, 1.0);
    let mut stream = rng.stream(&["macro"]);

    let interest = step_indicator(
        economy.interest_rate,
        &cfg.interest,
        volatility,
        season.interest_delta,
        &mut stream,
    );
    let inflation = step_indicator(
        economy.inflation,
        &cfg.inflation,
        volatility,
        season.inflation_delta,
        &mut stream,
    );

    let wage = finite_or(economy.wage_index, 1.0);
    let wage_drift = wage * inflation / 52.0;
    let wage_noise = stream.jitter() * cfg.wage_noise * volatility;
    let wage_factor = (1.0 + stream.jitter() * cfg.wage_factor_noise)
        .clamp(cfg.wage_factor_min, cfg.wage_factor_max);
    let wage_index = finite_or(
        (wage + wage_drift + wage_noise + season.wage_delta) * wage_factor,
        1.0,
    )
    .clamp(cfg.wage_min, cfg.wage_max);

    let demand_factor = (1.0
        - (interest - cfg.interest.target) * cfg.demand_interest_sensitivity
        - (inflation - cfg.inflation.target) * cfg.demand_inflation_sensitivity)
        .clamp(cfg.demand_factor_min, cfg.demand_factor_max);
    let energy = finite_or(economy.modifiers.energy_cost_factor, 1.0);
    let energy_cost_factor =
        (energy + stream.jitter() * cfg.energy_step * volatility).clamp(cfg.energy_min, cfg.energy_max);

    WorldEconomyState {
        interest_rate: interest,
        inflation,
        wage_index,
        modifiers: MacroModifiers {
            demand_factor,
            energy_cost_factor,
        },
        ..economy.clone()
    }
}
