//! Per-(world, niche, week) competitive pressure.

use sim_core::{finite_or, BotPressure, CompetitionType, Niche, RandomSource};

fn competition_baseline(c: CompetitionType) -> f64 {
    match c {
        CompetitionType::Fragmented => 0.6,
        CompetitionType::Moderate => 0.45,
        CompetitionType::Concentrated => 0.3,
        CompetitionType::Monopolistic => 0.15,
    }
}

/// Pressure bundle for `niche` this week. Draws come from the
/// `("bots", niche)` stream in a fixed order.
pub fn market_pressure(niche: &Niche, rng: &RandomSource) -> BotPressure {
    let mut stream = rng.stream(&["bots", niche.id.as_str()]);
    let volatility = finite_or(niche.volatility, 0.1).clamp(0.0, 1.0);

    let competition = (competition_baseline(niche.competition) + volatility * 0.5 + stream.jitter() * 0.1)
        .clamp(0.0, 1.0);
    let elasticity_bias = ((finite_or(niche.price_elasticity, -1.2).abs() - 1.0) * 0.4).clamp(-0.5, 0.5);
    let price = (elasticity_bias + competition * 0.3 + stream.jitter() * 0.15).clamp(-1.0, 1.0);
    let demand_noise = stream.jitter() * volatility * 0.5;
    let volatility_boost = stream.pick_range(0.0, volatility * 0.2);

    BotPressure {
        competition_pressure: competition,
        price_pressure: price,
        demand_noise,
        volatility_boost,
    }
}
