//! Softmax market-share primitive.

use sim_core::{CompanyId, MarketConfig};
use std::collections::BTreeMap;

/// Temperature-scaled softmax. Scores are shifted by their maximum before
/// exponentiation; a degenerate sum falls back to a uniform split.
pub fn softmax(scores: &[f64], temperature: f64) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let t = if temperature.is_finite() && temperature > 0.0 {
        temperature
    } else {
        1.0
    };
    let max = scores
        .iter()
        .copied()
        .filter(|s| s.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores
        .iter()
        .map(|s| {
            if s.is_finite() && max.is_finite() {
                ((s - max) / t).exp()
            } else {
                0.0
            }
        })
        .collect();
    let sum: f64 = exps.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        let u = 1.0 / scores.len() as f64;
        return vec![u; scores.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

/// Market shares from utilities: clamp each utility into the configured band,
/// then softmax. Shares sum to 1 for a non-empty input; empty in, empty out.
pub fn compute_market_shares(
    utilities: &[(CompanyId, f64)],
    cfg: &MarketConfig,
) -> BTreeMap<CompanyId, f64> {
    let clamped: Vec<f64> = utilities
        .iter()
        .map(|(_, u)| {
            let u = if u.is_finite() { *u } else { cfg.utility_min };
            u.clamp(cfg.utility_min, cfg.utility_max)
        })
        .collect();
    let shares = softmax(&clamped, cfg.temperature);
    let mut out = BTreeMap::new();
    for ((id, _), share) in utilities.iter().zip(shares) {
        *out.entry(id.clone()).or_insert(0.0) += share;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(us: &[f64]) -> Vec<(CompanyId, f64)> {
        us.iter()
            .enumerate()
            .map(|(i, u)| (CompanyId::new(format!("c{i}")), *u))
            .collect()
    }

    #[test]
    fn empty_in_empty_out() {
        assert!(compute_market_shares(&[], &MarketConfig::default()).is_empty());
    }

    #[test]
    fn tie_splits_evenly() {
        let shares = compute_market_shares(&ids(&[1.3, 1.3]), &MarketConfig::default());
        assert!((shares[&CompanyId::from("c0")] - 0.5).abs() < 1e-12);
        assert!((shares[&CompanyId::from("c1")] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn higher_utility_wins_more() {
        let shares = compute_market_shares(&ids(&[1.0, 2.0]), &MarketConfig::default());
        assert!(shares[&CompanyId::from("c1")] > shares[&CompanyId::from("c0")]);
    }

    #[test]
    fn non_finite_is_clamped() {
        let shares = compute_market_shares(&ids(&[f64::NAN, 1e300]), &MarketConfig::default());
        let sum: f64 = shares.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn shares_sum_to_one(us in proptest::collection::vec(-10.0f64..100.0, 1..20), t in 0.05f64..5.0) {
            let cfg = MarketConfig { temperature: t, ..MarketConfig::default() };
            let shares = compute_market_shares(&ids(&us), &cfg);
            let sum: f64 = shares.values().sum();
            prop_assert!((sum - 1.0).abs() < 1e-9);
            prop_assert!(shares.values().all(|s| *s >= 0.0));
        }
    }
}
