//! Segment-based, capacity-constrained allocation.
//!
//! Each demand segment is resolved in a few greedy rounds. A round scores
//! every eligible company, softmaxes the scores into shares and hands out the
//! remaining demand capped by each company's remaining capacity. Demand a
//! saturated company cannot serve flows to its competitors in the next round.
//! Capacity is shared across all segments of the niche.

use crate::market::softmax;
use sim_core::{finite_or, CompanyId, MarketConfig, Niche, MAX_SEGMENT_ROUNDS};
use std::collections::{BTreeMap, BTreeSet};

const EPS: f64 = 1e-9;

/// A company's offer into one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentOffer {
    pub company_id: CompanyId,
    pub price_level: f64,
    pub eligible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInput {
    pub id: String,
    /// Share of the niche's effective demand in this segment.
    pub demand_share: f64,
    pub reference_price_level: f64,
    pub price_elasticity: f64,
    pub reach: f64,
    pub offers: Vec<SegmentOffer>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentAllocationInput {
    pub segments: Vec<SegmentInput>,
}

/// Per-company scoring inputs shared by all segments.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentCompetitor {
    pub company_id: CompanyId,
    pub capacity: f64,
    pub quality: f64,
    pub marketing_score: f64,
    pub awareness: f64,
    pub reputation_score: f64,
    /// Demand multiplier from active effects; scales pull in every segment.
    pub demand: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentResult {
    pub id: String,
    pub demand: f64,
    pub delivered: f64,
    pub rounds: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentAllocation {
    pub sold: BTreeMap<CompanyId, f64>,
    pub segments: Vec<SegmentResult>,
}

impl SegmentAllocationInput {
    /// Offers for every segment of `niche`. A company is eligible in a
    /// segment when its effective quality meets the segment minimum.
    pub fn from_niche(niche: &Niche, companies: &[(CompanyId, f64, f64)]) -> Self {
        let segments = niche
            .segments
            .iter()
            .map(|s| SegmentInput {
                id: s.id.clone(),
                demand_share: s.demand_share.max(0.0),
                reference_price_level: s.reference_price_level,
                price_elasticity: s.price_elasticity,
                reach: s.reach,
                offers: companies
                    .iter()
                    .map(|(id, price_level, quality)| SegmentOffer {
                        company_id: id.clone(),
                        price_level: *price_level,
                        eligible: *quality >= s.min_quality,
                    })
                    .collect(),
            })
            .collect();
        Self { segments }
    }
}

/// `(price/reference)^(-|e|)`, clamped.
pub fn price_factor(price_level: f64, reference: f64, elasticity: f64) -> f64 {
    let reference = if reference > 0.0 { reference } else { 1.0 };
    let price = finite_or(price_level, reference).max(EPS);
    let f = (price / reference).powf(-finite_or(elasticity, -1.0).abs());
    finite_or(f, 1.0).clamp(0.2, 3.0)
}

fn ln_pos(v: f64) -> f64 {
    finite_or(v, EPS).max(EPS).ln()
}

pub fn allocate_segments(
    input: &SegmentAllocationInput,
    effective_demand: f64,
    competitors: &[SegmentCompetitor],
    cfg: &MarketConfig,
) -> SegmentAllocation {
    let by_id: BTreeMap<&CompanyId, &SegmentCompetitor> =
        competitors.iter().map(|c| (&c.company_id, c)).collect();
    let mut remaining_cap: BTreeMap<CompanyId, f64> = competitors
        .iter()
        .map(|c| (c.company_id.clone(), finite_or(c.capacity, 0.0).max(0.0)))
        .collect();
    let mut sold: BTreeMap<CompanyId, f64> = competitors
        .iter()
        .map(|c| (c.company_id.clone(), 0.0))
        .collect();
    let mut results = Vec::with_capacity(input.segments.len());
    let total_demand = finite_or(effective_demand, 0.0).max(0.0);

    for seg in &input.segments {
        let demand = total_demand * finite_or(seg.demand_share, 0.0).max(0.0);
        let mut remaining = demand;
        let mut rounds = 0;
        let mut excluded: BTreeSet<&CompanyId> = BTreeSet::new();

        let max_rounds = cfg.max_segment_rounds.min(MAX_SEGMENT_ROUNDS);
        while rounds < max_rounds && remaining > EPS {
            let eligible: Vec<(&SegmentOffer, &SegmentCompetitor)> = seg
                .offers
                .iter()
                .filter(|o| o.eligible && !excluded.contains(&o.company_id))
                .filter_map(|o| by_id.get(&o.company_id).map(|c| (o, *c)))
                .filter(|(o, _)| remaining_cap.get(&o.company_id).copied().unwrap_or(0.0) > EPS)
                .collect();
            if eligible.is_empty() {
                break;
            }
            rounds += 1;

            let fair_slice = remaining / eligible.len() as f64;
            let scores: Vec<f64> = eligible
                .iter()
                .map(|(o, c)| {
                    let cap = remaining_cap.get(&o.company_id).copied().unwrap_or(0.0);
                    let cap_avail = (cap / fair_slice.max(EPS)).clamp(0.05, 1.0);
                    let reach = c.marketing_score * (0.5 + 0.5 * c.awareness.clamp(0.0, 1.0)) * seg.reach;
                    cfg.segment_price_weight
                        * ln_pos(price_factor(o.price_level, seg.reference_price_level, seg.price_elasticity))
                        + cfg.segment_quality_weight * ln_pos(c.quality)
                        + cfg.segment_marketing_weight * ln_pos(reach)
                        + cfg.segment_reputation_weight * ln_pos(c.reputation_score)
                        + cfg.segment_capacity_weight * ln_pos(cap_avail)
                        + ln_pos(c.demand)
                })
                .collect();
            let shares = softmax(&scores, cfg.temperature);

            let mut delivered = 0.0;
            let pool = remaining;
            for ((o, _), share) in eligible.iter().zip(shares) {
                let cap = remaining_cap.entry(o.company_id.clone()).or_insert(0.0);
                let give = (pool * share).min(*cap).max(0.0);
                *cap -= give;
                *sold.entry(o.company_id.clone()).or_insert(0.0) += give;
                delivered += give;
                if *cap <= EPS {
                    excluded.insert(&o.company_id);
                }
            }
            remaining = (remaining - delivered).max(0.0);
            if delivered <= EPS {
                break;
            }
        }

        results.push(SegmentResult {
            id: seg.id.clone(),
            demand,
            delivered: demand - remaining,
            rounds,
        });
    }

    SegmentAllocation {
        sold,
        segments: results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn competitor(id: &str, capacity: f64) -> SegmentCompetitor {
        SegmentCompetitor {
            company_id: CompanyId::from(id),
            capacity,
            quality: 1.0,
            marketing_score: 1.0,
            awareness: 0.5,
            reputation_score: 1.0,
            demand: 1.0,
        }
    }

    fn segment(offers: &[(&str, f64)]) -> SegmentInput {
        SegmentInput {
            id: "mass".into(),
            demand_share: 1.0,
            reference_price_level: 1.0,
            price_elasticity: -1.5,
            reach: 1.0,
            offers: offers
                .iter()
                .map(|(id, p)| SegmentOffer {
                    company_id: CompanyId::from(*id),
                    price_level: *p,
                    eligible: true,
                })
                .collect(),
        }
    }

    #[test]
    fn saturated_company_reflows_demand() {
        let input = SegmentAllocationInput {
            segments: vec![segment(&[("cheap", 0.6), ("dear", 1.2)])],
        };
        let comps = [competitor("cheap", 50.0), competitor("dear", 1000.0)];
        let out = allocate_segments(&input, 400.0, &comps, &MarketConfig::default());
        let cheap = out.sold[&CompanyId::from("cheap")];
        let dear = out.sold[&CompanyId::from("dear")];
        assert!(cheap <= 50.0 + 1e-9);
        assert!((cheap - 50.0).abs() < 1e-6);
        assert!((cheap + dear - 400.0).abs() < 1e-6);
        assert!(out.segments[0].rounds <= 4);
    }

    #[test]
    fn ineligible_companies_get_nothing() {
        let mut seg = segment(&[("a", 1.0), ("b", 1.0)]);
        seg.offers[1].eligible = false;
        let input = SegmentAllocationInput { segments: vec![seg] };
        let comps = [competitor("a", 1000.0), competitor("b", 1000.0)];
        let out = allocate_segments(&input, 100.0, &comps, &MarketConfig::default());
        assert_eq!(out.sold[&CompanyId::from("b")], 0.0);
        assert!((out.sold[&CompanyId::from("a")] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn capacity_shared_across_segments() {
        let mut premium = segment(&[("a", 1.0)]);
        premium.id = "premium".into();
        premium.demand_share = 0.5;
        let mut mass = segment(&[("a", 1.0)]);
        mass.demand_share = 0.5;
        let input = SegmentAllocationInput {
            segments: vec![premium, mass],
        };
        let out = allocate_segments(&input, 200.0, &[competitor("a", 120.0)], &MarketConfig::default());
        assert!((out.sold[&CompanyId::from("a")] - 120.0).abs() < 1e-9);
        assert!((out.segments[0].delivered - 100.0).abs() < 1e-9);
        assert!((out.segments[1].delivered - 20.0).abs() < 1e-9);
    }

    #[test]
    fn demand_modifier_pulls_share() {
        let input = SegmentAllocationInput {
            segments: vec![segment(&[("plain", 1.0), ("viral", 1.0)])],
        };
        let mut viral = competitor("viral", 1000.0);
        viral.demand = 3.0;
        let comps = [competitor("plain", 1000.0), viral];
        let out = allocate_segments(&input, 400.0, &comps, &MarketConfig::default());
        let plain = out.sold[&CompanyId::from("plain")];
        let viral = out.sold[&CompanyId::from("viral")];
        assert!(viral > plain * 1.5, "viral {viral} plain {plain}");
        assert!((plain + viral - 400.0).abs() < 1e-6);
    }

    #[test]
    fn rounds_never_exceed_ceiling() {
        let input = SegmentAllocationInput {
            segments: vec![segment(&[("a", 0.5), ("b", 0.6), ("c", 0.7), ("d", 0.8), ("e", 2.0)])],
        };
        let comps = [
            competitor("a", 10.0),
            competitor("b", 10.0),
            competitor("c", 10.0),
            competitor("d", 10.0),
            competitor("e", 10_000.0),
        ];
        let cfg = MarketConfig { max_segment_rounds: 12, ..MarketConfig::default() };
        let out = allocate_segments(&input, 5_000.0, &comps, &cfg);
        assert!(out.segments[0].rounds <= MAX_SEGMENT_ROUNDS);
    }

    #[test]
    fn price_factor_direction() {
        assert!(price_factor(0.8, 1.0, -1.5) > 1.0);
        assert!(price_factor(1.2, 1.0, -1.5) < 1.0);
        assert_eq!(price_factor(100.0, 1.0, -3.0), 0.2);
    }

    proptest! {
        #[test]
        fn never_over_delivers(
            demand in 0.0f64..10_000.0,
            caps in proptest::collection::vec(0.0f64..3_000.0, 1..6),
            prices in proptest::collection::vec(0.4f64..2.5, 6),
        ) {
            let names: Vec<String> = (0..caps.len()).map(|i| format!("c{i}")).collect();
            let offers: Vec<(&str, f64)> = names.iter().zip(&prices).map(|(n, p)| (n.as_str(), *p)).collect();
            let input = SegmentAllocationInput { segments: vec![segment(&offers)] };
            let comps: Vec<SegmentCompetitor> = names.iter().zip(&caps).map(|(n, c)| competitor(n, *c)).collect();
            let out = allocate_segments(&input, demand, &comps, &MarketConfig::default());
            let total: f64 = out.sold.values().sum();
            prop_assert!(total <= demand + 1e-6);
            prop_assert!(out.segments[0].rounds <= 4);
            for (c, cap) in comps.iter().zip(&caps) {
                prop_assert!(out.sold[&c.company_id] <= cap + 1e-9);
            }
        }
    }
}
