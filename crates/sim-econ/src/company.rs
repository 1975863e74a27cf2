//! Company engine: market allocation, costs and state evolution for one
//! (sector, niche) group of competing companies.

use crate::market::compute_market_shares;
use crate::segment::{allocate_segments, SegmentAllocationInput, SegmentCompetitor};
use sim_core::{
    finite_or, money, BotPressure, Company, CompanyConfig, CompanyFinancials, CompanyId,
    CompanyState, EffectModifiers, EngineConfig, GameWeek, Niche, RefundBracket,
    WorldEconomyState,
};
use std::collections::BTreeMap;

/// One competing company with its decision-applied state.
#[derive(Debug, Clone)]
pub struct CompanyInput<'a> {
    pub company: &'a Company,
    pub state: &'a CompanyState,
    /// Composed program and upgrade effects for this week.
    pub modifiers: EffectModifiers,
    /// Recurring program/upgrade costs charged on top of operating expenses.
    pub extra_opex: f64,
}

#[derive(Debug, Clone)]
pub struct CompanyGroupInput<'a> {
    pub niche: &'a Niche,
    pub economy: &'a WorldEconomyState,
    pub week: GameWeek,
    /// Demand available to this niche before bot pressure.
    pub sector_demand: f64,
    pub pressure: &'a BotPressure,
    pub companies: Vec<CompanyInput<'a>>,
    /// Present when the niche defines demand segments.
    pub segments: Option<SegmentAllocationInput>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompanyResult {
    pub company_id: CompanyId,
    pub next_state: CompanyState,
    pub financials: CompanyFinancials,
    pub utility: f64,
    pub market_share: f64,
    pub sold_volume: f64,
    pub refund_rate: f64,
}

pub fn price_score(price_level: f64) -> f64 {
    1.0 / finite_or(price_level, 1.0).clamp(0.4, 2.5).powf(0.8)
}

pub fn quality_score(quality: f64) -> f64 {
    finite_or(quality, 1.0).clamp(0.1, 3.0)
}

pub fn marketing_score(spend: f64, cfg: &CompanyConfig) -> f64 {
    1.0 + (1.0 + finite_or(spend, 0.0).max(0.0) / cfg.marketing_reference).ln() * cfg.marketing_log_scale
}

pub fn reputation_score(reputation: f64) -> f64 {
    (0.5 + finite_or(reputation, 0.5)).clamp(0.5, 1.5)
}

/// Refund rate for a quality level: linear inside the matching bracket,
/// zero outside every bracket.
pub fn refund_rate(quality: f64, brackets: &[RefundBracket]) -> f64 {
    let q = finite_or(quality, 1.0);
    brackets
        .iter()
        .find(|b| q >= b.quality_min && q < b.quality_max)
        .map(|b| {
            let t = (q - b.quality_min) / (b.quality_max - b.quality_min);
            b.rate_at_min + (b.rate_at_max - b.rate_at_min) * t
        })
        .unwrap_or(0.0)
}

/// Price level after a unit-price override, relative to the niche base price.
pub fn effective_price_level(state: &CompanyState, niche: &Niche) -> f64 {
    match state.unit_price_override {
        Some(unit) if niche.base_price > 0.0 && unit.is_finite() => unit / niche.base_price,
        _ => finite_or(state.price_level, 1.0),
    }
}

pub fn effective_capacity(state: &CompanyState, m: &EffectModifiers) -> f64 {
    (finite_or(state.capacity, 0.0) * m.capacity).max(0.0)
}

pub fn effective_quality(state: &CompanyState, m: &EffectModifiers) -> f64 {
    ((finite_or(state.quality, 1.0) + m.quality_add) * m.quality).max(0.0)
}

fn effective_marketing(state: &CompanyState, m: &EffectModifiers) -> f64 {
    (finite_or(state.marketing_spend, 0.0) * m.marketing).max(0.0)
}

/// Simple-mode utility. Zero when the company has no capacity.
pub fn utility(input: &CompanyInput<'_>, niche: &Niche, cfg: &EngineConfig) -> f64 {
    let m = &input.modifiers;
    if effective_capacity(input.state, m) <= 0.0 {
        return 0.0;
    }
    let k = &cfg.market;
    let elasticity = finite_or(niche.price_elasticity, -1.2).abs();
    let u = price_score(effective_price_level(input.state, niche)).powf(1.0 + elasticity)
        * quality_score(effective_quality(input.state, m)).powf(k.quality_weight)
        * marketing_score(effective_marketing(input.state, m), &cfg.company).powf(k.marketing_weight)
        * reputation_score(input.state.reputation).powf(k.reputation_weight)
        * m.demand;
    finite_or(u, 0.0).max(0.0)
}

/// Resolve one company group for the week.
pub fn run_company_group(input: &CompanyGroupInput<'_>, cfg: &EngineConfig) -> Vec<CompanyResult> {
    if input.companies.is_empty() {
        return Vec::new();
    }
    let niche = input.niche;
    let avg_price = input
        .companies
        .iter()
        .map(|c| effective_price_level(c.state, niche))
        .sum::<f64>()
        / input.companies.len() as f64;
    let effective_demand = (finite_or(input.sector_demand, 0.0).max(0.0)
        * input.pressure.demand_factor()
        * input.pressure.price_demand_factor(avg_price))
    .max(0.0);

    let utilities: Vec<(CompanyId, f64)> = input
        .companies
        .iter()
        .map(|c| (c.company.id.clone(), utility(c, niche, cfg)))
        .collect();

    let (shares, sold): (BTreeMap<CompanyId, f64>, BTreeMap<CompanyId, f64>) = match &input.segments {
        None => {
            let positive: Vec<(CompanyId, f64)> =
                utilities.iter().filter(|(_, u)| *u > 0.0).cloned().collect();
            let shares = compute_market_shares(&positive, &cfg.market);
            let sold = input
                .companies
                .iter()
                .map(|c| {
                    let share = shares.get(&c.company.id).copied().unwrap_or(0.0);
                    let cap = effective_capacity(c.state, &c.modifiers);
                    (c.company.id.clone(), (share * effective_demand).min(cap))
                })
                .collect();
            (shares, sold)
        }
        Some(segments) => {
            let competitors: Vec<SegmentCompetitor> = input
                .companies
                .iter()
                .map(|c| SegmentCompetitor {
                    company_id: c.company.id.clone(),
                    capacity: effective_capacity(c.state, &c.modifiers),
                    quality: effective_quality(c.state, &c.modifiers),
                    marketing_score: marketing_score(effective_marketing(c.state, &c.modifiers), &cfg.company),
                    awareness: c.state.awareness,
                    reputation_score: reputation_score(c.state.reputation),
                    demand: c.modifiers.demand,
                })
                .collect();
            let allocation = allocate_segments(segments, effective_demand, &competitors, &cfg.market);
            let total: f64 = allocation.sold.values().sum();
            let shares = allocation
                .sold
                .iter()
                .map(|(id, v)| (id.clone(), if total > 0.0 { v / total } else { 0.0 }))
                .collect();
            (shares, allocation.sold)
        }
    };

    let results: Vec<CompanyResult> = input
        .companies
        .iter()
        .zip(utilities)
        .map(|(c, (_, u))| {
            let share = shares.get(&c.company.id).copied().unwrap_or(0.0);
            let volume = sold.get(&c.company.id).copied().unwrap_or(0.0);
            resolve_company(c, input, cfg, u, share, volume)
        })
        .collect();

    tracing::debug!(
        niche = %niche.id,
        companies = results.len(),
        effective_demand,
        sold = results.iter().map(|r| r.sold_volume).sum::<f64>(),
        "company group resolved"
    );
    results
}

fn resolve_company(
    c: &CompanyInput<'_>,
    group: &CompanyGroupInput<'_>,
    cfg: &EngineConfig,
    utility: f64,
    share: f64,
    sold: f64,
) -> CompanyResult {
    let k = &cfg.company;
    let m = &c.modifiers;
    let s = c.state;
    let niche = group.niche;
    let econ = group.economy;

    let capacity = effective_capacity(s, m);
    let quality = effective_quality(s, m);
    let marketing_eff = effective_marketing(s, m);
    let sold = finite_or(sold, 0.0).clamp(0.0, capacity);

    let unit_price = match s.unit_price_override {
        Some(unit) if unit.is_finite() => unit.max(0.0),
        _ => niche.base_price * finite_or(s.price_level, 1.0),
    };
    let inflation = 1.0 + finite_or(econ.inflation, 0.0) * k.inflation_pass_through;
    let energy = 1.0 + (finite_or(econ.modifiers.energy_cost_factor, 1.0) - 1.0) * niche.energy_intensity;
    let efficiency = (1.0
        + (k.efficiency_pivot - finite_or(s.operational_efficiency, 0.5)) * k.efficiency_cost_slope)
        .clamp(k.efficiency_cost_min, k.efficiency_cost_max);

    let unit_variable = finite_or(s.variable_cost_base, niche.unit_cost) * inflation * energy * m.variable_cost * efficiency;
    let fixed = finite_or(s.fixed_cost_base, niche.fixed_cost_weekly) * inflation * m.fixed_cost * efficiency;
    let labour = f64::from(s.employees)
        * niche.base_wage
        * finite_or(econ.wage_index, 1.0)
        * (0.5 + niche.labour_intensity)
        * (1.0 + niche.skill_intensity * 0.5)
        * m.labour_cost;
    let marketing = finite_or(s.marketing_spend, 0.0).max(0.0);
    let opex = fixed + labour + marketing + finite_or(c.extra_opex, 0.0).max(0.0);

    let gross = sold * unit_price;
    let refund = refund_rate(quality, &k.refund_brackets);
    let refunds = gross * refund;
    let revenue = gross - refunds;
    let cogs = sold * unit_variable;
    let profit = revenue - cogs - opex;

    let utilisation = if capacity > 0.0 { (sold / capacity).clamp(0.0, 1.0) } else { 0.0 };
    let margin = if revenue > 0.0 {
        (profit / revenue).clamp(-1.0, 1.0)
    } else if profit < 0.0 {
        -1.0
    } else {
        0.0
    };

    let awareness_gain = ((1.0 + marketing_eff / k.marketing_reference).ln() * k.awareness_gain)
        .min(k.awareness_max_drift);
    let awareness = finite_or(s.awareness, 0.1);
    let awareness = (awareness + awareness_gain - k.awareness_decay * awareness + m.awareness_add).clamp(0.0, 1.0);

    let reputation = finite_or(s.reputation, 0.5);
    let target = (0.5 + 0.5 * margin).clamp(0.1, 0.9);
    let step = ((target - reputation) * k.reputation_smoothing)
        .clamp(-k.reputation_max_step, k.reputation_max_step);
    let review = ((quality - 1.0) * k.review_quality_weight - refund * k.review_refund_weight)
        .clamp(-k.review_cap, k.review_cap);
    let reputation = (reputation + step + review + m.reputation_add).clamp(0.0, 1.0);

    let eff = finite_or(s.operational_efficiency, 0.5);
    let eff_step = ((utilisation - eff) * k.efficiency_smoothing)
        .clamp(-k.efficiency_max_step, k.efficiency_max_step);
    let operational_efficiency = (eff + eff_step + m.efficiency_add).clamp(0.0, 1.0);

    let next_state = CompanyState {
        week: group.week,
        awareness,
        reputation,
        operational_efficiency,
        utilisation,
        ..s.clone()
    };

    let profit_before_tax = money(profit);
    let financials = CompanyFinancials {
        sold_volume: sold,
        market_share: share,
        revenue: money(revenue),
        refunds: money(refunds),
        cogs: money(cogs),
        opex: money(opex),
        profit_before_tax,
        net_profit: profit_before_tax,
        cash_change: profit_before_tax,
        ..CompanyFinancials::empty(c.company.id.clone(), group.week)
    };

    CompanyResult {
        company_id: c.company.id.clone(),
        next_state,
        financials,
        utility,
        market_share: share,
        sold_volume: sold,
        refund_rate: refund,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use sim_core::{
        CompanyStatus, CompetitionType, HoldingId, NicheId, NicheSegment, SectorId, WorldId,
    };

    fn niche() -> Niche {
        Niche {
            id: NicheId::from("car-wash"),
            sector_id: SectorId::from("auto"),
            name: "Car Wash".into(),
            base_demand: 800.0,
            seasonality: [1.0; 12],
            base_price: 20.0,
            unit_cost: 8.0,
            fixed_cost_weekly: 500.0,
            base_wage: 600.0,
            labour_intensity: 0.5,
            skill_intensity: 0.5,
            energy_intensity: 0.2,
            price_elasticity: -1.2,
            volatility: 0.1,
            competition: CompetitionType::Moderate,
            initial_capacity: 100.0,
            segments: vec![],
        }
    }

    fn company(id: &str) -> Company {
        Company {
            id: CompanyId::from(id),
            world_id: WorldId::from("w1"),
            holding_id: HoldingId::from("h1"),
            sector_id: SectorId::from("auto"),
            niche_id: NicheId::from("car-wash"),
            name: id.into(),
            status: CompanyStatus::Active,
        }
    }

    fn economy() -> WorldEconomyState {
        WorldEconomyState::new(WorldId::from("w1"), GameWeek::new(2030, 1))
    }

    fn group<'a>(
        niche: &'a Niche,
        economy: &'a WorldEconomyState,
        pressure: &'a BotPressure,
        companies: Vec<CompanyInput<'a>>,
    ) -> CompanyGroupInput<'a> {
        CompanyGroupInput {
            niche,
            economy,
            week: GameWeek::new(2030, 1),
            sector_demand: 800.0,
            pressure,
            companies,
            segments: None,
        }
    }

    fn input<'a>(company: &'a Company, state: &'a CompanyState) -> CompanyInput<'a> {
        CompanyInput {
            company,
            state,
            modifiers: EffectModifiers::identity(),
            extra_opex: 0.0,
        }
    }

    #[test]
    fn single_company_takes_the_market() {
        let n = niche();
        let e = economy();
        let p = BotPressure::neutral();
        let c = company("a");
        let s = CompanyState::initial(c.id.clone(), &n, GameWeek::new(2030, 1));
        let out = run_company_group(&group(&n, &e, &p, vec![input(&c, &s)]), &EngineConfig::default());
        assert_eq!(out.len(), 1);
        let r = &out[0];
        assert!(r.utility > 0.0);
        assert!((r.market_share - 1.0).abs() < 1e-12);
        assert_eq!(r.sold_volume, 100.0);
        assert_eq!(r.financials.revenue, Decimal::new(2000, 0));
        assert!((r.next_state.utilisation - 1.0).abs() < 1e-12);
    }

    #[test]
    fn identical_companies_split_evenly() {
        let n = niche();
        let e = economy();
        let p = BotPressure::neutral();
        let (a, b) = (company("a"), company("b"));
        let sa = CompanyState::initial(a.id.clone(), &n, GameWeek::new(2030, 1));
        let sb = CompanyState::initial(b.id.clone(), &n, GameWeek::new(2030, 1));
        let mut g = group(&n, &e, &p, vec![input(&a, &sa), input(&b, &sb)]);
        g.sector_demand = 120.0;
        let out = run_company_group(&g, &EngineConfig::default());
        assert!((out[0].market_share - 0.5).abs() < 1e-12);
        assert!((out[1].market_share - 0.5).abs() < 1e-12);
        assert!((out[0].sold_volume - 60.0).abs() < 1e-9);
        assert_eq!(out[0].financials, CompanyFinancials { company_id: a.id.clone(), ..out[1].financials.clone() });
    }

    #[test]
    fn zero_capacity_sells_nothing() {
        let n = niche();
        let e = economy();
        let p = BotPressure::neutral();
        let (a, b) = (company("a"), company("b"));
        let mut sa = CompanyState::initial(a.id.clone(), &n, GameWeek::new(2030, 1));
        sa.capacity = 0.0;
        let sb = CompanyState::initial(b.id.clone(), &n, GameWeek::new(2030, 1));
        let out = run_company_group(&group(&n, &e, &p, vec![input(&a, &sa), input(&b, &sb)]), &EngineConfig::default());
        assert_eq!(out[0].utility, 0.0);
        assert_eq!(out[0].sold_volume, 0.0);
        assert_eq!(out[0].next_state.utilisation, 0.0);
        assert!((out[1].market_share - 1.0).abs() < 1e-12);
    }

    #[test]
    fn modifiers_scale_capacity_and_costs() {
        let n = niche();
        let e = economy();
        let p = BotPressure::neutral();
        let c = company("a");
        let s = CompanyState::initial(c.id.clone(), &n, GameWeek::new(2030, 1));
        let mut boosted = input(&c, &s);
        boosted.modifiers = EffectModifiers {
            capacity: 1.5,
            labour_cost: 0.5,
            ..EffectModifiers::identity()
        };
        boosted.extra_opex = 250.0;
        let base = run_company_group(&group(&n, &e, &p, vec![input(&c, &s)]), &EngineConfig::default());
        let out = run_company_group(&group(&n, &e, &p, vec![boosted]), &EngineConfig::default());
        assert_eq!(out[0].sold_volume, 150.0);
        assert_ne!(out[0].financials.opex, base[0].financials.opex);
    }

    #[test]
    fn refund_brackets_interpolate() {
        let cfg = CompanyConfig::default();
        assert!((refund_rate(0.0, &cfg.refund_brackets) - 0.15).abs() < 1e-12);
        assert!((refund_rate(0.7, &cfg.refund_brackets) - 0.05).abs() < 1e-12);
        assert_eq!(refund_rate(1.0, &cfg.refund_brackets), 0.0);
    }

    #[test]
    fn losses_erode_reputation_within_step() {
        let n = niche();
        let e = economy();
        let p = BotPressure::neutral();
        let c = company("a");
        let mut s = CompanyState::initial(c.id.clone(), &n, GameWeek::new(2030, 1));
        s.employees = 200;
        let out = run_company_group(&group(&n, &e, &p, vec![input(&c, &s)]), &EngineConfig::default());
        let delta = out[0].next_state.reputation - s.reputation;
        assert!(delta < 0.0);
        assert!(delta >= -0.03 - 1e-12);
    }

    #[test]
    fn segment_mode_respects_eligibility() {
        let mut n = niche();
        n.segments = vec![
            NicheSegment {
                id: "budget".into(),
                demand_share: 0.6,
                reference_price_level: 0.8,
                price_elasticity: -2.0,
                min_quality: 0.0,
                reach: 1.0,
            },
            NicheSegment {
                id: "premium".into(),
                demand_share: 0.4,
                reference_price_level: 1.3,
                price_elasticity: -0.6,
                min_quality: 1.5,
                reach: 0.8,
            },
        ];
        let e = economy();
        let p = BotPressure::neutral();
        let (a, b) = (company("a"), company("b"));
        let sa = CompanyState::initial(a.id.clone(), &n, GameWeek::new(2030, 1));
        let mut sb = CompanyState::initial(b.id.clone(), &n, GameWeek::new(2030, 1));
        sb.quality = 2.0;
        sb.capacity = 1000.0;
        let mut g = group(&n, &e, &p, vec![input(&a, &sa), input(&b, &sb)]);
        g.segments = Some(SegmentAllocationInput::from_niche(
            &n,
            &[(a.id.clone(), 1.0, 1.0), (b.id.clone(), 1.0, 2.0)],
        ));
        let out = run_company_group(&g, &EngineConfig::default());
        // Only b serves the premium segment; a is capped by its capacity.
        assert!(out[0].sold_volume <= 100.0 + 1e-9);
        assert!(out[1].sold_volume >= 800.0 * 0.4 - 1e-6);
        let total: f64 = out.iter().map(|r| r.sold_volume).sum();
        assert!(total <= 800.0 + 1e-6);
    }

    #[test]
    fn segment_mode_honours_demand_modifier() {
        let mut n = niche();
        n.segments = vec![NicheSegment {
            id: "mass".into(),
            demand_share: 1.0,
            reference_price_level: 1.0,
            price_elasticity: -1.2,
            min_quality: 0.0,
            reach: 1.0,
        }];
        let e = economy();
        let p = BotPressure::neutral();
        let (a, b) = (company("a"), company("b"));
        let sa = CompanyState { capacity: 1000.0, ..CompanyState::initial(a.id.clone(), &n, GameWeek::new(2030, 1)) };
        let sb = CompanyState { capacity: 1000.0, ..CompanyState::initial(b.id.clone(), &n, GameWeek::new(2030, 1)) };
        let run = |demand: f64| {
            let mut boosted = input(&a, &sa);
            boosted.modifiers = EffectModifiers { demand, ..EffectModifiers::identity() };
            let mut g = group(&n, &e, &p, vec![boosted, input(&b, &sb)]);
            g.segments = Some(SegmentAllocationInput::from_niche(
                &n,
                &[(a.id.clone(), 1.0, 1.0), (b.id.clone(), 1.0, 1.0)],
            ));
            run_company_group(&g, &EngineConfig::default())
        };
        let base = run(1.0);
        let boosted = run(3.0);
        assert!((base[0].sold_volume - base[1].sold_volume).abs() < 1e-6);
        assert!(boosted[0].sold_volume > base[0].sold_volume + 1.0);
        assert!(boosted[0].market_share > boosted[1].market_share);
    }

    proptest! {
        #[test]
        fn never_sells_beyond_capacity(
            demand in 0.0f64..50_000.0,
            caps in proptest::collection::vec(0.0f64..2_000.0, 1..5),
            price in 0.3f64..3.0,
            cap_mod in 0.0f64..2.0,
            competition in 0.0f64..1.0,
            noise in -0.3f64..0.3,
        ) {
            let n = niche();
            let e = economy();
            let p = BotPressure { competition_pressure: competition, demand_noise: noise, ..BotPressure::neutral() };
            let companies: Vec<Company> = (0..caps.len()).map(|i| company(&format!("c{i}"))).collect();
            let states: Vec<CompanyState> = companies
                .iter()
                .zip(&caps)
                .map(|(c, cap)| CompanyState { capacity: *cap, price_level: price, ..CompanyState::initial(c.id.clone(), &n, GameWeek::new(2030, 1)) })
                .collect();
            let inputs = companies
                .iter()
                .zip(&states)
                .map(|(c, s)| CompanyInput { modifiers: EffectModifiers { capacity: cap_mod, ..EffectModifiers::identity() }, ..input(c, s) })
                .collect();
            let mut g = group(&n, &e, &p, inputs);
            g.sector_demand = demand;
            let out = run_company_group(&g, &EngineConfig::default());
            for (r, cap) in out.iter().zip(&caps) {
                prop_assert!(r.sold_volume <= cap * cap_mod + 1e-9);
                prop_assert!((0.0..=1.0).contains(&r.next_state.reputation));
                prop_assert!((0.0..=1.0).contains(&r.next_state.awareness));
            }
        }
    }
}
