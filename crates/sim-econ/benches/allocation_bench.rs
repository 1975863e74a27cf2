use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sim_core::{
    BotPressure, Company, CompanyId, CompanyState, CompanyStatus, CompetitionType, EffectModifiers,
    EngineConfig, GameWeek, HoldingId, Niche, NicheId, NicheSegment, SectorId, WorldEconomyState,
    WorldId,
};
use sim_econ::{run_company_group, CompanyGroupInput, CompanyInput, SegmentAllocationInput};

fn niche() -> Niche {
    Niche {
        id: NicheId::from("bakery"),
        sector_id: SectorId::from("food"),
        name: "Bakery".into(),
        base_demand: 20_000.0,
        seasonality: [1.0; 12],
        base_price: 6.0,
        unit_cost: 2.0,
        fixed_cost_weekly: 800.0,
        base_wage: 550.0,
        labour_intensity: 0.6,
        skill_intensity: 0.3,
        energy_intensity: 0.4,
        price_elasticity: -1.4,
        volatility: 0.08,
        competition: CompetitionType::Fragmented,
        initial_capacity: 400.0,
        segments: vec![
            NicheSegment {
                id: "value".into(),
                demand_share: 0.7,
                reference_price_level: 0.9,
                price_elasticity: -1.8,
                min_quality: 0.0,
                reach: 1.0,
            },
            NicheSegment {
                id: "artisan".into(),
                demand_share: 0.3,
                reference_price_level: 1.4,
                price_elasticity: -0.7,
                min_quality: 1.2,
                reach: 0.7,
            },
        ],
    }
}

fn bench_groups(c: &mut Criterion) {
    let n = niche();
    let week = GameWeek::new(2030, 1);
    let economy = WorldEconomyState::new(WorldId::from("bench"), week);
    let pressure = BotPressure::neutral();
    let cfg = EngineConfig::default();
    let companies: Vec<Company> = (0..64)
        .map(|i| Company {
            id: CompanyId::new(format!("c{i}")),
            world_id: WorldId::from("bench"),
            holding_id: HoldingId::new(format!("h{}", i % 8)),
            sector_id: n.sector_id.clone(),
            niche_id: n.id.clone(),
            name: format!("Bakery {i}"),
            status: CompanyStatus::Active,
        })
        .collect();
    let states: Vec<CompanyState> = companies
        .iter()
        .enumerate()
        .map(|(i, c)| CompanyState {
            price_level: 0.7 + (i % 9) as f64 * 0.1,
            quality: 0.8 + (i % 5) as f64 * 0.15,
            marketing_spend: (i % 4) as f64 * 250.0,
            ..CompanyState::initial(c.id.clone(), &n, week)
        })
        .collect();
    let inputs: Vec<CompanyInput<'_>> = companies
        .iter()
        .zip(&states)
        .map(|(company, state)| CompanyInput {
            company,
            state,
            modifiers: EffectModifiers::identity(),
            extra_opex: 0.0,
        })
        .collect();
    let offers: Vec<(CompanyId, f64, f64)> = states
        .iter()
        .map(|s| (s.company_id.clone(), s.price_level, s.quality))
        .collect();

    let simple = CompanyGroupInput {
        niche: &n,
        economy: &economy,
        week,
        sector_demand: n.base_demand,
        pressure: &pressure,
        companies: inputs.clone(),
        segments: None,
    };
    let segmented = CompanyGroupInput {
        segments: Some(SegmentAllocationInput::from_niche(&n, &offers)),
        ..simple.clone()
    };

    c.bench_function("simple allocation 64 companies", |b| {
        b.iter(|| black_box(run_company_group(black_box(&simple), &cfg)))
    });
    c.bench_function("segment allocation 64 companies", |b| {
        b.iter(|| black_box(run_company_group(black_box(&segmented), &cfg)))
    });
}

criterion_group!(benches, bench_groups);
criterion_main!(benches);
