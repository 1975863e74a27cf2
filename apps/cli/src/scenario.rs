//! Seeded demo world for headless runs without a scenario file.

use persistence::WorldSnapshot;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use sim_core::{
    Bot, BotArchetype, BotId, Company, CompanyId, CompanyStatus, CompetitionType, CostFormula,
    GameWeek, Holding, HoldingId, HoldingOwner, ModifierTarget, Niche, NicheId, NicheSegment,
    NicheUpgrade, Player, PlayerId, ReputationTrack, Sector, SectorId, UpgradeEffect, UpgradeId,
    UpgradeRisk, World, WorldEconomyState, WorldId, WorldMode, WorldStatus,
};

struct NicheTemplate {
    id: &'static str,
    sector: &'static str,
    name: &'static str,
    demand: f64,
    price: f64,
    unit_cost: f64,
    fixed: f64,
    competition: CompetitionType,
}

const SECTORS: [(&str, &str); 3] = [
    ("auto", "Automotive"),
    ("food", "Food & Drink"),
    ("services", "Local Services"),
];

const NICHES: [NicheTemplate; 5] = [
    NicheTemplate {
        id: "car-wash",
        sector: "auto",
        name: "Car Wash",
        demand: 900.0,
        price: 20.0,
        unit_cost: 8.0,
        fixed: 400.0,
        competition: CompetitionType::Fragmented,
    },
    NicheTemplate {
        id: "tyre-shop",
        sector: "auto",
        name: "Tyre Shop",
        demand: 250.0,
        price: 90.0,
        unit_cost: 55.0,
        fixed: 900.0,
        competition: CompetitionType::Moderate,
    },
    NicheTemplate {
        id: "bakery",
        sector: "food",
        name: "Bakery",
        demand: 1_500.0,
        price: 6.0,
        unit_cost: 2.0,
        fixed: 300.0,
        competition: CompetitionType::Fragmented,
    },
    NicheTemplate {
        id: "coffee",
        sector: "food",
        name: "Coffee Bar",
        demand: 2_200.0,
        price: 4.0,
        unit_cost: 1.2,
        fixed: 500.0,
        competition: CompetitionType::Concentrated,
    },
    NicheTemplate {
        id: "gym",
        sector: "services",
        name: "Gym",
        demand: 400.0,
        price: 35.0,
        unit_cost: 6.0,
        fixed: 1_500.0,
        competition: CompetitionType::Moderate,
    },
];

const ARCHETYPES: [BotArchetype; 4] = [
    BotArchetype::Discounter,
    BotArchetype::Premium,
    BotArchetype::Balanced,
    BotArchetype::Expansionist,
];

fn niche(t: &NicheTemplate, rng: &mut ChaCha8Rng) -> Niche {
    let mut seasonality = [1.0; 12];
    for m in &mut seasonality {
        *m = rng.gen_range(0.85..1.15);
    }
    let segments = if t.id == "coffee" {
        vec![
            NicheSegment {
                id: "commuter".into(),
                demand_share: 0.7,
                reference_price_level: 0.9,
                price_elasticity: -1.8,
                min_quality: 0.0,
                reach: 1.0,
            },
            NicheSegment {
                id: "specialty".into(),
                demand_share: 0.3,
                reference_price_level: 1.4,
                price_elasticity: -0.6,
                min_quality: 0.9,
                reach: 0.8,
            },
        ]
    } else {
        Vec::new()
    };
    Niche {
        id: NicheId::from(t.id),
        sector_id: SectorId::from(t.sector),
        name: t.name.into(),
        base_demand: t.demand * rng.gen_range(0.9..1.1),
        seasonality,
        base_price: t.price,
        unit_cost: t.unit_cost,
        fixed_cost_weekly: t.fixed,
        base_wage: 600.0,
        labour_intensity: rng.gen_range(0.3..0.7),
        skill_intensity: rng.gen_range(0.2..0.6),
        energy_intensity: rng.gen_range(0.0..0.4),
        price_elasticity: rng.gen_range(-1.6..-0.8),
        volatility: rng.gen_range(0.05..0.2),
        competition: t.competition,
        initial_capacity: (t.demand / 6.0).round(),
        segments,
    }
}

fn upgrades() -> Vec<NicheUpgrade> {
    vec![
        NicheUpgrade {
            id: UpgradeId::from("tunnel-washer"),
            niche_id: NicheId::from("car-wash"),
            code: "TUNNEL".into(),
            name: "Tunnel Washer".into(),
            tier: 2,
            capex: CostFormula {
                base: 12_000.0,
                per_capacity: 20.0,
            },
            weekly_opex: CostFormula {
                base: 120.0,
                per_capacity: 0.0,
            },
            delay_weeks: (2, 4),
            effects: vec![UpgradeEffect {
                target: ModifierTarget::Capacity,
                min: 1.2,
                max: 1.5,
            }],
            risks: vec![UpgradeRisk {
                chance: 0.1,
                target: ModifierTarget::ReputationAdd,
                magnitude: -0.03,
            }],
        },
        NicheUpgrade {
            id: UpgradeId::from("espresso-line"),
            niche_id: NicheId::from("coffee"),
            code: "ESPRESSO".into(),
            name: "Second Espresso Line".into(),
            tier: 1,
            capex: CostFormula {
                base: 6_000.0,
                per_capacity: 5.0,
            },
            weekly_opex: CostFormula {
                base: 60.0,
                per_capacity: 0.0,
            },
            delay_weeks: (1, 2),
            effects: vec![
                UpgradeEffect {
                    target: ModifierTarget::Capacity,
                    min: 1.1,
                    max: 1.25,
                },
                UpgradeEffect {
                    target: ModifierTarget::QualityAdd,
                    min: 0.02,
                    max: 0.06,
                },
            ],
            risks: Vec::new(),
        },
    ]
}

/// One player holding plus `bots` bot holdings, each owning two companies
/// in distinct niches.
pub fn demo_world(seed: u64, bots: usize) -> WorldSnapshot {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let world_id = WorldId::from("demo");
    let start = GameWeek::new(2030, 1);

    let niches: Vec<Niche> = NICHES.iter().map(|t| niche(t, &mut rng)).collect();
    let player = Player {
        id: PlayerId::from("player-1"),
        name: "Player One".into(),
        brand: ReputationTrack::default(),
        credit: ReputationTrack::default(),
    };

    let bot_rows: Vec<Bot> = (0..bots)
        .map(|i| Bot {
            id: BotId::new(format!("bot-{}", i + 1)),
            world_id: world_id.clone(),
            archetype: ARCHETYPES[i % ARCHETYPES.len()],
            aggressiveness: rng.gen_range(0.2..0.9),
            risk_tolerance: rng.gen_range(0.2..0.9),
        })
        .collect();
    let owners = std::iter::once(HoldingOwner::Player(player.id.clone()))
        .chain(bot_rows.iter().map(|b| HoldingOwner::Bot(b.id.clone())));

    let mut holdings = Vec::with_capacity(bots + 1);
    for (i, owner) in owners.enumerate() {
        let cash = Decimal::from(rng.gen_range(40..80) * 1_000);
        holdings.push(Holding {
            id: HoldingId::new(format!("h{}", i + 1)),
            world_id: world_id.clone(),
            name: match &owner {
                HoldingOwner::Player(_) => "Player One Holdings".to_string(),
                HoldingOwner::Bot(b) => format!("{b} Group"),
            },
            owner,
            cash,
            total_equity: cash,
            total_debt: Decimal::ZERO,
            prestige_level: 1,
        });
    }

    let mut companies = Vec::new();
    for h in &holdings {
        let first = rng.gen_range(0..niches.len());
        let second = (first + rng.gen_range(1..niches.len())) % niches.len();
        for n in [&niches[first], &niches[second]] {
            companies.push(Company {
                id: CompanyId::new(format!("c{}", companies.len() + 1)),
                world_id: world_id.clone(),
                holding_id: h.id.clone(),
                sector_id: n.sector_id.clone(),
                niche_id: n.id.clone(),
                name: format!("{} {}", h.name.split_whitespace().next().unwrap_or("New"), n.name),
                status: CompanyStatus::Active,
            });
        }
    }

    WorldSnapshot {
        world: World {
            id: world_id.clone(),
            name: "Demo".into(),
            mode: WorldMode::Sandbox,
            status: WorldStatus::Active,
            round_interval_secs: 3_600,
        },
        economy: WorldEconomyState::new(world_id, start),
        sectors: SECTORS
            .iter()
            .map(|(id, name)| Sector {
                id: SectorId::from(*id),
                name: (*name).into(),
            })
            .collect(),
        niches,
        niche_upgrades: upgrades(),
        sector_states: Vec::new(),
        holdings,
        bots: bot_rows,
        players: vec![player],
        companies,
        company_states: Vec::new(),
        financials: Vec::new(),
        loans: Vec::new(),
        programs: Vec::new(),
        company_upgrades: Vec::new(),
        company_decisions: Vec::new(),
        holding_decisions: Vec::new(),
        events: Vec::new(),
        rounds: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_world_is_valid_and_seeded() {
        let a = demo_world(7, 3);
        a.validate().unwrap();
        assert_eq!(a.holdings.len(), 4);
        assert_eq!(a.companies.len(), 8);
        assert!(a
            .companies
            .chunks(2)
            .all(|pair| pair[0].niche_id != pair[1].niche_id));
        let b = demo_world(7, 3);
        assert_eq!(a.to_yaml().unwrap(), b.to_yaml().unwrap());
        assert_ne!(a.to_yaml().unwrap(), demo_world(8, 3).to_yaml().unwrap());
    }
}
