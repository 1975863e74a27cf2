#![allow(dead_code)]

mod interleaved;

pub use interleaved::InterleavedStore;

use chrono::{DateTime, TimeZone, Utc};
use persistence::{MemoryStore, WorldSnapshot, WorldStore};
use sim_core::{EngineConfig, WorldId};
use sim_runtime::TickOrchestrator;
use std::sync::Arc;

/// One player holding and one bot holding competing in two niches.
pub const WORLD: &str = r#"
world:
  id: w1
  name: Harbour Town
  mode: MULTIPLAYER
  status: ACTIVE
  round_interval_secs: 3600
economy:
  world_id: w1
  current: { year: 2030, week: 1 }
  interest_rate: 0.05
  inflation: 0.02
  wage_index: 1.0
sectors:
  - { id: auto, name: Automotive }
  - { id: food, name: Food }
niches:
  - id: car-wash
    sector_id: auto
    name: Car Wash
    base_demand: 900
    base_price: 20
    unit_cost: 8
    fixed_cost_weekly: 400
  - id: bakery
    sector_id: food
    name: Bakery
    base_demand: 1500
    base_price: 6
    unit_cost: 2
    fixed_cost_weekly: 300
    segments:
      - { id: budget, demand_share: 0.6, reference_price_level: 0.9, price_elasticity: -2.0 }
      - { id: premium, demand_share: 0.4, reference_price_level: 1.3, price_elasticity: -0.6, min_quality: 0.8 }
niche_upgrades:
  - id: u1
    niche_id: car-wash
    code: TUNNEL
    name: Tunnel Washer
    capex: { base: 50000, per_capacity: 100 }
    weekly_opex: { base: 150 }
    delay_weeks: [2, 3]
    effects:
      - { target: CAPACITY, min: 1.2, max: 1.4 }
  - id: u2
    niche_id: car-wash
    code: SIGNAGE
    name: Roadside Signage
    capex: { base: 500 }
    delay_weeks: [0, 0]
    effects:
      - { target: MARKETING, min: 1.1, max: 1.1 }
players:
  - { id: p1, name: Ada }
bots:
  - { id: b1, world_id: w1, archetype: DISCOUNTER, aggressiveness: 0.7, risk_tolerance: 0.4 }
holdings:
  - id: h1
    world_id: w1
    name: Ada Holdings
    owner: { kind: PLAYER, id: p1 }
    cash: "20000"
    total_equity: "10000"
    total_debt: "10000"
    prestige_level: 1
  - id: h2
    world_id: w1
    name: Budget Group
    owner: { kind: BOT, id: b1 }
    cash: "15000"
    total_equity: "15000"
    total_debt: "0"
    prestige_level: 1
companies:
  - { id: c1, world_id: w1, holding_id: h1, sector_id: auto, niche_id: car-wash, name: Sparkle, status: ACTIVE }
  - { id: c2, world_id: w1, holding_id: h2, sector_id: auto, niche_id: car-wash, name: QuickWash, status: ACTIVE }
  - { id: c3, world_id: w1, holding_id: h1, sector_id: food, niche_id: bakery, name: Crumb, status: ACTIVE }
  - { id: c4, world_id: w1, holding_id: h2, sector_id: food, niche_id: bakery, name: LoafCo, status: ACTIVE }
loans:
  - id: l1
    world_id: w1
    owner: { kind: HOLDING, id: h1 }
    principal: "10000"
    outstanding: "10000"
    annual_rate: "0.12"
    term_weeks: 52
    remaining_weeks: 52
    start: { year: 2029, week: 52 }
    status: ACTIVE
"#;

pub fn world_id() -> WorldId {
    WorldId::from("w1")
}

pub fn snapshot() -> WorldSnapshot {
    WorldSnapshot::from_yaml_str(WORLD).unwrap()
}

pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 7, 12, 0, 0).unwrap()
}

pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_snapshot(snapshot()))
}

pub fn orchestrator_with(store: Arc<dyn WorldStore>, config: EngineConfig) -> TickOrchestrator {
    TickOrchestrator::new(store, config).unwrap().with_clock(noon)
}

pub fn orchestrator(store: Arc<dyn WorldStore>) -> TickOrchestrator {
    orchestrator_with(store, EngineConfig::default())
}
