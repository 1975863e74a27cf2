#![deny(warnings)]

//! Persistence for worlds, rounds and decisions.
//!
//! [`WorldStore`] is the seam the tick runtime talks to. Two backends ship:
//! [`MemoryStore`] for tests and single-process runs, and [`SqliteStore`]
//! which keeps JSON documents in SQLite with the per-world tick lock held in
//! plain columns. [`WorldSnapshot`] seeds either one from YAML.

pub mod error;
pub mod memory;
pub mod snapshot;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use snapshot::WorldSnapshot;
pub use sqlite::SqliteStore;
pub use store::{TickCommit, WorldStore};

/// Returns the default SQLite URL used for local saves.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/main.db"
}

#[cfg(test)]
pub(crate) mod test_support {
    pub(crate) const TINY: &str = r#"
    world:
      id: w1
      name: Tiny
      mode: SOLO
      status: ACTIVE
      round_interval_secs: 60
    economy:
      world_id: w1
      current: { year: 2030, week: 1 }
      interest_rate: 0.05
      inflation: 0.02
      wage_index: 1.0
    sectors:
      - { id: auto, name: Auto }
    niches:
      - id: car-wash
        sector_id: auto
        name: Car Wash
        base_demand: 800
        seasonality: [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1]
        base_price: 20
        unit_cost: 8
        fixed_cost_weekly: 500
    players:
      - { id: p1, name: Ada }
    holdings:
      - id: h1
        world_id: w1
        name: Ada Holdings
        owner: { kind: PLAYER, id: p1 }
        cash: "10000"
        total_equity: "10000"
        total_debt: "0"
        prestige_level: 1
    companies:
      - id: c1
        world_id: w1
        holding_id: h1
        sector_id: auto
        niche_id: car-wash
        name: Sparkle
        status: ACTIVE
    "#;
}
