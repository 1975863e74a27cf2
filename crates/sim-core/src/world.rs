//! World, economy state and round markers.

use crate::ids::{SectorId, WorldId};
use crate::time::GameWeek;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorldMode {
    Multiplayer,
    Solo,
    Sandbox,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorldStatus {
    Active,
    Paused,
    Archived,
}

/// One independent simulated economy with its own clock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct World {
    pub id: WorldId,
    pub name: String,
    pub mode: WorldMode,
    pub status: WorldStatus,
    /// Wall-clock seconds between scheduled ticks.
    pub round_interval_secs: u64,
}

/// World-level macro multipliers consumed by the sector and company engines.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroModifiers {
    /// Global macro demand factor applied to every sector's target demand.
    pub demand_factor: f64,
    /// Energy price level; 1.0 is neutral.
    pub energy_cost_factor: f64,
}

impl Default for MacroModifiers {
    fn default() -> Self {
        Self {
            demand_factor: 1.0,
            energy_cost_factor: 1.0,
        }
    }
}

/// The single economy row of a world. Its lock columns double as the
/// per-world tick mutex.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldEconomyState {
    pub world_id: WorldId,
    pub current: GameWeek,
    /// Annual policy rate, e.g. 0.05.
    pub interest_rate: f64,
    /// Annual inflation, e.g. 0.02.
    pub inflation: f64,
    /// Wage level index; 1.0 at world creation.
    pub wage_index: f64,
    #[serde(default)]
    pub modifiers: MacroModifiers,
    #[serde(default)]
    pub is_ticking: bool,
    #[serde(default)]
    pub lock_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_tick_at: Option<DateTime<Utc>>,
}

impl WorldEconomyState {
    pub fn new(world_id: WorldId, start: GameWeek) -> Self {
        Self {
            world_id,
            current: start,
            interest_rate: 0.05,
            inflation: 0.02,
            wage_index: 1.0,
            modifiers: MacroModifiers::default(),
            is_ticking: false,
            lock_at: None,
            last_tick_at: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Observable marker for one world week.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldRound {
    pub world_id: WorldId,
    pub week: GameWeek,
    pub status: RoundStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure: Option<String>,
}

/// Evolving demand state of one sector inside one world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldSectorState {
    pub world_id: WorldId,
    pub sector_id: SectorId,
    /// Week this state was computed for.
    pub week: GameWeek,
    pub demand: f64,
    pub trend: f64,
    pub volatility: f64,
    /// Demand change against the previous week.
    pub last_delta: f64,
    pub last_shock: f64,
}
