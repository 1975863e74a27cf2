//! Game events and player reputation.

use crate::ids::{CompanyId, EventId, HoldingId, PlayerId, SectorId, WorldId};
use crate::time::GameWeek;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventScope {
    World,
    Sector(SectorId),
    Company(CompanyId),
    Holding(HoldingId),
}

/// A generated event. Regenerated for the current week on every tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub id: EventId,
    pub world_id: WorldId,
    pub week: GameWeek,
    pub scope: EventScope,
    /// Free-form type string, e.g. "PR_CAMPAIGN_VIRAL" or "REGULATOR_FINE".
    pub event_type: String,
    /// Multiplier on the event's effect, 1.0 nominal.
    pub severity: f64,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// One XP/level track.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReputationTrack {
    pub level: u32,
    pub xp: f64,
}

impl Default for ReputationTrack {
    fn default() -> Self {
        Self { level: 1, xp: 0.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub brand: ReputationTrack,
    #[serde(default)]
    pub credit: ReputationTrack,
}
