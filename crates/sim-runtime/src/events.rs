//! Event generation seam. Narrative content lives outside the engine; the
//! runtime only asks for the week's events per holding and stores them.

use sim_core::{Company, CompanyFinancials, GameEvent, GameWeek, Holding, RandomSource, WorldId};

/// What an events engine sees for one holding after finance has run.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    pub world_id: &'a WorldId,
    pub week: GameWeek,
    pub holding: &'a Holding,
    pub companies: &'a [&'a Company],
    pub financials: &'a [&'a CompanyFinancials],
    pub rng: &'a RandomSource,
}

pub trait EventsEngine: Send + Sync {
    fn generate(&self, ctx: &EventContext<'_>) -> Vec<GameEvent>;
}

/// Produces nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl EventsEngine for NoEvents {
    fn generate(&self, _ctx: &EventContext<'_>) -> Vec<GameEvent> {
        Vec::new()
    }
}
