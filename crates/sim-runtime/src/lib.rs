#![deny(warnings)]

//! Tick runtime: drives one simulated week per world against a
//! [`persistence::WorldStore`].
//!
//! [`TickOrchestrator::run_world_tick`] is the single entry point. It takes
//! the world's persisted tick lock, applies the week's decisions, runs the
//! macro, sector, market, company, finance, events and progression engines
//! in order and commits the results. [`Scheduler`] polls active worlds and
//! ticks those whose round interval has elapsed.

pub mod dispatch;
pub mod effects;
pub mod error;
pub mod events;
pub mod holding;
pub mod orchestrator;
pub mod scheduler;

pub use dispatch::{apply_company_decision, Applied, DecisionContext, WorkingSet};
pub use effects::{draw_upgrade, fold_effects, CompanyEffects};
pub use error::TickError;
pub use events::{EventContext, EventsEngine, NoEvents};
pub use holding::{apply_holding_decision, HoldingBook};
pub use orchestrator::{Clock, TickOrchestrator, TickOutcome, TickReport};
pub use scheduler::{PollResult, Scheduler};
