//! The storage seam consumed by the tick runtime.

use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sim_core::{
    Bot, Company, CompanyDecision, CompanyDecisionPayload, CompanyFinancials, CompanyId,
    CompanyProgram, CompanyState, CompanyUpgrade, GameEvent, GameWeek, Holding, HoldingDecision,
    HoldingDecisionPayload, HoldingId, Loan, Niche, NicheUpgrade, Player, PlayerId, Sector, World,
    WorldEconomyState, WorldId, WorldRound, WorldSectorState,
};

/// Everything a completed tick writes, applied atomically.
#[derive(Debug, Clone)]
pub struct TickCommit {
    pub world_id: WorldId,
    /// The week that was simulated.
    pub week: GameWeek,
    /// Economy advanced to the next week. Lock fields are ignored.
    pub economy: WorldEconomyState,
    pub company_states: Vec<CompanyState>,
    pub financials: Vec<CompanyFinancials>,
    pub companies: Vec<Company>,
    pub holdings: Vec<Holding>,
    pub loans: Vec<Loan>,
    pub programs: Vec<CompanyProgram>,
    pub upgrades: Vec<CompanyUpgrade>,
    /// Replaces every event stored for `week`.
    pub events: Vec<GameEvent>,
    pub players: Vec<Player>,
    /// Watermark sampled at tick start. Decisions for `week` above it
    /// arrived late and move to the following week.
    pub decision_watermark: u64,
    pub completed_at: DateTime<Utc>,
}

#[async_trait]
pub trait WorldStore: Send + Sync {
    async fn list_active_worlds(&self) -> StoreResult<Vec<World>>;
    async fn get_world(&self, world: &WorldId) -> StoreResult<World>;
    async fn get_economy(&self, world: &WorldId) -> StoreResult<WorldEconomyState>;

    /// Conditional lock acquire. Succeeds when the world is not ticking or
    /// its lock was taken before `stale_before`.
    async fn try_lock_tick(
        &self,
        world: &WorldId,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<bool>;
    /// Release the lock if it is still the one taken at `locked_at`.
    /// Returns false when another ticker has since taken it over.
    async fn unlock_tick(&self, world: &WorldId, locked_at: DateTime<Utc>) -> StoreResult<bool>;

    /// Create or resume the round marker for `week` and mark it running.
    /// Fails with [`crate::StoreError::WeekClosed`] once the clock has left `week`.
    async fn begin_round(
        &self,
        world: &WorldId,
        week: GameWeek,
        now: DateTime<Utc>,
    ) -> StoreResult<WorldRound>;
    /// Completed rounds are left untouched.
    async fn fail_round(&self, world: &WorldId, week: GameWeek, reason: &str) -> StoreResult<()>;
    async fn get_round(&self, world: &WorldId, week: GameWeek) -> StoreResult<Option<WorldRound>>;

    async fn list_sectors(&self, world: &WorldId) -> StoreResult<Vec<Sector>>;
    async fn list_niches(&self, world: &WorldId) -> StoreResult<Vec<Niche>>;
    async fn list_niche_upgrades(&self, world: &WorldId) -> StoreResult<Vec<NicheUpgrade>>;
    async fn list_sector_states(&self, world: &WorldId) -> StoreResult<Vec<WorldSectorState>>;
    async fn upsert_sector_states(&self, states: &[WorldSectorState]) -> StoreResult<()>;

    async fn list_holdings(&self, world: &WorldId) -> StoreResult<Vec<Holding>>;
    async fn list_bots(&self, world: &WorldId) -> StoreResult<Vec<Bot>>;
    async fn list_companies(&self, world: &WorldId) -> StoreResult<Vec<Company>>;
    /// Most recent state row per company.
    async fn latest_company_states(&self, world: &WorldId) -> StoreResult<Vec<CompanyState>>;
    async fn latest_company_financials(&self, world: &WorldId)
        -> StoreResult<Vec<CompanyFinancials>>;

    /// Highest sequence number assigned to any decision of the world.
    async fn decision_watermark(&self, world: &WorldId) -> StoreResult<u64>;
    /// Decisions for `week` with `seq <= up_to_seq`, in sequence order.
    async fn list_company_decisions(
        &self,
        world: &WorldId,
        week: GameWeek,
        up_to_seq: u64,
    ) -> StoreResult<Vec<CompanyDecision>>;
    async fn list_holding_decisions(
        &self,
        world: &WorldId,
        week: GameWeek,
        up_to_seq: u64,
    ) -> StoreResult<Vec<HoldingDecision>>;
    /// Fails with [`crate::StoreError::WeekClosed`] when `week` was already simulated.
    async fn submit_company_decision(
        &self,
        world: &WorldId,
        company: &CompanyId,
        week: GameWeek,
        payload: CompanyDecisionPayload,
        now: DateTime<Utc>,
    ) -> StoreResult<CompanyDecision>;
    async fn submit_holding_decision(
        &self,
        world: &WorldId,
        holding: &HoldingId,
        week: GameWeek,
        payload: HoldingDecisionPayload,
        now: DateTime<Utc>,
    ) -> StoreResult<HoldingDecision>;

    async fn list_active_programs(&self, world: &WorldId) -> StoreResult<Vec<CompanyProgram>>;
    async fn list_company_upgrades(&self, world: &WorldId) -> StoreResult<Vec<CompanyUpgrade>>;
    async fn list_loans(&self, world: &WorldId) -> StoreResult<Vec<Loan>>;
    async fn list_events(&self, world: &WorldId, week: GameWeek) -> StoreResult<Vec<GameEvent>>;
    async fn get_player(&self, player: &PlayerId) -> StoreResult<Player>;

    /// Persist a finished tick, advance the clock and complete the round.
    /// Nothing is written unless the stored clock still reads `commit.week`.
    async fn commit_tick(&self, commit: TickCommit) -> StoreResult<()>;
}
