use async_trait::async_trait;
use chrono::{DateTime, Utc};
use persistence::{StoreError, StoreResult, TickCommit, WorldStore};
use sim_core::{
    Bot, Company, CompanyDecision, CompanyDecisionPayload, CompanyFinancials, CompanyId,
    CompanyProgram, CompanyState, CompanyUpgrade, GameEvent, GameWeek, Holding, HoldingDecision,
    HoldingDecisionPayload, HoldingId, Loan, Niche, NicheUpgrade, Player, PlayerId, Sector, World,
    WorldEconomyState, WorldId, WorldRound, WorldSectorState,
};
use sim_runtime::TickOrchestrator;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Delegating store that hands control back to the runtime before the
/// reads a racing tick depends on. It can also fail world listings,
/// list worlds with no stored economy and run a rival tick mid-round.
pub struct InterleavedStore {
    inner: Arc<dyn WorldStore>,
    failing_listings: AtomicU32,
    phantom_worlds: Vec<World>,
    rival: Mutex<Option<TickOrchestrator>>,
}

impl InterleavedStore {
    pub fn new(inner: Arc<dyn WorldStore>) -> Self {
        Self {
            inner,
            failing_listings: AtomicU32::new(0),
            phantom_worlds: Vec::new(),
            rival: Mutex::new(None),
        }
    }

    /// The next `n` calls to `list_active_worlds` fail.
    pub fn failing_listings(self, n: u32) -> Self {
        self.failing_listings.store(n, Ordering::SeqCst);
        self
    }

    /// Listed as active but absent from the inner store.
    pub fn with_phantom_world(mut self, world: World) -> Self {
        self.phantom_worlds.push(world);
        self
    }

    /// `rival` runs one full tick against the inner store the first time
    /// a round begins through this store.
    pub fn with_rival(self, rival: TickOrchestrator) -> Self {
        *self.rival.lock().unwrap() = Some(rival);
        self
    }
}

#[async_trait]
impl WorldStore for InterleavedStore {
    async fn list_active_worlds(&self) -> StoreResult<Vec<World>> {
        let failing = self
            .failing_listings
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )));
        }
        let mut worlds = self.inner.list_active_worlds().await?;
        worlds.extend(self.phantom_worlds.iter().cloned());
        Ok(worlds)
    }

    async fn get_world(&self, world: &WorldId) -> StoreResult<World> {
        self.inner.get_world(world).await
    }

    async fn get_economy(&self, world: &WorldId) -> StoreResult<WorldEconomyState> {
        tokio::task::yield_now().await;
        self.inner.get_economy(world).await
    }

    async fn try_lock_tick(
        &self,
        world: &WorldId,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.inner.try_lock_tick(world, now, stale_before).await
    }

    async fn unlock_tick(&self, world: &WorldId, locked_at: DateTime<Utc>) -> StoreResult<bool> {
        self.inner.unlock_tick(world, locked_at).await
    }

    async fn begin_round(
        &self,
        world: &WorldId,
        week: GameWeek,
        now: DateTime<Utc>,
    ) -> StoreResult<WorldRound> {
        tokio::task::yield_now().await;
        let round = self.inner.begin_round(world, week, now).await?;
        let rival = self.rival.lock().unwrap().take();
        if let Some(rival) = rival {
            rival.run_world_tick(world).await.unwrap();
        }
        Ok(round)
    }

    async fn fail_round(&self, world: &WorldId, week: GameWeek, reason: &str) -> StoreResult<()> {
        self.inner.fail_round(world, week, reason).await
    }

    async fn get_round(&self, world: &WorldId, week: GameWeek) -> StoreResult<Option<WorldRound>> {
        self.inner.get_round(world, week).await
    }

    async fn list_sectors(&self, world: &WorldId) -> StoreResult<Vec<Sector>> {
        self.inner.list_sectors(world).await
    }

    async fn list_niches(&self, world: &WorldId) -> StoreResult<Vec<Niche>> {
        self.inner.list_niches(world).await
    }

    async fn list_niche_upgrades(&self, world: &WorldId) -> StoreResult<Vec<NicheUpgrade>> {
        self.inner.list_niche_upgrades(world).await
    }

    async fn list_sector_states(&self, world: &WorldId) -> StoreResult<Vec<WorldSectorState>> {
        self.inner.list_sector_states(world).await
    }

    async fn upsert_sector_states(&self, states: &[WorldSectorState]) -> StoreResult<()> {
        self.inner.upsert_sector_states(states).await
    }

    async fn list_holdings(&self, world: &WorldId) -> StoreResult<Vec<Holding>> {
        self.inner.list_holdings(world).await
    }

    async fn list_bots(&self, world: &WorldId) -> StoreResult<Vec<Bot>> {
        self.inner.list_bots(world).await
    }

    async fn list_companies(&self, world: &WorldId) -> StoreResult<Vec<Company>> {
        self.inner.list_companies(world).await
    }

    async fn latest_company_states(&self, world: &WorldId) -> StoreResult<Vec<CompanyState>> {
        self.inner.latest_company_states(world).await
    }

    async fn latest_company_financials(&self, world: &WorldId) -> StoreResult<Vec<CompanyFinancials>> {
        self.inner.latest_company_financials(world).await
    }

    async fn decision_watermark(&self, world: &WorldId) -> StoreResult<u64> {
        self.inner.decision_watermark(world).await
    }

    async fn list_company_decisions(
        &self,
        world: &WorldId,
        week: GameWeek,
        up_to_seq: u64,
    ) -> StoreResult<Vec<CompanyDecision>> {
        self.inner.list_company_decisions(world, week, up_to_seq).await
    }

    async fn list_holding_decisions(
        &self,
        world: &WorldId,
        week: GameWeek,
        up_to_seq: u64,
    ) -> StoreResult<Vec<HoldingDecision>> {
        self.inner.list_holding_decisions(world, week, up_to_seq).await
    }

    async fn submit_company_decision(
        &self,
        world: &WorldId,
        company: &CompanyId,
        week: GameWeek,
        payload: CompanyDecisionPayload,
        now: DateTime<Utc>,
    ) -> StoreResult<CompanyDecision> {
        self.inner
            .submit_company_decision(world, company, week, payload, now)
            .await
    }

    async fn submit_holding_decision(
        &self,
        world: &WorldId,
        holding: &HoldingId,
        week: GameWeek,
        payload: HoldingDecisionPayload,
        now: DateTime<Utc>,
    ) -> StoreResult<HoldingDecision> {
        self.inner
            .submit_holding_decision(world, holding, week, payload, now)
            .await
    }

    async fn list_active_programs(&self, world: &WorldId) -> StoreResult<Vec<CompanyProgram>> {
        self.inner.list_active_programs(world).await
    }

    async fn list_company_upgrades(&self, world: &WorldId) -> StoreResult<Vec<CompanyUpgrade>> {
        self.inner.list_company_upgrades(world).await
    }

    async fn list_loans(&self, world: &WorldId) -> StoreResult<Vec<Loan>> {
        self.inner.list_loans(world).await
    }

    async fn list_events(&self, world: &WorldId, week: GameWeek) -> StoreResult<Vec<GameEvent>> {
        self.inner.list_events(world, week).await
    }

    async fn get_player(&self, player: &PlayerId) -> StoreResult<Player> {
        self.inner.get_player(player).await
    }

    async fn commit_tick(&self, commit: TickCommit) -> StoreResult<()> {
        self.inner.commit_tick(commit).await
    }
}
