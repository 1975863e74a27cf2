//! In-process store backed by one [`WorldSnapshot`] per world.

use crate::error::{StoreError, StoreResult};
use crate::snapshot::WorldSnapshot;
use crate::store::{TickCommit, WorldStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sim_core::{
    Bot, Company, CompanyDecision, CompanyDecisionPayload, CompanyFinancials, CompanyId,
    CompanyProgram, CompanyState, CompanyUpgrade, DecisionId, GameEvent, GameWeek, Holding,
    HoldingDecision, HoldingDecisionPayload, HoldingId, Loan, Niche, NicheUpgrade, Player,
    PlayerId, ProgramStatus, RoundStatus, Sector, World, WorldEconomyState, WorldId, WorldRound,
    WorldSectorState, WorldStatus,
};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    worlds: BTreeMap<WorldId, WorldSnapshot>,
    next_seq: u64,
}

impl Inner {
    fn world(&self, id: &WorldId) -> StoreResult<&WorldSnapshot> {
        self.worlds
            .get(id)
            .ok_or_else(|| StoreError::not_found("world", id))
    }

    fn world_mut(&mut self, id: &WorldId) -> StoreResult<&mut WorldSnapshot> {
        self.worlds
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("world", id))
    }
}

/// Upsert `item` into `items` by `key`.
fn upsert<T, K: PartialEq>(items: &mut Vec<T>, item: T, key: impl Fn(&T) -> K) {
    let k = key(&item);
    match items.iter_mut().find(|x| key(x) == k) {
        Some(slot) => *slot = item,
        None => items.push(item),
    }
}

fn latest_by<T: Clone>(rows: &[T], company: impl Fn(&T) -> &CompanyId, week: impl Fn(&T) -> GameWeek) -> Vec<T> {
    let mut latest: BTreeMap<&CompanyId, &T> = BTreeMap::new();
    for row in rows {
        let newer = latest
            .get(company(row))
            .map(|cur| week(row) > week(cur))
            .unwrap_or(true);
        if newer {
            latest.insert(company(row), row);
        }
    }
    latest.into_values().cloned().collect()
}

/// Mutex-guarded store used by tests and the command line.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: WorldSnapshot) -> Self {
        let next_seq = snapshot
            .company_decisions
            .iter()
            .map(|d| d.seq)
            .chain(snapshot.holding_decisions.iter().map(|d| d.seq))
            .max()
            .unwrap_or(0);
        let mut worlds = BTreeMap::new();
        worlds.insert(snapshot.world.id.clone(), snapshot);
        Self {
            inner: Mutex::new(Inner { worlds, next_seq }),
        }
    }

    pub async fn insert_snapshot(&self, snapshot: WorldSnapshot) -> StoreResult<()> {
        snapshot.validate()?;
        let mut inner = self.inner.lock().await;
        let max_seq = snapshot
            .company_decisions
            .iter()
            .map(|d| d.seq)
            .chain(snapshot.holding_decisions.iter().map(|d| d.seq))
            .max()
            .unwrap_or(0);
        inner.next_seq = inner.next_seq.max(max_seq);
        inner.worlds.insert(snapshot.world.id.clone(), snapshot);
        Ok(())
    }

    /// A copy of the world's full state.
    pub async fn snapshot(&self, world: &WorldId) -> StoreResult<WorldSnapshot> {
        Ok(self.inner.lock().await.world(world)?.clone())
    }
}

#[async_trait]
impl WorldStore for MemoryStore {
    async fn list_active_worlds(&self) -> StoreResult<Vec<World>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .worlds
            .values()
            .filter(|s| s.world.status == WorldStatus::Active)
            .map(|s| s.world.clone())
            .collect())
    }

    async fn get_world(&self, world: &WorldId) -> StoreResult<World> {
        Ok(self.inner.lock().await.world(world)?.world.clone())
    }

    async fn get_economy(&self, world: &WorldId) -> StoreResult<WorldEconomyState> {
        Ok(self.inner.lock().await.world(world)?.economy.clone())
    }

    async fn try_lock_tick(
        &self,
        world: &WorldId,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let econ = &mut inner.world_mut(world)?.economy;
        let free = !econ.is_ticking || econ.lock_at.map(|t| t < stale_before).unwrap_or(true);
        if free {
            econ.is_ticking = true;
            econ.lock_at = Some(now);
        }
        Ok(free)
    }

    async fn unlock_tick(&self, world: &WorldId, locked_at: DateTime<Utc>) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let econ = &mut inner.world_mut(world)?.economy;
        if econ.lock_at != Some(locked_at) {
            return Ok(false);
        }
        econ.is_ticking = false;
        econ.lock_at = None;
        Ok(true)
    }

    async fn begin_round(
        &self,
        world: &WorldId,
        week: GameWeek,
        now: DateTime<Utc>,
    ) -> StoreResult<WorldRound> {
        let mut inner = self.inner.lock().await;
        let snap = inner.world_mut(world)?;
        if snap.economy.current != week {
            return Err(StoreError::week_closed(world, week, snap.economy.current));
        }
        let round = match snap.rounds.iter_mut().find(|r| r.week == week) {
            Some(r) => {
                r.status = RoundStatus::Running;
                r.started_at = Some(now);
                r.failure = None;
                r.clone()
            }
            None => {
                let r = WorldRound {
                    world_id: world.clone(),
                    week,
                    status: RoundStatus::Running,
                    started_at: Some(now),
                    completed_at: None,
                    failure: None,
                };
                snap.rounds.push(r.clone());
                r
            }
        };
        Ok(round)
    }

    async fn fail_round(&self, world: &WorldId, week: GameWeek, reason: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let snap = inner.world_mut(world)?;
        if let Some(r) = snap
            .rounds
            .iter_mut()
            .find(|r| r.week == week && r.status != RoundStatus::Completed)
        {
            r.status = RoundStatus::Failed;
            r.failure = Some(reason.to_string());
        }
        Ok(())
    }

    async fn get_round(&self, world: &WorldId, week: GameWeek) -> StoreResult<Option<WorldRound>> {
        let inner = self.inner.lock().await;
        Ok(inner.world(world)?.rounds.iter().find(|r| r.week == week).cloned())
    }

    async fn list_sectors(&self, world: &WorldId) -> StoreResult<Vec<Sector>> {
        Ok(self.inner.lock().await.world(world)?.sectors.clone())
    }

    async fn list_niches(&self, world: &WorldId) -> StoreResult<Vec<Niche>> {
        Ok(self.inner.lock().await.world(world)?.niches.clone())
    }

    async fn list_niche_upgrades(&self, world: &WorldId) -> StoreResult<Vec<NicheUpgrade>> {
        Ok(self.inner.lock().await.world(world)?.niche_upgrades.clone())
    }

    async fn list_sector_states(&self, world: &WorldId) -> StoreResult<Vec<WorldSectorState>> {
        Ok(self.inner.lock().await.world(world)?.sector_states.clone())
    }

    async fn upsert_sector_states(&self, states: &[WorldSectorState]) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        for s in states {
            let snap = inner.world_mut(&s.world_id)?;
            upsert(&mut snap.sector_states, s.clone(), |x| x.sector_id.clone());
        }
        Ok(())
    }

    async fn list_holdings(&self, world: &WorldId) -> StoreResult<Vec<Holding>> {
        Ok(self.inner.lock().await.world(world)?.holdings.clone())
    }

    async fn list_bots(&self, world: &WorldId) -> StoreResult<Vec<Bot>> {
        Ok(self.inner.lock().await.world(world)?.bots.clone())
    }

    async fn list_companies(&self, world: &WorldId) -> StoreResult<Vec<Company>> {
        Ok(self.inner.lock().await.world(world)?.companies.clone())
    }

    async fn latest_company_states(&self, world: &WorldId) -> StoreResult<Vec<CompanyState>> {
        let inner = self.inner.lock().await;
        let rows = &inner.world(world)?.company_states;
        Ok(latest_by(rows, |s| &s.company_id, |s| s.week))
    }

    async fn latest_company_financials(
        &self,
        world: &WorldId,
    ) -> StoreResult<Vec<CompanyFinancials>> {
        let inner = self.inner.lock().await;
        let rows = &inner.world(world)?.financials;
        Ok(latest_by(rows, |f| &f.company_id, |f| f.week))
    }

    async fn decision_watermark(&self, world: &WorldId) -> StoreResult<u64> {
        let inner = self.inner.lock().await;
        let snap = inner.world(world)?;
        Ok(snap
            .company_decisions
            .iter()
            .map(|d| d.seq)
            .chain(snap.holding_decisions.iter().map(|d| d.seq))
            .max()
            .unwrap_or(0))
    }

    async fn list_company_decisions(
        &self,
        world: &WorldId,
        week: GameWeek,
        up_to_seq: u64,
    ) -> StoreResult<Vec<CompanyDecision>> {
        let inner = self.inner.lock().await;
        let mut out: Vec<CompanyDecision> = inner
            .world(world)?
            .company_decisions
            .iter()
            .filter(|d| d.week == week && d.seq <= up_to_seq)
            .cloned()
            .collect();
        out.sort_by_key(|d| d.seq);
        Ok(out)
    }

    async fn list_holding_decisions(
        &self,
        world: &WorldId,
        week: GameWeek,
        up_to_seq: u64,
    ) -> StoreResult<Vec<HoldingDecision>> {
        let inner = self.inner.lock().await;
        let mut out: Vec<HoldingDecision> = inner
            .world(world)?
            .holding_decisions
            .iter()
            .filter(|d| d.week == week && d.seq <= up_to_seq)
            .cloned()
            .collect();
        out.sort_by_key(|d| d.seq);
        Ok(out)
    }

    async fn submit_company_decision(
        &self,
        world: &WorldId,
        company: &CompanyId,
        week: GameWeek,
        payload: CompanyDecisionPayload,
        now: DateTime<Utc>,
    ) -> StoreResult<CompanyDecision> {
        let mut inner = self.inner.lock().await;
        let exists = inner.world(world)?.companies.iter().any(|c| &c.id == company);
        let current = inner.world(world)?.economy.current;
        if week < current {
            return Err(StoreError::week_closed(world, week, current));
        }
        if !exists {
            return Err(StoreError::not_found("company", company));
        }
        inner.next_seq += 1;
        let seq = inner.next_seq;
        let decision = CompanyDecision {
            id: DecisionId::new(format!("dec-{seq}")),
            seq,
            world_id: world.clone(),
            company_id: company.clone(),
            week,
            created_at: now,
            payload,
        };
        inner.world_mut(world)?.company_decisions.push(decision.clone());
        Ok(decision)
    }

    async fn submit_holding_decision(
        &self,
        world: &WorldId,
        holding: &HoldingId,
        week: GameWeek,
        payload: HoldingDecisionPayload,
        now: DateTime<Utc>,
    ) -> StoreResult<HoldingDecision> {
        let mut inner = self.inner.lock().await;
        let exists = inner.world(world)?.holdings.iter().any(|h| &h.id == holding);
        let current = inner.world(world)?.economy.current;
        if week < current {
            return Err(StoreError::week_closed(world, week, current));
        }
        if !exists {
            return Err(StoreError::not_found("holding", holding));
        }
        inner.next_seq += 1;
        let seq = inner.next_seq;
        let decision = HoldingDecision {
            id: DecisionId::new(format!("dec-{seq}")),
            seq,
            world_id: world.clone(),
            holding_id: holding.clone(),
            week,
            created_at: now,
            payload,
        };
        inner.world_mut(world)?.holding_decisions.push(decision.clone());
        Ok(decision)
    }

    async fn list_active_programs(&self, world: &WorldId) -> StoreResult<Vec<CompanyProgram>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .world(world)?
            .programs
            .iter()
            .filter(|p| p.status == ProgramStatus::Active)
            .cloned()
            .collect())
    }

    async fn list_company_upgrades(&self, world: &WorldId) -> StoreResult<Vec<CompanyUpgrade>> {
        Ok(self.inner.lock().await.world(world)?.company_upgrades.clone())
    }

    async fn list_loans(&self, world: &WorldId) -> StoreResult<Vec<Loan>> {
        Ok(self.inner.lock().await.world(world)?.loans.clone())
    }

    async fn list_events(&self, world: &WorldId, week: GameWeek) -> StoreResult<Vec<GameEvent>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .world(world)?
            .events
            .iter()
            .filter(|e| e.week == week)
            .cloned()
            .collect())
    }

    async fn get_player(&self, player: &PlayerId) -> StoreResult<Player> {
        let inner = self.inner.lock().await;
        inner
            .worlds
            .values()
            .flat_map(|s| s.players.iter())
            .find(|p| &p.id == player)
            .cloned()
            .ok_or_else(|| StoreError::not_found("player", player))
    }

    async fn commit_tick(&self, commit: TickCommit) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let snap = inner.world_mut(&commit.world_id)?;
        if snap.economy.current != commit.week {
            return Err(StoreError::week_closed(&commit.world_id, commit.week, snap.economy.current));
        }

        for s in commit.company_states {
            upsert(&mut snap.company_states, s, |x| (x.company_id.clone(), x.week));
        }
        for f in commit.financials {
            upsert(&mut snap.financials, f, |x| (x.company_id.clone(), x.week));
        }
        for c in commit.companies {
            upsert(&mut snap.companies, c, |x| x.id.clone());
        }
        for h in commit.holdings {
            upsert(&mut snap.holdings, h, |x| x.id.clone());
        }
        for l in commit.loans {
            upsert(&mut snap.loans, l, |x| x.id.clone());
        }
        for p in commit.programs {
            upsert(&mut snap.programs, p, |x| x.id.clone());
        }
        for u in commit.upgrades {
            upsert(&mut snap.company_upgrades, u, |x| (x.company_id.clone(), x.upgrade_id.clone()));
        }
        snap.events.retain(|e| e.week != commit.week);
        snap.events.extend(commit.events);
        for p in commit.players {
            upsert(&mut snap.players, p, |x| x.id.clone());
        }
        let (week, mark, next) = (commit.week, commit.decision_watermark, commit.week.next());
        for d in snap.company_decisions.iter_mut().filter(|d| d.week == week && d.seq > mark) {
            d.week = next;
        }
        for d in snap.holding_decisions.iter_mut().filter(|d| d.week == week && d.seq > mark) {
            d.week = next;
        }

        let (is_ticking, lock_at) = (snap.economy.is_ticking, snap.economy.lock_at);
        snap.economy = WorldEconomyState {
            is_ticking,
            lock_at,
            ..commit.economy
        };
        if let Some(r) = snap.rounds.iter_mut().find(|r| r.week == commit.week) {
            r.status = RoundStatus::Completed;
            r.completed_at = Some(commit.completed_at);
            r.failure = None;
        }
        Ok(())
    }
}
