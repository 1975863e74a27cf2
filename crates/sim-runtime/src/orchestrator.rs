//! The weekly world tick.
//!
//! One call to [`TickOrchestrator::run_world_tick`] simulates the world's
//! current week end to end: it takes the persisted tick lock, applies the
//! week's decisions to working copies, runs the engines in order and writes
//! everything back in one commit. Sector states are the only rows persisted
//! before the commit. The lock is released on every path; a failed tick
//! leaves its round `FAILED` and the clock where it was.

use crate::dispatch::{apply_company_decision, Applied, DecisionContext, WorkingSet};
use crate::effects::{fold_effects, CompanyEffects};
use crate::error::TickError;
use crate::events::{EventContext, EventsEngine, NoEvents};
use crate::holding::{apply_holding_decision, HoldingBook};
use chrono::{DateTime, Duration, Utc};
use persistence::{TickCommit, WorldStore};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sim_ai::{market_pressure, plan_bot_decisions};
use sim_core::{
    finite_or, money, money_f64, Bot, BotId, Company, CompanyDecision, CompanyFinancials,
    CompanyId, CompanyProgram, CompanyState, CompanyStatus, CompanyUpgrade, EngineConfig,
    EventScope, GameEvent, GameWeek, Loan, LoanOwner, Niche, NicheId, NicheUpgrade, Player,
    PlayerId, ProgramStatus, RandomSource, SectorId, UpgradeId, WorldEconomyState, WorldId,
    WorldSectorState,
};
use sim_econ::company::{effective_price_level, effective_quality};
use sim_econ::{
    niche_demand_weight, progress_player, run_company_group, settle_holding, step_macro,
    step_sector, CompanyGroupInput, CompanyInput, FinanceInput, ProgressionInput, SectorInput,
    SegmentAllocationInput,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Wall-clock source; replaced in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Counters describing one completed tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub week: GameWeek,
    pub companies: usize,
    pub decisions_applied: usize,
    pub decisions_skipped: usize,
    pub bot_decisions: usize,
    pub bankruptcies: usize,
    pub events: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(TickReport),
    /// Another tick holds the world's lock; nothing was done.
    AlreadyRunning,
}

#[derive(Debug, Default)]
struct Tally {
    applied: usize,
    skipped: usize,
}

impl Tally {
    fn record(&mut self, applied: Applied) {
        match applied {
            Applied::Done => self.applied += 1,
            Applied::Skipped(_) => self.skipped += 1,
        }
    }
}

/// A player's results summed over every holding they own.
#[derive(Debug, Default)]
struct Standing {
    profitable: u32,
    profit: f64,
    bankruptcies: u32,
    /// Indices into the week's events; world events count once.
    events: BTreeSet<usize>,
}

fn by_id<K: Ord, V>(items: Vec<V>, key: impl Fn(&V) -> K) -> BTreeMap<K, V> {
    items.into_iter().map(|v| (key(&v), v)).collect()
}

pub struct TickOrchestrator {
    store: Arc<dyn WorldStore>,
    config: EngineConfig,
    events: Arc<dyn EventsEngine>,
    clock: Clock,
}

impl TickOrchestrator {
    pub fn new(store: Arc<dyn WorldStore>, config: EngineConfig) -> Result<Self, TickError> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            events: Arc::new(NoEvents),
            clock: Arc::new(Utc::now),
        })
    }

    pub fn with_events(mut self, events: Arc<dyn EventsEngine>) -> Self {
        self.events = events;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &Arc<dyn WorldStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Simulate the world's current week. Returns
    /// [`TickOutcome::AlreadyRunning`] without side effects when the lock is
    /// held and not stale.
    #[tracing::instrument(skip_all, fields(world = %world_id))]
    pub async fn run_world_tick(&self, world_id: &WorldId) -> Result<TickOutcome, TickError> {
        let now = self.now();
        let stale_before = now - Duration::seconds(self.config.tick.stale_lock_secs.max(0));
        let before = self.store.get_economy(world_id).await?;

        if !self.store.try_lock_tick(world_id, now, stale_before).await? {
            debug!(locked_at = ?before.lock_at, "tick already in flight");
            return Ok(TickOutcome::AlreadyRunning);
        }
        if before.is_ticking {
            warn!(locked_at = ?before.lock_at, "took over stale tick lock");
        }

        let result = match self.store.get_economy(world_id).await {
            Ok(economy) => {
                let week = economy.current;
                let result = self.tick_locked(world_id, economy, now).await;
                if let Err(err) = &result {
                    warn!(%week, error = %err, "tick failed");
                    if let Err(e) = self.store.fail_round(world_id, week, &err.to_string()).await {
                        warn!(%week, error = %e, "could not mark round failed");
                    }
                }
                result
            }
            Err(e) => Err(e.into()),
        };

        let unlocked = self.store.unlock_tick(world_id, now).await;
        let report = result?;
        if !unlocked? {
            warn!("tick lock was taken over before release");
        }
        Ok(TickOutcome::Completed(report))
    }

    async fn tick_locked(
        &self,
        world_id: &WorldId,
        economy: WorldEconomyState,
        now: DateTime<Utc>,
    ) -> Result<TickReport, TickError> {
        let cfg = &self.config;
        let store = self.store.as_ref();
        let week = economy.current;

        // Decisions submitted after this point belong to the next tick.
        let watermark = store.decision_watermark(world_id).await?;
        store.begin_round(world_id, week, now).await?;
        let rng = RandomSource::new(world_id.clone(), week);
        info!(%week, watermark, "tick started");

        let sectors = store.list_sectors(world_id).await?;
        let niches: BTreeMap<NicheId, Niche> = by_id(store.list_niches(world_id).await?, |n| n.id.clone());
        let catalog: BTreeMap<UpgradeId, NicheUpgrade> =
            by_id(store.list_niche_upgrades(world_id).await?, |u| u.id.clone());
        let previous_sectors: BTreeMap<SectorId, WorldSectorState> =
            by_id(store.list_sector_states(world_id).await?, |s| s.sector_id.clone());
        let bots: BTreeMap<BotId, Bot> = by_id(store.list_bots(world_id).await?, |b| b.id.clone());
        let companies = store.list_companies(world_id).await?;
        let latest_states: BTreeMap<CompanyId, CompanyState> =
            by_id(store.latest_company_states(world_id).await?, |s| s.company_id.clone());
        let last_books: BTreeMap<CompanyId, CompanyFinancials> =
            by_id(store.latest_company_financials(world_id).await?, |f| f.company_id.clone());
        let company_decisions = store.list_company_decisions(world_id, week, watermark).await?;
        let holding_decisions = store.list_holding_decisions(world_id, week, watermark).await?;
        let loans = store.list_loans(world_id).await?;

        let mut ws = WorkingSet {
            holdings: by_id(store.list_holdings(world_id).await?, |h| h.id.clone()),
            programs: by_id(store.list_active_programs(world_id).await?, |p| p.id.clone()),
            upgrades: by_id(store.list_company_upgrades(world_id).await?, |u| {
                (u.company_id.clone(), u.upgrade_id.clone())
            }),
            ..WorkingSet::default()
        };

        let companies_by_id: BTreeMap<&CompanyId, &Company> = companies.iter().map(|c| (&c.id, c)).collect();
        let active: Vec<&Company> = companies
            .iter()
            .filter(|c| c.status == CompanyStatus::Active)
            .collect();
        for c in active.iter().copied() {
            if !ws.holdings.contains_key(&c.holding_id) {
                return Err(TickError::HoldingNotFound(c.holding_id.clone()));
            }
            let niche = niches
                .get(&c.niche_id)
                .ok_or_else(|| TickError::NicheNotFound(c.niche_id.clone()))?;
            let state = latest_states
                .get(&c.id)
                .cloned()
                .unwrap_or_else(|| CompanyState::initial(c.id.clone(), niche, week));
            ws.states.insert(c.id.clone(), state);
        }

        // Decisions, in submission order per company.
        let mut tally = Tally::default();
        let mut by_company: BTreeMap<&CompanyId, Vec<&CompanyDecision>> = BTreeMap::new();
        for d in &company_decisions {
            by_company.entry(&d.company_id).or_default().push(d);
        }
        for (id, decisions) in &by_company {
            let company = companies_by_id
                .get(id)
                .copied()
                .ok_or_else(|| TickError::CompanyNotFound((*id).clone()))?;
            if company.status != CompanyStatus::Active {
                debug!(company = %id, count = decisions.len(), "decisions for inactive company ignored");
                tally.skipped += decisions.len();
                continue;
            }
            let ctx = DecisionContext {
                company,
                niche: niches
                    .get(&company.niche_id)
                    .ok_or_else(|| TickError::NicheNotFound(company.niche_id.clone()))?,
                catalog: &catalog,
                week,
                rng: &rng,
            };
            for d in decisions {
                tally.record(apply_company_decision(&mut ws, &ctx, d.id.as_str(), &d.payload)?);
            }
        }

        let mut bot_decisions = 0;
        if cfg.tick.bot_planning {
            for c in active.iter().copied() {
                if by_company.contains_key(&c.id) {
                    continue;
                }
                let Some(bot) = ws
                    .holdings
                    .get(&c.holding_id)
                    .and_then(|h| h.bot_id())
                    .and_then(|b| bots.get(b))
                else {
                    continue;
                };
                let Some(state) = ws.states.get(&c.id) else {
                    continue;
                };
                let plan = plan_bot_decisions(bot, state, last_books.get(&c.id), &rng);
                let Some(niche) = niches.get(&c.niche_id) else {
                    continue;
                };
                let ctx = DecisionContext {
                    company: c,
                    niche,
                    catalog: &catalog,
                    week,
                    rng: &rng,
                };
                for (i, payload) in plan.iter().enumerate() {
                    tally.record(apply_company_decision(&mut ws, &ctx, &format!("bot-{i}"), payload)?);
                    bot_decisions += 1;
                }
            }
        }

        let effects: BTreeMap<CompanyId, CompanyEffects> = active
            .iter()
            .map(|c| {
                let folded = fold_effects(week, ws.programs_of(&c.id), ws.upgrades_of(&c.id));
                (c.id.clone(), folded)
            })
            .collect();

        // Macro and sectors.
        let season = cfg.seasons.season_for(week);
        let economy = step_macro(&economy, season, &cfg.macro_econ, &rng);

        let mut sector_states = Vec::with_capacity(sectors.len());
        let mut sector_demand: BTreeMap<SectorId, f64> = BTreeMap::new();
        for sector in &sectors {
            let in_sector: Vec<&Niche> = niches.values().filter(|n| n.sector_id == sector.id).collect();
            let out = step_sector(
                &SectorInput {
                    sector,
                    niches: in_sector,
                    previous: previous_sectors.get(&sector.id),
                    economy: &economy,
                    season,
                },
                &cfg.sector,
                &rng,
            );
            debug!(sector = %sector.id, demand = out.demand, shock = out.volatility_shock, "sector stepped");
            sector_demand.insert(sector.id.clone(), out.demand);
            sector_states.push(out.state);
        }
        store.upsert_sector_states(&sector_states).await?;

        // Market pressure and company groups, one per niche with active companies.
        let mut groups: BTreeMap<&NicheId, Vec<&Company>> = BTreeMap::new();
        for c in active.iter().copied() {
            groups.entry(&c.niche_id).or_default().push(c);
        }
        let mut next_states = Vec::with_capacity(active.len());
        let mut books: BTreeMap<CompanyId, CompanyFinancials> = BTreeMap::new();
        for (niche_id, members) in &groups {
            let niche = niches
                .get(*niche_id)
                .ok_or_else(|| TickError::NicheNotFound((*niche_id).clone()))?;
            let in_sector: Vec<&Niche> = niches.values().filter(|n| n.sector_id == niche.sector_id).collect();
            let demand = sector_demand.get(&niche.sector_id).copied().unwrap_or(0.0)
                * niche_demand_weight(&in_sector, &niche.id);
            let pressure = market_pressure(niche, &rng);

            let inputs: Vec<CompanyInput<'_>> = members
                .iter()
                .copied()
                .filter_map(|c| {
                    let state = ws.states.get(&c.id)?;
                    let e = effects.get(&c.id).copied().unwrap_or_default();
                    Some(CompanyInput {
                        company: c,
                        state,
                        modifiers: e.modifiers,
                        extra_opex: e.extra_opex,
                    })
                })
                .collect();
            let segments = (!niche.segments.is_empty()).then(|| {
                let offers: Vec<(CompanyId, f64, f64)> = inputs
                    .iter()
                    .map(|i| {
                        (
                            i.company.id.clone(),
                            effective_price_level(i.state, niche),
                            effective_quality(i.state, &i.modifiers),
                        )
                    })
                    .collect();
                SegmentAllocationInput::from_niche(niche, &offers)
            });

            let results = run_company_group(
                &CompanyGroupInput {
                    niche,
                    economy: &economy,
                    week,
                    sector_demand: demand,
                    pressure: &pressure,
                    companies: inputs,
                    segments,
                },
                cfg,
            );
            for r in results {
                books.insert(r.company_id.clone(), r.financials);
                next_states.push(r.next_state);
            }
        }

        // Holding decisions move cash directly.
        let mut book = HoldingBook {
            holdings: std::mem::take(&mut ws.holdings),
            companies: companies.iter().map(|c| (c.id.clone(), c.clone())).collect(),
            loans: by_id(loans, |l: &Loan| l.id.clone()),
        };
        let loan_rate = Decimal::from_f64(
            finite_or(economy.interest_rate + cfg.finance.loan_spread, 0.0).max(0.0),
        )
        .unwrap_or_default()
        .round_dp(4);
        for d in &holding_decisions {
            tally.record(apply_holding_decision(&mut book, d, week, loan_rate)?);
        }

        // Finance per holding, with the holding's loans and its companies' loans.
        let holding_ids: Vec<_> = book.holdings.keys().cloned().collect();
        let mut settled: BTreeMap<CompanyId, CompanyFinancials> = BTreeMap::new();
        for hid in &holding_ids {
            let owned: BTreeSet<&CompanyId> = book
                .companies
                .values()
                .filter(|c| &c.holding_id == hid)
                .map(|c| &c.id)
                .collect();
            let financials: Vec<CompanyFinancials> = owned.iter().filter_map(|id| books.remove(*id)).collect();
            let loans: Vec<Loan> = book
                .loans
                .values()
                .filter(|l| match &l.owner {
                    LoanOwner::Holding(h) => h == hid,
                    LoanOwner::Company(c) => owned.contains(c),
                })
                .cloned()
                .collect();
            let Some(holding) = book.holdings.get(hid) else {
                continue;
            };
            let out = settle_holding(
                &FinanceInput {
                    week,
                    holding,
                    financials,
                    loans,
                },
                &cfg.finance,
            );
            debug!(holding = %hid, cash = %out.holding.cash, interest = %out.holding_interest, "holding settled");
            for l in out.loans {
                book.loans.insert(l.id.clone(), l);
            }
            for f in out.financials {
                settled.insert(f.company_id.clone(), f);
            }
            book.holdings.insert(hid.clone(), out.holding);
        }

        // Insolvent holdings lose their loss-making companies.
        let floor = money(cfg.tick.bankruptcy_cash_floor);
        let mut bankruptcies: BTreeMap<_, u32> = BTreeMap::new();
        for h in book.holdings.values().filter(|h| h.cash < floor) {
            for c in book
                .companies
                .values_mut()
                .filter(|c| c.holding_id == h.id && c.status == CompanyStatus::Active)
            {
                let losing = settled
                    .get(&c.id)
                    .map(|f| f.net_profit < Decimal::ZERO)
                    .unwrap_or(false);
                if losing {
                    warn!(company = %c.id, holding = %h.id, cash = %h.cash, "company bankrupt");
                    c.status = CompanyStatus::Bankrupt;
                    *bankruptcies.entry(h.id.clone()).or_default() += 1;
                }
            }
        }

        // Events, then progression for player holdings.
        let mut events: Vec<GameEvent> = Vec::new();
        for h in book.holdings.values() {
            let owned: Vec<&Company> = book.companies.values().filter(|c| c.holding_id == h.id).collect();
            let financials: Vec<&CompanyFinancials> = owned.iter().filter_map(|c| settled.get(&c.id)).collect();
            events.extend(self.events.generate(&EventContext {
                world_id,
                week,
                holding: h,
                companies: &owned,
                financials: &financials,
                rng: &rng,
            }));
        }

        // Progression runs once per player across all of their holdings.
        let mut standings: BTreeMap<PlayerId, Standing> = BTreeMap::new();
        for h in book.holdings.values() {
            let Some(pid) = h.player_id() else {
                continue;
            };
            let owned: Vec<&Company> = book.companies.values().filter(|c| c.holding_id == h.id).collect();
            let standing = standings.entry(pid.clone()).or_default();
            for f in owned.iter().filter_map(|c| settled.get(&c.id)) {
                if f.net_profit > Decimal::ZERO {
                    standing.profitable += 1;
                }
                standing.profit += money_f64(f.net_profit);
            }
            standing.bankruptcies += bankruptcies.get(&h.id).copied().unwrap_or(0);
            for (i, e) in events.iter().enumerate() {
                let relevant = match &e.scope {
                    EventScope::World => true,
                    EventScope::Holding(id) => id == &h.id,
                    EventScope::Company(id) => owned.iter().any(|c| &c.id == id),
                    EventScope::Sector(id) => owned.iter().any(|c| &c.sector_id == id),
                };
                if relevant {
                    standing.events.insert(i);
                }
            }
        }

        let mut players: Vec<Player> = Vec::with_capacity(standings.len());
        for (pid, standing) in &standings {
            let player = store.get_player(pid).await?;
            let relevant: Vec<GameEvent> = standing.events.iter().map(|i| events[*i].clone()).collect();
            let out = progress_player(
                &ProgressionInput {
                    player: &player,
                    profitable_companies: standing.profitable,
                    total_profit: standing.profit,
                    bankruptcies: standing.bankruptcies,
                    events: &relevant,
                },
                &cfg.progression,
            );
            debug!(
                player = %pid,
                brand_xp = out.brand.xp,
                credit_xp = out.credit.xp,
                "progression applied"
            );
            players.push(out.player);
        }

        let upgrades: Vec<CompanyUpgrade> = ws
            .purchased
            .iter()
            .filter_map(|key| ws.upgrades.get(key).cloned())
            .collect();
        let programs: Vec<CompanyProgram> = ws
            .programs
            .into_values()
            .map(|mut p| {
                if p.status == ProgramStatus::Active && p.ends_at(week) {
                    p.status = ProgramStatus::Completed;
                }
                p
            })
            .collect();

        let report = TickReport {
            week,
            companies: next_states.len(),
            decisions_applied: tally.applied,
            decisions_skipped: tally.skipped,
            bot_decisions,
            bankruptcies: bankruptcies.values().map(|n| *n as usize).sum(),
            events: events.len(),
        };

        store
            .commit_tick(TickCommit {
                world_id: world_id.clone(),
                week,
                economy: WorldEconomyState {
                    current: week.next(),
                    last_tick_at: Some(now),
                    ..economy
                },
                company_states: next_states,
                financials: settled.into_values().collect(),
                companies: book.companies.into_values().collect(),
                holdings: book.holdings.into_values().collect(),
                loans: book.loans.into_values().collect(),
                programs,
                upgrades,
                events,
                players,
                decision_watermark: watermark,
                completed_at: now,
            })
            .await?;

        info!(
            %week,
            companies = report.companies,
            applied = report.decisions_applied,
            skipped = report.decisions_skipped,
            "tick completed"
        );
        Ok(report)
    }
}
