#![deny(warnings)]

//! Headless driver: loads or generates a world, runs weekly ticks and prints
//! KPIs per week.

mod scenario;

use anyhow::{bail, Context, Result};
use persistence::{MemoryStore, SqliteStore, StoreError, WorldSnapshot, WorldStore};
use rust_decimal::Decimal;
use sim_core::{CompanyStatus, EngineConfig, WorldId};
use sim_runtime::{TickOrchestrator, TickOutcome, TickReport};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Args {
    scenario: Option<String>,
    config: Option<String>,
    db: Option<String>,
    export: Option<String>,
    weeks: u32,
    seed: u64,
    bots: usize,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        scenario: None,
        config: None,
        db: None,
        export: None,
        weeks: 12,
        seed: 42,
        bots: 3,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = || it.next().with_context(|| format!("{arg} needs a value"));
        match arg.as_str() {
            "--scenario" => args.scenario = Some(value()?),
            "--config" => args.config = Some(value()?),
            "--db" => args.db = Some(value()?),
            "--export" => args.export = Some(value()?),
            "--weeks" => args.weeks = value()?.parse().context("--weeks")?,
            "--seed" => args.seed = value()?.parse().context("--seed")?,
            "--bots" => args.bots = value()?.parse().context("--bots")?,
            other => bail!("unknown argument {other}"),
        }
    }
    Ok(args)
}

/// Opens the requested store. Sqlite worlds are imported once and resumed
/// on later runs.
async fn open_store(
    args: &Args,
    snapshot: WorldSnapshot,
) -> Result<(Arc<dyn WorldStore>, Option<Arc<MemoryStore>>)> {
    let Some(url) = &args.db else {
        let memory = Arc::new(MemoryStore::with_snapshot(snapshot));
        let store: Arc<dyn WorldStore> = memory.clone();
        return Ok((store, Some(memory)));
    };
    let store = SqliteStore::connect(url).await?;
    match store.get_world(&snapshot.world.id).await {
        Ok(world) => info!(world = %world.id, "resuming stored world"),
        Err(StoreError::NotFound { .. }) => {
            store.import_snapshot(&snapshot).await?;
            info!(world = %snapshot.world.id, "imported world");
        }
        Err(e) => return Err(e.into()),
    }
    let store: Arc<dyn WorldStore> = Arc::new(store);
    Ok((store, None))
}

async fn print_kpis(store: &dyn WorldStore, world: &WorldId, report: &TickReport) -> Result<()> {
    let books = store.latest_company_financials(world).await?;
    let (revenue, profit) = books
        .iter()
        .filter(|f| f.week == report.week)
        .fold((Decimal::ZERO, Decimal::ZERO), |(r, p), f| (r + f.revenue, p + f.net_profit));
    let holdings = store.list_holdings(world).await?;
    let cash: Decimal = holdings.iter().map(|h| h.cash).sum();
    let debt: Decimal = holdings.iter().map(|h| h.total_debt).sum();
    let active = store
        .list_companies(world)
        .await?
        .iter()
        .filter(|c| c.status == CompanyStatus::Active)
        .count();
    println!(
        "KPI | week: {} | active: {} | revenue: ${} | profit: ${} | cash: ${} | debt: ${} | decisions: {}+{} bot | skipped: {} | bankrupt: {}",
        report.week,
        active,
        revenue.round_dp(2),
        profit.round_dp(2),
        cash.round_dp(2),
        debt.round_dp(2),
        report.decisions_applied.saturating_sub(report.bot_decisions),
        report.bot_decisions,
        report.decisions_skipped,
        report.bankruptcies,
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args()?;
    info!(?args, "starting CLI");

    let config = match &args.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => EngineConfig::default(),
    };
    let snapshot = match &args.scenario {
        Some(path) => WorldSnapshot::load(path).with_context(|| format!("loading {path}"))?,
        None => scenario::demo_world(args.seed, args.bots),
    };
    let world = snapshot.world.id.clone();
    println!(
        "World OK | {} | sectors: {} | niches: {} | holdings: {} | companies: {}",
        snapshot.world.name,
        snapshot.sectors.len(),
        snapshot.niches.len(),
        snapshot.holdings.len(),
        snapshot.companies.len()
    );

    let (store, memory) = open_store(&args, snapshot).await?;
    let orchestrator = TickOrchestrator::new(store.clone(), config)?;
    for _ in 0..args.weeks {
        match orchestrator.run_world_tick(&world).await? {
            TickOutcome::Completed(report) => print_kpis(store.as_ref(), &world, &report).await?,
            TickOutcome::AlreadyRunning => {
                warn!(%world, "another process is ticking this world");
                break;
            }
        }
    }

    if let Some(path) = &args.export {
        match &memory {
            Some(memory) => {
                let yaml = memory.snapshot(&world).await?.to_yaml()?;
                tokio::fs::write(path, yaml).await?;
                info!(%path, "exported world");
            }
            None => warn!("--export only applies to in-memory runs"),
        }
    }
    Ok(())
}
