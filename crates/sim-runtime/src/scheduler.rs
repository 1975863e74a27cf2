//! Polls active worlds and ticks the ones whose round interval has elapsed.

use crate::error::TickError;
use crate::orchestrator::{TickOrchestrator, TickOutcome};
use chrono::{DateTime, Duration, Utc};
use sim_core::{World, WorldEconomyState, WorldId};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;

pub type PollResult = Vec<(WorldId, Result<TickOutcome, TickError>)>;

pub struct Scheduler {
    orchestrator: Arc<TickOrchestrator>,
}

fn is_due(world: &World, economy: &WorldEconomyState, now: DateTime<Utc>) -> bool {
    let secs = i64::try_from(world.round_interval_secs)
        .unwrap_or(i64::MAX)
        .min(i64::MAX / 1_000);
    let interval = Duration::seconds(secs);
    match economy.last_tick_at {
        None => true,
        Some(last) => last
            .checked_add_signed(interval)
            .map(|due| due <= now)
            .unwrap_or(false),
    }
}

impl Scheduler {
    pub fn new(orchestrator: Arc<TickOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Tick every due world concurrently. Results are ordered by world id.
    /// A world whose clock cannot be read is reported and skipped.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> Result<PollResult, TickError> {
        let store = self.orchestrator.store();
        let mut results: PollResult = Vec::new();
        let mut set = JoinSet::new();
        for world in store.list_active_worlds().await? {
            let economy = match store.get_economy(&world.id).await {
                Ok(economy) => economy,
                Err(e) => {
                    tracing::debug!(world = %world.id, error = %e, "skipping world; economy unreadable");
                    results.push((world.id, Err(e.into())));
                    continue;
                }
            };
            if !is_due(&world, &economy, now) {
                continue;
            }
            let orchestrator = Arc::clone(&self.orchestrator);
            set.spawn(async move {
                let outcome = orchestrator.run_world_tick(&world.id).await;
                (world.id, outcome)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(pair) => results.push(pair),
                Err(e) => tracing::warn!(error = %e, "tick task aborted"),
            }
        }
        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }

    /// Poll on `every` until `shutdown` flips to true.
    pub async fn run(&self, every: std::time::Duration, mut shutdown: watch::Receiver<bool>) -> Result<(), TickError> {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let polled = match self.poll_once(self.orchestrator.now()).await {
                        Ok(polled) => polled,
                        Err(e) => {
                            tracing::warn!(error = %e, "poll failed; retrying next interval");
                            continue;
                        }
                    };
                    for (world, outcome) in polled {
                        match outcome {
                            Ok(TickOutcome::Completed(report)) => {
                                tracing::info!(%world, week = %report.week, "scheduled tick completed")
                            }
                            Ok(TickOutcome::AlreadyRunning) => {}
                            Err(e) => tracing::warn!(%world, error = %e, "scheduled tick failed"),
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("scheduler stopping");
                        return Ok(());
                    }
                }
            }
        }
    }
}
