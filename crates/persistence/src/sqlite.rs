//! SQLite store. Documents are JSON bodies; the tick lock lives in real
//! columns so acquiring it is one conditional `UPDATE`.

use crate::error::{StoreError, StoreResult};
use crate::snapshot::WorldSnapshot;
use crate::store::{TickCommit, WorldStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sim_core::{
    Bot, Company, CompanyDecision, CompanyDecisionPayload, CompanyFinancials, CompanyId,
    CompanyProgram, CompanyState, CompanyUpgrade, DecisionId, GameEvent, GameWeek, Holding,
    HoldingDecision, HoldingDecisionPayload, HoldingId, Loan, Niche, NicheUpgrade, Player,
    PlayerId, RoundStatus, Sector, World, WorldEconomyState, WorldId, WorldRound,
    WorldSectorState,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Tables holding `(world_id, id, body)` documents.
const DOC_TABLES: [&str; 7] = [
    "sectors",
    "niches",
    "niche_upgrades",
    "holdings",
    "bots",
    "companies",
    "loans",
];

fn encode<T: Serialize>(value: &T) -> StoreResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn decode<T: DeserializeOwned>(body: &str) -> StoreResult<T> {
    Ok(serde_json::from_str(body)?)
}

fn decode_all<T: DeserializeOwned>(bodies: Vec<String>) -> StoreResult<Vec<T>> {
    bodies.iter().map(|b| decode(b)).collect()
}

/// The serde tag of a unit enum variant, e.g. `"ACTIVE"`.
fn tag<T: Serialize>(value: &T) -> StoreResult<String> {
    Ok(serde_json::to_value(value)?
        .as_str()
        .unwrap_or_default()
        .to_string())
}

async fn upsert_doc(
    conn: &mut SqliteConnection,
    table: &'static str,
    world: &WorldId,
    id: &str,
    body: String,
) -> StoreResult<()> {
    debug_assert!(DOC_TABLES.contains(&table));
    let sql = format!(
        "INSERT INTO {table} (world_id, id, body) VALUES (?1, ?2, ?3) \
         ON CONFLICT(world_id, id) DO UPDATE SET body = excluded.body"
    );
    sqlx::query(&sql)
        .bind(world.as_str())
        .bind(id)
        .bind(body)
        .execute(conn)
        .await?;
    Ok(())
}

async fn upsert_sector_state(conn: &mut SqliteConnection, s: &WorldSectorState) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO sector_states (world_id, sector_id, body) VALUES (?1, ?2, ?3) \
         ON CONFLICT(world_id, sector_id) DO UPDATE SET body = excluded.body",
    )
    .bind(s.world_id.as_str())
    .bind(s.sector_id.as_str())
    .bind(encode(s)?)
    .execute(conn)
    .await?;
    Ok(())
}

async fn upsert_weekly(
    conn: &mut SqliteConnection,
    table: &'static str,
    world: &WorldId,
    company: &CompanyId,
    week: GameWeek,
    body: String,
) -> StoreResult<()> {
    let sql = format!(
        "INSERT INTO {table} (world_id, company_id, week_index, body) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(company_id, week_index) DO UPDATE SET body = excluded.body"
    );
    sqlx::query(&sql)
        .bind(world.as_str())
        .bind(company.as_str())
        .bind(week.index())
        .bind(body)
        .execute(conn)
        .await?;
    Ok(())
}

async fn upsert_program(conn: &mut SqliteConnection, world: &WorldId, p: &CompanyProgram) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO programs (world_id, id, status, body) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(world_id, id) DO UPDATE SET status = excluded.status, body = excluded.body",
    )
    .bind(world.as_str())
    .bind(p.id.as_str())
    .bind(tag(&p.status)?)
    .bind(encode(p)?)
    .execute(conn)
    .await?;
    Ok(())
}

async fn upsert_upgrade(conn: &mut SqliteConnection, world: &WorldId, u: &CompanyUpgrade) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO company_upgrades (world_id, company_id, upgrade_id, body) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(company_id, upgrade_id) DO UPDATE SET body = excluded.body",
    )
    .bind(world.as_str())
    .bind(u.company_id.as_str())
    .bind(u.upgrade_id.as_str())
    .bind(encode(u)?)
    .execute(conn)
    .await?;
    Ok(())
}

async fn upsert_player(conn: &mut SqliteConnection, p: &Player) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO players (id, body) VALUES (?1, ?2) \
         ON CONFLICT(id) DO UPDATE SET body = excluded.body",
    )
    .bind(p.id.as_str())
    .bind(encode(p)?)
    .execute(conn)
    .await?;
    Ok(())
}

async fn upsert_round(conn: &mut SqliteConnection, r: &WorldRound) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO rounds (world_id, week_index, status, body) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(world_id, week_index) DO UPDATE SET status = excluded.status, body = excluded.body",
    )
    .bind(r.world_id.as_str())
    .bind(r.week.index())
    .bind(tag(&r.status)?)
    .bind(encode(r)?)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_event(conn: &mut SqliteConnection, e: &GameEvent) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO events (world_id, id, week_index, body) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(world_id, id) DO UPDATE SET week_index = excluded.week_index, body = excluded.body",
    )
    .bind(e.world_id.as_str())
    .bind(e.id.as_str())
    .bind(e.week.index())
    .bind(encode(e)?)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_decision(
    conn: &mut SqliteConnection,
    seq: u64,
    world: &WorldId,
    scope: &str,
    week: GameWeek,
    body: String,
) -> StoreResult<()> {
    sqlx::query(
        "INSERT OR REPLACE INTO decisions (seq, world_id, scope, week_index, body) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(seq as i64)
    .bind(world.as_str())
    .bind(scope)
    .bind(week.index())
    .bind(body)
    .execute(conn)
    .await?;
    Ok(())
}

/// SQLite integers are signed; larger watermarks mean "everything".
async fn stored_week(conn: &mut SqliteConnection, world: &WorldId) -> StoreResult<GameWeek> {
    let body = sqlx::query_scalar::<_, String>("SELECT body FROM economies WHERE world_id = ?1")
        .bind(world.as_str())
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| StoreError::not_found("economy", world))?;
    let economy: WorldEconomyState = decode(&body)?;
    Ok(economy.current)
}

fn seq_bound(seq: u64) -> i64 {
    i64::try_from(seq).unwrap_or(i64::MAX)
}

fn from_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) and migrate. In-memory databases get a
    /// single connection so every query sees the same database.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let max = if url.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!(url, "sqlite store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Write a whole snapshot in one transaction, replacing rows with the
    /// same keys.
    pub async fn import_snapshot(&self, s: &WorldSnapshot) -> StoreResult<()> {
        s.validate()?;
        let w = &s.world.id;
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR REPLACE INTO worlds (id, status, body) VALUES (?1, ?2, ?3)")
            .bind(w.as_str())
            .bind(tag(&s.world.status)?)
            .bind(encode(&s.world)?)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT OR REPLACE INTO economies (world_id, body, is_ticking, lock_at_ms) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(w.as_str())
        .bind(encode(&s.economy)?)
        .bind(i64::from(s.economy.is_ticking))
        .bind(s.economy.lock_at.map(|t| t.timestamp_millis()))
        .execute(&mut *tx)
        .await?;

        for x in &s.sectors {
            upsert_doc(&mut tx, "sectors", w, x.id.as_str(), encode(x)?).await?;
        }
        for x in &s.niches {
            upsert_doc(&mut tx, "niches", w, x.id.as_str(), encode(x)?).await?;
        }
        for x in &s.niche_upgrades {
            upsert_doc(&mut tx, "niche_upgrades", w, x.id.as_str(), encode(x)?).await?;
        }
        for x in &s.holdings {
            upsert_doc(&mut tx, "holdings", w, x.id.as_str(), encode(x)?).await?;
        }
        for x in &s.bots {
            upsert_doc(&mut tx, "bots", w, x.id.as_str(), encode(x)?).await?;
        }
        for x in &s.companies {
            upsert_doc(&mut tx, "companies", w, x.id.as_str(), encode(x)?).await?;
        }
        for x in &s.loans {
            upsert_doc(&mut tx, "loans", w, x.id.as_str(), encode(x)?).await?;
        }
        for x in &s.sector_states {
            upsert_sector_state(&mut tx, x).await?;
        }
        for x in &s.players {
            upsert_player(&mut tx, x).await?;
        }
        for x in &s.company_states {
            upsert_weekly(&mut tx, "company_states", w, &x.company_id, x.week, encode(x)?).await?;
        }
        for x in &s.financials {
            upsert_weekly(&mut tx, "company_financials", w, &x.company_id, x.week, encode(x)?).await?;
        }
        for x in &s.programs {
            upsert_program(&mut tx, w, x).await?;
        }
        for x in &s.company_upgrades {
            upsert_upgrade(&mut tx, w, x).await?;
        }
        for x in &s.company_decisions {
            insert_decision(&mut tx, x.seq, w, "COMPANY", x.week, encode(x)?).await?;
        }
        for x in &s.holding_decisions {
            insert_decision(&mut tx, x.seq, w, "HOLDING", x.week, encode(x)?).await?;
        }
        for x in &s.events {
            insert_event(&mut tx, x).await?;
        }
        for x in &s.rounds {
            upsert_round(&mut tx, x).await?;
        }
        tx.commit().await?;
        tracing::info!(world = %w, companies = s.companies.len(), "snapshot imported");
        Ok(())
    }

    async fn bodies(&self, sql: &str, world: &WorldId) -> StoreResult<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>(sql)
            .bind(world.as_str())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn docs<T: DeserializeOwned>(&self, table: &'static str, world: &WorldId) -> StoreResult<Vec<T>> {
        debug_assert!(DOC_TABLES.contains(&table));
        let sql = format!("SELECT body FROM {table} WHERE world_id = ?1 ORDER BY id");
        decode_all(self.bodies(&sql, world).await?)
    }

    async fn decisions<T: DeserializeOwned>(
        &self,
        world: &WorldId,
        scope: &str,
        week: GameWeek,
        up_to_seq: u64,
    ) -> StoreResult<Vec<T>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT body FROM decisions WHERE world_id = ?1 AND scope = ?2 AND week_index = ?3 \
             AND seq <= ?4 AND body IS NOT NULL ORDER BY seq",
        )
        .bind(world.as_str())
        .bind(scope)
        .bind(week.index())
        .bind(seq_bound(up_to_seq))
        .fetch_all(&self.pool)
        .await?;
        decode_all(rows)
    }

    /// Reserve a sequence number, build the decision with it and store it.
    async fn append_decision<T: Serialize + Send>(
        &self,
        world: &WorldId,
        scope: &str,
        owner_table: &'static str,
        owner: &str,
        week: GameWeek,
        build: impl FnOnce(u64) -> T + Send,
    ) -> StoreResult<T> {
        let mut tx = self.pool.begin().await?;
        let sql = format!("SELECT COUNT(*) FROM {owner_table} WHERE world_id = ?1 AND id = ?2");
        let exists: i64 = sqlx::query_scalar(&sql)
            .bind(world.as_str())
            .bind(owner)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(StoreError::not_found(
                if owner_table == "companies" { "company" } else { "holding" },
                owner,
            ));
        }
        let current = stored_week(&mut tx, world).await?;
        if week < current {
            return Err(StoreError::week_closed(world, week, current));
        }
        let res = sqlx::query("INSERT INTO decisions (world_id, scope, week_index) VALUES (?1, ?2, ?3)")
            .bind(world.as_str())
            .bind(scope)
            .bind(week.index())
            .execute(&mut *tx)
            .await?;
        let seq = res.last_insert_rowid() as u64;
        let decision = build(seq);
        sqlx::query("UPDATE decisions SET body = ?1 WHERE seq = ?2")
            .bind(encode(&decision)?)
            .bind(seq as i64)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(decision)
    }
}

#[async_trait]
impl WorldStore for SqliteStore {
    async fn list_active_worlds(&self) -> StoreResult<Vec<World>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT body FROM worlds WHERE status = 'ACTIVE' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        decode_all(rows)
    }

    async fn get_world(&self, world: &WorldId) -> StoreResult<World> {
        let row = sqlx::query_scalar::<_, String>("SELECT body FROM worlds WHERE id = ?1")
            .bind(world.as_str())
            .fetch_optional(&self.pool)
            .await?;
        let body = row.ok_or_else(|| StoreError::not_found("world", world))?;
        decode(&body)
    }

    async fn get_economy(&self, world: &WorldId) -> StoreResult<WorldEconomyState> {
        let row = sqlx::query_as::<_, (String, i64, Option<i64>)>(
            "SELECT body, is_ticking, lock_at_ms FROM economies WHERE world_id = ?1",
        )
        .bind(world.as_str())
        .fetch_optional(&self.pool)
        .await?;
        let (body, is_ticking, lock_at) = row.ok_or_else(|| StoreError::not_found("economy", world))?;
        let economy: WorldEconomyState = decode(&body)?;
        Ok(WorldEconomyState {
            is_ticking: is_ticking != 0,
            lock_at: from_millis(lock_at),
            ..economy
        })
    }

    async fn try_lock_tick(
        &self,
        world: &WorldId,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let res = sqlx::query(
            "UPDATE economies SET is_ticking = 1, lock_at_ms = ?1 \
             WHERE world_id = ?2 AND (is_ticking = 0 OR lock_at_ms IS NULL OR lock_at_ms < ?3)",
        )
        .bind(now.timestamp_millis())
        .bind(world.as_str())
        .bind(stale_before.timestamp_millis())
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 1 {
            return Ok(true);
        }
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM economies WHERE world_id = ?1")
            .bind(world.as_str())
            .fetch_one(&self.pool)
            .await?;
        if exists == 0 {
            return Err(StoreError::not_found("economy", world));
        }
        Ok(false)
    }

    async fn unlock_tick(&self, world: &WorldId, locked_at: DateTime<Utc>) -> StoreResult<bool> {
        let res = sqlx::query(
            "UPDATE economies SET is_ticking = 0, lock_at_ms = NULL WHERE world_id = ?1 AND lock_at_ms = ?2",
        )
        .bind(world.as_str())
        .bind(locked_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn begin_round(
        &self,
        world: &WorldId,
        week: GameWeek,
        now: DateTime<Utc>,
    ) -> StoreResult<WorldRound> {
        let current = self.get_economy(world).await?.current;
        if current != week {
            return Err(StoreError::week_closed(world, week, current));
        }
        let round = match self.get_round(world, week).await? {
            Some(r) => WorldRound {
                status: RoundStatus::Running,
                started_at: Some(now),
                failure: None,
                ..r
            },
            None => WorldRound {
                world_id: world.clone(),
                week,
                status: RoundStatus::Running,
                started_at: Some(now),
                completed_at: None,
                failure: None,
            },
        };
        let mut conn = self.pool.acquire().await?;
        upsert_round(&mut conn, &round).await?;
        Ok(round)
    }

    async fn fail_round(&self, world: &WorldId, week: GameWeek, reason: &str) -> StoreResult<()> {
        if let Some(r) = self.get_round(world, week).await?.filter(|r| r.status != RoundStatus::Completed) {
            let failed = WorldRound {
                status: RoundStatus::Failed,
                failure: Some(reason.to_string()),
                ..r
            };
            let mut conn = self.pool.acquire().await?;
            upsert_round(&mut conn, &failed).await?;
        }
        Ok(())
    }

    async fn get_round(&self, world: &WorldId, week: GameWeek) -> StoreResult<Option<WorldRound>> {
        let row = sqlx::query_scalar::<_, String>(
            "SELECT body FROM rounds WHERE world_id = ?1 AND week_index = ?2",
        )
        .bind(world.as_str())
        .bind(week.index())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|b| decode(&b)).transpose()
    }

    async fn list_sectors(&self, world: &WorldId) -> StoreResult<Vec<Sector>> {
        self.docs("sectors", world).await
    }

    async fn list_niches(&self, world: &WorldId) -> StoreResult<Vec<Niche>> {
        self.docs("niches", world).await
    }

    async fn list_niche_upgrades(&self, world: &WorldId) -> StoreResult<Vec<NicheUpgrade>> {
        self.docs("niche_upgrades", world).await
    }

    async fn list_sector_states(&self, world: &WorldId) -> StoreResult<Vec<WorldSectorState>> {
        let rows = self
            .bodies(
                "SELECT body FROM sector_states WHERE world_id = ?1 ORDER BY sector_id",
                world,
            )
            .await?;
        decode_all(rows)
    }

    async fn upsert_sector_states(&self, states: &[WorldSectorState]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for s in states {
            upsert_sector_state(&mut tx, s).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_holdings(&self, world: &WorldId) -> StoreResult<Vec<Holding>> {
        self.docs("holdings", world).await
    }

    async fn list_bots(&self, world: &WorldId) -> StoreResult<Vec<Bot>> {
        self.docs("bots", world).await
    }

    async fn list_companies(&self, world: &WorldId) -> StoreResult<Vec<Company>> {
        self.docs("companies", world).await
    }

    async fn latest_company_states(&self, world: &WorldId) -> StoreResult<Vec<CompanyState>> {
        let rows = self
            .bodies(
                "SELECT s.body FROM company_states s \
                 JOIN (SELECT company_id, MAX(week_index) AS wi FROM company_states \
                       WHERE world_id = ?1 GROUP BY company_id) m \
                 ON s.company_id = m.company_id AND s.week_index = m.wi \
                 ORDER BY s.company_id",
                world,
            )
            .await?;
        decode_all(rows)
    }

    async fn latest_company_financials(
        &self,
        world: &WorldId,
    ) -> StoreResult<Vec<CompanyFinancials>> {
        let rows = self
            .bodies(
                "SELECT f.body FROM company_financials f \
                 JOIN (SELECT company_id, MAX(week_index) AS wi FROM company_financials \
                       WHERE world_id = ?1 GROUP BY company_id) m \
                 ON f.company_id = m.company_id AND f.week_index = m.wi \
                 ORDER BY f.company_id",
                world,
            )
            .await?;
        decode_all(rows)
    }

    async fn decision_watermark(&self, world: &WorldId) -> StoreResult<u64> {
        let max: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(seq), 0) FROM decisions WHERE world_id = ?1")
            .bind(world.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(max.max(0) as u64)
    }

    async fn list_company_decisions(
        &self,
        world: &WorldId,
        week: GameWeek,
        up_to_seq: u64,
    ) -> StoreResult<Vec<CompanyDecision>> {
        self.decisions(world, "COMPANY", week, up_to_seq).await
    }

    async fn list_holding_decisions(
        &self,
        world: &WorldId,
        week: GameWeek,
        up_to_seq: u64,
    ) -> StoreResult<Vec<HoldingDecision>> {
        self.decisions(world, "HOLDING", week, up_to_seq).await
    }

    async fn submit_company_decision(
        &self,
        world: &WorldId,
        company: &CompanyId,
        week: GameWeek,
        payload: CompanyDecisionPayload,
        now: DateTime<Utc>,
    ) -> StoreResult<CompanyDecision> {
        self.append_decision(world, "COMPANY", "companies", company.as_str(), week, |seq| CompanyDecision {
            id: DecisionId::new(format!("dec-{seq}")),
            seq,
            world_id: world.clone(),
            company_id: company.clone(),
            week,
            created_at: now,
            payload,
        })
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
        self.append_decision(world, "HOLDING", "holdings", holding.as_str(), week, |seq| HoldingDecision {
            id: DecisionId::new(format!("dec-{seq}")),
            seq,
            world_id: world.clone(),
            holding_id: holding.clone(),
            week,
            created_at: now,
            payload,
        })
        .await
    }

    async fn list_active_programs(&self, world: &WorldId) -> StoreResult<Vec<CompanyProgram>> {
        let rows = self
            .bodies(
                "SELECT body FROM programs WHERE world_id = ?1 AND status = 'ACTIVE' ORDER BY id",
                world,
            )
            .await?;
        decode_all(rows)
    }

    async fn list_company_upgrades(&self, world: &WorldId) -> StoreResult<Vec<CompanyUpgrade>> {
        let rows = self
            .bodies(
                "SELECT body FROM company_upgrades WHERE world_id = ?1 ORDER BY company_id, upgrade_id",
                world,
            )
            .await?;
        decode_all(rows)
    }

    async fn list_loans(&self, world: &WorldId) -> StoreResult<Vec<Loan>> {
        self.docs("loans", world).await
    }

    async fn list_events(&self, world: &WorldId, week: GameWeek) -> StoreResult<Vec<GameEvent>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT body FROM events WHERE world_id = ?1 AND week_index = ?2 ORDER BY id",
        )
        .bind(world.as_str())
        .bind(week.index())
        .fetch_all(&self.pool)
        .await?;
        decode_all(rows)
    }

    async fn get_player(&self, player: &PlayerId) -> StoreResult<Player> {
        let row = sqlx::query_scalar::<_, String>("SELECT body FROM players WHERE id = ?1")
            .bind(player.as_str())
            .fetch_optional(&self.pool)
            .await?;
        let body = row.ok_or_else(|| StoreError::not_found("player", player))?;
        decode(&body)
    }

    async fn commit_tick(&self, c: TickCommit) -> StoreResult<()> {
        let w = &c.world_id;
        let mut tx = self.pool.begin().await?;
        let current = stored_week(&mut tx, w).await?;
        if current != c.week {
            return Err(StoreError::week_closed(w, c.week, current));
        }

        for s in &c.company_states {
            upsert_weekly(&mut tx, "company_states", w, &s.company_id, s.week, encode(s)?).await?;
        }
        for f in &c.financials {
            upsert_weekly(&mut tx, "company_financials", w, &f.company_id, f.week, encode(f)?).await?;
        }
        for x in &c.companies {
            upsert_doc(&mut tx, "companies", w, x.id.as_str(), encode(x)?).await?;
        }
        for x in &c.holdings {
            upsert_doc(&mut tx, "holdings", w, x.id.as_str(), encode(x)?).await?;
        }
        for x in &c.loans {
            upsert_doc(&mut tx, "loans", w, x.id.as_str(), encode(x)?).await?;
        }
        for p in &c.programs {
            upsert_program(&mut tx, w, p).await?;
        }
        for u in &c.upgrades {
            upsert_upgrade(&mut tx, w, u).await?;
        }
        sqlx::query("DELETE FROM events WHERE world_id = ?1 AND week_index = ?2")
            .bind(w.as_str())
            .bind(c.week.index())
            .execute(&mut *tx)
            .await?;
        for e in &c.events {
            insert_event(&mut tx, e).await?;
        }
        for p in &c.players {
            upsert_player(&mut tx, p).await?;
        }

        let late = sqlx::query_as::<_, (i64, String)>(
            "SELECT seq, body FROM decisions WHERE world_id = ?1 AND week_index = ?2 \
             AND seq > ?3 AND body IS NOT NULL",
        )
        .bind(w.as_str())
        .bind(c.week.index())
        .bind(seq_bound(c.decision_watermark))
        .fetch_all(&mut *tx)
        .await?;
        let next = c.week.next();
        for (seq, body) in late {
            let mut doc: serde_json::Value = decode(&body)?;
            doc["week"] = serde_json::to_value(next)?;
            sqlx::query("UPDATE decisions SET week_index = ?1, body = ?2 WHERE seq = ?3")
                .bind(next.index())
                .bind(encode(&doc)?)
                .bind(seq)
                .execute(&mut *tx)
                .await?;
        }

        let economy = WorldEconomyState {
            is_ticking: false,
            lock_at: None,
            ..c.economy.clone()
        };
        sqlx::query("UPDATE economies SET body = ?1 WHERE world_id = ?2")
            .bind(encode(&economy)?)
            .bind(w.as_str())
            .execute(&mut *tx)
            .await?;

        let round = sqlx::query_scalar::<_, String>(
            "SELECT body FROM rounds WHERE world_id = ?1 AND week_index = ?2",
        )
        .bind(w.as_str())
        .bind(c.week.index())
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(body) = round {
            let r: WorldRound = decode(&body)?;
            let done = WorldRound {
                status: RoundStatus::Completed,
                completed_at: Some(c.completed_at),
                failure: None,
                ..r
            };
            upsert_round(&mut tx, &done).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
