//! SQLite-backed local store for servers, providers, catalogs, cases,
//! intentions and persisted schedules.
//!
//! The connection is guarded by a mutex; every multi-statement write
//! (selection flips, get-or-create) runs inside a single transaction so a
//! concurrent reader never observes a half-applied selection.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::types::*;

pub struct LocalStore {
    conn: Mutex<Connection>,
}

#[derive(Clone, Debug)]
pub struct NewServer {
    pub url: String,
    pub description: String,
    pub api_key: String,
}

#[derive(Clone, Debug)]
pub struct NewProvider {
    pub name: String,
    pub server_provider_id: String,
    pub server_id: ServerId,
    pub url: String,
    pub api_key: String,
    pub exchange_id: String,
}

#[derive(Clone, Debug)]
pub struct NewIntention {
    pub description: String,
    pub intention: String,
    pub hold_minutes: i64,
    pub amount: f64,
    pub stop_loss_percentage: f64,
    pub take_profit_percentage: f64,
}

#[derive(Clone, Debug)]
pub struct NewSchedule {
    pub intention_id: IntentionId,
    pub buy_datetime: DateTime<Utc>,
    pub sell_datetime: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub server_schedule_buy_id: Option<RemoteScheduleId>,
    pub server_schedule_sell_id: Option<RemoteScheduleId>,
}

impl LocalStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("opening database at {}", path.display()))?;
        let store = Self::from_connection(conn)?;
        info!(path = %path.display(), "local store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS servers (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                url         TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                api_key     TEXT NOT NULL DEFAULT '',
                selected    INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS providers (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                name               TEXT NOT NULL,
                server_provider_id TEXT NOT NULL,
                server_id          INTEGER NOT NULL REFERENCES servers(id),
                url                TEXT NOT NULL DEFAULT '',
                api_key            TEXT NOT NULL DEFAULT '',
                exchange_id        TEXT NOT NULL DEFAULT '',
                selected           INTEGER NOT NULL DEFAULT 0,
                UNIQUE(server_provider_id, server_id)
            );
            CREATE TABLE IF NOT EXISTS catalogs (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL,
                host_catalog_id INTEGER NOT NULL UNIQUE,
                selected        INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS cases (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                host_case_id INTEGER NOT NULL UNIQUE,
                name         TEXT NOT NULL,
                catalog_id   INTEGER NOT NULL,
                selected     INTEGER NOT NULL DEFAULT 0,
                created_at   INTEGER NOT NULL DEFAULT (strftime('%s','now'))
            );
            CREATE TABLE IF NOT EXISTS intentions (
                id                     INTEGER PRIMARY KEY AUTOINCREMENT,
                description            TEXT NOT NULL DEFAULT '',
                intention              TEXT NOT NULL,
                hold_minutes           INTEGER NOT NULL,
                amount                 REAL NOT NULL,
                stop_loss_percentage   REAL NOT NULL,
                take_profit_percentage REAL NOT NULL,
                selected               INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS intention_schedules (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                intention_id            INTEGER NOT NULL REFERENCES intentions(id),
                buy_datetime            INTEGER NOT NULL,
                sell_datetime           INTEGER NOT NULL,
                status                  TEXT NOT NULL,
                server_schedule_buy_id  TEXT,
                server_schedule_sell_id TEXT,
                created_at              INTEGER NOT NULL DEFAULT (strftime('%s','now'))
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ---- servers ----

    pub fn insert_server(&self, new: &NewServer) -> Result<Server> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO servers (url, description, api_key) VALUES (?1, ?2, ?3)",
            params![new.url, new.description, new.api_key],
        )
        .context("inserting server")?;
        let id = conn.last_insert_rowid();
        Self::server_by_id(&conn, ServerId(id))?.context("server vanished after insert")
    }

    pub fn list_servers(&self) -> Result<Vec<Server>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, url, description, api_key, selected FROM servers ORDER BY id",
        )?;
        let rows = stmt.query_map([], map_server)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_server(&self, id: ServerId) -> Result<Option<Server>> {
        Self::server_by_id(&self.conn.lock(), id)
    }

    fn server_by_id(conn: &Connection, id: ServerId) -> Result<Option<Server>> {
        Ok(conn
            .query_row(
                "SELECT id, url, description, api_key, selected FROM servers WHERE id = ?1",
                params![id.0],
                map_server,
            )
            .optional()?)
    }

    pub fn update_server(&self, id: ServerId, description: &str, api_key: &str) -> Result<bool> {
        let n = self.conn.lock().execute(
            "UPDATE servers SET description = ?2, api_key = ?3 WHERE id = ?1",
            params![id.0, description, api_key],
        )?;
        Ok(n > 0)
    }

    pub fn selected_server(&self) -> Result<Option<Server>> {
        Ok(self
            .conn
            .lock()
            .query_row(
                "SELECT id, url, description, api_key, selected FROM servers WHERE selected = 1",
                [],
                map_server,
            )
            .optional()?)
    }

    /// Make `target` the only selected server; `None` deselects all.
    pub fn select_server(&self, target: Option<ServerId>) -> Result<()> {
        self.flip_selection("servers", None, target.map(|id| id.0))
    }

    // ---- providers ----

    pub fn insert_provider(&self, new: &NewProvider) -> Result<Provider> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO providers (name, server_provider_id, server_id, url, api_key, exchange_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.name,
                new.server_provider_id,
                new.server_id.0,
                new.url,
                new.api_key,
                new.exchange_id
            ],
        )
        .context("inserting provider")?;
        let id = conn.last_insert_rowid();
        Self::provider_by_id(&conn, ProviderId(id))?.context("provider vanished after insert")
    }

    pub fn list_providers(&self) -> Result<Vec<Provider>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, server_provider_id, server_id, url, api_key, exchange_id, selected
             FROM providers ORDER BY id",
        )?;
        let rows = stmt.query_map([], map_provider)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_provider(&self, id: ProviderId) -> Result<Option<Provider>> {
        Self::provider_by_id(&self.conn.lock(), id)
    }

    fn provider_by_id(conn: &Connection, id: ProviderId) -> Result<Option<Provider>> {
        Ok(conn
            .query_row(
                "SELECT id, name, server_provider_id, server_id, url, api_key, exchange_id, selected
                 FROM providers WHERE id = ?1",
                params![id.0],
                map_provider,
            )
            .optional()?)
    }

    /// Provider selection is scoped to one server; other servers' providers
    /// keep their selection.
    pub fn select_provider(&self, server_id: ServerId, target: Option<ProviderId>) -> Result<()> {
        self.flip_selection("providers", Some(server_id), target.map(|id| id.0))
    }

    // ---- catalogs ----

    /// Insert-or-refresh the local mirror row for a host catalog.
    pub fn upsert_catalog(&self, name: &str, host_catalog_id: HostCatalogId) -> Result<Catalog> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO catalogs (name, host_catalog_id) VALUES (?1, ?2)
             ON CONFLICT(host_catalog_id) DO UPDATE SET name = excluded.name",
            params![name, host_catalog_id.0],
        )?;
        conn.query_row(
            "SELECT id, name, host_catalog_id, selected FROM catalogs WHERE host_catalog_id = ?1",
            params![host_catalog_id.0],
            map_catalog,
        )
        .context("catalog vanished after upsert")
    }

    pub fn list_catalogs(&self) -> Result<Vec<Catalog>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, name, host_catalog_id, selected FROM catalogs ORDER BY id")?;
        let rows = stmt.query_map([], map_catalog)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_catalog(&self, id: CatalogId) -> Result<Option<Catalog>> {
        Ok(self
            .conn
            .lock()
            .query_row(
                "SELECT id, name, host_catalog_id, selected FROM catalogs WHERE id = ?1",
                params![id.0],
                map_catalog,
            )
            .optional()?)
    }

    pub fn select_catalog(&self, target: Option<CatalogId>) -> Result<()> {
        self.flip_selection("catalogs", None, target.map(|id| id.0))
    }

    // ---- cases ----

    /// Mirror a host case locally. Re-registering an already-known host case
    /// returns the existing row untouched.
    pub fn get_or_create_case(
        &self,
        host_case_id: HostCaseId,
        name: &str,
        catalog_id: CatalogId,
    ) -> Result<CaseRecord> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let existing = tx
            .query_row(
                "SELECT id, host_case_id, name, catalog_id, selected, created_at
                 FROM cases WHERE host_case_id = ?1",
                params![host_case_id.0],
                map_case,
            )
            .optional()?;
        let case = match existing {
            Some(case) => case,
            None => {
                tx.execute(
                    "INSERT INTO cases (host_case_id, name, catalog_id) VALUES (?1, ?2, ?3)",
                    params![host_case_id.0, name, catalog_id.0],
                )?;
                let id = tx.last_insert_rowid();
                tx.query_row(
                    "SELECT id, host_case_id, name, catalog_id, selected, created_at
                     FROM cases WHERE id = ?1",
                    params![id],
                    map_case,
                )?
            }
        };
        tx.commit()?;
        Ok(case)
    }

    pub fn list_cases(&self) -> Result<Vec<CaseRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, host_case_id, name, catalog_id, selected, created_at
             FROM cases ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], map_case)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_case(&self, id: CaseId) -> Result<Option<CaseRecord>> {
        Ok(self
            .conn
            .lock()
            .query_row(
                "SELECT id, host_case_id, name, catalog_id, selected, created_at
                 FROM cases WHERE id = ?1",
                params![id.0],
                map_case,
            )
            .optional()?)
    }

    pub fn select_case(&self, target: Option<CaseId>) -> Result<()> {
        self.flip_selection("cases", None, target.map(|id| id.0))
    }

    // ---- intentions ----

    pub fn insert_intention(&self, new: &NewIntention) -> Result<Intention> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO intentions
               (description, intention, hold_minutes, amount, stop_loss_percentage, take_profit_percentage)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.description,
                new.intention,
                new.hold_minutes,
                new.amount,
                new.stop_loss_percentage,
                new.take_profit_percentage
            ],
        )
        .context("inserting intention")?;
        let id = conn.last_insert_rowid();
        Self::intention_by_id(&conn, IntentionId(id))?.context("intention vanished after insert")
    }

    pub fn list_intentions(&self) -> Result<Vec<Intention>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, description, intention, hold_minutes, amount,
                    stop_loss_percentage, take_profit_percentage, selected
             FROM intentions ORDER BY id",
        )?;
        let rows = stmt.query_map([], map_intention)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_intention(&self, id: IntentionId) -> Result<Option<Intention>> {
        Self::intention_by_id(&self.conn.lock(), id)
    }

    fn intention_by_id(conn: &Connection, id: IntentionId) -> Result<Option<Intention>> {
        Ok(conn
            .query_row(
                "SELECT id, description, intention, hold_minutes, amount,
                        stop_loss_percentage, take_profit_percentage, selected
                 FROM intentions WHERE id = ?1",
                params![id.0],
                map_intention,
            )
            .optional()?)
    }

    pub fn update_intention(&self, id: IntentionId, new: &NewIntention) -> Result<bool> {
        let n = self.conn.lock().execute(
            "UPDATE intentions SET description = ?2, intention = ?3, hold_minutes = ?4,
                    amount = ?5, stop_loss_percentage = ?6, take_profit_percentage = ?7
             WHERE id = ?1",
            params![
                id.0,
                new.description,
                new.intention,
                new.hold_minutes,
                new.amount,
                new.stop_loss_percentage,
                new.take_profit_percentage
            ],
        )?;
        Ok(n > 0)
    }

    pub fn delete_intention(&self, id: IntentionId) -> Result<bool> {
        let n = self
            .conn
            .lock()
            .execute("DELETE FROM intentions WHERE id = ?1", params![id.0])?;
        Ok(n > 0)
    }

    pub fn select_intention(&self, target: Option<IntentionId>) -> Result<()> {
        self.flip_selection("intentions", None, target.map(|id| id.0))
    }

    // ---- schedules ----

    pub fn insert_schedule(&self, new: &NewSchedule) -> Result<IntentionSchedule> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO intention_schedules
               (intention_id, buy_datetime, sell_datetime, status,
                server_schedule_buy_id, server_schedule_sell_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.intention_id.0,
                new.buy_datetime.timestamp(),
                new.sell_datetime.timestamp(),
                new.status.as_str(),
                new.server_schedule_buy_id.as_ref().map(|id| id.0.as_str()),
                new.server_schedule_sell_id.as_ref().map(|id| id.0.as_str()),
            ],
        )
        .context("inserting intention schedule")?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT id, intention_id, buy_datetime, sell_datetime, status,
                    server_schedule_buy_id, server_schedule_sell_id, created_at
             FROM intention_schedules WHERE id = ?1",
            params![id],
            map_schedule,
        )
        .context("schedule vanished after insert")
    }

    pub fn list_schedules(&self) -> Result<Vec<IntentionSchedule>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, intention_id, buy_datetime, sell_datetime, status,
                    server_schedule_buy_id, server_schedule_sell_id, created_at
             FROM intention_schedules ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], map_schedule)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ---- selection core ----

    /// Clear-then-set inside one transaction. `scope` restricts the clear and
    /// the set to one server's providers.
    fn flip_selection(
        &self,
        table: &str,
        scope: Option<ServerId>,
        target: Option<i64>,
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        match scope {
            Some(server_id) => {
                tx.execute(
                    &format!("UPDATE {table} SET selected = 0 WHERE server_id = ?1"),
                    params![server_id.0],
                )?;
                if let Some(id) = target {
                    let n = tx.execute(
                        &format!("UPDATE {table} SET selected = 1 WHERE id = ?1 AND server_id = ?2"),
                        params![id, server_id.0],
                    )?;
                    if n == 0 {
                        bail!("no row {id} in {table} for server {}", server_id.0);
                    }
                }
            }
            None => {
                tx.execute(&format!("UPDATE {table} SET selected = 0"), [])?;
                if let Some(id) = target {
                    let n = tx.execute(
                        &format!("UPDATE {table} SET selected = 1 WHERE id = ?1"),
                        params![id],
                    )?;
                    if n == 0 {
                        bail!("no row {id} in {table}");
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn map_server(row: &Row<'_>) -> rusqlite::Result<Server> {
    Ok(Server {
        id: ServerId(row.get(0)?),
        url: row.get(1)?,
        description: row.get(2)?,
        api_key: row.get(3)?,
        selected: row.get(4)?,
    })
}

fn map_provider(row: &Row<'_>) -> rusqlite::Result<Provider> {
    Ok(Provider {
        id: ProviderId(row.get(0)?),
        name: row.get(1)?,
        server_provider_id: row.get(2)?,
        server_id: ServerId(row.get(3)?),
        url: row.get(4)?,
        api_key: row.get(5)?,
        exchange_id: row.get(6)?,
        selected: row.get(7)?,
    })
}

fn map_catalog(row: &Row<'_>) -> rusqlite::Result<Catalog> {
    Ok(Catalog {
        id: CatalogId(row.get(0)?),
        name: row.get(1)?,
        host_catalog_id: HostCatalogId(row.get(2)?),
        selected: row.get(3)?,
    })
}

fn map_case(row: &Row<'_>) -> rusqlite::Result<CaseRecord> {
    Ok(CaseRecord {
        id: CaseId(row.get(0)?),
        host_case_id: HostCaseId(row.get(1)?),
        name: row.get(2)?,
        catalog_id: CatalogId(row.get(3)?),
        selected: row.get(4)?,
        created_at: epoch_to_utc(row.get(5)?),
    })
}

fn map_schedule(row: &Row<'_>) -> rusqlite::Result<IntentionSchedule> {
    let status: String = row.get(4)?;
    Ok(IntentionSchedule {
        id: ScheduleId(row.get(0)?),
        intention_id: IntentionId(row.get(1)?),
        buy_datetime: epoch_to_utc(row.get(2)?),
        sell_datetime: epoch_to_utc(row.get(3)?),
        status: ScheduleStatus::parse(&status).unwrap_or(ScheduleStatus::Failed),
        server_schedule_buy_id: row.get::<_, Option<String>>(5)?.map(RemoteScheduleId),
        server_schedule_sell_id: row.get::<_, Option<String>>(6)?.map(RemoteScheduleId),
        created_at: epoch_to_utc(row.get(7)?),
    })
}

fn map_intention(row: &Row<'_>) -> rusqlite::Result<Intention> {
    Ok(Intention {
        id: IntentionId(row.get(0)?),
        description: row.get(1)?,
        intention: row.get(2)?,
        hold_minutes: row.get(3)?,
        amount: row.get(4)?,
        stop_loss_percentage: row.get(5)?,
        take_profit_percentage: row.get(6)?,
        selected: row.get(7)?,
    })
}

fn epoch_to_utc(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}
