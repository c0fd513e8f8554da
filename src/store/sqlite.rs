//! SQLite-backed store. The counter increment is a single upsert with
//! RETURNING, so concurrent activations for the same (user, period) can
//! never observe the same pre-increment count.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::{AbuseLog, AreaStore, CounterStore, SearchArea, WarnFlags};
use crate::auth::UserId;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open(path)?),
        })
    }

    pub fn init(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS activation_counters (
                user TEXT NOT NULL,
                period TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user, period)
            );
            CREATE TABLE IF NOT EXISTS search_areas (
                user TEXT NOT NULL,
                generation INTEGER NOT NULL,
                lat REAL NOT NULL,
                lng REAL NOT NULL,
                radius_m REAL NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (user, generation)
            );
            CREATE TABLE IF NOT EXISTS abuse_log (
                user TEXT NOT NULL,
                ts INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS abuse_log_user_ts ON abuse_log (user, ts);
            CREATE TABLE IF NOT EXISTS warn_flags (
                user TEXT NOT NULL,
                key TEXT NOT NULL,
                set_at INTEGER NOT NULL,
                PRIMARY KEY (user, key)
            );
            COMMIT;",
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("sqlite connection mutex poisoned"))
    }
}

impl CounterStore for SqliteStore {
    fn get(&self, user: &UserId, period: &str) -> Result<u32> {
        let conn = self.lock()?;
        let count: Option<u32> = conn
            .query_row(
                "SELECT count FROM activation_counters WHERE user = ?1 AND period = ?2",
                params![user.as_str(), period],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0))
    }

    fn get_and_increment(&self, user: &UserId, period: &str) -> Result<u32> {
        let conn = self.lock()?;
        let new_count: u32 = conn.query_row(
            "INSERT INTO activation_counters (user, period, count) VALUES (?1, ?2, 1)
             ON CONFLICT (user, period) DO UPDATE SET count = count + 1
             RETURNING count",
            params![user.as_str(), period],
            |row| row.get(0),
        )?;
        Ok(new_count - 1)
    }
}

impl AreaStore for SqliteStore {
    fn last_radius(&self, user: &UserId) -> Result<Option<f64>> {
        let conn = self.lock()?;
        let radius: Option<f64> = conn
            .query_row(
                "SELECT radius_m FROM search_areas WHERE user = ?1
                 ORDER BY generation DESC LIMIT 1",
                params![user.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(radius)
    }

    fn last_generation(&self, user: &UserId) -> Result<u32> {
        let conn = self.lock()?;
        let generation: u32 = conn.query_row(
            "SELECT COALESCE(MAX(generation), 0) FROM search_areas WHERE user = ?1",
            params![user.as_str()],
            |row| row.get(0),
        )?;
        Ok(generation)
    }

    fn put_new_area(&self, area: &SearchArea) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO search_areas (user, generation, lat, lng, radius_m, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                area.user.as_str(),
                area.generation,
                area.lat,
                area.lng,
                area.radius_m,
                area.created_at as i64
            ],
        )?;
        Ok(())
    }
}

impl AbuseLog for SqliteStore {
    fn recent_count(&self, user: &UserId, window_secs: u64, now: u64) -> Result<u32> {
        let conn = self.lock()?;
        let cutoff = now.saturating_sub(window_secs) as i64;
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM abuse_log WHERE user = ?1 AND ts >= ?2",
            params![user.as_str(), cutoff],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn append(&self, user: &UserId, ts: u64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO abuse_log (user, ts) VALUES (?1, ?2)",
            params![user.as_str(), ts as i64],
        )?;
        // Lazy pruning: rows older than an hour can never count toward a
        // 30-second window again.
        conn.execute(
            "DELETE FROM abuse_log WHERE user = ?1 AND ts < ?2",
            params![user.as_str(), ts.saturating_sub(3_600) as i64],
        )?;
        Ok(())
    }
}

impl WarnFlags for SqliteStore {
    fn is_set(&self, user: &UserId, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM warn_flags WHERE user = ?1 AND key = ?2",
                params![user.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn set(&self, user: &UserId, key: &str, ts: u64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO warn_flags (user, key, set_at) VALUES (?1, ?2, ?3)",
            params![user.as_str(), key, ts as i64],
        )?;
        Ok(())
    }
}
