//! SQLite-backed identity and state history.
//!
//! One identity row (birth is forever), awakenings deduplicated within a
//! 60 s window so a restart loop can't inflate the count, append-only
//! state history, and a generic event log. WAL journaling, parameterised
//! queries only. The server process is the sole writer of this file.

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;
use uuid::Uuid;

use anima_core::Anima;

/// Wakes closer together than this are the same awakening.
pub const WAKE_DEDUP_SECONDS: i64 = 60;

/// The creature's persistent identity.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Identity {
    pub birth_id: Uuid,
    pub born_at: i64,
    pub name: String,
    pub awakenings: i64,
    pub total_alive_seconds: i64,
    pub session_started_at: i64,
}

impl Identity {
    pub fn age_seconds(&self, now: i64) -> i64 {
        (now - self.born_at).max(0)
    }

    /// Fraction of its existence the creature has actually been running.
    pub fn alive_ratio(&self, now: i64) -> f64 {
        let age = self.age_seconds(now);
        if age == 0 {
            return 0.0;
        }
        (self.total_alive_seconds as f64 / age as f64).min(1.0)
    }
}

/// One row of state history.
#[derive(Debug, Clone)]
pub struct StateRow {
    pub at: i64,
    pub anima: Anima,
    pub sensors_json: String,
}

#[derive(Clone)]
pub struct IdentityStore {
    pool: Pool<Sqlite>,
}

impl IdentityStore {
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                    sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .connect(&db_url)
            .await
            .context("Failed to open identity database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS identity (
                birth_id TEXT PRIMARY KEY,
                born_at INTEGER NOT NULL,
                name TEXT NOT NULL,
                total_alive_seconds INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create identity table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS awakenings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create awakenings table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS name_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                renamed_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create name_history table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS state_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                at INTEGER NOT NULL,
                warmth REAL NOT NULL,
                clarity REAL NOT NULL,
                stability REAL NOT NULL,
                presence REAL NOT NULL,
                sensors_json TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create state_history table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_state_history_at ON state_history(at)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                at INTEGER NOT NULL,
                kind TEXT NOT NULL,
                detail TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create events table")?;

        Ok(())
    }

    /// Begin a session: mint the identity on first run, then record an
    /// awakening unless one landed within the dedup window.
    pub async fn begin_session(&self, now: i64, id_override: Option<Uuid>) -> Result<Identity> {
        let existing = sqlx::query("SELECT birth_id FROM identity LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        if existing.is_none() {
            let birth_id = id_override.unwrap_or_else(Uuid::new_v4);
            sqlx::query(
                "INSERT INTO identity (birth_id, born_at, name, total_alive_seconds) VALUES (?, ?, ?, 0)",
            )
            .bind(birth_id.to_string())
            .bind(now)
            .bind("Lumen")
            .execute(&self.pool)
            .await
            .context("Failed to record birth")?;
            tracing::info!(%birth_id, "First awakening: birth recorded");
        }

        let last_wake: Option<i64> = sqlx::query("SELECT MAX(at) AS at FROM awakenings")
            .fetch_one(&self.pool)
            .await?
            .try_get::<Option<i64>, _>("at")?;

        let duplicate = last_wake.map(|at| now - at < WAKE_DEDUP_SECONDS).unwrap_or(false);
        if !duplicate {
            sqlx::query("INSERT INTO awakenings (at) VALUES (?)")
                .bind(now)
                .execute(&self.pool)
                .await?;
        } else {
            tracing::debug!("Awakening within dedup window, not counted");
        }

        self.identity(now).await
    }

    pub async fn identity(&self, session_started_at: i64) -> Result<Identity> {
        let row = sqlx::query(
            "SELECT birth_id, born_at, name, total_alive_seconds FROM identity LIMIT 1",
        )
        .fetch_one(&self.pool)
        .await
        .context("Identity not yet created")?;

        let awakenings: i64 = sqlx::query("SELECT COUNT(*) AS n FROM awakenings")
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;

        let birth_id: String = row.try_get("birth_id")?;
        Ok(Identity {
            birth_id: birth_id.parse().unwrap_or_else(|_| Uuid::nil()),
            born_at: row.try_get("born_at")?,
            name: row.try_get("name")?,
            awakenings,
            total_alive_seconds: row.try_get("total_alive_seconds")?,
            session_started_at,
        })
    }

    /// Accumulate alive time (called per tick with the tick length).
    pub async fn add_alive_seconds(&self, seconds: i64) -> Result<()> {
        sqlx::query("UPDATE identity SET total_alive_seconds = total_alive_seconds + ?")
            .bind(seconds)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Rename, keeping the old name in history.
    pub async fn rename(&self, new_name: &str, now: i64) -> Result<()> {
        let row = sqlx::query("SELECT name FROM identity LIMIT 1")
            .fetch_one(&self.pool)
            .await?;
        let old: String = row.try_get("name")?;
        sqlx::query("INSERT INTO name_history (name, renamed_at) VALUES (?, ?)")
            .bind(&old)
            .bind(now)
            .execute(&self.pool)
            .await?;
        sqlx::query("UPDATE identity SET name = ?")
            .bind(new_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn name_history(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query("SELECT name, renamed_at FROM name_history ORDER BY renamed_at")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| Ok((r.try_get("name")?, r.try_get("renamed_at")?)))
            .collect()
    }

    /// Append a state row. Commits synchronously; the history is the
    /// substrate the learner reads, losing rows means losing experience.
    pub async fn record_state(&self, at: i64, anima: &Anima, sensors_json: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO state_history (at, warmth, clarity, stability, presence, sensors_json)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(at)
        .bind(anima.warmth as f64)
        .bind(anima.clarity as f64)
        .bind(anima.stability as f64)
        .bind(anima.presence as f64)
        .bind(sensors_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn states_since(&self, since: i64) -> Result<Vec<StateRow>> {
        let rows = sqlx::query(
            r#"
            SELECT at, warmth, clarity, stability, presence, sensors_json
            FROM state_history WHERE at >= ? ORDER BY at
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(StateRow {
                    at: r.try_get("at")?,
                    anima: Anima::new(
                        r.try_get::<f64, _>("warmth")? as f32,
                        r.try_get::<f64, _>("clarity")? as f32,
                        r.try_get::<f64, _>("stability")? as f32,
                        r.try_get::<f64, _>("presence")? as f32,
                    ),
                    sensors_json: r.try_get("sensors_json")?,
                })
            })
            .collect()
    }

    pub async fn state_count_since(&self, since: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM state_history WHERE at >= ?")
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    pub async fn record_event(&self, kind: &str, detail: &str, at: i64) -> Result<()> {
        sqlx::query("INSERT INTO events (at, kind, detail) VALUES (?, ?, ?)")
            .bind(at)
            .bind(kind)
            .bind(detail)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn recent_events(&self, limit: i64) -> Result<Vec<(i64, String, String)>> {
        let rows = sqlx::query("SELECT at, kind, detail FROM events ORDER BY at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| Ok((r.try_get("at")?, r.try_get("kind")?, r.try_get("detail")?)))
            .collect()
    }

    /// Close the pool on clean shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cold_start_birth() {
        // First session ever: birth recorded, awakenings = 1.
        let store = IdentityStore::open_in_memory().await.unwrap();
        let identity = store.begin_session(1000, None).await.unwrap();
        assert_eq!(identity.awakenings, 1);
        assert_eq!(identity.born_at, 1000);
        assert_eq!(identity.alive_ratio(1000), 0.0);
    }

    #[tokio::test]
    async fn test_alive_ratio_accumulates() {
        // S1 continued: after 100 ticks of 2 s, alive ≈ age ≈ 200 s.
        let store = IdentityStore::open_in_memory().await.unwrap();
        store.begin_session(0, None).await.unwrap();
        for _ in 0..100 {
            store.add_alive_seconds(2).await.unwrap();
        }
        let identity = store.identity(0).await.unwrap();
        assert_eq!(identity.total_alive_seconds, 200);
        assert!((identity.alive_ratio(200) - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_wake_deduplication() {
        // Three wakes within 30 s count as one awakening.
        let store = IdentityStore::open_in_memory().await.unwrap();
        store.begin_session(100, None).await.unwrap();
        store.begin_session(110, None).await.unwrap();
        let identity = store.begin_session(125, None).await.unwrap();
        assert_eq!(identity.awakenings, 1);
    }

    #[tokio::test]
    async fn test_separated_wakes_count() {
        let store = IdentityStore::open_in_memory().await.unwrap();
        store.begin_session(100, None).await.unwrap();
        let identity = store.begin_session(200, None).await.unwrap();
        assert_eq!(identity.awakenings, 2);
    }

    #[tokio::test]
    async fn test_birth_id_stable_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anima.db");
        let first = {
            let store = IdentityStore::open(&path).await.unwrap();
            store.begin_session(100, None).await.unwrap()
        };
        let store = IdentityStore::open(&path).await.unwrap();
        let second = store.begin_session(500, None).await.unwrap();
        assert_eq!(first.birth_id, second.birth_id);
        assert_eq!(second.awakenings, 2);
    }

    #[tokio::test]
    async fn test_id_override_used_at_birth() {
        let store = IdentityStore::open_in_memory().await.unwrap();
        let id = Uuid::new_v4();
        let identity = store.begin_session(0, Some(id)).await.unwrap();
        assert_eq!(identity.birth_id, id);
    }

    #[tokio::test]
    async fn test_state_history_query_window() {
        let store = IdentityStore::open_in_memory().await.unwrap();
        store.begin_session(0, None).await.unwrap();
        let anima = Anima::new(0.6, 0.5, 0.7, 0.4);
        for t in 0..20 {
            store.record_state(t * 10, &anima, "{}").await.unwrap();
        }
        let recent = store.states_since(100).await.unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(store.state_count_since(0).await.unwrap(), 20);
        assert!((recent[0].anima.warmth - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_rename_keeps_history() {
        let store = IdentityStore::open_in_memory().await.unwrap();
        store.begin_session(0, None).await.unwrap();
        store.rename("Faro", 50).await.unwrap();
        let identity = store.identity(0).await.unwrap();
        assert_eq!(identity.name, "Faro");
        let history = store.name_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].0, "Lumen");
    }

    #[tokio::test]
    async fn test_events_roundtrip() {
        let store = IdentityStore::open_in_memory().await.unwrap();
        store.begin_session(0, None).await.unwrap();
        store.record_event("canvas_saved", "gestural era", 10).await.unwrap();
        let events = store.recent_events(5).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, "canvas_saved");
    }
}
