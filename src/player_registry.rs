//! Player Registry (§4.7 addition): Elo ratings, persisted outside the
//! match lock. `Match::report_results_if_over` hands back a
//! [`crate::match_engine::PendingResult`] synchronously; the adapter
//! awaits `record_result` afterward, never while a match lock is held.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::constants::DEFAULT_RATING;
use crate::match_engine::elo_delta;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PlayerRecord {
    pub name: String,
    pub rating: i64,
    pub wins: i64,
    pub losses: i64,
}

#[async_trait]
pub trait PlayerRegistry: Send + Sync {
    async fn record_result(&self, winner: &str, loser: &str) -> Result<(), sqlx::Error>;
    async fn lookup(&self, name: &str) -> Result<Option<PlayerRecord>, sqlx::Error>;
}

/// SQLite-backed registry, grounded in `auth.py`'s `user` table and the
/// teacher's `sqlx::query` usage in `auth.rs`.
pub struct SqlitePlayerRegistry {
    pool: SqlitePool,
}

impl SqlitePlayerRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotent schema bootstrap, run once at startup.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS players (
                name TEXT PRIMARY KEY,
                rating INTEGER NOT NULL,
                wins INTEGER NOT NULL DEFAULT 0,
                losses INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn rating_of(&self, name: &str) -> Result<i64, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT rating FROM players WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(r,)| r).unwrap_or(DEFAULT_RATING))
    }

    async fn ensure_row(&self, name: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO players (name, rating, wins, losses) VALUES (?, ?, 0, 0)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(DEFAULT_RATING)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PlayerRegistry for SqlitePlayerRegistry {
    async fn record_result(&self, winner: &str, loser: &str) -> Result<(), sqlx::Error> {
        self.ensure_row(winner).await?;
        self.ensure_row(loser).await?;

        let winner_rating = self.rating_of(winner).await?;
        let loser_rating = self.rating_of(loser).await?;
        let delta = elo_delta(winner_rating, loser_rating);

        sqlx::query(
            "UPDATE players SET rating = rating + ?, wins = wins + 1 WHERE name = ?",
        )
        .bind(delta)
        .bind(winner)
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "UPDATE players SET rating = rating - ?, losses = losses + 1 WHERE name = ?",
        )
        .bind(delta)
        .bind(loser)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lookup(&self, name: &str) -> Result<Option<PlayerRecord>, sqlx::Error> {
        let row: Option<(String, i64, i64, i64)> =
            sqlx::query_as("SELECT name, rating, wins, losses FROM players WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(name, rating, wins, losses)| PlayerRecord {
            name,
            rating,
            wins,
            losses,
        }))
    }
}
