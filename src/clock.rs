// src/clock.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::{error::ClockError, models::attempt::AttemptId};

/// Remembers when each attempt was first entered, so remaining time survives
/// reloads instead of restarting from the full duration.
#[async_trait]
pub trait AttemptClockStore: Send + Sync {
    /// Returns the recorded start of `attempt_id`, recording `now` the first
    /// time the attempt is seen.
    async fn start_or_resume(
        &self,
        attempt_id: &AttemptId,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ClockError>;

    /// Forgets a finished attempt.
    async fn clear(&self, attempt_id: &AttemptId) -> Result<(), ClockError>;
}

/// Clock store backed by the `attempt_clocks` table.
#[derive(Debug, Clone)]
pub struct SqliteClockStore {
    pool: SqlitePool,
}

impl SqliteClockStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptClockStore for SqliteClockStore {
    async fn start_or_resume(
        &self,
        attempt_id: &AttemptId,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ClockError> {
        // First writer wins; later entries keep the first start.
        sqlx::query(
            r#"
            INSERT INTO attempt_clocks (attempt_id, started_at)
            VALUES (?, ?)
            ON CONFLICT(attempt_id) DO NOTHING
            "#,
        )
        .bind(attempt_id.as_str())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        let stored: String =
            sqlx::query_scalar("SELECT started_at FROM attempt_clocks WHERE attempt_id = ?")
                .bind(attempt_id.as_str())
                .fetch_one(&self.pool)
                .await?;

        DateTime::parse_from_rfc3339(&stored)
            .map(|started| started.with_timezone(&Utc))
            .map_err(|_| ClockError::Corrupt(stored))
    }

    async fn clear(&self, attempt_id: &AttemptId) -> Result<(), ClockError> {
        sqlx::query("DELETE FROM attempt_clocks WHERE attempt_id = ?")
            .bind(attempt_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Process-local clock store for tests and single-process development.
#[derive(Debug, Default)]
pub struct MemoryClockStore {
    starts: Mutex<HashMap<AttemptId, DateTime<Utc>>>,
}

impl MemoryClockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn recorded(&self, attempt_id: &AttemptId) -> Option<DateTime<Utc>> {
        self.starts.lock().await.get(attempt_id).copied()
    }
}

#[async_trait]
impl AttemptClockStore for MemoryClockStore {
    async fn start_or_resume(
        &self,
        attempt_id: &AttemptId,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ClockError> {
        let mut starts = self.starts.lock().await;
        Ok(*starts.entry(attempt_id.clone()).or_insert(now))
    }

    async fn clear(&self, attempt_id: &AttemptId) -> Result<(), ClockError> {
        self.starts.lock().await.remove(attempt_id);
        Ok(())
    }
}
