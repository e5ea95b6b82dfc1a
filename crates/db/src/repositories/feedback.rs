use chrono::{Duration, Utc};
use sqlx::Row;

use dealerbot_core::domain::chat::{FeedbackKind, FeedbackStats};

use super::{encode_timestamp, FeedbackRepository, RepositoryError};
use crate::DbPool;

pub struct SqlFeedbackRepository {
    pool: DbPool,
}

impl SqlFeedbackRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl FeedbackRepository for SqlFeedbackRepository {
    async fn store(
        &self,
        session_id: &str,
        kind: FeedbackKind,
        message: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO feedback (session_id, feedback_type, message, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(kind.as_str())
        .bind(message)
        .bind(encode_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn stats(&self, days: u32) -> Result<FeedbackStats, RepositoryError> {
        let cutoff = encode_timestamp(Utc::now() - Duration::days(i64::from(days)));
        let row = sqlx::query(
            "SELECT
                COALESCE(SUM(CASE WHEN feedback_type = 'positive' THEN 1 ELSE 0 END), 0) AS positive_count,
                COALESCE(SUM(CASE WHEN feedback_type = 'negative' THEN 1 ELSE 0 END), 0) AS negative_count
             FROM feedback
             WHERE created_at >= ?",
        )
        .bind(&cutoff)
        .fetch_one(&self.pool)
        .await?;

        let positive: i64 =
            row.try_get("positive_count").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let negative: i64 =
            row.try_get("negative_count").map_err(|e| RepositoryError::Decode(e.to_string()))?;

        Ok(FeedbackStats::from_counts(
            u64::try_from(positive).unwrap_or_default(),
            u64::try_from(negative).unwrap_or_default(),
        ))
    }
}
