use chrono::{Duration, Utc};
use sqlx::Row;
use tracing::{debug, info};

use dealerbot_core::domain::session::{ContextUpdate, Session, SessionContext, SessionId};

use super::{decode_timestamp, encode_timestamp, RepositoryError, SessionRepository};
use crate::DbPool;

pub struct SqlSessionRepository {
    pool: DbPool,
    timeout: Duration,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

fn decode_context(raw: &str) -> Result<SessionContext, RepositoryError> {
    serde_json::from_str(raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid session context: {error}")))
}

fn encode_context(context: &SessionContext) -> Result<String, RepositoryError> {
    serde_json::to_string(context)
        .map_err(|error| RepositoryError::Decode(format!("unencodable session context: {error}")))
}

/// Deletes the row when it has been idle past `cutoff`. Runs first in every
/// transaction so the write lock is taken before anything is read.
async fn delete_if_expired(
    conn: &mut sqlx::SqliteConnection,
    id: &SessionId,
    cutoff: &str,
) -> Result<bool, RepositoryError> {
    let deleted = sqlx::query("DELETE FROM sessions WHERE session_id = ? AND last_activity < ?")
        .bind(id.as_str())
        .bind(cutoff)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if deleted > 0 {
        info!(event_name = "session.expired", session_id = %id, "expired session removed on access");
    }
    Ok(deleted > 0)
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn create(&self) -> Result<SessionId, RepositoryError> {
        let id = SessionId::generate();
        let now = encode_timestamp(Utc::now());
        let context = encode_context(&SessionContext::default())?;

        sqlx::query(
            "INSERT INTO sessions (session_id, context, last_activity, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(&context)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        info!(event_name = "session.created", session_id = %id, "session created");
        Ok(id)
    }

    async fn get(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if delete_if_expired(&mut tx, id, &encode_timestamp(now - self.timeout)).await? {
            tx.commit().await?;
            return Ok(None);
        }

        let row = sqlx::query(
            "UPDATE sessions SET last_activity = ?
             WHERE session_id = ?
             RETURNING context, created_at",
        )
        .bind(encode_timestamp(now))
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        let Some(row) = row else {
            debug!(event_name = "session.missing", session_id = %id, "session lookup missed");
            return Ok(None);
        };

        let context: String =
            row.try_get("context").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let created_at: String =
            row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

        Ok(Some(Session {
            id: id.clone(),
            context: decode_context(&context)?,
            last_activity: now,
            created_at: decode_timestamp(&created_at)?,
        }))
    }

    async fn update(&self, id: &SessionId, update: ContextUpdate) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if delete_if_expired(&mut tx, id, &encode_timestamp(now - self.timeout)).await? {
            tx.commit().await?;
            return Ok(false);
        }

        let row = sqlx::query(
            "UPDATE sessions SET last_activity = ?
             WHERE session_id = ?
             RETURNING context",
        )
        .bind(encode_timestamp(now))
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(false);
        };

        let raw: String =
            row.try_get("context").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let mut context = decode_context(&raw)?;
        update.apply_to(&mut context);

        sqlx::query("UPDATE sessions SET context = ? WHERE session_id = ?")
            .bind(encode_context(&context)?)
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn clear(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        let deleted = sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted > 0 {
            info!(event_name = "session.cleared", session_id = %id, "session cleared");
        }
        Ok(deleted > 0)
    }

    async fn clear_all(&self) -> Result<u64, RepositoryError> {
        let deleted = sqlx::query("DELETE FROM sessions").execute(&self.pool).await?.rows_affected();
        info!(event_name = "session.cleared_all", deleted, "all sessions cleared");
        Ok(deleted)
    }

    async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let cutoff = encode_timestamp(Utc::now() - self.timeout);
        let deleted = sqlx::query("DELETE FROM sessions WHERE last_activity < ?")
            .bind(&cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();
        info!(event_name = "session.purged", deleted, "expired sessions purged");
        Ok(deleted)
    }

    async fn list_all(&self) -> Result<Vec<Session>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT session_id, context, last_activity, created_at FROM sessions
             ORDER BY last_activity DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_session).collect()
    }
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, RepositoryError> {
    let column = |name: &str| -> Result<String, RepositoryError> {
        row.try_get(name).map_err(|e| RepositoryError::Decode(e.to_string()))
    };
    Ok(Session {
        id: SessionId::from(column("session_id")?.as_str()),
        context: decode_context(&column("context")?)?,
        last_activity: decode_timestamp(&column("last_activity")?)?,
        created_at: decode_timestamp(&column("created_at")?)?,
    })
}
