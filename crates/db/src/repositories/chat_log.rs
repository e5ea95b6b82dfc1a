use chrono::Utc;
use sqlx::Row;

use dealerbot_core::domain::chat::ChatMessage;

use super::{encode_timestamp, ChatLogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlChatLogRepository {
    pool: DbPool,
}

impl SqlChatLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<ChatMessage, RepositoryError> {
    let role: String = row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let message: String =
        row.try_get("message").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let session_id: Option<String> =
        row.try_get("session_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    Ok(ChatMessage { role, message, session_id })
}

#[async_trait::async_trait]
impl ChatLogRepository for SqlChatLogRepository {
    /// All messages land in one transaction or none do.
    async fn append(&self, messages: &[ChatMessage]) -> Result<usize, RepositoryError> {
        let created_at = encode_timestamp(Utc::now());
        let mut tx = self.pool.begin().await?;
        for message in messages {
            sqlx::query(
                "INSERT INTO chat_messages (role, message, session_id, created_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&message.role)
            .bind(&message.message)
            .bind(&message.session_id)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(messages.len())
    }

    async fn list_all(&self) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> =
            sqlx::query("SELECT role, message, session_id FROM chat_messages ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(row_to_message).collect::<Result<Vec<_>, _>>()
    }
}
