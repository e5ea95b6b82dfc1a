use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use dealerbot_core::domain::chat::{ChatMessage, FeedbackKind, FeedbackStats};
use dealerbot_core::domain::session::{ContextUpdate, Session, SessionId};
use dealerbot_core::errors::ApplicationError;

pub mod chat_log;
pub mod feedback;
pub mod memory;
pub mod session;

pub use chat_log::SqlChatLogRepository;
pub use feedback::SqlFeedbackRepository;
pub use memory::{
    InMemoryChatLogRepository, InMemoryFeedbackRepository, InMemorySessionRepository,
};
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

/// Per-session conversational state with idle expiry.
///
/// A session idle for longer than the repository's timeout is absent: `get`
/// and `update` delete it on contact and report it missing. Every successful
/// `get` or `update` refreshes `last_activity`.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self) -> Result<SessionId, RepositoryError>;
    async fn get(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError>;
    /// Shallow-merges `update` into the stored context. `false` when the
    /// session does not exist; no row is created.
    async fn update(&self, id: &SessionId, update: ContextUpdate) -> Result<bool, RepositoryError>;
    async fn clear(&self, id: &SessionId) -> Result<bool, RepositoryError>;
    async fn clear_all(&self) -> Result<u64, RepositoryError>;
    /// Deletes every expired session and returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, RepositoryError>;
    /// Every stored row, most recently active first. Does not refresh
    /// `last_activity` or evict anything.
    async fn list_all(&self) -> Result<Vec<Session>, RepositoryError>;
}

#[async_trait]
pub trait ChatLogRepository: Send + Sync {
    async fn append(&self, messages: &[ChatMessage]) -> Result<usize, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<ChatMessage>, RepositoryError>;
}

#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn store(
        &self,
        session_id: &str,
        kind: FeedbackKind,
        message: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Counts over the trailing `days` days.
    async fn stats(&self, days: u32) -> Result<FeedbackStats, RepositoryError>;
}

/// Fixed-width UTC timestamps so that string order matches time order in SQL.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {error}")))
}
