use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};

use dealerbot_core::domain::chat::{ChatMessage, FeedbackKind, FeedbackStats};
use dealerbot_core::domain::session::{ContextUpdate, Session, SessionId};

use super::{ChatLogRepository, FeedbackRepository, RepositoryError, SessionRepository};

pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
    timeout: Duration,
}

impl InMemorySessionRepository {
    pub fn new(timeout: Duration) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), timeout }
    }
}

impl Default for InMemorySessionRepository {
    fn default() -> Self {
        Self::new(Duration::hours(2))
    }
}

/// Removes `id` when it has gone idle. Callers hold the write lock.
fn evict_if_expired(sessions: &mut HashMap<String, Session>, id: &SessionId, timeout: Duration) {
    let now = Utc::now();
    if sessions.get(id.as_str()).is_some_and(|session| session.is_expired(now, timeout)) {
        sessions.remove(id.as_str());
        tracing::info!(event_name = "session.expired", session_id = %id, "expired session removed on access");
    }
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self) -> Result<SessionId, RepositoryError> {
        let id = SessionId::generate();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id.0.clone(), Session::new(id.clone(), Utc::now()));
        Ok(id)
    }

    async fn get(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        evict_if_expired(&mut sessions, id, self.timeout);
        Ok(sessions.get_mut(id.as_str()).map(|session| {
            session.last_activity = Utc::now();
            session.clone()
        }))
    }

    async fn update(&self, id: &SessionId, update: ContextUpdate) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        evict_if_expired(&mut sessions, id, self.timeout);
        let Some(session) = sessions.get_mut(id.as_str()) else {
            return Ok(false);
        };
        update.apply_to(&mut session.context);
        session.last_activity = Utc::now();
        Ok(true)
    }

    async fn clear(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(id.as_str()).is_some())
    }

    async fn clear_all(&self) -> Result<u64, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len() as u64;
        sessions.clear();
        Ok(count)
    }

    async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, self.timeout));
        Ok((before - sessions.len()) as u64)
    }

    async fn list_all(&self) -> Result<Vec<Session>, RepositoryError> {
        let mut sessions: Vec<Session> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(sessions)
    }
}

#[derive(Default)]
pub struct InMemoryChatLogRepository {
    messages: Mutex<Vec<ChatMessage>>,
}

#[async_trait::async_trait]
impl ChatLogRepository for InMemoryChatLogRepository {
    async fn append(&self, messages: &[ChatMessage]) -> Result<usize, RepositoryError> {
        self.messages.lock().await.extend_from_slice(messages);
        Ok(messages.len())
    }

    async fn list_all(&self) -> Result<Vec<ChatMessage>, RepositoryError> {
        Ok(self.messages.lock().await.clone())
    }
}

#[derive(Default)]
pub struct InMemoryFeedbackRepository {
    entries: Mutex<Vec<FeedbackEntry>>,
}

struct FeedbackEntry {
    kind: FeedbackKind,
    created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl FeedbackRepository for InMemoryFeedbackRepository {
    async fn store(
        &self,
        _session_id: &str,
        kind: FeedbackKind,
        _message: Option<&str>,
    ) -> Result<(), RepositoryError> {
        self.entries.lock().await.push(FeedbackEntry { kind, created_at: Utc::now() });
        Ok(())
    }

    async fn stats(&self, days: u32) -> Result<FeedbackStats, RepositoryError> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let entries = self.entries.lock().await;
        let (positive, negative) = entries
            .iter()
            .filter(|entry| entry.created_at >= cutoff)
            .fold((0, 0), |(positive, negative), entry| match entry.kind {
                FeedbackKind::Positive => (positive + 1, negative),
                FeedbackKind::Negative => (positive, negative + 1),
            });
        Ok(FeedbackStats::from_counts(positive, negative))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use dealerbot_core::domain::chat::{ChatMessage, FeedbackKind};
    use dealerbot_core::domain::session::{ContextUpdate, SessionContext, SessionId};

    use super::{InMemoryChatLogRepository, InMemoryFeedbackRepository, InMemorySessionRepository};
    use crate::repositories::{ChatLogRepository, FeedbackRepository, SessionRepository};

    async fn backdate(repo: &InMemorySessionRepository, id: &SessionId, idle: Duration) {
        let mut sessions = repo.sessions.write().await;
        if let Some(session) = sessions.get_mut(id.as_str()) {
            session.last_activity = Utc::now() - idle;
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips_empty_context() {
        let repo = InMemorySessionRepository::default();
        let id = repo.create().await.expect("create");
        let session = repo.get(&id).await.expect("get").expect("exists");
        assert_eq!(session.context, SessionContext::default());
    }

    #[tokio::test]
    async fn expired_session_is_unreachable_and_removed() {
        let repo = InMemorySessionRepository::new(Duration::hours(2));
        let id = repo.create().await.expect("create");
        backdate(&repo, &id, Duration::hours(2) + Duration::seconds(1)).await;

        assert!(repo.get(&id).await.expect("get").is_none());
        assert!(repo.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn update_requires_an_existing_session() {
        let repo = InMemorySessionRepository::default();
        let update = ContextUpdate { last_query: Some("hi".to_string()), ..ContextUpdate::default() };

        assert!(!repo.update(&SessionId::from("nope"), update.clone()).await.expect("update"));
        assert!(repo.sessions.read().await.is_empty());

        let id = repo.create().await.expect("create");
        assert!(repo.update(&id, update).await.expect("update"));
        let context = repo.get(&id).await.expect("get").expect("exists").context;
        assert_eq!(context.last_query.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn purge_removes_only_idle_sessions() {
        let repo = InMemorySessionRepository::default();
        let fresh = repo.create().await.expect("create fresh");
        let stale = repo.create().await.expect("create stale");
        backdate(&repo, &stale, Duration::hours(6)).await;

        assert_eq!(repo.purge_expired().await.expect("purge"), 1);
        assert!(repo.get(&fresh).await.expect("get").is_some());
        assert_eq!(repo.clear_all().await.expect("clear all"), 1);
    }

    #[tokio::test]
    async fn chat_log_and_feedback_accumulate() {
        let chat = InMemoryChatLogRepository::default();
        chat.append(&[ChatMessage::user("hi", "S-1")]).await.expect("append");
        assert_eq!(chat.list_all().await.expect("list").len(), 1);

        let feedback = InMemoryFeedbackRepository::default();
        feedback.store("S-1", FeedbackKind::Positive, None).await.expect("store");
        feedback.store("S-1", FeedbackKind::Negative, Some("slow")).await.expect("store");
        let stats = feedback.stats(30).await.expect("stats");
        assert_eq!((stats.positive_count, stats.negative_count), (1, 1));
    }

    #[tokio::test]
    async fn feedback_stats_honour_the_window() {
        let feedback = InMemoryFeedbackRepository::default();
        feedback.store("S-1", FeedbackKind::Positive, None).await.expect("store");
        feedback.store("S-1", FeedbackKind::Negative, None).await.expect("store");
        feedback.entries.lock().await[1].created_at = Utc::now() - Duration::days(10);

        let recent = feedback.stats(7).await.expect("stats");
        assert_eq!((recent.positive_count, recent.negative_count), (1, 0));
        let month = feedback.stats(30).await.expect("stats");
        assert_eq!(month.total_feedback, 2);
    }

    #[tokio::test]
    async fn list_all_returns_most_recent_first() {
        let repo = InMemorySessionRepository::default();
        let older = repo.create().await.expect("create older");
        let newer = repo.create().await.expect("create newer");
        backdate(&repo, &older, Duration::minutes(30)).await;

        let ids: Vec<_> =
            repo.list_all().await.expect("list").into_iter().map(|session| session.id).collect();
        assert_eq!(ids, vec![newer, older]);
    }
}
