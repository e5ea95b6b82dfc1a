use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::vehicle::VehicleRecord;

/// Turns of history included in prompts.
pub const RECENT_TURNS: usize = 3;
/// Characters of each past response included in prompts.
pub const RESPONSE_PREVIEW_CHARS: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub query: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn now(query: impl Into<String>, response: impl Into<String>) -> Self {
        Self { query: query.into(), response: response.into(), timestamp: Utc::now() }
    }
}

/// Conversational state persisted per session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    pub last_query: Option<String>,
    #[serde(default)]
    pub last_response: Option<String>,
    #[serde(default)]
    pub last_vehicles: Option<Vec<VehicleRecord>>,
    #[serde(default)]
    pub last_comparison: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<Turn>,
}

impl SessionContext {
    /// Prompt digest of the last `turns` exchanges, each response cut to
    /// `preview_chars` characters. Empty when there is no history.
    pub fn history_digest(&self, turns: usize, preview_chars: usize) -> String {
        if self.conversation_history.is_empty() || turns == 0 {
            return String::new();
        }

        let start = self.conversation_history.len().saturating_sub(turns);
        let mut digest = String::from("\nLast few interactions:\n");
        for turn in &self.conversation_history[start..] {
            digest.push_str(&format!("User: {}\n", turn.query));
            digest.push_str(&format!("Assistant: {}\n", preview(&turn.response, preview_chars)));
        }
        digest
    }

    pub fn recent_history_digest(&self) -> String {
        self.history_digest(RECENT_TURNS, RESPONSE_PREVIEW_CHARS)
    }

    /// History with `turn` appended, keeping at most `limit` newest turns.
    pub fn history_with(&self, turn: Turn, limit: Option<usize>) -> Vec<Turn> {
        let mut history = self.conversation_history.clone();
        history.push(turn);
        if let Some(limit) = limit {
            let excess = history.len().saturating_sub(limit);
            history.drain(..excess);
        }
        history
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

/// Partial context merged into a stored session.
///
/// Each `Some` field replaces the stored value wholesale; `None` leaves it alone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContextUpdate {
    pub last_query: Option<String>,
    pub last_response: Option<String>,
    pub last_vehicles: Option<Vec<VehicleRecord>>,
    pub last_comparison: Option<String>,
    pub conversation_history: Option<Vec<Turn>>,
}

impl ContextUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply_to(self, context: &mut SessionContext) {
        if let Some(last_query) = self.last_query {
            context.last_query = Some(last_query);
        }
        if let Some(last_response) = self.last_response {
            context.last_response = Some(last_response);
        }
        if let Some(last_vehicles) = self.last_vehicles {
            context.last_vehicles = Some(last_vehicles);
        }
        if let Some(last_comparison) = self.last_comparison {
            context.last_comparison = Some(last_comparison);
        }
        if let Some(history) = self.conversation_history {
            context.conversation_history = history;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub context: SessionContext,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId, now: DateTime<Utc>) -> Self {
        Self { id, context: SessionContext::default(), last_activity: now, created_at: now }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        is_expired(self.last_activity, now, timeout)
    }
}

pub fn is_expired(last_activity: DateTime<Utc>, now: DateTime<Utc>, timeout: Duration) -> bool {
    now - last_activity > timeout
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::{ContextUpdate, Session, SessionContext, SessionId, Turn};
    use crate::domain::vehicle::VehicleRecord;

    fn context_with_turns(count: usize) -> SessionContext {
        SessionContext {
            conversation_history: (0..count)
                .map(|index| Turn::now(format!("q{index}"), format!("r{index}")))
                .collect(),
            ..SessionContext::default()
        }
    }

    #[test]
    fn digest_is_empty_without_history() {
        assert_eq!(SessionContext::default().recent_history_digest(), "");
    }

    #[test]
    fn digest_keeps_only_the_last_three_turns() {
        let digest = context_with_turns(5).recent_history_digest();
        assert!(digest.starts_with("\nLast few interactions:\n"));
        assert!(!digest.contains("User: q1\n"));
        assert!(digest.contains("User: q2\nAssistant: r2\n"));
        assert!(digest.contains("User: q4\nAssistant: r4\n"));
    }

    #[test]
    fn digest_truncates_long_responses() {
        let long = "x".repeat(250);
        let context = SessionContext {
            conversation_history: vec![Turn::now("q", long)],
            ..SessionContext::default()
        };
        let digest = context.recent_history_digest();
        assert!(digest.contains(&format!("Assistant: {}...\n", "x".repeat(200))));
        assert!(!digest.contains(&"x".repeat(201)));
    }

    #[test]
    fn history_limit_drops_oldest_turns() {
        let history = context_with_turns(10).history_with(Turn::now("new", "answer"), Some(10));
        assert_eq!(history.len(), 10);
        assert_eq!(history.first().map(|turn| turn.query.as_str()), Some("q1"));
        assert_eq!(history.last().map(|turn| turn.query.as_str()), Some("new"));

        let unbounded = context_with_turns(10).history_with(Turn::now("new", "answer"), None);
        assert_eq!(unbounded.len(), 11);
    }

    #[test]
    fn update_overwrites_only_supplied_keys() {
        let vehicles = vec![VehicleRecord::from_value(json!({"vin": "A"})).expect("object")];
        let mut context = SessionContext {
            last_query: Some("old query".to_string()),
            last_vehicles: Some(vehicles.clone()),
            ..SessionContext::default()
        };

        ContextUpdate {
            last_query: Some("new query".to_string()),
            last_response: Some("new response".to_string()),
            ..ContextUpdate::default()
        }
        .apply_to(&mut context);

        assert_eq!(context.last_query.as_deref(), Some("new query"));
        assert_eq!(context.last_response.as_deref(), Some("new response"));
        assert_eq!(context.last_vehicles, Some(vehicles));
        assert!(ContextUpdate::default().is_empty());
    }

    #[test]
    fn expiry_is_strictly_after_timeout() {
        let now = Utc::now();
        let mut session = Session::new(SessionId::generate(), now - Duration::hours(2));
        assert!(!session.is_expired(now, Duration::hours(2)));
        session.last_activity = now - Duration::hours(2) - Duration::seconds(1);
        assert!(session.is_expired(now, Duration::hours(2)));
    }

    #[test]
    fn context_tolerates_missing_keys() {
        let context: SessionContext =
            serde_json::from_value(json!({"last_query": "hi"})).expect("partial context");
        assert_eq!(context.last_query.as_deref(), Some("hi"));
        assert!(context.conversation_history.is_empty());
    }
}
