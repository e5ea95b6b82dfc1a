use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// One line of the transcript log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ChatMessage {
    pub fn user(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self { role: "user".to_string(), message: message.into(), session_id: Some(session_id.into()) }
    }

    pub fn bot(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self { role: "bot".to_string(), message: message.into(), session_id: Some(session_id.into()) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Positive,
    Negative,
}

impl FeedbackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            other => Err(DomainError::Validation(format!(
                "feedback must be `positive` or `negative`, got `{other}`"
            ))),
        }
    }
}

/// Feedback counts over a trailing window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackStats {
    pub total_feedback: u64,
    pub positive_count: u64,
    pub negative_count: u64,
    pub positive_ratio: f64,
}

impl FeedbackStats {
    pub fn from_counts(positive_count: u64, negative_count: u64) -> Self {
        let total_feedback = positive_count + negative_count;
        let positive_ratio =
            if total_feedback == 0 { 0.0 } else { positive_count as f64 / total_feedback as f64 };
        Self { total_feedback, positive_count, negative_count, positive_ratio }
    }
}
