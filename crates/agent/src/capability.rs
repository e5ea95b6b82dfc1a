//! Contracts for the reasoning services the orchestrator depends on.
//!
//! Implementations are non-deterministic and may be remote, so every call can
//! fail with [`CapabilityError::Unavailable`] or hand back output that does not
//! parse ([`CapabilityError::Malformed`]). Callers decide which of the two they
//! can recover from.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use dealerbot_core::domain::field::FieldPath;
use dealerbot_core::errors::ApplicationError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("capability unavailable: {0}")]
    Unavailable(String),
    #[error("malformed capability output: {0}")]
    Malformed(String),
}

impl From<CapabilityError> for ApplicationError {
    fn from(value: CapabilityError) -> Self {
        ApplicationError::CapabilityUnavailable(value.to_string())
    }
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Picks exactly one of `labels` for `text`.
    async fn classify(
        &self,
        text: &str,
        labels: &[&str],
        context: &str,
    ) -> Result<String, CapabilityError>;

    /// Whether `text` asks for the full matching set of vehicles rather than a summary.
    async fn classify_boolean(&self, text: &str, context: &str) -> Result<bool, CapabilityError>;
}

#[async_trait]
pub trait ParameterExtractor: Send + Sync {
    /// Field path → value for every schema field the text mentions. Fields the
    /// text asks about without a value map to `"Unknown"`.
    async fn extract(
        &self,
        text: &str,
        schema: &[FieldPath],
    ) -> Result<BTreeMap<String, Option<String>>, CapabilityError>;
}

/// Voice the composer should answer in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    /// Answer a question from retrieved data.
    Answer,
    /// Product-specialist advice without inventory access.
    Expert,
    /// Small talk, steering back to vehicles.
    Conversational,
    /// Stock availability summary.
    Availability,
    /// Six-section structured vehicle comparison.
    Comparison,
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Answer => "answer",
            Self::Expert => "expert",
            Self::Conversational => "conversational",
            Self::Availability => "availability",
            Self::Comparison => "comparison",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComposeRequest<'a> {
    pub framing: Framing,
    pub query: &'a str,
    pub material: &'a str,
    pub history: &'a str,
}

#[async_trait]
pub trait ResponseComposer: Send + Sync {
    async fn compose(&self, request: ComposeRequest<'_>) -> Result<String, CapabilityError>;
}

/// The three capabilities the orchestrator is wired with.
#[derive(Clone)]
pub struct Capabilities {
    pub classifier: Arc<dyn IntentClassifier>,
    pub extractor: Arc<dyn ParameterExtractor>,
    pub composer: Arc<dyn ResponseComposer>,
}

impl Capabilities {
    /// Uses one backend for all three roles.
    pub fn shared<T>(backend: Arc<T>) -> Self
    where
        T: IntentClassifier + ParameterExtractor + ResponseComposer + 'static,
    {
        Self { classifier: backend.clone(), extractor: backend.clone(), composer: backend }
    }
}
