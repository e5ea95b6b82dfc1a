use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use dealerbot_core::domain::session::{ContextUpdate, SessionId};
use dealerbot_core::domain::vehicle::VehicleRecord;
use dealerbot_core::errors::ApplicationError;
use dealerbot_db::SessionRepository;

use crate::capability::{ComposeRequest, Framing, ResponseComposer};
use crate::parsing::object_slice;

pub const NO_PREVIOUS_CONTEXT: &str = "No previous context";

/// Structured side-by-side comparison. Section values are whatever shape the
/// composer chose (text, list or mapping).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub summary: Value,
    pub key_differences: Value,
    pub best_for: Value,
    pub value_analysis: Value,
    pub practical_considerations: Value,
    pub recommendation: Value,
}

impl Comparison {
    pub fn parse(raw: &str) -> Result<Self, ApplicationError> {
        let object = object_slice(raw).ok_or_else(|| {
            ApplicationError::MalformedComparison("no JSON object in comparison output".to_string())
        })?;
        serde_json::from_str(object)
            .map_err(|error| ApplicationError::MalformedComparison(error.to_string()))
    }
}

pub struct VehicleComparator {
    composer: Arc<dyn ResponseComposer>,
    sessions: Arc<dyn SessionRepository>,
}

impl VehicleComparator {
    pub fn new(composer: Arc<dyn ResponseComposer>, sessions: Arc<dyn SessionRepository>) -> Self {
        Self { composer, sessions }
    }

    /// Compares two or more vehicles, weighting the recommendation by the
    /// session's context when one is supplied.
    ///
    /// With a session id the raw composer output and the vehicles are saved to
    /// the session even when the output does not parse.
    pub async fn compare(
        &self,
        vehicles: &[VehicleRecord],
        session_id: Option<&SessionId>,
    ) -> Result<Comparison, ApplicationError> {
        if vehicles.is_empty() {
            return Err(ApplicationError::validation("No vehicles provided for comparison"));
        }
        if vehicles.len() < 2 {
            return Err(ApplicationError::validation(
                "At least two vehicles are required for comparison",
            ));
        }

        let user_context = match session_id {
            Some(id) => match self.sessions.get(id).await? {
                Some(session) => serde_json::to_string(&session.context)
                    .map_err(|error| ApplicationError::Persistence(error.to_string()))?,
                None => NO_PREVIOUS_CONTEXT.to_string(),
            },
            None => NO_PREVIOUS_CONTEXT.to_string(),
        };
        let material = serde_json::to_string_pretty(vehicles)
            .map_err(|error| ApplicationError::DataUnavailable(error.to_string()))?;

        let raw = self
            .composer
            .compose(ComposeRequest {
                framing: Framing::Comparison,
                query: "",
                material: &material,
                history: &user_context,
            })
            .await?;

        if let Some(id) = session_id {
            let update = ContextUpdate {
                last_comparison: Some(raw.clone()),
                last_vehicles: Some(vehicles.to_vec()),
                ..ContextUpdate::default()
            };
            self.sessions.update(id, update).await?;
        }

        let parsed = Comparison::parse(&raw);
        if let Err(error) = &parsed {
            tracing::warn!(event_name = "comparison.malformed", error = %error);
        }
        parsed
    }
}
