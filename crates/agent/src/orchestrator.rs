//! Per-request query handling.
//!
//! A query goes through the full-listing check, then intent routing, then one
//! dispatch branch. Session context is written back only after the branch has
//! produced its answer, so an abandoned request leaves the session untouched.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use dealerbot_core::domain::field::{FieldPath, IDENTITY_FIELDS, SCHEMA_FIELDS};
use dealerbot_core::domain::session::{ContextUpdate, SessionContext, SessionId, Turn};
use dealerbot_core::domain::vehicle::VehicleRecord;
use dealerbot_core::errors::ApplicationError;
use dealerbot_core::inventory::{project, FilterOutcome, InventoryStore, SearchPredicate};
use dealerbot_db::SessionRepository;

use crate::capability::{Capabilities, CapabilityError, ComposeRequest, Framing};
use crate::router::Route;

pub const INITIALIZE_QUERY: &str = "initialize";
pub const SESSION_INITIALIZED: &str = "Session initialized";
pub const SHOW_FORM: &str = "Show Form";
pub const NOT_IN_STOCK: &str = "Not in stock";
pub const FULL_INVENTORY_MESSAGE: &str = "Here is the full vehicle inventory.";
pub const REMEMBERED_VEHICLES_MESSAGE: &str = "Here are the vehicles we were just looking at.";
pub const NARROW_REQUEST: &str = "Please specify a make, model, type, year, or trim to see all matching vehicles. For example, 'Show me all Escape vehicles'.";
pub const FOLLOW_UP_FALLBACK: &str =
    "I'm not sure what you're referring to. Could you please rephrase your question?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Formatted,
    RawData,
    Info,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryResponse {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub message: Option<String>,
    pub data: Option<Value>,
    pub session_id: SessionId,
}

/// What a branch produced, before it is persisted.
struct Outcome {
    kind: ResponseKind,
    message: Option<String>,
    data: Option<Value>,
    /// Text recorded as the turn's response in session history.
    recorded: String,
    vehicles: Option<Vec<VehicleRecord>>,
}

impl Outcome {
    fn formatted(message: String) -> Self {
        Self {
            kind: ResponseKind::Formatted,
            recorded: message.clone(),
            message: Some(message),
            data: None,
            vehicles: None,
        }
    }

    fn listing(
        message: &str,
        records: Vec<VehicleRecord>,
        remember: bool,
    ) -> Result<Self, ApplicationError> {
        let data = render_value(&records)?;
        Ok(Self {
            kind: ResponseKind::RawData,
            message: Some(message.to_string()),
            recorded: data.to_string(),
            data: Some(data),
            vehicles: remember.then_some(records),
        })
    }

    fn into_response(self, session_id: SessionId) -> QueryResponse {
        QueryResponse { kind: self.kind, message: self.message, data: self.data, session_id }
    }
}

pub struct Orchestrator {
    capabilities: Capabilities,
    sessions: Arc<dyn SessionRepository>,
    inventory: Arc<InventoryStore>,
    history_limit: Option<usize>,
}

impl Orchestrator {
    pub fn new(
        capabilities: Capabilities,
        sessions: Arc<dyn SessionRepository>,
        inventory: Arc<InventoryStore>,
        history_limit: Option<usize>,
    ) -> Self {
        Self { capabilities, sessions, inventory, history_limit }
    }

    pub async fn handle_query(
        &self,
        query: &str,
        session_id: Option<&str>,
    ) -> Result<QueryResponse, ApplicationError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ApplicationError::validation("Query cannot be empty"));
        }

        if query.eq_ignore_ascii_case(INITIALIZE_QUERY) {
            let session_id = match session_id {
                Some(id) => SessionId::from(id),
                None => self.sessions.create().await?,
            };
            return Ok(Outcome::formatted(SESSION_INITIALIZED.to_string()).into_response(session_id));
        }

        let (session_id, context) = self.resolve_session(session_id).await?;
        let history = context.recent_history_digest();

        let outcome = if self.capabilities.classifier.classify_boolean(query, &history).await? {
            tracing::info!(event_name = "agent.query.full_listing", session_id = %session_id);
            self.full_listing(query).await?
        } else {
            let route = self.route(query, &history).await?;
            tracing::info!(event_name = "agent.query.routed", session_id = %session_id, route = %route);
            self.dispatch(route, query, &history, &context).await?
        };

        self.persist(&session_id, &context, query, &outcome).await?;
        Ok(outcome.into_response(session_id))
    }

    async fn resolve_session(
        &self,
        session_id: Option<&str>,
    ) -> Result<(SessionId, SessionContext), ApplicationError> {
        if let Some(id) = session_id {
            if let Some(session) = self.sessions.get(&SessionId::from(id)).await? {
                return Ok((session.id, session.context));
            }
            tracing::info!(
                event_name = "session.replaced",
                session_id = id,
                "unknown or expired session, starting a new one"
            );
        }

        let id = self.sessions.create().await?;
        tracing::info!(event_name = "session.created", session_id = %id);
        Ok((id, SessionContext::default()))
    }

    async fn route(&self, query: &str, history: &str) -> Result<Route, ApplicationError> {
        let label =
            self.capabilities.classifier.classify(query, Route::LABELS.as_slice(), history).await?;
        Route::from_label(&label).ok_or_else(|| {
            ApplicationError::CapabilityUnavailable(format!("classifier returned unknown route `{label}`"))
        })
    }

    /// Extractor output as a predicate. Unparseable output means no filter.
    async fn extract_predicate(&self, query: &str) -> Result<SearchPredicate, ApplicationError> {
        match self.capabilities.extractor.extract(query, &FieldPath::schema()).await {
            Ok(fields) => Ok(SearchPredicate::from_extraction(&fields)),
            Err(CapabilityError::Malformed(reason)) => {
                tracing::warn!(
                    event_name = "agent.extraction.malformed",
                    reason = %reason,
                    "treating extraction as empty predicate"
                );
                Ok(SearchPredicate::new())
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn compose(
        &self,
        framing: Framing,
        query: &str,
        material: &str,
        history: &str,
    ) -> Result<String, ApplicationError> {
        let request = ComposeRequest { framing, query, material, history };
        Ok(self.capabilities.composer.compose(request).await?)
    }

    async fn full_listing(&self, query: &str) -> Result<Outcome, ApplicationError> {
        let predicate = self.extract_predicate(query).await?;
        if !predicate.has_identity_filter() {
            return Ok(Outcome {
                kind: ResponseKind::Info,
                message: Some(NARROW_REQUEST.to_string()),
                data: None,
                recorded: NARROW_REQUEST.to_string(),
                vehicles: None,
            });
        }

        match self.inventory.snapshot().filter(&predicate) {
            FilterOutcome::Matched(records) => {
                Outcome::listing(FULL_INVENTORY_MESSAGE, records, true)
            }
            FilterOutcome::NotInStock => Ok(Outcome {
                kind: ResponseKind::RawData,
                message: Some(NOT_IN_STOCK.to_string()),
                data: None,
                recorded: NOT_IN_STOCK.to_string(),
                vehicles: None,
            }),
        }
    }

    async fn dispatch(
        &self,
        route: Route,
        query: &str,
        history: &str,
        context: &SessionContext,
    ) -> Result<Outcome, ApplicationError> {
        match route {
            Route::ShowForm => Ok(Outcome::formatted(SHOW_FORM.to_string())),
            Route::FollowUp => self.follow_up(query, history, context).await,
            Route::SpecificVehicle => self.specific_vehicle(query, history).await,
            Route::InventorySearch => self.inventory_search(query, history).await,
            Route::FordExpert => {
                let answer = self.compose(Framing::Expert, query, "", history).await?;
                Ok(Outcome::formatted(answer))
            }
            Route::CustomerRelations => {
                let answer = self.compose(Framing::Conversational, query, "", history).await?;
                Ok(Outcome::formatted(answer))
            }
        }
    }

    async fn follow_up(
        &self,
        query: &str,
        history: &str,
        context: &SessionContext,
    ) -> Result<Outcome, ApplicationError> {
        if let Some(vehicles) = &context.last_vehicles {
            return Outcome::listing(REMEMBERED_VEHICLES_MESSAGE, vehicles.clone(), false);
        }

        let material = context.last_response.as_deref().unwrap_or(FOLLOW_UP_FALLBACK);
        let answer = self.compose(Framing::Answer, query, material, history).await?;
        Ok(Outcome::formatted(answer))
    }

    async fn specific_vehicle(&self, query: &str, history: &str) -> Result<Outcome, ApplicationError> {
        let (predicate, interest) = tokio::join!(
            self.extract_predicate(query),
            self.capabilities.classifier.classify(query, SCHEMA_FIELDS.as_slice(), history),
        );
        let predicate = predicate?;

        let fields = if predicate.requested_fields().is_empty() {
            interest_fields(interest)?
        } else {
            predicate.requested_fields().to_vec()
        };

        let material = match self.inventory.snapshot().filter(&predicate) {
            FilterOutcome::Matched(records) => render_value(&project(&records, &fields))?.to_string(),
            FilterOutcome::NotInStock => NOT_IN_STOCK.to_string(),
        };

        let answer = self.compose(Framing::Answer, query, &material, history).await?;
        Ok(Outcome::formatted(answer))
    }

    async fn inventory_search(&self, query: &str, history: &str) -> Result<Outcome, ApplicationError> {
        let predicate = self.extract_predicate(query).await?;
        let outcome = self.inventory.snapshot().filter(&predicate);

        let model = predicate
            .constraint(&FieldPath::nested("parsed_name", "model"))
            .unwrap_or("vehicle");
        let material = serde_json::json!({
            "available": outcome.is_in_stock(),
            "count": outcome.count(),
            "model": model,
        })
        .to_string();

        let answer = self.compose(Framing::Availability, query, &material, history).await?;
        Ok(Outcome { vehicles: outcome.into_records(), ..Outcome::formatted(answer) })
    }

    async fn persist(
        &self,
        session_id: &SessionId,
        context: &SessionContext,
        query: &str,
        outcome: &Outcome,
    ) -> Result<(), ApplicationError> {
        let turn = Turn::now(query, outcome.recorded.clone());
        let update = ContextUpdate {
            last_query: Some(query.to_string()),
            last_response: Some(outcome.recorded.clone()),
            last_vehicles: outcome.vehicles.clone(),
            last_comparison: None,
            conversation_history: Some(context.history_with(turn, self.history_limit)),
        };

        if !self.sessions.update(session_id, update).await? {
            tracing::warn!(
                event_name = "session.update.missed",
                session_id = %session_id,
                "session disappeared before its context could be saved"
            );
        }
        Ok(())
    }
}

/// The classified interest as a projection. A label outside the schema
/// degrades to the identity fields; an unreachable classifier still fails.
fn interest_fields(
    interest: Result<String, CapabilityError>,
) -> Result<Vec<FieldPath>, ApplicationError> {
    let label = match interest {
        Ok(label) => label,
        Err(CapabilityError::Malformed(reason)) => reason,
        Err(error) => return Err(error.into()),
    };

    match label.trim().parse::<FieldPath>() {
        Ok(field) if field.is_schema_field() => Ok(vec![field]),
        _ => {
            tracing::warn!(
                event_name = "agent.interest.unrecognized",
                label = %label,
                "projecting identity fields instead"
            );
            Ok(IDENTITY_FIELDS.iter().filter_map(|field| field.parse().ok()).collect())
        }
    }
}

fn render_value<T: Serialize>(value: &T) -> Result<Value, ApplicationError> {
    serde_json::to_value(value)
        .map_err(|error| ApplicationError::DataUnavailable(format!("render inventory data: {error}")))
}
