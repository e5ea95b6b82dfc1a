//! JSON endpoints used by the chat widget.
//!
//! - `POST /user_query`        answer one customer message
//! - `POST /compare_vehicles`  structured comparison of two or more vehicles
//! - `POST /clear_session`     drop a session and its context
//! - `POST /feedback`          thumbs up / down on the conversation
//! - `POST /store_chat`        append transcript lines directly
//! - `GET  /all_vehicles`      the flattened catalog
//! - `POST /inventory/reload`  re-read the catalog file

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use dealerbot_agent::{Comparison, Orchestrator, QueryResponse, VehicleComparator};
use dealerbot_core::domain::chat::{ChatMessage, FeedbackKind};
use dealerbot_core::domain::session::SessionId;
use dealerbot_core::domain::vehicle::VehicleRecord;
use dealerbot_core::errors::{ApplicationError, InterfaceError};
use dealerbot_core::inventory::InventoryStore;
use dealerbot_db::{ChatLogRepository, FeedbackRepository, SessionRepository};

use crate::chat_log::ChatLogSink;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub comparator: Arc<VehicleComparator>,
    pub sessions: Arc<dyn SessionRepository>,
    pub chat_messages: Arc<dyn ChatLogRepository>,
    pub feedback: Arc<dyn FeedbackRepository>,
    pub inventory: Arc<InventoryStore>,
    pub chat_log: ChatLogSink,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct UserQueryRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompareRequest {
    #[serde(default)]
    pub vehicles: Vec<Value>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub comparison: Comparison,
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearSessionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
}

impl MessageResponse {
    fn new(message: &str) -> Self {
        Self { message: message.to_string(), status: None }
    }
}

#[derive(Debug, Serialize)]
pub struct AllVehiclesResponse {
    pub success: bool,
    pub count: usize,
    pub vehicles: Vec<VehicleRecord>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ReloadResponse {
    pub reloaded: bool,
    pub count: usize,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>, correlation_id: &str) -> Self {
        Self {
            status,
            body: ErrorBody { error: message.into(), correlation_id: correlation_id.to_string() },
        }
    }

    fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, correlation_id)
    }

    /// Maps an application failure and logs it under the request's correlation id.
    fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        warn!(
            event_name = "api.request.failed",
            correlation_id,
            error = %error,
            "request failed"
        );
        Self::from(error.into_interface(correlation_id))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &ErrorBody {
        &self.body
    }
}

impl From<InterfaceError> for ApiError {
    fn from(error: InterfaceError) -> Self {
        let status = match &error {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.user_message(), error.correlation_id())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/user_query", post(user_query))
        .route("/compare_vehicles", post(compare_vehicles))
        .route("/clear_session", post(clear_session))
        .route("/feedback", post(submit_feedback))
        .route("/store_chat", post(store_chat))
        .route("/all_vehicles", get(all_vehicles))
        .route("/inventory/reload", post(reload_inventory))
        .with_state(state)
}

fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Blank ids count as absent.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn user_query(
    State(state): State<AppState>,
    Json(request): Json<UserQueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let correlation_id = correlation_id();
    let session_id = present(request.session_id);

    let response = state
        .orchestrator
        .handle_query(&request.query, session_id.as_deref())
        .await
        .map_err(|error| ApiError::from_application(error, &correlation_id))?;

    let bot_message = serde_json::to_string(&response.message).unwrap_or_default();
    state.chat_log.record(vec![
        ChatMessage::user(request.query.trim(), response.session_id.as_str()),
        ChatMessage::bot(bot_message, response.session_id.as_str()),
    ]);

    info!(
        event_name = "api.user_query.answered",
        correlation_id = %correlation_id,
        session_id = %response.session_id,
        response_type = ?response.kind,
        "query answered"
    );
    Ok(Json(response))
}

pub async fn compare_vehicles(
    State(state): State<AppState>,
    Json(request): Json<CompareRequest>,
) -> Result<Json<CompareResponse>, ApiError> {
    let correlation_id = correlation_id();

    let vehicles = request
        .vehicles
        .into_iter()
        .map(VehicleRecord::from_value)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ApiError::bad_request("Each vehicle must be a JSON object", &correlation_id))?;
    let session_id = present(request.session_id);

    let comparison = state
        .comparator
        .compare(&vehicles, session_id.as_deref().map(SessionId::from).as_ref())
        .await
        .map_err(|error| match error {
            ApplicationError::MalformedComparison(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to parse comparison response",
                &correlation_id,
            ),
            other => ApiError::from_application(other, &correlation_id),
        })?;

    Ok(Json(CompareResponse { comparison, session_id }))
}

pub async fn clear_session(
    State(state): State<AppState>,
    Json(request): Json<ClearSessionRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let correlation_id = correlation_id();
    let Some(session_id) = present(request.session_id) else {
        return Err(ApiError::bad_request("No session ID provided", &correlation_id));
    };

    let cleared = state
        .sessions
        .clear(&SessionId::from(session_id.as_str()))
        .await
        .map_err(|error| ApiError::from_application(error.into(), &correlation_id))?;

    if !cleared {
        return Err(InterfaceError::not_found("Session not found", correlation_id).into());
    }

    info!(event_name = "session.cleared", correlation_id = %correlation_id, session_id = %session_id);
    Ok(Json(MessageResponse::new("Session cleared successfully")))
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let correlation_id = correlation_id();
    let (Some(session_id), Some(feedback)) = (present(request.session_id), present(request.feedback))
    else {
        return Err(ApiError::bad_request("Session ID and feedback type are required", &correlation_id));
    };
    let kind = feedback
        .parse::<FeedbackKind>()
        .map_err(|_| ApiError::bad_request("Invalid feedback type", &correlation_id))?;

    state
        .feedback
        .store(&session_id, kind, request.message.as_deref())
        .await
        .map_err(|error| ApiError::from_application(error.into(), &correlation_id))?;

    info!(
        event_name = "feedback.recorded",
        correlation_id = %correlation_id,
        session_id = %session_id,
        feedback = %kind
    );
    Ok(Json(MessageResponse {
        message: "Thank you for your feedback!".to_string(),
        status: Some("success"),
    }))
}

pub async fn store_chat(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<MessageResponse>, ApiError> {
    let correlation_id = correlation_id();
    let invalid = || ApiError::bad_request("Invalid input format, expected a list of messages", &correlation_id);
    if !payload.is_array() {
        return Err(invalid());
    }
    let messages: Vec<ChatMessage> = serde_json::from_value(payload).map_err(|_| invalid())?;

    state
        .chat_messages
        .append(&messages)
        .await
        .map_err(|error| ApiError::from_application(error.into(), &correlation_id))?;

    Ok(Json(MessageResponse::new("Chat stored successfully")))
}

pub async fn all_vehicles(State(state): State<AppState>) -> Json<AllVehiclesResponse> {
    let vehicles = state.inventory.snapshot().records().to_vec();
    Json(AllVehiclesResponse { success: true, count: vehicles.len(), vehicles })
}

pub async fn reload_inventory(
    State(state): State<AppState>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let correlation_id = correlation_id();
    let count = state
        .inventory
        .reload()
        .map_err(|error| ApiError::from_application(error.into(), &correlation_id))?;
    Ok(Json(ReloadResponse { reloaded: true, count }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use serde_json::{json, Value};

    use dealerbot_agent::{
        Capabilities, CapabilityError, ComposeRequest, IntentClassifier, Orchestrator,
        ParameterExtractor, ResponseComposer, VehicleComparator,
    };
    use dealerbot_core::domain::chat::FeedbackKind;
    use dealerbot_core::domain::field::FieldPath;
    use dealerbot_core::domain::vehicle::VehicleRecord;
    use dealerbot_core::inventory::{Catalog, InventoryStore};
    use dealerbot_db::{
        ChatLogRepository, FeedbackRepository, InMemoryChatLogRepository,
        InMemoryFeedbackRepository, InMemorySessionRepository, SessionRepository,
    };

    use super::*;

    struct Canned;

    #[async_trait]
    impl IntentClassifier for Canned {
        async fn classify(
            &self,
            _text: &str,
            _labels: &[&str],
            _context: &str,
        ) -> Result<String, CapabilityError> {
            Ok("Customer Relations".to_string())
        }

        async fn classify_boolean(&self, _text: &str, _context: &str) -> Result<bool, CapabilityError> {
            Ok(false)
        }
    }

    #[async_trait]
    impl ParameterExtractor for Canned {
        async fn extract(
            &self,
            _text: &str,
            _schema: &[FieldPath],
        ) -> Result<std::collections::BTreeMap<String, Option<String>>, CapabilityError> {
            Ok(Default::default())
        }
    }

    #[async_trait]
    impl ResponseComposer for Canned {
        async fn compose(&self, request: ComposeRequest<'_>) -> Result<String, CapabilityError> {
            Ok(format!("Happy to help with that: {}", request.query))
        }
    }

    struct Fixture {
        state: AppState,
        sessions: Arc<InMemorySessionRepository>,
        chat: Arc<InMemoryChatLogRepository>,
        feedback: Arc<InMemoryFeedbackRepository>,
    }

    fn fixture() -> Fixture {
        let capabilities = Capabilities::shared(Arc::new(Canned));
        let sessions = Arc::new(InMemorySessionRepository::default());
        let chat = Arc::new(InMemoryChatLogRepository::default());
        let feedback = Arc::new(InMemoryFeedbackRepository::default());
        let mut catalog = Catalog::default();
        catalog.insert(
            "suv",
            VehicleRecord::from_value(json!({"vehicle_name": "2024 Escape", "vin": "V1"})).expect("object"),
        );
        let inventory = Arc::new(InventoryStore::from_catalog(catalog));
        let (chat_log, _worker) = ChatLogSink::spawn(chat.clone());

        let state = AppState {
            orchestrator: Arc::new(Orchestrator::new(
                capabilities.clone(),
                sessions.clone(),
                inventory.clone(),
                Some(10),
            )),
            comparator: Arc::new(VehicleComparator::new(capabilities.composer.clone(), sessions.clone())),
            sessions: sessions.clone(),
            chat_messages: chat.clone(),
            feedback: feedback.clone(),
            inventory,
            chat_log,
        };
        Fixture { state, sessions, chat, feedback }
    }

    #[tokio::test]
    async fn user_query_creates_session_and_answers() {
        let fixture = fixture();

        let Json(response) = user_query(
            State(fixture.state.clone()),
            Json(UserQueryRequest { query: "hello there".to_string(), session_id: None }),
        )
        .await
        .expect("answered");

        assert_eq!(response.message.as_deref(), Some("Happy to help with that: hello there"));
        assert!(fixture.sessions.get(&response.session_id).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn empty_query_is_bad_request() {
        let fixture = fixture();

        let error = user_query(State(fixture.state), Json(UserQueryRequest::default()))
            .await
            .expect_err("empty query");

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.body().error, "Query cannot be empty");
    }

    #[tokio::test]
    async fn comparison_requires_two_vehicles() {
        let fixture = fixture();

        let error = compare_vehicles(
            State(fixture.state),
            Json(CompareRequest { vehicles: vec![json!({"vin": "V1"})], session_id: None }),
        )
        .await
        .expect_err("one vehicle");

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.body().error, "At least two vehicles are required for comparison");
    }

    #[tokio::test]
    async fn unparseable_comparison_is_internal_error() {
        let fixture = fixture();

        let error = compare_vehicles(
            State(fixture.state),
            Json(CompareRequest {
                vehicles: vec![json!({"vin": "V1"}), json!({"vin": "V2"})],
                session_id: None,
            }),
        )
        .await
        .expect_err("canned composer returns prose");

        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.body().error, "Failed to parse comparison response");
    }

    #[tokio::test]
    async fn clear_session_reports_missing_and_unknown_ids() {
        let fixture = fixture();

        let missing = clear_session(State(fixture.state.clone()), Json(ClearSessionRequest::default()))
            .await
            .expect_err("missing id");
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(missing.body().error, "No session ID provided");

        let unknown = clear_session(
            State(fixture.state.clone()),
            Json(ClearSessionRequest { session_id: Some("nope".to_string()) }),
        )
        .await
        .expect_err("unknown id");
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let id = fixture.sessions.create().await.expect("create");
        let Json(cleared) = clear_session(
            State(fixture.state),
            Json(ClearSessionRequest { session_id: Some(id.0.clone()) }),
        )
        .await
        .expect("cleared");
        assert_eq!(cleared.message, "Session cleared successfully");
        assert!(fixture.sessions.get(&id).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn feedback_is_validated_and_stored() {
        let fixture = fixture();

        let invalid = submit_feedback(
            State(fixture.state.clone()),
            Json(FeedbackRequest {
                session_id: Some("S-1".to_string()),
                feedback: Some("meh".to_string()),
                message: None,
            }),
        )
        .await
        .expect_err("invalid kind");
        assert_eq!(invalid.body().error, "Invalid feedback type");

        let Json(thanks) = submit_feedback(
            State(fixture.state),
            Json(FeedbackRequest {
                session_id: Some("S-1".to_string()),
                feedback: Some(FeedbackKind::Positive.to_string()),
                message: Some("great".to_string()),
            }),
        )
        .await
        .expect("stored");
        assert_eq!(thanks.status, Some("success"));
        assert_eq!(fixture.feedback.stats(30).await.expect("stats").positive_count, 1);
    }

    #[tokio::test]
    async fn store_chat_requires_a_list() {
        let fixture = fixture();

        let error = store_chat(State(fixture.state.clone()), Json(json!({"role": "user"})))
            .await
            .expect_err("not a list");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);

        store_chat(
            State(fixture.state),
            Json(json!([{"role": "user", "message": "hi", "session_id": "S-1"}])),
        )
        .await
        .expect("stored");
        assert_eq!(fixture.chat.list_all().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn all_vehicles_returns_flattened_catalog() {
        let fixture = fixture();

        let Json(response) = all_vehicles(State(fixture.state)).await;

        assert!(response.success);
        assert_eq!(response.count, 1);
        let rendered: Value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(rendered["vehicles"][0]["vin"], json!("V1"));
    }
}
