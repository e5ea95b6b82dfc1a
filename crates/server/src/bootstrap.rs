use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use dealerbot_agent::{
    Capabilities, CapabilityError, LlmCapabilities, OpenAiCompatibleClient, Orchestrator,
    VehicleComparator,
};
use dealerbot_core::config::{AppConfig, ConfigError, LoadOptions};
use dealerbot_core::inventory::{InventoryError, InventoryStore};
use dealerbot_db::{
    connect_with_config, migrations, DbPool, SqlChatLogRepository, SqlFeedbackRepository,
    SqlSessionRepository,
};

use crate::api::AppState;
use crate::chat_log::ChatLogSink;
use crate::health::HealthState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
    pub health: HealthState,
    pub chat_log_worker: JoinHandle<()>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("inventory could not be loaded: {0}")]
    Inventory(#[from] InventoryError),
    #[error("llm client could not be built: {0}")]
    Llm(#[from] CapabilityError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let inventory = Arc::new(InventoryStore::open(config.inventory.path.clone())?);

    let client = OpenAiCompatibleClient::new(&config.llm)?;
    info!(
        event_name = "system.bootstrap.llm_configured",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        endpoint = %client.endpoint(),
        "llm client configured"
    );
    let capabilities = Capabilities::shared(Arc::new(LlmCapabilities::new(Arc::new(client))));

    let sessions = Arc::new(SqlSessionRepository::new(db_pool.clone(), config.session.timeout()));
    let chat_messages = Arc::new(SqlChatLogRepository::new(db_pool.clone()));
    let feedback = Arc::new(SqlFeedbackRepository::new(db_pool.clone()));
    let (chat_log, chat_log_worker) = ChatLogSink::spawn(chat_messages.clone());

    let orchestrator = Orchestrator::new(
        capabilities.clone(),
        sessions.clone(),
        inventory.clone(),
        config.session.history_cap(),
    );
    let comparator = VehicleComparator::new(capabilities.composer.clone(), sessions.clone());

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        comparator: Arc::new(comparator),
        sessions,
        chat_messages,
        feedback,
        inventory: inventory.clone(),
        chat_log,
    };
    let health = HealthState::new(db_pool.clone(), inventory);

    Ok(Application { config, db_pool, state, health, chat_log_worker })
}
