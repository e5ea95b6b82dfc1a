use chrono::SecondsFormat;
use clap::Subcommand;
use dealerbot_core::domain::session::Session;
use dealerbot_db::{SessionRepository, SqlSessionRepository};

use crate::commands::{build_runtime, finish, load_config, open_database, CommandResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum SessionsCommand {
    #[command(about = "Delete every stored session")]
    ClearAll,
    #[command(about = "Delete sessions idle longer than the configured timeout")]
    Purge,
    #[command(about = "List stored sessions, most recently active first")]
    List,
}

pub fn run(action: SessionsCommand) -> CommandResult {
    let config = match load_config("sessions") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("sessions") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let repository = SqlSessionRepository::new(pool.clone(), config.session.timeout());
        let outcome = match action {
            SessionsCommand::ClearAll => {
                repository.clear_all().await.map(|removed| format!("cleared {removed} sessions"))
            }
            SessionsCommand::Purge => repository
                .purge_expired()
                .await
                .map(|removed| format!("purged {removed} expired sessions")),
            SessionsCommand::List => {
                repository.list_all().await.map(|sessions| render(&sessions))
            }
        };
        pool.close().await;
        outcome.map_err(|error| ("repository", error.to_string(), 4u8))
    });

    finish("sessions", result)
}

fn render(sessions: &[Session]) -> String {
    let mut lines = vec![format!("{} sessions", sessions.len())];
    lines.extend(sessions.iter().map(|session| {
        format!(
            "- {} last_activity={} turns={} last_query={}",
            session.id,
            session.last_activity.to_rfc3339_opts(SecondsFormat::Secs, true),
            session.context.conversation_history.len(),
            session.context.last_query.as_deref().unwrap_or("<none>"),
        )
    }));
    lines.join("\n")
}
