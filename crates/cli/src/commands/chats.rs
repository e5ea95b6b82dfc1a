use clap::Subcommand;
use dealerbot_core::domain::chat::ChatMessage;
use dealerbot_db::{ChatLogRepository, SqlChatLogRepository};

use crate::commands::{build_runtime, finish, load_config, open_database, CommandResult};

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ChatsCommand {
    #[command(about = "List stored chat messages in the order they were logged")]
    List {
        #[arg(long, help = "Only show messages from this session")]
        session: Option<String>,
    },
}

pub fn run(action: ChatsCommand) -> CommandResult {
    let config = match load_config("chats") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("chats") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let ChatsCommand::List { session } = action;
    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let messages = SqlChatLogRepository::new(pool.clone()).list_all().await;
        pool.close().await;
        let messages = messages.map_err(|error| ("repository", error.to_string(), 4u8))?;

        let selected: Vec<&ChatMessage> = messages
            .iter()
            .filter(|message| {
                session.as_deref().map_or(true, |id| message.session_id.as_deref() == Some(id))
            })
            .collect();
        Ok(render(&selected))
    });

    finish("chats", result)
}

fn render(messages: &[&ChatMessage]) -> String {
    let mut lines = vec![format!("{} messages", messages.len())];
    lines.extend(messages.iter().map(|message| {
        format!(
            "- [{}] {}: {}",
            message.session_id.as_deref().unwrap_or("-"),
            message.role,
            message.message
        )
    }));
    lines.join("\n")
}
