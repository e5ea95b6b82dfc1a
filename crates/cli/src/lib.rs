pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::chats::ChatsCommand;
use commands::sessions::SessionsCommand;

#[derive(Debug, Parser)]
#[command(
    name = "dealerbot",
    about = "Dealerbot operator CLI",
    long_about = "Operate the dealership assistant: migrations, config inspection, inventory checks, session upkeep, and chat log review.",
    after_help = "Examples:\n  dealerbot migrate\n  dealerbot inventory\n  dealerbot sessions purge\n  dealerbot chats list --session <id>\n  dealerbot feedback-stats --days 7"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Load the inventory catalog and report vehicle counts per category")]
    Inventory,
    #[command(about = "Clear or purge stored conversation sessions")]
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },
    #[command(about = "Inspect the stored chat log")]
    Chats {
        #[command(subcommand)]
        action: ChatsCommand,
    },
    #[command(about = "Summarize visitor feedback over a trailing window of days")]
    FeedbackStats {
        #[arg(long, default_value_t = 30, help = "Size of the trailing window in days")]
        days: u32,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Inventory => commands::inventory::run(),
        Command::Sessions { action } => commands::sessions::run(action),
        Command::Chats { action } => commands::chats::run(action),
        Command::FeedbackStats { days } => commands::feedback::run(days),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{ChatsCommand, Cli, Command, SessionsCommand};

    #[test]
    fn feedback_window_defaults_to_thirty_days() {
        let cli = Cli::parse_from(["dealerbot", "feedback-stats"]);
        assert!(matches!(cli.command, Command::FeedbackStats { days: 30 }));

        let cli = Cli::parse_from(["dealerbot", "feedback-stats", "--days", "7"]);
        assert!(matches!(cli.command, Command::FeedbackStats { days: 7 }));
    }

    #[test]
    fn sessions_takes_a_nested_action() {
        let cli = Cli::parse_from(["dealerbot", "sessions", "clear-all"]);
        assert!(matches!(cli.command, Command::Sessions { action: SessionsCommand::ClearAll }));

        let cli = Cli::parse_from(["dealerbot", "sessions", "purge"]);
        assert!(matches!(cli.command, Command::Sessions { action: SessionsCommand::Purge }));

        let cli = Cli::parse_from(["dealerbot", "sessions", "list"]);
        assert!(matches!(cli.command, Command::Sessions { action: SessionsCommand::List }));
    }

    #[test]
    fn chats_list_takes_an_optional_session_filter() {
        let cli = Cli::parse_from(["dealerbot", "chats", "list"]);
        assert!(matches!(cli.command, Command::Chats { action: ChatsCommand::List { session: None } }));

        let cli = Cli::parse_from(["dealerbot", "chats", "list", "--session", "S-1"]);
        let Command::Chats { action: ChatsCommand::List { session } } = cli.command else {
            panic!("expected chats list");
        };
        assert_eq!(session.as_deref(), Some("S-1"));
    }
}
