use std::process::ExitCode;

fn main() -> ExitCode {
    dealerbot_cli::run()
}
