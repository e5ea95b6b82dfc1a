use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dealerbot_core::config::AppConfig;
use toml::Value;

use crate::commands::{load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for ConfigLine { key, value, env_keys } in effective_values(&config) {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn effective_values(config: &AppConfig) -> Vec<ConfigLine> {
    let api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };

    vec![
        line("database.url", config.database.url.clone(), &["DEALERBOT_DATABASE_URL"]),
        line(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["DEALERBOT_DATABASE_MAX_CONNECTIONS"],
        ),
        line(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["DEALERBOT_DATABASE_TIMEOUT_SECS"],
        ),
        line("llm.provider", format!("{:?}", config.llm.provider), &["DEALERBOT_LLM_PROVIDER"]),
        line("llm.model", config.llm.model.clone(), &["DEALERBOT_LLM_MODEL"]),
        line("llm.base_url", config.llm.effective_base_url(), &["DEALERBOT_LLM_BASE_URL"]),
        line("llm.api_key", api_key.to_string(), &["DEALERBOT_LLM_API_KEY"]),
        line("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["DEALERBOT_LLM_TIMEOUT_SECS"]),
        line("llm.max_retries", config.llm.max_retries.to_string(), &["DEALERBOT_LLM_MAX_RETRIES"]),
        line(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["DEALERBOT_SERVER_BIND_ADDRESS"],
        ),
        line("server.port", config.server.port.to_string(), &["DEALERBOT_SERVER_PORT"]),
        line(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["DEALERBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        line(
            "inventory.path",
            config.inventory.path.display().to_string(),
            &["DEALERBOT_INVENTORY_PATH"],
        ),
        line(
            "session.timeout_secs",
            config.session.timeout_secs.to_string(),
            &["DEALERBOT_SESSION_TIMEOUT_SECS"],
        ),
        line(
            "session.history_limit",
            config.session.history_limit.to_string(),
            &["DEALERBOT_SESSION_HISTORY_LIMIT"],
        ),
        line(
            "logging.level",
            config.logging.level.clone(),
            &["DEALERBOT_LOGGING_LEVEL", "DEALERBOT_LOG_LEVEL"],
        ),
        line(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["DEALERBOT_LOGGING_FORMAT", "DEALERBOT_LOG_FORMAT"],
        ),
    ]
}

struct ConfigLine {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn line(key: &'static str, value: String, env_keys: &'static [&'static str]) -> ConfigLine {
    ConfigLine { key, value, env_keys }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("dealerbot.toml"), PathBuf::from("config/dealerbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use super::{contains_path, field_source, render_line};

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: toml::Value = "[llm]\nmodel = \"llama3.1\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.provider"));
        assert!(!contains_path(&doc, "server.port"));
    }

    #[test]
    fn unset_keys_fall_back_to_default_source() {
        let source = field_source("server.port", &["DEALERBOT_CONFIG_TEST_UNSET_KEY"], None, None);
        assert_eq!(source, "default");
        assert_eq!(
            render_line("server.port", "8000", source),
            "- server.port = 8000 (source: default)"
        );
    }
}
