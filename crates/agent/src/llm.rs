use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use dealerbot_core::config::LlmConfig;

use crate::capability::CapabilityError;

const TEMPERATURE: f32 = 0.1;
const INITIAL_BACKOFF_MS: u64 = 250;

/// One system + user prompt exchange with a chat model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, CapabilityError>;
}

/// Client for any server exposing the OpenAI `chat/completions` API
/// (OpenAI itself, Ollama, vLLM and similar).
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

enum Attempt {
    Retry(CapabilityError),
    Fail(CapabilityError),
}

impl OpenAiCompatibleClient {
    pub fn new(config: &LlmConfig) -> Result<Self, CapabilityError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| CapabilityError::Unavailable(format!("http client: {error}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.effective_base_url()),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn attempt(&self, body: &serde_json::Value) -> Result<String, Attempt> {
        let mut request = self.http.post(&self.endpoint).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| Attempt::Retry(CapabilityError::Unavailable(error.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error = CapabilityError::Unavailable(format!("llm api error {status}: {text}"));
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                Attempt::Retry(error)
            } else {
                Attempt::Fail(error)
            });
        }

        let parsed: ApiResponse = response.json().await.map_err(|error| {
            Attempt::Fail(CapabilityError::Malformed(format!("llm response body: {error}")))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Attempt::Fail(CapabilityError::Malformed("llm returned no choices".to_string())))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, CapabilityError> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": TEMPERATURE
        });

        let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
        let mut attempt = 0;
        loop {
            match self.attempt(&body).await {
                Ok(content) => return Ok(content),
                Err(Attempt::Fail(error)) => return Err(error),
                Err(Attempt::Retry(error)) if attempt >= self.max_retries => return Err(error),
                Err(Attempt::Retry(error)) => {
                    attempt += 1;
                    tracing::warn!(
                        event_name = "llm.request.retry",
                        attempt,
                        error = %error,
                        "retrying llm request"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
}
