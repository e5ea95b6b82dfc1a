use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use dealerbot_core::domain::field::FieldPath;
use dealerbot_core::domain::vehicle::UNKNOWN;

use crate::capability::{
    CapabilityError, ComposeRequest, IntentClassifier, ParameterExtractor, ResponseComposer,
};
use crate::llm::LlmClient;
use crate::parsing::{bare_answer, object_slice, python_literal_to_json};
use crate::prompts;

/// Classifier, extractor and composer backed by a chat model.
#[derive(Clone)]
pub struct LlmCapabilities {
    client: Arc<dyn LlmClient>,
}

impl LlmCapabilities {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

/// Resolves a free-text answer to one of `labels`: an exact case-insensitive
/// match first, otherwise the single label the answer mentions.
pub fn match_label(answer: &str, labels: &[&str]) -> Result<String, CapabilityError> {
    let answer = bare_answer(answer);
    if let Some(label) = labels.iter().find(|label| label.eq_ignore_ascii_case(answer)) {
        return Ok((*label).to_string());
    }

    let lowered = answer.to_lowercase();
    let mentioned: Vec<&str> =
        labels.iter().copied().filter(|label| lowered.contains(&label.to_lowercase())).collect();
    match mentioned.as_slice() {
        [label] => Ok((*label).to_string()),
        _ => Err(CapabilityError::Malformed(format!("`{answer}` is not one of the offered labels"))),
    }
}

/// Reads an extraction answer into field → value, keeping only `schema` keys.
pub fn parse_extraction(
    answer: &str,
    schema: &[FieldPath],
) -> Result<BTreeMap<String, Option<String>>, CapabilityError> {
    let object = object_slice(answer)
        .ok_or_else(|| CapabilityError::Malformed("extraction contained no object".to_string()))?;
    let parsed: Map<String, Value> = serde_json::from_str(&python_literal_to_json(object))
        .map_err(|error| CapabilityError::Malformed(format!("extraction object: {error}")))?;

    let allowed: Vec<String> = schema.iter().map(ToString::to_string).collect();
    Ok(parsed
        .into_iter()
        .filter(|(key, _)| allowed.contains(key))
        .map(|(key, value)| {
            let text = match value {
                Value::Null => UNKNOWN.to_string(),
                Value::String(text) if text.trim().is_empty() => UNKNOWN.to_string(),
                Value::String(text) => text.trim().to_string(),
                other => other.to_string(),
            };
            (key, Some(text))
        })
        .collect())
}

#[async_trait]
impl IntentClassifier for LlmCapabilities {
    async fn classify(
        &self,
        text: &str,
        labels: &[&str],
        context: &str,
    ) -> Result<String, CapabilityError> {
        let (system, user) = prompts::classification(text, labels, context);
        let answer = self.client.complete(&system, &user).await?;
        match_label(&answer, labels)
    }

    async fn classify_boolean(&self, text: &str, context: &str) -> Result<bool, CapabilityError> {
        let (system, user) = prompts::full_listing(text, context);
        let answer = self.client.complete(&system, &user).await?;
        Ok(bare_answer(&answer).eq_ignore_ascii_case("true"))
    }
}

#[async_trait]
impl ParameterExtractor for LlmCapabilities {
    async fn extract(
        &self,
        text: &str,
        schema: &[FieldPath],
    ) -> Result<BTreeMap<String, Option<String>>, CapabilityError> {
        let (system, user) = prompts::extraction(text, schema);
        let answer = self.client.complete(&system, &user).await?;
        parse_extraction(&answer, schema)
    }
}

#[async_trait]
impl ResponseComposer for LlmCapabilities {
    async fn compose(&self, request: ComposeRequest<'_>) -> Result<String, CapabilityError> {
        let (system, user) = prompts::composition(&request);
        let answer = self.client.complete(&system, &user).await?;
        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use dealerbot_core::domain::field::FieldPath;

    use super::{match_label, parse_extraction, LlmCapabilities};
    use crate::capability::{
        CapabilityError, ComposeRequest, Framing, IntentClassifier, ParameterExtractor,
        ResponseComposer,
    };
    use crate::llm::LlmClient;
    use crate::router::Route;

    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, CapabilityError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String, CapabilityError>>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), prompts: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, CapabilityError> {
            self.prompts.lock().expect("prompts lock").push(user.to_string());
            self.replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or_else(|| Err(CapabilityError::Unavailable("script exhausted".to_string())))
        }
    }

    #[test]
    fn labels_match_loosely_but_unambiguously() {
        let labels = Route::LABELS.as_slice();
        assert_eq!(match_label("'inventory search'", labels).expect("exact"), "Inventory Search");
        assert_eq!(
            match_label("Routing: Ford Expert.", labels).expect("mentioned"),
            "Ford Expert"
        );
        assert!(matches!(
            match_label("Ford Expert or Follow-up", labels),
            Err(CapabilityError::Malformed(_))
        ));
        assert!(matches!(match_label("Sales", labels), Err(CapabilityError::Malformed(_))));
    }

    #[test]
    fn extraction_keeps_schema_keys_only() {
        let fields = parse_extraction(
            "```python\n{'parsed_name[model]': 'Escape', 'colour': 'red', 'price': None, 'vin': ''}\n```",
            &FieldPath::schema(),
        )
        .expect("parse");

        assert_eq!(fields.len(), 3);
        assert_eq!(fields["parsed_name[model]"].as_deref(), Some("Escape"));
        assert_eq!(fields["price"].as_deref(), Some("Unknown"));
        assert_eq!(fields["vin"].as_deref(), Some("Unknown"));
    }

    #[test]
    fn non_object_extraction_is_malformed() {
        assert!(matches!(
            parse_extraction("I could not find anything", &FieldPath::schema()),
            Err(CapabilityError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn boolean_requires_literal_true() {
        let client = ScriptedClient::new(vec![
            Ok(" True.".to_string()),
            Ok("true, they want everything".to_string()),
        ]);
        let capabilities = LlmCapabilities::new(client);
        assert!(capabilities.classify_boolean("show all escapes", "").await.expect("first"));
        assert!(!capabilities.classify_boolean("show all escapes", "").await.expect("second"));
    }

    #[tokio::test]
    async fn classify_passes_history_into_prompt() {
        let client = ScriptedClient::new(vec![Ok("Follow-up".to_string())]);
        let capabilities = LlmCapabilities::new(client.clone());
        let label = capabilities
            .classify("yes", Route::LABELS.as_slice(), "\nLast few interactions:\nUser: hi\n")
            .await
            .expect("classify");

        assert_eq!(label, "Follow-up");
        let prompts = client.prompts.lock().expect("prompts lock");
        assert!(prompts[0].contains("User: hi"));
    }

    #[tokio::test]
    async fn unavailable_backend_propagates() {
        let client = ScriptedClient::new(vec![Err(CapabilityError::Unavailable("down".to_string()))]);
        let capabilities = LlmCapabilities::new(client);
        let error = capabilities
            .compose(ComposeRequest {
                framing: Framing::Expert,
                query: "best suv?",
                material: "",
                history: "",
            })
            .await
            .expect_err("backend down");
        assert_eq!(error, CapabilityError::Unavailable("down".to_string()));
    }

    #[tokio::test]
    async fn extract_round_trips_through_client() {
        let client = ScriptedClient::new(vec![Ok(
            r#"{"parsed_name[year]": 2024, "specifications[horsepower]": "Unknown"}"#.to_string(),
        )]);
        let capabilities = LlmCapabilities::new(client);
        let fields =
            capabilities.extract("hp of the 2024?", &FieldPath::schema()).await.expect("extract");
        assert_eq!(fields["parsed_name[year]"].as_deref(), Some("2024"));
        assert_eq!(fields["specifications[horsepower]"].as_deref(), Some("Unknown"));
    }
}
