//! OpenAI-compatible chat completion client.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use ticketbuddy_core::{ChatMessage, Error, LanguageModel, Result};
use tracing::{debug, warn};

/// Client for `POST {base_url}/chat/completions`.
pub struct ChatClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for ChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, messages = messages.len(), "Chat completion request");

        let mut request = self.client.post(&url).json(&CompletionRequest {
            model: &self.model,
            messages,
            temperature: 0.2,
        });
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!(status = status_code, message = message, "Chat model error response");
            return Err(Error::from_status(status_code, message));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidData(format!("Failed to parse response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::InvalidData("Chat model returned no content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start();

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("Authorization", "Bearer llm-key")
                .body_includes("\"model\":\"triage-small\"");
            then.status(200).json_body(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "[]"}}]
            }));
        });

        let client = ChatClient::new(
            format!("{}/v1/", server.base_url()),
            "triage-small",
            Some("llm-key".to_string()),
        );
        let text = client
            .complete(&[ChatMessage::user("hello")])
            .await
            .unwrap();

        mock.assert();
        assert_eq!(text, "[]");
    }

    #[tokio::test]
    async fn test_complete_maps_error_status() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(429)
                .json_body(serde_json::json!({"message": "rate limited"}));
        });

        let client = ChatClient::new(server.base_url(), "m", None);
        let err = client.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert_eq!(err.upstream_status(), Some(429));
    }

    #[tokio::test]
    async fn test_complete_without_choices() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(serde_json::json!({"choices": []}));
        });

        let client = ChatClient::new(server.base_url(), "m", None);
        let err = client.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }
}
