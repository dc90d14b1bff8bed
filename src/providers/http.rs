//! OpenAI-compatible HTTP completion provider.
//!
//! Speaks `/chat/completions` against any OpenAI-compatible endpoint (Groq,
//! Cohere's compatibility API, OpenRouter, a local server). Non-streaming:
//! the dispatch cycle wants one text per call, not token deltas.

use crate::config::ProviderEndpoint;
use crate::providers::{ChatMessage, CompletionError, CompletionProvider, Role};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// HTTP client for one OpenAI-compatible chat-completions endpoint.
pub struct HttpCompletionProvider {
    id: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl HttpCompletionProvider {
    /// Create a provider from endpoint config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(id: impl Into<String>, endpoint: &ProviderEndpoint) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .build()
            .map_err(|e| crate::error::AssistantError::Provider(e.to_string()))?;

        Ok(Self {
            id: id.into(),
            base_url: endpoint.base_url.trim_end_matches('/').to_owned(),
            api_key: endpoint.api_key.clone(),
            model: endpoint.model.clone(),
            client,
        })
    }

    fn build_body(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_message: &str,
    ) -> serde_json::Value {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": system_prompt,
        })];

        for msg in history {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(serde_json::json!({
                "role": role,
                "content": msg.content,
            }));
        }

        messages.push(serde_json::json!({
            "role": "user",
            "content": user_message,
        }));

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.7,
            "stream": false,
        })
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_message: &str,
    ) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(system_prompt, history, user_message);

        debug!(provider = self.id.as_str(), model = self.model.as_str(), "completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    CompletionError::Transient(e.to_string())
                } else {
                    CompletionError::Permanent(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("{status}: {text}");
            return Err(if status.is_server_error() {
                CompletionError::Transient(message)
            } else {
                CompletionError::Permanent(message)
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CompletionError::Permanent(format!("invalid response body: {e}")))?;

        let content = value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                CompletionError::Permanent("response has no choices[0].message.content".into())
            })?;

        Ok(content.trim().to_owned())
    }
}
