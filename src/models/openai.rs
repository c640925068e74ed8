//! OpenAI chat-completions provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{ChatMessage, ModelProvider, ProviderResponse, TokenUsage};

/// Provider that talks to an OpenAI-compatible chat completions API.
pub struct OpenAIProvider {
    api_key: String,
    endpoint: String,
    client: Client,
    /// Model name sent in the request body (e.g. "gpt-4-turbo").
    model: String,
    temperature: f32,
}

impl OpenAIProvider {
    /// Create a provider with explicit configuration.
    pub fn with_config(api_key: String, endpoint: String, model: String, temperature: f32) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "model HTTP client fell back to defaults");
                Client::new()
            });
        Self {
            api_key,
            endpoint,
            client,
            model,
            temperature,
        }
    }

    fn request_body(&self, messages: &[ChatMessage], functions: &[serde_json::Value]) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": super::serialize_messages(messages),
            "temperature": self.temperature,
        });
        if !functions.is_empty() {
            body["tools"] = serde_json::Value::Array(functions.to_vec());
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    async fn send_chat_with_functions(
        &self,
        messages: &[ChatMessage],
        functions: &[serde_json::Value],
    ) -> Result<(ProviderResponse, Option<TokenUsage>), anyhow::Error> {
        let body = self.request_body(messages, functions);

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API returned {status}: {text}");
        }

        let json: serde_json::Value = resp.json().await?;
        let usage = super::parse_token_usage(&json);

        if let Some(pr) = super::parse_tool_calls(&json) {
            return Ok((pr, usage));
        }

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        Ok((ProviderResponse::Final(content), usage))
    }
}
