//! Model provider abstractions.
//!
//! Defines the [`ModelProvider`] trait, the [`ChatMessage`] type and the
//! function-calling aware [`ProviderResponse`], plus the concrete
//! [`OpenAIProvider`].

pub mod openai;

use async_trait::async_trait;

use crate::config::ModelConfig;

pub use openai::OpenAIProvider;

// ---------------------------------------------------------------------------
// ChatMessage – shared message representation
// ---------------------------------------------------------------------------

/// A single chat message with a role and content.
///
/// Assistant messages that invoke tools carry the raw OpenAI-format
/// `tool_calls` array; `tool` role messages carry the id of the call they
/// answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    pub tool_calls: Option<Vec<serde_json::Value>>,
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Plain message (no tool metadata).
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Result of the tool call `id`.
    pub fn tool_result(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(id.into()),
        }
    }

    /// Assistant turn that requested the given calls.
    pub fn assistant_calls(calls: &[FunctionCallItem]) -> Self {
        let tool_calls = calls
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id,
                    "type": "function",
                    "function": { "name": c.name, "arguments": c.arguments },
                })
            })
            .collect();
        Self {
            role: "assistant".into(),
            content: String::new(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }
}

/// Serialise messages into the OpenAI-compatible JSON array format,
/// including `tool_calls` and `tool_call_id` when present.
pub fn serialize_messages(messages: &[ChatMessage]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|m| {
            let mut msg = serde_json::json!({ "role": m.role });
            match &m.tool_calls {
                // Content must be null on assistant messages that only carry tool_calls.
                Some(tcs) if m.content.is_empty() => {
                    msg["tool_calls"] = serde_json::json!(tcs);
                    msg["content"] = serde_json::Value::Null;
                }
                Some(tcs) => {
                    msg["tool_calls"] = serde_json::json!(tcs);
                    msg["content"] = serde_json::json!(m.content);
                }
                None => msg["content"] = serde_json::json!(m.content),
            }
            if let Some(ref tcid) = m.tool_call_id {
                msg["tool_call_id"] = serde_json::json!(tcid);
            }
            msg
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ProviderResponse – function-calling aware response
// ---------------------------------------------------------------------------

/// Token usage statistics returned by the API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// A single function call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallItem {
    /// Tool call id (from the API).
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments object.
    pub arguments: String,
}

/// Response from a model that may be a final text reply or function calls.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    /// Plain text reply.
    Final(String),
    /// The model wants to invoke a single function.
    FunctionCall {
        id: String,
        name: String,
        arguments: String,
    },
    /// The model wants to invoke several functions.
    MultiFunctionCall(Vec<FunctionCallItem>),
}

impl ProviderResponse {
    /// The requested calls, in order.  A final reply comes back as `Err`
    /// carrying its text.
    pub fn into_calls(self) -> Result<Vec<FunctionCallItem>, String> {
        match self {
            ProviderResponse::Final(text) => Err(text),
            ProviderResponse::FunctionCall {
                id,
                name,
                arguments,
            } => Ok(vec![FunctionCallItem {
                id,
                name,
                arguments,
            }]),
            ProviderResponse::MultiFunctionCall(items) => Ok(items),
        }
    }
}

/// Extract token usage statistics from a chat-completions response.
pub fn parse_token_usage(json: &serde_json::Value) -> Option<TokenUsage> {
    let usage = json.get("usage")?;
    Some(TokenUsage {
        prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0),
        completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0),
        total_tokens: usage["total_tokens"].as_u64().unwrap_or(0),
    })
}

/// Parse `tool_calls` from a chat-completions response.
///
/// One call yields `FunctionCall`, several yield `MultiFunctionCall`,
/// none yields `None`.
pub fn parse_tool_calls(json: &serde_json::Value) -> Option<ProviderResponse> {
    let message = json.get("choices")?.get(0)?.get("message")?;
    let tool_calls = message.get("tool_calls")?.as_array()?;

    let mut items: Vec<FunctionCallItem> = tool_calls
        .iter()
        .enumerate()
        .filter_map(|(idx, tc)| {
            let func = tc.get("function")?;
            let name = func.get("name")?.as_str()?.to_string();
            let arguments = func
                .get("arguments")
                .and_then(|a| a.as_str())
                .unwrap_or("{}")
                .to_string();
            let id = tc
                .get("id")
                .and_then(|i| i.as_str())
                .map(String::from)
                .unwrap_or_else(|| format!("call_{idx}"));
            Some(FunctionCallItem { id, name, arguments })
        })
        .collect();

    match items.len() {
        0 => None,
        1 => items.pop().map(|item| ProviderResponse::FunctionCall {
            id: item.id,
            name: item.name,
            arguments: item.arguments,
        }),
        _ => Some(ProviderResponse::MultiFunctionCall(items)),
    }
}

// ---------------------------------------------------------------------------
// ModelProvider trait
// ---------------------------------------------------------------------------

/// Trait implemented by every LLM backend.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Send chat messages together with tool function definitions.
    async fn send_chat_with_functions(
        &self,
        messages: &[ChatMessage],
        functions: &[serde_json::Value],
    ) -> Result<(ProviderResponse, Option<TokenUsage>), anyhow::Error>;
}

/// Stand-in used when no model key is configured.  Every call fails with
/// an actionable message; startup does not.
pub struct UnconfiguredProvider;

#[async_trait]
impl ModelProvider for UnconfiguredProvider {
    async fn send_chat_with_functions(
        &self,
        _messages: &[ChatMessage],
        _functions: &[serde_json::Value],
    ) -> Result<(ProviderResponse, Option<TokenUsage>), anyhow::Error> {
        anyhow::bail!("no model API key configured (set OPENAI_API_KEY)")
    }
}

/// Build the provider described by `cfg`.
pub fn build_provider(cfg: &ModelConfig) -> Box<dyn ModelProvider> {
    match cfg.api_key.as_deref() {
        Some(key) => {
            tracing::info!(model = %cfg.model, endpoint = %cfg.endpoint, "using OpenAI-compatible provider");
            Box::new(OpenAIProvider::with_config(
                key.to_string(),
                cfg.endpoint.clone(),
                cfg.model.clone(),
                cfg.temperature,
            ))
        }
        None => {
            tracing::warn!("no model API key configured; chat turns will fail until one is set");
            Box::new(UnconfiguredProvider)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialize_tool_call_round() {
        let calls = vec![FunctionCallItem {
            id: "c1".into(),
            name: "WeatherLookup".into(),
            arguments: r#"{"input":"Oslo"}"#.into(),
        }];
        let msgs = vec![
            ChatMessage::new("user", "weather?"),
            ChatMessage::assistant_calls(&calls),
            ChatMessage::tool_result("c1", "sunny"),
        ];
        let out = serialize_messages(&msgs);
        assert_eq!(out[0]["content"], "weather?");
        assert!(out[1]["content"].is_null());
        assert_eq!(out[1]["tool_calls"][0]["function"]["name"], "WeatherLookup");
        assert_eq!(out[2]["role"], "tool");
        assert_eq!(out[2]["tool_call_id"], "c1");
    }

    #[test]
    fn parse_single_and_multi_calls() {
        let one = json!({"choices": [{"message": {"tool_calls": [
            {"id": "a", "function": {"name": "SystemTool", "arguments": "{\"input\":\"date\"}"}}
        ]}}]});
        assert_eq!(
            parse_tool_calls(&one),
            Some(ProviderResponse::FunctionCall {
                id: "a".into(),
                name: "SystemTool".into(),
                arguments: "{\"input\":\"date\"}".into(),
            })
        );

        let two = json!({"choices": [{"message": {"tool_calls": [
            {"id": "a", "function": {"name": "x"}},
            {"function": {"name": "y", "arguments": "{}"}}
        ]}}]});
        match parse_tool_calls(&two) {
            Some(ProviderResponse::MultiFunctionCall(items)) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].arguments, "{}");
                assert_eq!(items[1].id, "call_1");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let none = json!({"choices": [{"message": {"content": "hi"}}]});
        assert_eq!(parse_tool_calls(&none), None);
    }

    #[test]
    fn usage_is_optional() {
        assert_eq!(parse_token_usage(&json!({})), None);
        let u = parse_token_usage(&json!({"usage": {"prompt_tokens": 3, "total_tokens": 5}})).unwrap();
        assert_eq!(u.completion_tokens, 0);
        assert_eq!(u.total_tokens, 5);
    }

    #[tokio::test]
    async fn unconfigured_provider_names_the_variable() {
        let err = UnconfiguredProvider
            .send_chat_with_functions(&[], &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
