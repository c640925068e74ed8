//! Integration test: the tool-call loop end-to-end with a mock provider
//! and the real tool set.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use intelligent_agent::agent::Agent;
use intelligent_agent::config::Config;
use intelligent_agent::models::{ChatMessage, ModelProvider, ProviderResponse, TokenUsage};
use intelligent_agent::tools::ToolRegistry;

/// Asks for a chart on the first call, then echoes the tool result.
struct ChartThenEcho {
    calls: AtomicUsize,
    last_tool_result: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl ModelProvider for ChartThenEcho {
    async fn send_chat_with_functions(
        &self,
        messages: &[ChatMessage],
        functions: &[serde_json::Value],
    ) -> anyhow::Result<(ProviderResponse, Option<TokenUsage>)> {
        assert_eq!(functions.len(), 4, "every tool should be offered");
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            return Ok((
                ProviderResponse::FunctionCall {
                    id: "call_1".into(),
                    name: "DataVisualization".into(),
                    arguments: serde_json::json!({ "input": "bar|Jan,10,Feb,15|Sales" }).to_string(),
                },
                None,
            ));
        }
        let tool = messages
            .iter()
            .rev()
            .find(|m| m.role == "tool")
            .map(|m| m.content.clone())
            .unwrap_or_default();
        *self.last_tool_result.lock().unwrap() = Some(tool.clone());
        Ok((ProviderResponse::Final(format!("Done. {tool}")), None))
    }
}

struct AlwaysFails;

#[async_trait]
impl ModelProvider for AlwaysFails {
    async fn send_chat_with_functions(
        &self,
        _messages: &[ChatMessage],
        _functions: &[serde_json::Value],
    ) -> anyhow::Result<(ProviderResponse, Option<TokenUsage>)> {
        anyhow::bail!("upstream unavailable")
    }
}

fn config(ws: &tempfile::TempDir) -> Config {
    Config {
        notes_dir: ws.path().join("agent_notes"),
        visualizations_dir: ws.path().join("visualizations"),
        working_dir: Some(ws.path().to_path_buf()),
        ..Config::default()
    }
}

#[tokio::test]
async fn tool_call_round_trip_renders_chart() {
    let ws = tempfile::tempdir().unwrap();
    let cfg = config(&ws);
    let seen = Arc::new(Mutex::new(None));
    let provider = ChartThenEcho {
        calls: AtomicUsize::new(0),
        last_tool_result: seen.clone(),
    };
    let mut agent = Agent::new(Box::new(provider), ToolRegistry::from_config(&cfg), cfg.max_tool_iterations);

    let reply = agent.run("chart my sales").await;
    let png = cfg.visualizations_dir.join("Sales.png");
    assert!(png.is_file(), "chart should exist at {}", png.display());
    assert_eq!(
        seen.lock().unwrap().as_deref(),
        Some(format!("Visualization created and saved as {}", png.display()).as_str())
    );
    assert!(reply.starts_with("Done. Visualization created"), "{reply}");

    let history = agent.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[1].content, reply);
}

#[tokio::test]
async fn provider_failure_is_reported_in_reply() {
    let ws = tempfile::tempdir().unwrap();
    let cfg = config(&ws);
    let mut agent = Agent::new(Box::new(AlwaysFails), ToolRegistry::from_config(&cfg), 5);
    let reply = agent.run("hello").await;
    assert!(reply.starts_with("I encountered an error: "), "{reply}");
    assert!(reply.contains("upstream unavailable"), "{reply}");
}

#[tokio::test]
async fn missing_model_key_is_reported_in_reply() {
    let ws = tempfile::tempdir().unwrap();
    let mut agent = Agent::from_config(&config(&ws));
    let reply = agent.run("hello").await;
    assert!(reply.contains("OPENAI_API_KEY"), "{reply}");
}
