//! Agent runtime: conversation history and turn execution.
//!
//! A turn sends the system prompt, the history and the new user message to
//! the model together with the tool function definitions, runs every tool
//! call the model asks for, feeds the results back and repeats until the
//! model answers in plain text or the iteration limit is hit.

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{build_provider, ChatMessage, FunctionCallItem, ModelProvider};
use crate::tools::ToolRegistry;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that can answer questions, search \
the web, check the weather, manage notes, and create visualizations. Use the provided tools \
when they help. When a tool reports where it saved a file, repeat that path in your answer.";

/// A running agent instance.
pub struct Agent {
    provider: Box<dyn ModelProvider>,
    tools: ToolRegistry,
    /// Completed user/assistant exchanges.  Append-only.
    history: Vec<ChatMessage>,
    max_tool_iterations: usize,
    events: Option<broadcast::Sender<String>>,
}

impl Agent {
    pub fn new(provider: Box<dyn ModelProvider>, tools: ToolRegistry, max_tool_iterations: usize) -> Self {
        Self {
            provider,
            tools,
            history: Vec::new(),
            max_tool_iterations: max_tool_iterations.max(1),
            events: None,
        }
    }

    /// Build the provider and the standard tool set from configuration.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            build_provider(&cfg.model),
            ToolRegistry::from_config(cfg),
            cfg.max_tool_iterations,
        )
    }

    /// Publish tool activity to `tx`.
    pub fn with_events(mut self, tx: broadcast::Sender<String>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Process one user message.  Never fails: errors come back as
    /// `"I encountered an error: …"`.
    pub async fn run(&mut self, input: &str) -> String {
        self.publish(serde_json::json!({ "type": "typing_start" }));
        let reply = match self.run_turn(input).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = format!("{e:#}"), "agent turn failed");
                format!("I encountered an error: {e:#}")
            }
        };
        self.publish(serde_json::json!({ "type": "typing_end" }));
        reply
    }

    async fn run_turn(&mut self, input: &str) -> anyhow::Result<String> {
        info!(input_len = input.len(), history = self.history.len(), "agent turn");

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::new("system", SYSTEM_PROMPT));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::new("user", input));

        let function_defs = self.tools.function_defs();

        for iter in 0..self.max_tool_iterations {
            let (response, usage) = self
                .provider
                .send_chat_with_functions(&messages, &function_defs)
                .await
                .context("model call failed")?;
            if let Some(u) = usage {
                debug!(prompt = u.prompt_tokens, completion = u.completion_tokens, "token usage");
            }

            let calls = match response.into_calls() {
                Ok(calls) => calls,
                Err(reply) => {
                    self.history.push(ChatMessage::new("user", input));
                    self.history.push(ChatMessage::new("assistant", reply.clone()));
                    return Ok(reply);
                }
            };

            debug!(iteration = iter, calls = calls.len(), "model requested tools");
            messages.push(ChatMessage::assistant_calls(&calls));
            for call in &calls {
                let output = self.invoke(call).await;
                messages.push(ChatMessage::tool_result(call.id.clone(), output));
            }
        }

        anyhow::bail!(
            "agent stopped after {} tool iterations without a final answer",
            self.max_tool_iterations
        )
    }

    async fn invoke(&self, call: &FunctionCallItem) -> String {
        let input = tool_input(&call.arguments);
        self.publish(serde_json::json!({
            "type": "tool_start",
            "tool": call.name,
            "input": input,
        }));
        let output = self.tools.call_tool(&call.name, &input).await;
        self.publish(serde_json::json!({
            "type": "tool_end",
            "tool": call.name,
            "output": output,
        }));
        output
    }

    fn publish(&self, event: serde_json::Value) {
        if let Some(tx) = &self.events {
            // No subscribers is fine.
            let _ = tx.send(event.to_string());
        }
    }
}

/// The `input` argument of a tool call.  Arguments that are not a JSON
/// object with a string `input` are passed through verbatim.
pub fn tool_input(arguments: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(arguments) {
        Ok(serde_json::Value::Object(map)) => match map.get("input") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        },
        Ok(serde_json::Value::String(s)) => s,
        _ => arguments.to_string(),
    }
}
