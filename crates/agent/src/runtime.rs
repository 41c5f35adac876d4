//! The planner loop.
//!
//! Loads session history, asks the LLM what to do, executes any tool calls it
//! requests, and feeds the results back until the model produces a plain
//! answer or the iteration budget runs out. Tool failures are reported back
//! to the model as result strings so it can adjust course.

use std::sync::Arc;
use taskweaver_core::types::ChatMessage;
use taskweaver_core::{Config, Paths, Result};
use taskweaver_providers::{GeminiProvider, Provider};
use taskweaver_storage::SessionStore;
use taskweaver_tools::{ToolContext, ToolRegistry};
use tracing::{debug, info, warn};

use crate::context::ContextBuilder;
use crate::ProviderModelAdapter;

pub struct AgentRuntime {
    config: Config,
    provider: Arc<dyn Provider>,
    tool_registry: ToolRegistry,
    session_store: SessionStore,
    context_builder: ContextBuilder,
}

impl AgentRuntime {
    pub fn new(config: Config, paths: Paths) -> Result<Self> {
        config.ensure_ready()?;

        let provider: Arc<dyn Provider> = Arc::new(GeminiProvider::new(
            &config.gemini.api_key,
            &config.gemini.model,
            config.agent.max_tokens,
            config.agent.temperature,
        ));

        Ok(Self::with_provider(config, paths, provider))
    }

    /// Assemble a runtime around an already-built provider.
    pub fn with_provider(config: Config, paths: Paths, provider: Arc<dyn Provider>) -> Self {
        Self {
            context_builder: ContextBuilder::new(&config),
            provider,
            tool_registry: ToolRegistry::with_defaults(),
            session_store: SessionStore::new(paths),
            config,
        }
    }

    /// Process one user message and return the final assistant response.
    pub async fn process_message(&self, session_key: &str, content: &str) -> Result<String> {
        info!(session_key, "Processing message");

        let mut history = self.session_store.load(session_key)?;
        let mut messages = self.context_builder.build_messages(&history, content);
        history.push(ChatMessage::user(content));

        let tools = self.tool_registry.get_tool_schemas();
        let max_iterations = self.config.agent.max_tool_iterations;
        let mut final_response = String::new();

        for iteration in 0..max_iterations {
            debug!(iteration, "LLM call iteration");

            let response = self.provider.chat(&messages, &tools).await?;

            info!(
                content_len = response.content.as_ref().map(|c| c.len()).unwrap_or(0),
                tool_calls_count = response.tool_calls.len(),
                finish_reason = %response.finish_reason,
                "LLM response received"
            );

            if response.tool_calls.is_empty() {
                final_response = response.content.unwrap_or_default();
                history.push(ChatMessage::assistant(&final_response));
                break;
            }

            // Iteration budget spent: no further model call will see new tool
            // results, so stop without executing the requested calls.
            if iteration == max_iterations - 1 {
                warn!("Reached max tool iterations");
                final_response = response.content.unwrap_or_else(|| {
                    "I've reached the maximum number of tool iterations.".to_string()
                });
                history.push(ChatMessage::assistant(&final_response));
                break;
            }

            let mut assistant_msg =
                ChatMessage::assistant(response.content.as_deref().unwrap_or(""));
            assistant_msg.tool_calls = Some(response.tool_calls.clone());
            messages.push(assistant_msg.clone());
            history.push(assistant_msg);

            for tool_call in &response.tool_calls {
                let result = self
                    .execute_tool_call(&tool_call.name, tool_call.arguments.clone())
                    .await;

                let mut tool_msg = ChatMessage::tool_result(&tool_call.id, &result);
                tool_msg.name = Some(tool_call.name.clone());
                messages.push(tool_msg.clone());
                history.push(tool_msg);
            }
        }

        self.session_store.save(session_key, &history)?;

        Ok(final_response)
    }

    async fn execute_tool_call(&self, name: &str, arguments: serde_json::Value) -> String {
        info!(tool = name, "Executing tool call");

        let ctx = ToolContext::new(self.config.clone())
            .with_model(Arc::new(ProviderModelAdapter::new(self.provider.clone())));

        render_tool_result(self.tool_registry.execute(name, ctx, arguments).await)
    }
}

/// Render a tool outcome as the string the model sees. Errors become plain
/// "Error: ..." text so the model can recover instead of the turn aborting.
fn render_tool_result(result: Result<serde_json::Value>) -> String {
    match result {
        Ok(serde_json::Value::String(s)) => s,
        Ok(value) => serde_json::to_string(&value)
            .unwrap_or_else(|e| format!("Error: failed to serialize tool result: {}", e)),
        Err(e) => format!("Error: {}", e),
    }
}
