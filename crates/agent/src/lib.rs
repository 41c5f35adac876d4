pub mod context;
pub mod runtime;

use std::sync::Arc;
use taskweaver_core::types::{ChatMessage, LLMResponse};
use taskweaver_core::Result;
use taskweaver_providers::Provider;

pub use context::ContextBuilder;
pub use runtime::AgentRuntime;

/// Adapter that exposes a Provider as the tools crate's ChatModel trait, so
/// the browser automation agent can call the LLM without the tools crate
/// depending on the provider stack.
pub struct ProviderModelAdapter {
    provider: Arc<dyn Provider>,
}

impl ProviderModelAdapter {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl taskweaver_tools::ChatModel for ProviderModelAdapter {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<LLMResponse> {
        self.provider.chat(messages, tools).await
    }
}
