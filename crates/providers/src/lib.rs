pub mod gemini;

use async_trait::async_trait;
use serde_json::Value;
use taskweaver_core::types::{ChatMessage, LLMResponse};
use taskweaver_core::Result;

#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], tools: &[Value]) -> Result<LLMResponse>;
}

pub use gemini::GeminiProvider;
