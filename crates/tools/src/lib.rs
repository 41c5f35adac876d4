pub mod browser;
pub mod docs;
pub mod firecrawl;
pub mod registry;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use taskweaver_core::types::{ChatMessage, LLMResponse};
use taskweaver_core::{Config, Result};

pub use registry::ToolRegistry;

/// Truncate a string to at most `max_chars` bytes, respecting UTF-8 char
/// boundaries.
pub fn safe_truncate(s: &str, max_chars: usize) -> &str {
    if s.len() <= max_chars {
        return s;
    }
    let mut end = max_chars;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Trait abstracting the chat model for tools that drive an LLM themselves
/// (the browser automation agent), breaking the circular dependency between
/// the tools crate and the providers crate.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], tools: &[Value]) -> Result<LLMResponse>;
}

/// Opaque handle to the chat model, passed through ToolContext.
pub type ModelHandle = Arc<dyn ChatModel>;

#[derive(Clone)]
pub struct ToolContext {
    pub config: Config,
    /// Model used by the browser automation agent. Tools that never call an
    /// LLM ignore it.
    pub model: Option<ModelHandle>,
}

impl ToolContext {
    pub fn new(config: Config) -> Self {
        Self { config, model: None }
    }

    pub fn with_model(mut self, model: ModelHandle) -> Self {
        self.model = Some(model);
        self
    }
}

pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;
    fn validate(&self, params: &Value) -> Result<()>;
    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_truncate() {
        assert_eq!(safe_truncate("hello", 10), "hello");
        assert_eq!(safe_truncate("hello", 3), "hel");
        // Multi-byte chars are not split
        let s = "héllo";
        let t = safe_truncate(s, 2);
        assert!(t.len() <= 2);
        assert!(s.starts_with(t));
    }
}
