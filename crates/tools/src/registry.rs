use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use taskweaver_core::{Error, Result};
use tracing::{debug, warn};

use crate::browser::BrowserUseTool;
use crate::docs::{CreateDocsTool, DeleteDocsTool, ReadDocsTool, UpdateDocsTool};
use crate::firecrawl::{WebScrapeTool, WebSearchTool};
use crate::{Tool, ToolContext};

#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        // Web research tools
        registry.register(Arc::new(WebSearchTool));
        registry.register(Arc::new(WebScrapeTool));

        // Browser automation
        registry.register(Arc::new(BrowserUseTool));

        // HackMD document workflows
        registry.register(Arc::new(CreateDocsTool));
        registry.register(Arc::new(ReadDocsTool));
        registry.register(Arc::new(UpdateDocsTool));
        registry.register(Arc::new(DeleteDocsTool));

        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        debug!(name = schema.name, "Registering tool");
        self.tools.insert(schema.name.to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Tool schemas in the OpenAI function-calling shape the provider expects.
    pub fn get_tool_schemas(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                let schema = tool.schema();
                json!({
                    "type": "function",
                    "function": {
                        "name": schema.name,
                        "description": schema.description,
                        "parameters": schema.parameters
                    }
                })
            })
            .collect()
    }

    /// Get all registered tool names.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub async fn execute(&self, name: &str, ctx: ToolContext, params: Value) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::Tool(format!("Unknown tool: {}", name)))?;

        if let Err(e) = tool.validate(&params) {
            warn!(tool = name, error = %e, "Tool validation failed");
            return Err(e);
        }

        debug!(tool = name, "Executing tool");
        tool.execute(ctx, params).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_new_empty() {
        let reg = ToolRegistry::new();
        assert!(reg.tool_names().is_empty());
        assert!(reg.get("web_search").is_none());
    }

    #[test]
    fn test_registry_with_defaults_has_all_tools() {
        let reg = ToolRegistry::with_defaults();
        let names = reg.tool_names();
        for expected in [
            "web_search",
            "web_scrape",
            "browser_use",
            "create_docs",
            "read_docs",
            "update_docs",
            "delete_docs",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {}", expected);
        }
        assert_eq!(names.len(), 7);
    }

    #[test]
    fn test_registry_get_tool_schemas() {
        let reg = ToolRegistry::with_defaults();
        let schemas = reg.get_tool_schemas();
        assert_eq!(schemas.len(), 7);
        for schema in &schemas {
            assert_eq!(schema["type"], "function");
            assert!(schema["function"]["name"].is_string());
            assert!(schema["function"]["description"].is_string());
            assert_eq!(schema["function"]["parameters"]["type"], "object");
        }
    }

    #[tokio::test]
    async fn test_registry_execute_unknown_tool() {
        let reg = ToolRegistry::with_defaults();
        let ctx = ToolContext::new(taskweaver_core::Config::default());
        let err = reg.execute("no_such_tool", ctx, json!({})).await.unwrap_err();
        assert!(err.to_string().contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_registry_execute_rejects_invalid_params() {
        let reg = ToolRegistry::with_defaults();
        let ctx = ToolContext::new(taskweaver_core::Config::default());
        // web_search without a query fails validation before any network I/O
        let err = reg.execute("web_search", ctx, json!({})).await.unwrap_err();
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn test_register_custom() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(WebSearchTool));
        assert!(reg.get("web_search").is_some());
        assert_eq!(reg.tool_names().len(), 1);
    }
}
