use async_trait::async_trait;
use serde_json::{json, Value};
use taskweaver_core::{Error, Result};
use tracing::warn;

use super::agent::AutomationAgent;
use super::session;
use crate::{Tool, ToolContext, ToolSchema};

/// Runs a natural-language task in the shared browser session. A fresh
/// automation agent is spun up per call; failures come back to the planner as
/// a result string rather than an error, so it can rephrase or retry.
pub struct BrowserUseTool;

#[async_trait]
impl Tool for BrowserUseTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "browser_use",
            description: "Perform a task in a real browser: navigate, click, fill forms, and extract content. Describe the task in natural language, including the starting URL and what to do. Use for interactive workflows (logins, creating or editing documents); use web_search/web_scrape for read-only lookups.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "task": {
                        "type": "string",
                        "description": "Natural-language description of the browser task"
                    }
                },
                "required": ["task"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        match params.get("task").and_then(|v| v.as_str()) {
            Some(t) if !t.trim().is_empty() => Ok(()),
            Some(_) => Err(Error::Validation("Parameter 'task' must not be empty".to_string())),
            None => Err(Error::Validation("Missing required parameter: task".to_string())),
        }
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let task = params["task"].as_str().unwrap_or_default();

        let model = ctx
            .model
            .clone()
            .ok_or_else(|| Error::Tool("browser_use requires a chat model".to_string()))?;

        let outcome = run_task(&ctx, model, task).await;

        match outcome {
            Ok(result) => Ok(json!({ "result": result })),
            Err(e) => {
                warn!(error = %e, "browser automation failed");
                // The page state after any failed run is unknown, whether the
                // transport broke or the agent gave up mid-task; drop the
                // session so the next call starts from a fresh attachment.
                session::reset_shared_session().await;
                Ok(failure_result(&e))
            }
        }
    }
}

/// Failures surface to the planner as a result string, never as a hard
/// error, so it can rephrase the task or fall back to another tool.
fn failure_result(e: &Error) -> Value {
    json!({ "result": format!("Error during browser automation: {}", e) })
}

async fn run_task(ctx: &ToolContext, model: crate::ModelHandle, task: &str) -> Result<String> {
    let slot = session::shared_session(&ctx.config.browser.cdp_url).await?;
    let guard = slot.lock().await;
    let browser = guard
        .as_ref()
        .ok_or_else(|| Error::Browser("browser session unavailable".to_string()))?;

    let agent = AutomationAgent::new(model, ctx.config.browser.max_steps);
    agent.run(browser, task).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema() {
        let tool = BrowserUseTool;
        let schema = tool.schema();
        assert_eq!(schema.name, "browser_use");
        assert_eq!(schema.parameters["required"], json!(["task"]));
    }

    #[test]
    fn test_failure_result_prefix() {
        let value = failure_result(&Error::Browser("task did not complete within 25 steps".to_string()));
        let result = value["result"].as_str().unwrap();
        assert!(result.starts_with("Error during browser automation: "));
        assert!(result.contains("25 steps"));
    }

    #[test]
    fn test_validate() {
        let tool = BrowserUseTool;
        assert!(tool.validate(&json!({"task": "open hackmd.io"})).is_ok());
        assert!(tool.validate(&json!({"task": ""})).is_err());
        assert!(tool.validate(&json!({})).is_err());
    }
}
