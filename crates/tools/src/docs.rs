//! HackMD document workflows.
//!
//! HackMD has no API access on the free tier, so these tools drive the web
//! UI through browser automation. Each builder turns typed arguments into a
//! deterministic step-by-step task string; the automation agent does the
//! rest.

use async_trait::async_trait;
use serde_json::{json, Value};
use taskweaver_core::{Error, Result};

use crate::browser::BrowserUseTool;
use crate::{Tool, ToolContext, ToolSchema};

/// Task for creating a new note with the given title and markdown body.
pub fn build_create_task(title: &str, markdown: &str) -> String {
    format!(
        r#"1. Go to https://hackmd.io/new
    2. Paste the following markdown in the editor on the left side:
    {markdown}
    3. Click on the three dots(Menu icon) on the top right
    4. Click on "Note settings"
    5. In the opened modal, remove the current title and paste this new title: {title}
    6. Wait for the document to save automatically
    7. Get the current URL from the browser's address bar"#
    )
}

/// Task for reading a note's title and content.
pub fn build_read_task(url: &str) -> String {
    format!(
        r#"1. Go to {url}
    2. Wait for the document to load
    3. Get the title from the top center of the page
    4. Get the content from the editor on the left side
    5. Return both title and content in this format:
    Title: [document title]
    Content: [document content]"#
    )
}

/// Task for replacing a note's content and title.
pub fn build_update_task(url: &str, new_title: &str, new_markdown: &str) -> String {
    format!(
        r#"1. Go to {url}
    2. Wait for the document to load
    3. Delete all content in the editor on left side
    4. Paste the following new markdown:
    {new_markdown}
    5. Click on the three dots(Menu icon) on the top right
    6. Click on "Note settings"
    7. In the opened modal, remove the current title and paste this new title: {new_title}"#
    )
}

/// Task for deleting a note, confirming the dialog.
pub fn build_delete_task(url: &str) -> String {
    format!(
        r#"1. Go to {url}
2. Wait for the document to load
3. Click on the three dots(Menu icon) on the top right
4. Click on "Delete this note"
5. Confirm the deletion in the popup dialog"#
    )
}

fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Validation(format!("Missing required parameter: {}", key)))
}

fn require_hackmd_url<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    let url = require_str(params, key)?;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(Error::Validation(
            "URL must start with http:// or https://".to_string(),
        ));
    }
    Ok(url)
}

async fn run_docs_task(ctx: ToolContext, task: String) -> Result<Value> {
    BrowserUseTool.execute(ctx, json!({ "task": task })).await
}

// ============ create_docs ============

pub struct CreateDocsTool;

#[async_trait]
impl Tool for CreateDocsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "create_docs",
            description: "Create a new HackMD document with a title and markdown content. Returns the URL of the created document.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Title of the document"
                    },
                    "markdown": {
                        "type": "string",
                        "description": "Markdown content of the document"
                    }
                },
                "required": ["title", "markdown"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        require_str(params, "title")?;
        require_str(params, "markdown")?;
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let title = require_str(&params, "title")?;
        let markdown = require_str(&params, "markdown")?;
        run_docs_task(ctx, build_create_task(title, markdown)).await
    }
}

// ============ read_docs ============

pub struct ReadDocsTool;

#[async_trait]
impl Tool for ReadDocsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "read_docs",
            description: "Read an existing HackMD document. Returns its title and markdown content.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "URL of the document to read"
                    }
                },
                "required": ["url"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        require_hackmd_url(params, "url")?;
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let url = require_hackmd_url(&params, "url")?;
        run_docs_task(ctx, build_read_task(url)).await
    }
}

// ============ update_docs ============

pub struct UpdateDocsTool;

#[async_trait]
impl Tool for UpdateDocsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "update_docs",
            description: "Replace the title and markdown content of an existing HackMD document.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "URL of the document to update"
                    },
                    "new_title": {
                        "type": "string",
                        "description": "New title for the document"
                    },
                    "new_markdown": {
                        "type": "string",
                        "description": "New markdown content"
                    }
                },
                "required": ["url", "new_title", "new_markdown"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        require_hackmd_url(params, "url")?;
        require_str(params, "new_title")?;
        require_str(params, "new_markdown")?;
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let url = require_hackmd_url(&params, "url")?;
        let new_title = require_str(&params, "new_title")?;
        let new_markdown = require_str(&params, "new_markdown")?;
        run_docs_task(ctx, build_update_task(url, new_title, new_markdown)).await
    }
}

// ============ delete_docs ============

pub struct DeleteDocsTool;

#[async_trait]
impl Tool for DeleteDocsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "delete_docs",
            description: "Delete an existing HackMD document, confirming the deletion dialog.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "URL of the document to delete"
                    }
                },
                "required": ["url"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        require_hackmd_url(params, "url")?;
        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let url = require_hackmd_url(&params, "url")?;
        run_docs_task(ctx, build_delete_task(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_create_task() {
        let task = build_create_task("My Note", "# Hello");
        assert!(task.starts_with("1. Go to https://hackmd.io/new"));
        assert!(task.contains("# Hello"));
        assert!(task.contains("paste this new title: My Note"));
        assert!(task.ends_with("Get the current URL from the browser's address bar"));
    }

    #[test]
    fn test_build_read_task() {
        let task = build_read_task("https://hackmd.io/abc123");
        assert!(task.starts_with("1. Go to https://hackmd.io/abc123"));
        assert!(task.contains("Title: [document title]"));
        assert!(task.contains("Content: [document content]"));
    }

    #[test]
    fn test_build_update_task() {
        let task = build_update_task("https://hackmd.io/abc123", "New Title", "new body");
        assert!(task.contains("Delete all content in the editor"));
        assert!(task.contains("new body"));
        assert!(task.contains("paste this new title: New Title"));
    }

    #[test]
    fn test_build_delete_task() {
        let task = build_delete_task("https://hackmd.io/abc123");
        assert!(task.contains("Click on \"Delete this note\""));
        assert!(task.contains("Confirm the deletion in the popup dialog"));
    }

    #[test]
    fn test_builders_are_deterministic() {
        assert_eq!(
            build_create_task("T", "M"),
            build_create_task("T", "M")
        );
        assert_eq!(
            build_update_task("u", "t", "m"),
            build_update_task("u", "t", "m")
        );
    }

    #[test]
    fn test_validate_urls() {
        let tool = ReadDocsTool;
        assert!(tool.validate(&json!({"url": "https://hackmd.io/x"})).is_ok());
        assert!(tool.validate(&json!({"url": "hackmd.io/x"})).is_err());
        assert!(tool.validate(&json!({})).is_err());
    }

    #[test]
    fn test_update_validate_requires_all_fields() {
        let tool = UpdateDocsTool;
        assert!(tool
            .validate(&json!({"url": "https://hackmd.io/x", "new_title": "t", "new_markdown": "m"}))
            .is_ok());
        assert!(tool
            .validate(&json!({"url": "https://hackmd.io/x", "new_title": "t"}))
            .is_err());
    }
}
