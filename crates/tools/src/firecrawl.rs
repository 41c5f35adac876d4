use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use taskweaver_core::config::FirecrawlConfig;
use taskweaver_core::{Error, Result};

use crate::{Tool, ToolContext, ToolSchema};

const DEFAULT_SEARCH_LIMIT: u64 = 5;
const MAX_SEARCH_LIMIT: u64 = 10;

/// Thin client for the Firecrawl v1 REST API.
pub struct FirecrawlClient {
    client: Client,
    api_base: String,
    api_key: String,
}

impl FirecrawlClient {
    pub fn new(config: &FirecrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Tool(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Search the web, scraping each hit as markdown. Returns at most `limit`
    /// results even if the API over-delivers.
    pub async fn search(&self, query: &str, limit: u64) -> Result<Vec<Value>> {
        let url = format!("{}/v1/search", self.api_base);
        let body = json!({
            "query": query,
            "limit": limit,
            "scrapeOptions": { "formats": ["markdown"] }
        });

        tracing::debug!(query, limit, "firecrawl search");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Tool(format!("Search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Tool(format!("Search API error {}: {}", status, text)));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| Error::Tool(format!("Failed to parse search response: {}", e)))?;

        Ok(parse_search_results(&data, limit as usize))
    }

    /// Scrape a single page as markdown. The URL is passed through unaltered.
    pub async fn scrape(&self, page_url: &str) -> Result<Value> {
        let url = format!("{}/v1/scrape", self.api_base);
        let body = json!({
            "url": page_url,
            "formats": ["markdown"]
        });

        tracing::debug!(url = page_url, "firecrawl scrape");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Tool(format!("Scrape request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Tool(format!("Scrape API error {}: {}", status, text)));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| Error::Tool(format!("Failed to parse scrape response: {}", e)))?;

        parse_scrape_result(&data, page_url)
    }
}

fn parse_search_results(data: &Value, limit: usize) -> Vec<Value> {
    data["data"]
        .as_array()
        .unwrap_or(&vec![])
        .iter()
        .take(limit)
        .map(|r| {
            json!({
                "title": r.get("title").and_then(|v| v.as_str()).unwrap_or(""),
                "url": r.get("url").and_then(|v| v.as_str()).unwrap_or(""),
                "description": r.get("description").and_then(|v| v.as_str()).unwrap_or(""),
                "markdown": r.get("markdown").and_then(|v| v.as_str()).unwrap_or("")
            })
        })
        .collect()
}

fn parse_scrape_result(data: &Value, page_url: &str) -> Result<Value> {
    let markdown = data["data"]
        .get("markdown")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Tool("Scrape response missing markdown content".to_string()))?;

    Ok(json!({
        "url": page_url,
        "markdown": markdown
    }))
}

fn clamp_limit(requested: Option<u64>) -> u64 {
    requested
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT)
}

// ============ web_search ============

pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "web_search",
            description: "Search the web via Firecrawl. Each result includes the page title, URL, a short description, and the scraped page content as markdown. Use this before browser automation when you only need to read information.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Number of results (1-10, default 5)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        match params.get("query").and_then(|v| v.as_str()) {
            Some(q) if !q.trim().is_empty() => Ok(()),
            Some(_) => Err(Error::Validation("Parameter 'query' must not be empty".to_string())),
            None => Err(Error::Validation("Missing required parameter: query".to_string())),
        }
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let query = params["query"].as_str().unwrap_or_default();
        let limit = clamp_limit(params.get("limit").and_then(|v| v.as_u64()));

        let client = FirecrawlClient::new(&ctx.config.firecrawl)?;
        let results = client.search(query, limit).await?;

        tracing::info!(query, count = results.len(), "web search complete");

        Ok(json!({ "query": query, "results": results }))
    }
}

// ============ web_scrape ============

pub struct WebScrapeTool;

#[async_trait]
impl Tool for WebScrapeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "web_scrape",
            description: "Scrape a single web page via Firecrawl and return its content as markdown. Use when you already know the exact URL.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "URL to scrape (must be http or https)"
                    }
                },
                "required": ["url"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        let url = params
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Validation("Missing required parameter: url".to_string()))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::Validation(
                "URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(())
    }

    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value> {
        let url = params["url"].as_str().unwrap_or_default();

        let client = FirecrawlClient::new(&ctx.config.firecrawl)?;
        let result = client.scrape(url).await?;

        tracing::info!(url, "web scrape complete");

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 5);
        assert_eq!(clamp_limit(Some(3)), 3);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(50)), 10);
    }

    #[test]
    fn test_parse_search_results() {
        let data = json!({
            "success": true,
            "data": [
                {
                    "title": "Rust",
                    "url": "https://www.rust-lang.org/",
                    "description": "A language empowering everyone",
                    "markdown": "# Rust\n\nFast, reliable, productive."
                },
                {
                    "title": "Crates.io",
                    "url": "https://crates.io/"
                }
            ]
        });

        let results = parse_search_results(&data, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["title"], "Rust");
        assert_eq!(results[0]["markdown"], "# Rust\n\nFast, reliable, productive.");
        // Missing fields come back as empty strings, not nulls
        assert_eq!(results[1]["description"], "");
        assert_eq!(results[1]["markdown"], "");
    }

    #[test]
    fn test_parse_search_results_respects_limit() {
        let data = json!({
            "data": [
                {"title": "a", "url": "https://a.example"},
                {"title": "b", "url": "https://b.example"},
                {"title": "c", "url": "https://c.example"}
            ]
        });
        let results = parse_search_results(&data, 2);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_parse_search_results_empty() {
        assert!(parse_search_results(&json!({}), 5).is_empty());
        assert!(parse_search_results(&json!({"data": []}), 5).is_empty());
    }

    #[test]
    fn test_parse_scrape_result() {
        let data = json!({
            "success": true,
            "data": { "markdown": "# Page", "metadata": { "title": "Page" } }
        });
        let result = parse_scrape_result(&data, "https://example.com/a?b=c").unwrap();
        assert_eq!(result["url"], "https://example.com/a?b=c");
        assert_eq!(result["markdown"], "# Page");
    }

    #[test]
    fn test_parse_scrape_result_missing_markdown() {
        let data = json!({"success": true, "data": {}});
        assert!(parse_scrape_result(&data, "https://example.com").is_err());
    }

    #[test]
    fn test_web_search_validate() {
        let tool = WebSearchTool;
        assert!(tool.validate(&json!({"query": "rust lang"})).is_ok());
        assert!(tool.validate(&json!({"query": "  "})).is_err());
        assert!(tool.validate(&json!({})).is_err());
    }

    #[test]
    fn test_web_scrape_validate() {
        let tool = WebScrapeTool;
        assert!(tool.validate(&json!({"url": "https://example.com"})).is_ok());
        assert!(tool.validate(&json!({"url": "ftp://example.com"})).is_err());
        assert!(tool.validate(&json!({})).is_err());
    }
}
