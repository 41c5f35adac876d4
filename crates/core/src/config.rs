use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Gemini model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_gemini_model(),
        }
    }
}

/// Firecrawl search/scrape backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirecrawlConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_firecrawl_api_base")]
    pub api_base: String,
    #[serde(default = "default_firecrawl_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_firecrawl_api_base() -> String {
    "https://api.firecrawl.dev".to_string()
}

fn default_firecrawl_timeout_secs() -> u64 {
    60
}

impl Default for FirecrawlConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_firecrawl_api_base(),
            timeout_secs: default_firecrawl_timeout_secs(),
        }
    }
}

/// Remote browser settings. The browser is expected to already be running
/// with its debugging endpoint exposed; taskweaver only attaches to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    #[serde(default = "default_cdp_url")]
    pub cdp_url: String,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

fn default_cdp_url() -> String {
    "http://localhost:9223".to_string()
}

fn default_max_steps() -> u32 {
    25
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            cdp_url: default_cdp_url(),
            max_steps: default_max_steps(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefaults {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    /// How many messages of prior history to keep in the LLM context window.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tool_iterations() -> u32 {
    10
}

fn default_history_window() -> usize {
    10
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_tool_iterations: default_max_tool_iterations(),
            history_window: default_history_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub firecrawl: FirecrawlConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub agent: AgentDefaults,
}

impl Config {
    /// Build a config from the process environment. Missing variables fall
    /// back to defaults; validity is checked separately by `ensure_ready`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Tests use this to avoid
    /// mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(v) = lookup("GEMINI_API_KEY") {
            config.gemini.api_key = v;
        }
        if let Some(v) = lookup("GEMINI_MODEL_ID") {
            config.gemini.model = v;
        }
        if let Some(v) = lookup("FIRECRAWL_API_KEY") {
            config.firecrawl.api_key = v;
        }
        if let Some(v) = lookup("FIRECRAWL_API_BASE") {
            config.firecrawl.api_base = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("BROWSER_CDP_URL") {
            config.browser.cdp_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("TASKWEAVER_MAX_TOOL_ITERATIONS") {
            if let Ok(n) = v.parse() {
                config.agent.max_tool_iterations = n;
            }
        }

        config
    }

    /// Validate that everything the agent needs at startup is present.
    pub fn ensure_ready(&self) -> Result<()> {
        if self.gemini.api_key.is_empty() {
            return Err(Error::Config(
                "GEMINI_API_KEY is not set. The agent cannot call the language model without it."
                    .to_string(),
            ));
        }
        if self.firecrawl.api_key.is_empty() {
            return Err(Error::Config(
                "FIRECRAWL_API_KEY is not set. web_search and web_scrape will not work without it."
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.firecrawl.api_base, "https://api.firecrawl.dev");
        assert_eq!(config.browser.cdp_url, "http://localhost:9223");
        assert_eq!(config.agent.max_tool_iterations, 10);
    }

    #[test]
    fn test_from_lookup() {
        let config = Config::from_lookup(|key| match key {
            "GEMINI_API_KEY" => Some("test-key".to_string()),
            "GEMINI_MODEL_ID" => Some("gemini-2.5-flash".to_string()),
            "FIRECRAWL_API_KEY" => Some("fc-test".to_string()),
            "BROWSER_CDP_URL" => Some("http://localhost:9333/".to_string()),
            _ => None,
        });

        assert_eq!(config.gemini.api_key, "test-key");
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert_eq!(config.firecrawl.api_key, "fc-test");
        // Trailing slash is stripped
        assert_eq!(config.browser.cdp_url, "http://localhost:9333");
    }

    #[test]
    fn test_ensure_ready_missing_keys() {
        let config = Config::default();
        assert!(config.ensure_ready().is_err());

        let config = Config::from_lookup(|key| match key {
            "GEMINI_API_KEY" => Some("k".to_string()),
            "FIRECRAWL_API_KEY" => Some("k".to_string()),
            _ => None,
        });
        assert!(config.ensure_ready().is_ok());
    }

    #[test]
    fn test_bad_numeric_env_keeps_default() {
        let config = Config::from_lookup(|key| match key {
            "TASKWEAVER_MAX_TOOL_ITERATIONS" => Some("not-a-number".to_string()),
            _ => None,
        });
        assert_eq!(config.agent.max_tool_iterations, 10);
    }
}
