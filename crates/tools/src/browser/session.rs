//! Browser session management.
//!
//! Attaches to an already-running Chrome instance over its remote debugging
//! endpoint. One shared session lives for the whole process; automation runs
//! reuse it so page state (logins, cookies) carries between tool calls. The
//! browser is never launched or closed from here.

use super::cdp::CdpClient;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::sync::Arc;
use taskweaver_core::{Error, Result};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Process-wide shared session. Populated on first use.
static SHARED_SESSION: Lazy<Arc<Mutex<Option<BrowserSession>>>> =
    Lazy::new(|| Arc::new(Mutex::new(None)));

/// A browser session attached to an external Chrome instance.
pub struct BrowserSession {
    /// The debugging endpoint this session is attached to.
    pub cdp_url: String,
    /// CDP WebSocket client, connected to a page target.
    pub cdp: CdpClient,
}

impl BrowserSession {
    /// Attach to the page target of the Chrome instance at `cdp_url`
    /// (e.g. "http://localhost:9223").
    pub async fn attach(cdp_url: &str) -> Result<Self> {
        let page_ws_url = get_page_ws_url(cdp_url).await?;
        let cdp = CdpClient::connect(&page_ws_url).await?;

        cdp.enable_domain("Page").await?;
        cdp.enable_domain("Runtime").await?;
        cdp.enable_domain("DOM").await?;

        info!(cdp_url, ws_url = %page_ws_url, "attached to browser page target");

        Ok(Self {
            cdp_url: cdp_url.to_string(),
            cdp,
        })
    }
}

/// Handle to the shared session slot. Attaches on first use; if the endpoint
/// changed since the last attach, reattaches to the new one.
pub async fn shared_session(cdp_url: &str) -> Result<Arc<Mutex<Option<BrowserSession>>>> {
    let slot = SHARED_SESSION.clone();
    {
        let mut guard = slot.lock().await;
        let needs_attach = match guard.as_ref() {
            Some(session) => session.cdp_url != cdp_url,
            None => true,
        };
        if needs_attach {
            *guard = Some(BrowserSession::attach(cdp_url).await?);
        }
    }
    Ok(slot)
}

/// Drop the shared session so the next run reattaches. Used after a CDP
/// transport failure.
pub async fn reset_shared_session() {
    let mut guard = SHARED_SESSION.lock().await;
    if guard.take().is_some() {
        debug!("shared browser session reset");
    }
}

/// Discover the WebSocket URL of a page target via /json/list.
/// Retries a few times since targets may not appear immediately.
async fn get_page_ws_url(cdp_url: &str) -> Result<String> {
    let url = format!("{}/json/list", cdp_url);

    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        }

        let resp = match reqwest::get(&url).await {
            Ok(r) => r,
            Err(_) => continue,
        };
        let targets: Vec<Value> = match resp.json().await {
            Ok(t) => t,
            Err(_) => continue,
        };

        if let Some(ws_url) = pick_page_target(&targets) {
            return Ok(ws_url);
        }
    }

    Err(Error::Browser(format!(
        "No page target found at {}. Is Chrome running with remote debugging enabled?",
        cdp_url
    )))
}

/// Pick the first "page" type target with a WebSocket debugger URL.
fn pick_page_target(targets: &[Value]) -> Option<String> {
    targets
        .iter()
        .find(|t| t.get("type").and_then(|v| v.as_str()) == Some("page"))
        .and_then(|t| t.get("webSocketDebuggerUrl").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pick_page_target() {
        let targets = vec![
            json!({"type": "background_page", "webSocketDebuggerUrl": "ws://x/1"}),
            json!({"type": "page", "webSocketDebuggerUrl": "ws://localhost:9223/devtools/page/ABC"}),
            json!({"type": "page", "webSocketDebuggerUrl": "ws://localhost:9223/devtools/page/DEF"}),
        ];
        assert_eq!(
            pick_page_target(&targets).as_deref(),
            Some("ws://localhost:9223/devtools/page/ABC")
        );
    }

    #[test]
    fn test_pick_page_target_none() {
        assert!(pick_page_target(&[]).is_none());
        let targets = vec![json!({"type": "page"})];
        assert!(pick_page_target(&targets).is_none());
    }
}
