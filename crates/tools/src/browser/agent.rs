//! LLM-driven browser automation.
//!
//! A fresh [`AutomationAgent`] is created per task. It observes the page,
//! asks the model for the next action as a JSON object, applies it over CDP,
//! and repeats until the model reports done/fail or the step limit is hit.

use serde_json::Value;
use taskweaver_core::types::ChatMessage;
use taskweaver_core::{Error, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::session::BrowserSession;
use crate::{safe_truncate, ModelHandle};

const OBSERVATION_TEXT_LIMIT: usize = 4000;
const MAX_WAIT_MS: u64 = 10_000;
const MAX_PARSE_FAILURES: u32 = 3;

const SYSTEM_PROMPT: &str = r#"You are a browser automation operator. You control a real browser one step at a time.

Each turn you receive the current page state: URL, title, visible text, and a numbered list of interactive elements with CSS selectors. Respond with EXACTLY ONE JSON object (no prose, no code fences) choosing your next action:

{"action": "navigate", "url": "https://..."}
{"action": "click", "selector": "<css selector>"}
{"action": "click", "text": "<visible text of a link or button>"}
{"action": "fill", "selector": "<css selector>", "text": "<value to type>"}
{"action": "press", "key": "Enter"}
{"action": "scroll", "direction": "down", "amount": 600}
{"action": "wait", "ms": 1000}
{"action": "extract", "selector": "<css selector, optional>"}
{"action": "done", "result": "<what you accomplished, including any extracted data>"}
{"action": "fail", "reason": "<why the task cannot be completed>"}

Rules:
- Prefer selectors from the element list. Use click-by-text only when no selector fits.
- After fill, submit forms with press Enter or by clicking the submit button.
- Use wait after navigation or clicks that trigger page loads.
- When the task is complete, reply with done and put everything the caller needs in result.
- If you are stuck after several attempts, reply with fail."#;

/// One action decided by the model.
#[derive(Debug, PartialEq)]
pub enum Action {
    Navigate { url: String },
    Click { selector: Option<String>, text: Option<String> },
    Fill { selector: String, text: String },
    Press { key: String },
    Scroll { direction: String, amount: u64 },
    Wait { ms: u64 },
    Extract { selector: Option<String> },
    Done { result: String },
    Fail { reason: String },
}

pub struct AutomationAgent {
    model: ModelHandle,
    max_steps: u32,
    run_id: String,
}

impl AutomationAgent {
    pub fn new(model: ModelHandle, max_steps: u32) -> Self {
        Self {
            model,
            max_steps,
            run_id: Uuid::new_v4().to_string(),
        }
    }

    /// Drive the browser until the model reports done or the step budget
    /// runs out.
    pub async fn run(&self, session: &BrowserSession, task: &str) -> Result<String> {
        info!(run_id = %self.run_id, task, "browser automation started");

        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(&format!("Task: {}", task)),
        ];
        let mut last_outcome: Option<String> = None;
        let mut parse_failures = 0u32;

        for step in 1..=self.max_steps {
            let observation = self.observe(session).await?;
            let mut prompt = render_observation(&observation);
            if let Some(outcome) = last_outcome.take() {
                prompt = format!("Previous action result: {}\n\n{}", outcome, prompt);
            }
            messages.push(ChatMessage::user(&prompt));

            let response = self.model.chat(&messages, &[]).await?;
            let content = response.content.unwrap_or_default();
            messages.push(ChatMessage::assistant(&content));

            match next_step(&content) {
                StepDecision::Finished(result) => {
                    info!(run_id = %self.run_id, step, "browser automation complete");
                    return Ok(result);
                }
                StepDecision::GaveUp(reason) => {
                    return Err(Error::Browser(format!("automation gave up: {}", reason)));
                }
                StepDecision::Malformed(reason) => {
                    // A stray prose reply must not discard completed steps;
                    // feed the error back so the model can correct itself.
                    parse_failures += 1;
                    warn!(run_id = %self.run_id, step, parse_failures, reason = %reason, "unparseable action reply");
                    if parse_failures >= MAX_PARSE_FAILURES {
                        return Err(Error::Browser(format!(
                            "no parseable action after {} replies: {}",
                            parse_failures, reason
                        )));
                    }
                    last_outcome = Some(format!(
                        "error: {}. Reply with exactly one JSON action object.",
                        reason
                    ));
                }
                StepDecision::Act(action) => {
                    parse_failures = 0;
                    debug!(run_id = %self.run_id, step, action = ?action, "applying action");
                    let outcome = match self.apply(session, &action).await {
                        Ok(o) => o,
                        Err(e) => {
                            warn!(run_id = %self.run_id, step, error = %e, "action failed");
                            format!("error: {}", e)
                        }
                    };
                    last_outcome = Some(outcome);
                }
            }
        }

        Err(Error::Browser(format!(
            "task did not complete within {} steps",
            self.max_steps
        )))
    }

    /// Collect page state: URL, title, body text, interactive elements.
    async fn observe(&self, session: &BrowserSession) -> Result<Value> {
        let js = r#"(() => {
  const els = [];
  const nodes = document.querySelectorAll('a[href], button, input, textarea, select, [role="button"]');
  let i = 0;
  for (const el of nodes) {
    if (els.length >= 60) break;
    const rect = el.getBoundingClientRect();
    if (rect.width === 0 && rect.height === 0) continue;
    const tag = el.tagName.toLowerCase();
    const label = (el.innerText || el.value || el.getAttribute('placeholder') || el.getAttribute('aria-label') || '').trim().slice(0, 80);
    let selector = tag;
    if (el.id) selector = tag + '#' + el.id;
    else if (el.name) selector = tag + '[name="' + el.name + '"]';
    els.push({ index: i++, tag, label, selector });
  }
  return {
    url: location.href,
    title: document.title,
    text: (document.body ? document.body.innerText : '').slice(0, 6000),
    elements: els
  };
})()"#;

        let eval = session.cdp.evaluate_js(js).await?;
        eval.get("result")
            .and_then(|v| v.get("value"))
            .cloned()
            .ok_or_else(|| Error::Browser("page observation returned no value".to_string()))
    }

    /// Apply one action and describe what happened.
    async fn apply(&self, session: &BrowserSession, action: &Action) -> Result<String> {
        match action {
            Action::Navigate { url } => {
                session.cdp.navigate(url).await?;
                // Give the load a moment before the next observation
                tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
                Ok(format!("navigated to {}", url))
            }
            Action::Click { selector, text } => {
                let js = match (selector, text) {
                    (Some(sel), _) => click_by_selector_js(sel),
                    (None, Some(t)) => click_by_text_js(t),
                    (None, None) => {
                        return Err(Error::Browser(
                            "click requires a selector or text".to_string(),
                        ))
                    }
                };
                self.eval_outcome(session, &js).await
            }
            Action::Fill { selector, text } => {
                let js = fill_js(selector, text);
                self.eval_outcome(session, &js).await
            }
            Action::Press { key } => {
                session.cdp.dispatch_key_event("keyDown", key, key).await?;
                session.cdp.dispatch_key_event("keyUp", key, key).await?;
                Ok(format!("pressed {}", key))
            }
            Action::Scroll { direction, amount } => {
                let delta = if direction == "up" {
                    -(*amount as i64)
                } else {
                    *amount as i64
                };
                let js = format!("window.scrollBy(0, {}); 'scrolled'", delta);
                session.cdp.evaluate_js(&js).await?;
                Ok(format!("scrolled {} by {}", direction, amount))
            }
            Action::Wait { ms } => {
                let ms = (*ms).min(MAX_WAIT_MS);
                tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
                Ok(format!("waited {}ms", ms))
            }
            Action::Extract { selector } => {
                let js = extract_js(selector.as_deref());
                let eval = session.cdp.evaluate_js(&js).await?;
                let text = eval
                    .get("result")
                    .and_then(|v| v.get("value"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                Ok(format!("extracted: {}", safe_truncate(text, OBSERVATION_TEXT_LIMIT)))
            }
            Action::Done { .. } | Action::Fail { .. } => {
                // Handled in the run loop
                Ok(String::new())
            }
        }
    }

    /// Evaluate JS that returns {ok, error?} and turn it into an outcome string.
    async fn eval_outcome(&self, session: &BrowserSession, js: &str) -> Result<String> {
        let eval = session.cdp.evaluate_js(js).await?;
        let value = eval
            .get("result")
            .and_then(|v| v.get("value"))
            .cloned()
            .unwrap_or(Value::Null);

        if value.get("ok").and_then(|v| v.as_bool()) == Some(true) {
            Ok("ok".to_string())
        } else {
            let reason = value
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("element not found");
            Ok(format!("failed: {}", reason))
        }
    }
}

/// Render an observation into the prompt shown to the model.
fn render_observation(observation: &Value) -> String {
    let url = observation.get("url").and_then(|v| v.as_str()).unwrap_or("");
    let title = observation.get("title").and_then(|v| v.as_str()).unwrap_or("");
    let text = observation.get("text").and_then(|v| v.as_str()).unwrap_or("");

    let mut out = format!("URL: {}\nTitle: {}\n\nInteractive elements:\n", url, title);
    if let Some(elements) = observation.get("elements").and_then(|v| v.as_array()) {
        for el in elements {
            let index = el.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            let tag = el.get("tag").and_then(|v| v.as_str()).unwrap_or("");
            let label = el.get("label").and_then(|v| v.as_str()).unwrap_or("");
            let selector = el.get("selector").and_then(|v| v.as_str()).unwrap_or("");
            out.push_str(&format!("[{}] <{}> \"{}\" selector={}\n", index, tag, label, selector));
        }
    }
    out.push_str("\nPage text:\n");
    out.push_str(safe_truncate(text, OBSERVATION_TEXT_LIMIT));
    out
}

/// Parse the model's reply into an [`Action`]. Tolerates code fences and
/// surrounding prose by extracting the first balanced JSON object.
pub fn parse_action(content: &str) -> Result<Action> {
    let raw = extract_json_object(content)
        .ok_or_else(|| Error::Browser(format!("no JSON action in model reply: {}", safe_truncate(content, 200))))?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| Error::Browser(format!("invalid JSON action: {}", e)))?;

    let action = value
        .get("action")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Browser("action field missing".to_string()))?;

    let str_field = |key: &str| -> Option<String> {
        value.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
    };

    match action {
        "navigate" => str_field("url")
            .map(|url| Action::Navigate { url })
            .ok_or_else(|| Error::Browser("navigate requires url".to_string())),
        "click" => {
            let selector = str_field("selector");
            let text = str_field("text");
            if selector.is_none() && text.is_none() {
                return Err(Error::Browser("click requires selector or text".to_string()));
            }
            Ok(Action::Click { selector, text })
        }
        "fill" => {
            let selector = str_field("selector")
                .ok_or_else(|| Error::Browser("fill requires selector".to_string()))?;
            let text = str_field("text")
                .ok_or_else(|| Error::Browser("fill requires text".to_string()))?;
            Ok(Action::Fill { selector, text })
        }
        "press" => str_field("key")
            .map(|key| Action::Press { key })
            .ok_or_else(|| Error::Browser("press requires key".to_string())),
        "scroll" => Ok(Action::Scroll {
            direction: str_field("direction").unwrap_or_else(|| "down".to_string()),
            amount: value.get("amount").and_then(|v| v.as_u64()).unwrap_or(600),
        }),
        "wait" => Ok(Action::Wait {
            ms: value.get("ms").and_then(|v| v.as_u64()).unwrap_or(1000),
        }),
        "extract" => Ok(Action::Extract { selector: str_field("selector") }),
        "done" => Ok(Action::Done {
            result: str_field("result").unwrap_or_default(),
        }),
        "fail" => Ok(Action::Fail {
            reason: str_field("reason").unwrap_or_else(|| "unspecified".to_string()),
        }),
        other => Err(Error::Browser(format!("unknown action '{}'", other))),
    }
}

/// What the run loop should do with one model reply. Unparseable replies are
/// retryable, not fatal: the reply goes back to the model as an error outcome.
#[derive(Debug)]
enum StepDecision {
    Act(Action),
    Finished(String),
    GaveUp(String),
    Malformed(String),
}

fn next_step(content: &str) -> StepDecision {
    match parse_action(content) {
        Ok(Action::Done { result }) => StepDecision::Finished(result),
        Ok(Action::Fail { reason }) => StepDecision::GaveUp(reason),
        Ok(action) => StepDecision::Act(action),
        Err(e) => StepDecision::Malformed(e.to_string()),
    }
}

/// Extract the first balanced top-level JSON object from free-form text.
fn extract_json_object(content: &str) -> Option<String> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in content[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(content[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn click_by_selector_js(selector: &str) -> String {
    let sel = js_string(selector);
    format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return {{ ok: false, error: 'no element matches selector' }};
  el.scrollIntoView({{ block: 'center' }});
  el.click();
  return {{ ok: true }};
}})()"#
    )
}

fn click_by_text_js(text: &str) -> String {
    let needle = js_string(text);
    format!(
        r#"(() => {{
  const needle = {needle}.trim().toLowerCase();
  const nodes = document.querySelectorAll('a, button, [role="button"], input[type="submit"]');
  for (const el of nodes) {{
    const label = (el.innerText || el.value || '').trim().toLowerCase();
    if (label === needle || label.includes(needle)) {{
      el.scrollIntoView({{ block: 'center' }});
      el.click();
      return {{ ok: true }};
    }}
  }}
  return {{ ok: false, error: 'no element with that text' }};
}})()"#
    )
}

fn fill_js(selector: &str, text: &str) -> String {
    let sel = js_string(selector);
    let val = js_string(text);
    // Use the native value setter so framework-bound inputs notice the change
    format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return {{ ok: false, error: 'no element matches selector' }};
  el.focus();
  const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
  const desc = Object.getOwnPropertyDescriptor(proto, 'value');
  if (desc && desc.set) {{
    desc.set.call(el, {val});
  }} else {{
    el.value = {val};
  }}
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return {{ ok: true }};
}})()"#
    )
}

fn extract_js(selector: Option<&str>) -> String {
    match selector {
        Some(sel) => {
            let sel = js_string(sel);
            format!(
                r#"(() => {{
  const el = document.querySelector({sel});
  return el ? el.innerText : '';
}})()"#
            )
        }
        None => "(() => document.body ? document.body.innerText : '')()".to_string(),
    }
}

/// Encode a Rust string as a JS string literal. JSON string syntax is valid JS.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_action_navigate() {
        let action = parse_action(r#"{"action": "navigate", "url": "https://hackmd.io"}"#).unwrap();
        assert_eq!(action, Action::Navigate { url: "https://hackmd.io".to_string() });
    }

    #[test]
    fn test_parse_action_strips_fences_and_prose() {
        let content = "Sure, next step:\n```json\n{\"action\": \"click\", \"selector\": \"button#new-note\"}\n```";
        let action = parse_action(content).unwrap();
        assert_eq!(
            action,
            Action::Click {
                selector: Some("button#new-note".to_string()),
                text: None
            }
        );
    }

    #[test]
    fn test_parse_action_fill_requires_both_fields() {
        assert!(parse_action(r#"{"action": "fill", "selector": "input"}"#).is_err());
        let action = parse_action(r#"{"action": "fill", "selector": "input", "text": "hi"}"#).unwrap();
        assert_eq!(
            action,
            Action::Fill { selector: "input".to_string(), text: "hi".to_string() }
        );
    }

    #[test]
    fn test_parse_action_defaults() {
        assert_eq!(
            parse_action(r#"{"action": "scroll"}"#).unwrap(),
            Action::Scroll { direction: "down".to_string(), amount: 600 }
        );
        assert_eq!(parse_action(r#"{"action": "wait"}"#).unwrap(), Action::Wait { ms: 1000 });
    }

    #[test]
    fn test_parse_action_rejects_garbage() {
        assert!(parse_action("I don't know what to do").is_err());
        assert!(parse_action(r#"{"action": "teleport"}"#).is_err());
        assert!(parse_action(r#"{"action": "click"}"#).is_err());
    }

    #[test]
    fn test_next_step_prose_reply_is_retryable() {
        match next_step("Let me think about this first") {
            StepDecision::Malformed(reason) => assert!(reason.contains("no JSON action")),
            other => panic!("expected malformed decision, got {:?}", other),
        }
    }

    #[test]
    fn test_next_step_routing() {
        assert!(matches!(
            next_step(r#"{"action": "done", "result": "https://hackmd.io/abc"}"#),
            StepDecision::Finished(r) if r == "https://hackmd.io/abc"
        ));
        assert!(matches!(
            next_step(r#"{"action": "fail", "reason": "login wall"}"#),
            StepDecision::GaveUp(r) if r == "login wall"
        ));
        assert!(matches!(
            next_step(r#"{"action": "wait", "ms": 500}"#),
            StepDecision::Act(Action::Wait { ms: 500 })
        ));
    }

    #[test]
    fn test_extract_json_object_nested() {
        let text = r#"prefix {"a": {"b": "}"}, "c": 1} suffix"#;
        let raw = extract_json_object(text).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["c"], 1);
    }

    #[test]
    fn test_render_observation() {
        let obs = json!({
            "url": "https://example.com",
            "title": "Example",
            "text": "Hello world",
            "elements": [
                {"index": 0, "tag": "a", "label": "More", "selector": "a#more"}
            ]
        });
        let rendered = render_observation(&obs);
        assert!(rendered.contains("URL: https://example.com"));
        assert!(rendered.contains("[0] <a> \"More\" selector=a#more"));
        assert!(rendered.contains("Hello world"));
    }

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("a\"b"), r#""a\"b""#);
        assert_eq!(js_string("line\nbreak"), r#""line\nbreak""#);
    }

    #[test]
    fn test_fill_js_embeds_escaped_values() {
        let js = fill_js("input[name=\"q\"]", "rust \"lang\"");
        assert!(js.contains(r#"document.querySelector("input[name=\"q\"]")"#));
        assert!(js.contains(r#""rust \"lang\"""#));
    }
}
