//! JSONL session persistence.
//!
//! One file per session key under the sessions directory. The first line is
//! metadata; every following line is one chat message. Unparseable lines are
//! skipped on load so a corrupt entry never loses the whole session.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use taskweaver_core::types::ChatMessage;
use taskweaver_core::{Paths, Result};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_type")]
enum SessionLine {
    #[serde(rename = "metadata")]
    Metadata {
        created_at: String,
        updated_at: String,
        #[serde(default)]
        metadata: serde_json::Value,
    },
    #[serde(untagged)]
    Message(ChatMessage),
}

pub struct SessionStore {
    paths: Paths,
}

impl SessionStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    pub fn load(&self, session_key: &str) -> Result<Vec<ChatMessage>> {
        let path = self.paths.session_file(session_key);

        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let mut messages = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<SessionLine>(&line) {
                Ok(SessionLine::Message(msg)) => {
                    messages.push(msg);
                }
                Ok(SessionLine::Metadata { .. }) => {
                    // Skip metadata line
                }
                Err(e) => {
                    debug!(error = %e, "Failed to parse session line, skipping");
                }
            }
        }

        Ok(messages)
    }

    pub fn save(&self, session_key: &str, messages: &[ChatMessage]) -> Result<()> {
        let path = self.paths.session_file(session_key);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let now = chrono::Utc::now().to_rfc3339();

        let mut file = File::create(&path)?;

        let metadata = SessionLine::Metadata {
            created_at: now.clone(),
            updated_at: now,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
        };
        writeln!(file, "{}", serde_json::to_string(&metadata)?)?;

        for msg in messages {
            writeln!(file, "{}", serde_json::to_string(msg)?)?;
        }

        Ok(())
    }

    pub fn append(&self, session_key: &str, message: &ChatMessage) -> Result<()> {
        let path = self.paths.session_file(session_key);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Create file with metadata if it doesn't exist
        if !path.exists() {
            let now = chrono::Utc::now().to_rfc3339();
            let mut file = File::create(&path)?;
            let metadata = SessionLine::Metadata {
                created_at: now.clone(),
                updated_at: now,
                metadata: serde_json::Value::Object(serde_json::Map::new()),
            };
            writeln!(file, "{}", serde_json::to_string(&metadata)?)?;
        }

        let mut file = OpenOptions::new().append(true).open(&path)?;
        writeln!(file, "{}", serde_json::to_string(message)?)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (SessionStore, std::path::PathBuf) {
        let base = std::env::temp_dir().join(format!("taskweaver-test-{}", uuid::Uuid::new_v4()));
        let store = SessionStore::new(Paths::with_base(base.clone()));
        (store, base)
    }

    #[test]
    fn test_load_missing_session_is_empty() {
        let (store, base) = temp_store();
        assert!(store.load("cli:nobody").unwrap().is_empty());
        let _ = std::fs::remove_dir_all(base);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (store, base) = temp_store();

        let messages = vec![
            ChatMessage::user("find me the rust book"),
            ChatMessage::assistant("Here it is: https://doc.rust-lang.org/book/"),
        ];
        store.save("cli:default", &messages).unwrap();

        let loaded = store.load("cli:default").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].role, "user");
        assert_eq!(loaded[1].text(), "Here it is: https://doc.rust-lang.org/book/");

        let _ = std::fs::remove_dir_all(base);
    }

    #[test]
    fn test_append_creates_metadata_line_first() {
        let (store, base) = temp_store();

        store.append("cli:default", &ChatMessage::user("hello")).unwrap();
        store.append("cli:default", &ChatMessage::assistant("hi")).unwrap();

        let raw = std::fs::read_to_string(store.paths.session_file("cli:default")).unwrap();
        let first = raw.lines().next().unwrap();
        assert!(first.contains("\"_type\":\"metadata\""));

        let loaded = store.load("cli:default").unwrap();
        assert_eq!(loaded.len(), 2);

        let _ = std::fs::remove_dir_all(base);
    }

    #[test]
    fn test_load_skips_corrupt_lines() {
        let (store, base) = temp_store();

        store.save("cli:default", &[ChatMessage::user("ok")]).unwrap();
        let path = store.paths.session_file("cli:default");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file, "{}", serde_json::to_string(&ChatMessage::user("after")).unwrap()).unwrap();

        let loaded = store.load("cli:default").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].text(), "after");

        let _ = std::fs::remove_dir_all(base);
    }
}
