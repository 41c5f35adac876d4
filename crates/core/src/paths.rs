use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    /// Default base directory: `$TASKWEAVER_HOME`, or `~/.taskweaver`.
    pub fn new() -> Self {
        let base = std::env::var("TASKWEAVER_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::home_dir().map(|h| h.join(".taskweaver")))
            .unwrap_or_else(|| PathBuf::from(".taskweaver"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.base.join("sessions")
    }

    pub fn session_file(&self, session_key: &str) -> PathBuf {
        let safe_key = session_key.replace([':', '/', '\\'], "_");
        self.sessions_dir().join(format!("{}.jsonl", safe_key))
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
