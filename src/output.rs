//! Run artifacts: the append-only `run.log` and the JSON/text writers for
//! `blackboard.json` and `final_explanation.md`.

use serde_json::{Value, json};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Write a pretty-printed JSON artifact, creating parent directories.
pub fn write_json(path: &Path, value: &Value) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value).unwrap_or_default())
}

/// Write a text artifact, creating parent directories.
pub fn write_text(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)
}

/// Timestamped, append-only run log.
///
/// Best-effort: a log line that cannot be written is reported through
/// tracing and dropped rather than failing the run.
pub struct RunLogger {
    path: PathBuf,
}

impl RunLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        Self { path }
    }

    /// Append one timestamped line.
    pub fn log(&self, msg: &str) {
        let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("[{ts}] {msg}\n");
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = result {
            warn!("failed to append to {}: {e}", self.path.display());
        }
    }

    /// Append a labeled, pretty-printed JSON dump.
    pub fn log_json(&self, label: &str, value: &Value) {
        let payload = json!({ "label": label, "data": value });
        self.log(&serde_json::to_string_pretty(&payload).unwrap_or_default());
    }
}
