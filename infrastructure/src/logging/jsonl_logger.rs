//! Conversation transcript in JSON Lines.
//!
//! One line per [`ConversationEvent`]:
//!
//! ```json
//! {"type":"turn_completed","timestamp":"2026-01-02T03:04:05.678Z","question":"hi","answer":"Hello","outcome":"marker_terminated"}
//! ```
//!
//! Object payloads are flattened next to `type` and `timestamp`; any other
//! payload goes under `data`.

use chrono::{SecondsFormat, Utc};
use pocket_application::ports::conversation_logger::{ConversationEvent, ConversationLogger};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

#[derive(Serialize)]
struct TranscriptLine<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    timestamp: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl<'a> TranscriptLine<'a> {
    fn new(event: &'a ConversationEvent) -> Self {
        let mut fields = match &event.payload {
            Value::Object(map) => map.clone(),
            other => Map::from_iter([("data".to_string(), other.clone())]),
        };
        fields.remove("type");
        fields.remove("timestamp");
        Self {
            kind: event.event_type,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            fields,
        }
    }
}

/// Appends turn events to a transcript file shared across sessions.
///
/// Lines are flushed as they complete, so a crash loses at most the line
/// being written.
pub struct JsonlConversationLogger {
    path: PathBuf,
    file: Mutex<LineWriter<File>>,
    /// Set after the first failed write so the warning is logged once.
    write_failed: AtomicBool,
}

impl JsonlConversationLogger {
    /// Open `path` for appending, creating it and its parent directories.
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(LineWriter::new(file)),
            write_failed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &TranscriptLine<'_>) -> io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *file, line)?;
        file.write_all(b"\n")
    }
}

impl ConversationLogger for JsonlConversationLogger {
    fn log(&self, event: ConversationEvent) {
        if let Err(e) = self.append(&TranscriptLine::new(&event))
            && !self.write_failed.swap(true, Ordering::Relaxed)
        {
            warn!("Cannot write conversation transcript {}: {}", self.path.display(), e);
        }
    }
}
