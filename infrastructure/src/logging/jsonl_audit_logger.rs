//! JSONL file writer for audit events.
//!
//! Each [`AuditEvent`] becomes one JSON line carrying a `type` and a
//! `timestamp` next to the payload fields. The file is opened in append
//! mode so the trail survives restarts.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tracing::warn;
use verity_application::ports::audit_logger::{AuditEvent, AuditLogger};

/// Append-only JSONL audit trail.
///
/// Thread-safe via `Mutex<BufWriter<File>>`; flushed after every event and on `Drop`.
pub struct JsonlAuditLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlAuditLogger {
    /// Open (or create) the trail at `path`, creating parent directories.
    ///
    /// Returns `None` when the file cannot be opened; auditing is then
    /// skipped rather than failing the run.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!("Could not create audit log directory {}: {}", parent.display(), e);
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open audit log {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record(event: AuditEvent) -> Value {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        match event.payload {
            Value::Object(payload) => {
                let mut map = Map::with_capacity(payload.len() + 2);
                map.insert("type".to_string(), Value::from(event.event_type));
                map.insert("timestamp".to_string(), Value::from(timestamp));
                map.extend(payload.into_iter().filter(|(k, _)| k != "type" && k != "timestamp"));
                Value::Object(map)
            }
            other => json!({
                "type": event.event_type,
                "timestamp": timestamp,
                "data": other,
            }),
        }
    }
}

impl AuditLogger for JsonlAuditLogger {
    fn log(&self, event: AuditEvent) {
        let Ok(line) = serde_json::to_string(&Self::record(event)) else {
            return;
        };

        let mut writer = self.writer.lock();
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            warn!("Audit log write to {} failed: {}", self.path.display(), e);
        }
    }
}

impl Drop for JsonlAuditLogger {
    fn drop(&mut self) {
        let _ = self.writer.lock().flush();
    }
}
