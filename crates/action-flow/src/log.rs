//! Per-run log shared by the interpreter and action handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub ts: DateTime<Utc>,
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub message: String,
}

/// Cloneable handle; clones append to the same entry list.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, level: LogLevel, node_id: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => debug!(node_id = node_id.unwrap_or("-"), "{message}"),
            LogLevel::Info => info!(node_id = node_id.unwrap_or("-"), "{message}"),
            LogLevel::Warn | LogLevel::Error => {
                warn!(node_id = node_id.unwrap_or("-"), level = ?level, "{message}")
            }
        }
        self.entries.lock().push(LogEntry {
            ts: Utc::now(),
            level,
            node_id: node_id.map(str::to_string),
            message,
        });
    }

    pub fn info(&self, node_id: Option<&str>, message: impl Into<String>) {
        self.record(LogLevel::Info, node_id, message);
    }

    pub fn warn(&self, node_id: Option<&str>, message: impl Into<String>) {
        self.record(LogLevel::Warn, node_id, message);
    }

    pub fn error(&self, node_id: Option<&str>, message: impl Into<String>) {
        self.record(LogLevel::Error, node_id, message);
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries() {
        let log = RunLog::new();
        let handle = log.clone();
        handle.error(Some("n1"), "boom");
        log.info(None, "started");

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, LogLevel::Error);
        assert_eq!(entries[0].node_id.as_deref(), Some("n1"));
        assert_eq!(entries[1].node_id, None);
    }
}
