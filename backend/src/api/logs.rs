//! Real-time log and progress streaming via Server-Sent Events (SSE).
//!
//! Pipeline logs are printed to stdout and broadcast, together with batch
//! progress updates, to every client connected to `GET /api/logs`.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::RowStatus;

/// Log level for frontend display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting level, for sub-steps
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into(), indent: 0 }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into(), indent: 0 }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into(), indent: 0 }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into(), indent: 0 }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Progress of a running batch, sent after each processed row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub batch_id: String,
    /// Row index of the row that just finished
    pub row: Option<usize>,
    pub status: Option<RowStatus>,
    pub processed: usize,
    pub total: usize,
    pub percent: u8,
}

/// Everything that goes down the SSE stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Log(LogEntry),
    Progress(ProgressEvent),
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries and progress to all connected SSE clients
pub struct LogBroadcaster {
    sender: broadcast::Sender<StreamEvent>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Print a log entry and send it to all subscribers
    pub fn log(&self, entry: LogEntry) {
        let prefix = match entry.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        let indent = "   ".repeat(entry.indent as usize);
        println!("{}{} {}", indent, prefix, entry.message);

        // No receivers is fine
        let _ = self.sender.send(StreamEvent::Log(entry));
    }

    /// Send a progress update to all subscribers
    pub fn progress(&self, event: ProgressEvent) {
        let _ = self.sender.send(StreamEvent::Progress(event));
    }

    /// Get a receiver for SSE streaming
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::info(msg).with_indent(indent));
}

pub fn log_error_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::error(msg).with_indent(indent));
}

pub fn log_success_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::success(msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_event_tagging() {
        let log = serde_json::to_value(StreamEvent::Log(LogEntry::warning("slow"))).unwrap();
        assert_eq!(log["type"], "log");
        assert_eq!(log["level"], "warning");

        let progress = serde_json::to_value(StreamEvent::Progress(ProgressEvent {
            batch_id: "b".into(),
            row: Some(2),
            status: Some(RowStatus::Success),
            processed: 1,
            total: 4,
            percent: 25,
        }))
        .unwrap();
        assert_eq!(progress["type"], "progress");
        assert_eq!(progress["batchId"], "b");
        assert_eq!(progress["status"], "success");
        assert_eq!(progress["percent"], 25);
    }

    #[test]
    fn test_broadcast_reaches_subscriber() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.log(LogEntry::info("hello").with_indent(1));

        match rx.try_recv().unwrap() {
            StreamEvent::Log(entry) => {
                assert_eq!(entry.message, "hello");
                assert_eq!(entry.indent, 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
