//! Logging service - structured event logging to a JSON-lines file
//!
//! Provides a privacy-safe event log stored in logs.jsonl, one JSON object
//! per line. No user data (phone numbers, PINs, balances, amounts) is ever
//! logged: events carry a name, the command that ran and error text only.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::adapters::snapshot_store::write_atomic;

pub const LOG_FILE: &str = "logs.jsonl";

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique ID based on timestamp + counter
fn generate_id() -> u64 {
    let timestamp = now_ms().max(0) as u64;

    // Lower 16 bits: counter (65536 unique IDs per millisecond)
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    (timestamp << 16) | counter
}

/// Current unix timestamp in milliseconds
fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// Who recorded the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    /// The core used as a library
    Embedded,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Embedded => "embedded",
        }
    }
}

/// A log event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            command: None,
            error_message: None,
        }
    }

    /// Set the command context (for CLI events)
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// One line of logs.jsonl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Service for structured event logging
///
/// Appends are serialized through a mutex; readers parse the whole file and
/// skip lines that do not decode (a torn final line after a crash).
pub struct LoggingService {
    lock: Mutex<()>,
    path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Create a logging service writing to logs.jsonl in `data_dir`
    pub fn new(
        data_dir: &Path,
        entry_point: EntryPoint,
        app_version: impl Into<String>,
    ) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(LOG_FILE);
        OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            lock: Mutex::new(()),
            path,
            entry_point,
            app_version: app_version.into(),
            platform: detect_platform(),
        })
    }

    /// Log an event
    ///
    /// The entry point, app version and platform are filled in from the
    /// service configuration.
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let entry = LogEntry {
            id: generate_id(),
            timestamp: now_ms(),
            entry_point: self.entry_point.as_str().to_string(),
            app_version: self.app_version.clone(),
            platform: self.platform.to_string(),
            event: event.event,
            command: event.command,
            error_message: event.error_message,
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let _guard = self.lock.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<LogEntry>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(entry) = serde_json::from_str::<LogEntry>(&line) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn newest_first(mut entries: Vec<LogEntry>, limit: usize) -> Vec<LogEntry> {
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        entries.truncate(limit);
        entries
    }

    /// Most recent entries, newest first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let _guard = self.lock.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        Ok(Self::newest_first(self.read_all()?, limit))
    }

    /// Entries that carry an error message, newest first
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let _guard = self.lock.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let errors = self
            .read_all()?
            .into_iter()
            .filter(|e| e.error_message.is_some())
            .collect();
        Ok(Self::newest_first(errors, limit))
    }

    pub fn count(&self) -> Result<u64> {
        let _guard = self.lock.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        Ok(self.read_all()?.len() as u64)
    }

    /// Delete logs older than the specified timestamp (unix ms)
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let _guard = self.lock.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let entries = self.read_all()?;
        let before = entries.len();

        let mut kept = Vec::new();
        for entry in entries.iter().filter(|e| e.timestamp >= timestamp_ms) {
            serde_json::to_writer(&mut kept, entry)?;
            kept.push(b'\n');
        }
        let remaining = kept.iter().filter(|&&b| b == b'\n').count();
        write_atomic(&self.path, &kept)?;

        Ok((before - remaining) as u64)
    }

    /// Copy the log file elsewhere for troubleshooting
    pub fn export(&self, output_path: &Path) -> Result<PathBuf> {
        let _guard = self.lock.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        fs::copy(&self.path, output_path)?;
        Ok(output_path.to_path_buf())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_logging_service_creation() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "1.0.0").unwrap();

        assert!(service.path().exists());
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_log_event() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "1.0.0").unwrap();

        service.log(LogEvent::new("send_started")).unwrap();

        let entries = service.get_recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "send_started");
        assert_eq!(entries[0].entry_point, "cli");
        assert_eq!(entries[0].app_version, "1.0.0");
    }

    #[test]
    fn test_log_with_command() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Embedded, "2.0.0").unwrap();

        service
            .log(LogEvent::new("backup_completed").with_command("backup"))
            .unwrap();

        let entries = service.get_recent(10).unwrap();
        assert_eq!(entries[0].command, Some("backup".to_string()));
        assert_eq!(entries[0].entry_point, "embedded");
    }

    #[test]
    fn test_log_error() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "1.0.0").unwrap();

        service.log(LogEvent::new("status_started")).unwrap();
        service
            .log(LogEvent::new("send_failed").with_error("persistence"))
            .unwrap();

        let errors = service.get_errors(10).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].event, "send_failed");
        assert_eq!(errors[0].error_message, Some("persistence".to_string()));
    }

    #[test]
    fn test_recent_is_newest_first_and_limited() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "1.0.0").unwrap();

        for i in 0..5 {
            service.log(LogEvent::new(format!("event{}", i))).unwrap();
        }

        let entries = service.get_recent(2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event, "event4");
        assert_eq!(entries[1].event, "event3");
    }

    #[test]
    fn test_torn_line_is_skipped() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "1.0.0").unwrap();
        service.log(LogEvent::new("event1")).unwrap();

        let mut file = OpenOptions::new().append(true).open(service.path()).unwrap();
        file.write_all(b"{\"id\":1,\"timest").unwrap();

        assert_eq!(service.count().unwrap(), 1);
    }

    #[test]
    fn test_count_and_delete() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "1.0.0").unwrap();

        service.log(LogEvent::new("event1")).unwrap();
        service.log(LogEvent::new("event2")).unwrap();
        service.log(LogEvent::new("event3")).unwrap();

        assert_eq!(service.count().unwrap(), 3);
        assert_eq!(service.delete_before(0).unwrap(), 0);

        // Delete all logs (using future timestamp)
        let deleted = service.delete_before(now_ms() + 1000).unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_export() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "1.0.0").unwrap();

        service.log(LogEvent::new("test_event")).unwrap();

        let export_path = dir.path().join("export.jsonl");
        service.export(&export_path).unwrap();

        assert_eq!(
            fs::read_to_string(&export_path).unwrap(),
            fs::read_to_string(service.path()).unwrap()
        );
    }
}
