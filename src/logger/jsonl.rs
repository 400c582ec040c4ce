//! JSONL run log: one self-contained JSON object per line.
//!
//! Each line is serialized in memory and handed to the file in a single
//! `write_all`, so a concurrent `tail -f` never sees half an event.
//!
//! Degradation chain when the file misbehaves:
//! 1. Configured file path
//! 2. stderr with `[LC-JSONL]` prefix
//! 3. Silent discard (a run must never fail because logging did)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{LoadError, Result};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Events emitted over the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunStart,
    RunComplete,
    RunTimeout,
    RunInterrupted,
    TaskFailed,
    ConfigDivergence,
}

/// A single JSONL log entry. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Tasks submitted to the pool for the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks_failed: Option<usize>,
    /// Pool worker that ran a failed task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            threads: None,
            timeout_secs: None,
            tasks: None,
            tasks_failed: None,
            worker: None,
            duration_ms: None,
            error_code: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    File,
    Stderr,
    Discard,
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    /// Rotate once the file would grow past this size. Default: 16 MiB.
    pub max_size_bytes: u64,
    /// Rotated generations kept next to the live file. Default: 3.
    pub max_rotated_files: u32,
}

impl JsonlConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

/// Append-only JSONL writer with size rotation and fallback to stderr.
pub struct JsonlWriter {
    config: JsonlConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Open the log file, falling back to stderr when it cannot be opened.
    pub fn open(config: JsonlConfig) -> Self {
        let mut w = Self {
            config,
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
        };
        match open_append(&w.config.path) {
            Ok((file, size)) => {
                w.writer = Some(BufWriter::new(file));
                w.state = WriterState::File;
                w.bytes_written = size;
            }
            Err(e) => {
                let _ = writeln!(io::stderr(), "[LC-JSONL] {e}; logging to stderr");
                w.state = WriterState::Stderr;
            }
        }
        w
    }

    /// A writer that only prints to stderr.
    pub fn stderr() -> Self {
        Self {
            config: JsonlConfig::at(PathBuf::new()),
            writer: None,
            state: WriterState::Stderr,
            bytes_written: 0,
        }
    }

    /// Write one entry as one line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[LC-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::File => "file",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    fn write_line(&mut self, line: &str) {
        if self.state == WriterState::File
            && self.bytes_written + line.len() as u64 > self.config.max_size_bytes
        {
            self.rotate();
        }

        match self.state {
            WriterState::File => {
                let Some(w) = self.writer.as_mut() else {
                    self.degrade();
                    self.write_line(line);
                    return;
                };
                if w.write_all(line.as_bytes()).is_err() {
                    self.degrade();
                    self.write_line(line);
                    return;
                }
                self.bytes_written += line.len() as u64;
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[LC-JSONL] {line}").is_err() {
                    self.degrade();
                }
            }
            WriterState::Discard => {}
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        self.state = match self.state {
            WriterState::File => {
                let _ = writeln!(io::stderr(), "[LC-JSONL] file write failed, using stderr");
                WriterState::Stderr
            }
            WriterState::Stderr | WriterState::Discard => WriterState::Discard,
        };
    }

    fn rotate(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
        self.writer = None;

        let base = self.config.path.clone();
        let keep = self.config.max_rotated_files;
        if keep == 0 {
            let _ = fs::remove_file(&base);
        } else {
            let _ = fs::remove_file(rotated_name(&base, keep));
            for i in (1..keep).rev() {
                let _ = fs::rename(rotated_name(&base, i), rotated_name(&base, i + 1));
            }
            let _ = fs::rename(&base, rotated_name(&base, 1));
        }

        match open_append(&base) {
            Ok((file, _)) => {
                self.writer = Some(BufWriter::new(file));
                self.bytes_written = 0;
            }
            Err(_) => self.degrade(),
        }
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Cloneable, thread-safe handle to one [`JsonlWriter`].
///
/// Worker threads log task failures through their own clone; every entry is
/// flushed immediately so a timed-out run still leaves a complete log.
#[derive(Clone)]
pub struct EventLog {
    inner: Arc<Mutex<JsonlWriter>>,
}

impl EventLog {
    pub fn open(config: JsonlConfig) -> Self {
        Self::from_writer(JsonlWriter::open(config))
    }

    pub fn stderr() -> Self {
        Self::from_writer(JsonlWriter::stderr())
    }

    pub fn from_writer(writer: JsonlWriter) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn record(&self, entry: &LogEntry) {
        let mut writer = self.inner.lock();
        writer.write_entry(entry);
        writer.flush();
    }

    pub fn state(&self) -> &'static str {
        self.inner.lock().state()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("state", &self.state())
            .finish()
    }
}

/// Open or create a file for appending. Returns `(File, current_size)`.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| LoadError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoadError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// `runs.jsonl` → `runs.jsonl.2`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn entries_are_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");
        let mut writer = JsonlWriter::open(JsonlConfig::at(&path));
        assert_eq!(writer.state(), "file");

        let mut entry = LogEntry::new(EventType::RunTimeout, Severity::Critical);
        entry.timeout_secs = Some(1);
        entry.error_code = Some("LC-2002".to_string());
        writer.write_entry(&entry);
        writer.write_entry(&LogEntry::new(EventType::RunStart, Severity::Info));
        writer.flush();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "run_timeout");
        assert_eq!(lines[0]["severity"], "critical");
        assert_eq!(lines[0]["timeout_secs"], 1);
        assert!(lines[1].get("timeout_secs").is_none());
    }

    #[test]
    fn nested_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("runs.jsonl");
        let log = EventLog::open(JsonlConfig::at(&path));
        log.record(&LogEntry::new(EventType::RunComplete, Severity::Info));
        assert_eq!(read_lines(&path).len(), 1);
    }

    #[test]
    fn unwritable_path_falls_back_to_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        // A regular file cannot be used as a parent directory.
        let writer = JsonlWriter::open(JsonlConfig::at(blocker.join("runs.jsonl")));
        assert_eq!(writer.state(), "stderr");
    }

    #[test]
    fn rotation_keeps_bounded_generations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rot.jsonl");
        let config = JsonlConfig {
            path: path.clone(),
            max_size_bytes: 100,
            max_rotated_files: 2,
        };
        let mut writer = JsonlWriter::open(config);
        for _ in 0..10 {
            writer.write_entry(&LogEntry::new(EventType::RunComplete, Severity::Info));
        }
        writer.flush();

        assert!(path.exists());
        assert!(rotated_name(&path, 1).exists());
        assert!(rotated_name(&path, 2).exists());
        assert!(!rotated_name(&path, 3).exists());
    }

    #[test]
    fn event_log_is_shared_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.jsonl");
        let log = EventLog::open(JsonlConfig::at(&path));

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let log = log.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        let mut entry = LogEntry::new(EventType::TaskFailed, Severity::Warning);
                        entry.worker = Some(worker);
                        log.record(&entry);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 100);
        assert!(lines.iter().all(|l| l["event"] == "task_failed"));
    }
}
