//! Run log capture
//!
//! `LogBuffer` is a `tracing_subscriber` layer that keeps the formatted
//! records of the current process. After a stage finishes, the recent lines not
//! uploaded before are inserted into `log_message` so operators can read the run
//! without access to the worker's files.

use crate::time::DB_TIMESTAMP_FORMAT;
use crate::Result;
use chrono::{DateTime, Duration, Local};
use sqlx::SqlitePool;
use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Oldest records are discarded past this many
const DEFAULT_CAPACITY: usize = 10_000;

/// One captured log event
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub target: String,
    pub message: String,
}

impl LogRecord {
    /// Render as `<time> <target> <LEVEL> <message>`
    pub fn to_line(&self) -> String {
        format!(
            "{} {:<12} {:<8} {}",
            self.timestamp.format(DB_TIMESTAMP_FORMAT),
            self.target,
            self.level,
            self.message
        )
    }
}

/// Shared, bounded buffer of log records
#[derive(Clone)]
pub struct LogBuffer {
    inner: Arc<Mutex<Inner>>,
    capacity: usize,
}

#[derive(Default)]
struct Inner {
    records: VecDeque<LogRecord>,
    /// Records ever pushed, including discarded ones
    pushed: u64,
    /// Records pushed before the last successful upload
    uploaded: u64,
}

impl Inner {
    /// Buffered records that were not part of an upload yet
    fn pending(&self) -> impl Iterator<Item = &LogRecord> {
        let first_seq = self.pushed - self.records.len() as u64;
        let skip = self.uploaded.saturating_sub(first_seq) as usize;
        self.records.iter().skip(skip)
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves the records intact
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a record, discarding the oldest when full
    pub fn push(&self, record: LogRecord) {
        let mut inner = self.lock();
        if inner.records.len() == self.capacity {
            inner.records.pop_front();
        }
        inner.records.push_back(record);
        inner.pushed += 1;
    }

    /// Snapshot of all buffered records
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().records.iter().cloned().collect()
    }

    /// Check if any buffered message contains `pattern`
    pub fn contains(&self, pattern: &str) -> bool {
        self.lock().records.iter().any(|r| r.message.contains(pattern))
    }

    pub fn clear(&self) {
        self.lock().records.clear();
    }

    /// Not yet uploaded lines newer than `window` relative to `now`, in
    /// chronological order
    pub fn recent_lines(&self, now: DateTime<Local>, window: Duration) -> Vec<String> {
        self.pending_lines(now, window).0
    }

    /// Pending lines plus the push count they cover
    fn pending_lines(&self, now: DateTime<Local>, window: Duration) -> (Vec<String>, u64) {
        let cutoff = now - window;
        let inner = self.lock();
        let lines: Vec<String> = inner
            .pending()
            .filter(|r| r.timestamp > cutoff)
            .map(LogRecord::to_line)
            .collect();
        (lines, inner.pushed)
    }

    /// Insert the recent, not yet uploaded lines as one `log_message` row
    ///
    /// Returns the new row id, or `None` when there was nothing to upload.
    /// Lines are only marked uploaded once the insert succeeded.
    pub async fn upload_recent(
        &self,
        pool: &SqlitePool,
        plant: &str,
        source_file: &str,
        window: Duration,
    ) -> Result<Option<i64>> {
        let now = Local::now();
        let (lines, mark) = self.pending_lines(now, window);
        if lines.is_empty() {
            return Ok(None);
        }

        let result = sqlx::query(
            "INSERT INTO log_message (update_time, plant, message, source_file, status) VALUES (?, ?, ?, ?, 'undone')",
        )
        .bind(now.format(DB_TIMESTAMP_FORMAT).to_string())
        .bind(plant)
        .bind(lines.join("\n"))
        .bind(source_file)
        .execute(pool)
        .await?;

        {
            let mut inner = self.lock();
            inner.uploaded = inner.uploaded.max(mark);
        }
        Ok(Some(result.last_insert_rowid()))
    }
}

impl<S: Subscriber> Layer<S> for LogBuffer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.push(LogRecord {
            timestamp: Local::now(),
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: visitor.finish(),
        });
    }
}

/// Collects the `message` field followed by `key=value` pairs
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
