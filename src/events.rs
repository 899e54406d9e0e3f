//! Run event stream.
//!
//! Every connect/disconnect transition, transport retry, per-record outcome
//! and run summary is published as a [`LogEvent`] with a [`LogSeverity`].
//! Progress updates travel on the same channel so a consumer sees them in
//! order with the log lines. Each event is also mirrored to `tracing`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Severity of a log event as shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Success,
    Warning,
    Error,
}

impl LogSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSeverity::Info => "info",
            LogSeverity::Success => "success",
            LogSeverity::Warning => "warning",
            LogSeverity::Error => "error",
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The pipeline an event or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pipeline {
    Upsert,
    Delete,
    Password,
    Export,
}

impl Pipeline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pipeline::Upsert => "upsert",
            Pipeline::Delete => "delete",
            Pipeline::Password => "password",
            Pipeline::Export => "export",
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single operator-facing log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub severity: LogSeverity,
    pub message: String,
}

impl LogEvent {
    pub fn new(severity: LogSeverity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            message: message.into(),
        }
    }
}

/// Anything published on the event stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    Log(LogEvent),
    Progress { pipeline: Pipeline, percent: u8 },
}

/// Receiving half of the event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<SyncEvent>;

/// Create a new event channel.
///
/// The sink can be cloned freely; events from all clones arrive on the
/// single receiver in send order.
pub fn create_event_channel() -> (EventSink, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx: Some(tx) }, rx)
}

/// Sending half of the event stream.
///
/// Sending never fails: once the receiver is dropped events still reach
/// `tracing` and are otherwise discarded.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SyncEvent>>,
}

impl EventSink {
    /// A sink that only mirrors to `tracing`.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn log(&self, severity: LogSeverity, message: impl Into<String>) {
        let event = LogEvent::new(severity, message);
        match severity {
            LogSeverity::Info | LogSeverity::Success => tracing::info!("{}", event.message),
            LogSeverity::Warning => tracing::warn!("{}", event.message),
            LogSeverity::Error => tracing::error!("{}", event.message),
        }
        self.send(SyncEvent::Log(event));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogSeverity::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogSeverity::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogSeverity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogSeverity::Error, message);
    }

    pub fn progress(&self, pipeline: Pipeline, percent: u8) {
        tracing::debug!(pipeline = %pipeline, percent, "progress");
        self.send(SyncEvent::Progress { pipeline, percent });
    }

    fn send(&self, event: SyncEvent) {
        if let Some(ref tx) = self.tx {
            let _ = tx.send(event);
        }
    }
}

/// Drain everything currently queued on a receiver.
pub fn drain(rx: &mut EventReceiver) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
