//! Bulk user-directory synchronization.
//!
//! Reconciles a set of user records against a remote user API:
//! chunked create-or-update with conflict resolution, two-step deletion
//! with timeout compensation, password rewrites, and a deduplicating
//! paginated export. All requests go through a retrying transport and the
//! mutating pipelines are gated on a connection monitor.

pub mod adapters;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod monitor;
pub mod sync;
pub mod traits;
pub mod transport;

pub use api::UserApi;
pub use config::SyncConfig;
pub use error::{NetworkError, SyncError, SyncResult};
pub use events::{create_event_channel, EventSink, LogEvent, LogSeverity, Pipeline, SyncEvent};
pub use monitor::{ConnectionMonitor, ConnectionStatus};
pub use sync::{BatchSize, BatchUpsertEngine, DeletionPipeline, ExportEngine, PasswordPipeline};
pub use transport::{RetryPolicy, RetryingTransport};
