//! The synchronization pipelines.
//!
//! Each engine owns a busy flag and a progress tracker, reports through the
//! event stream, and (except export) refuses to start unless the
//! connection monitor reports `Connected`.

pub mod delete;
pub mod export;
pub mod guard;
pub mod password;
pub mod progress;
pub mod resolver;
pub mod upsert;

pub use delete::DeletionPipeline;
pub use export::ExportEngine;
pub use guard::{BusyFlag, RunGuard};
pub use password::PasswordPipeline;
pub use progress::ProgressTracker;
pub use resolver::ConflictResolver;
pub use upsert::{BatchSize, BatchUpsertEngine};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
