//! Chunked, bounded-concurrency upsert of user records.

use std::fmt;
use std::sync::Mutex;

use futures::future::join_all;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::guard::BusyFlag;
use super::lock;
use super::progress::ProgressTracker;
use super::resolver::ConflictResolver;
use crate::api::UserApi;
use crate::error::{SyncError, SyncResult};
use crate::events::{EventSink, Pipeline};
use crate::models::{UpsertSummary, UserRecord};
use crate::monitor::{ensure_connected, ConnectionStatus};

/// Records resolved concurrently per chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchSize {
    One,
    Two,
    #[default]
    Five,
    Ten,
}

impl BatchSize {
    pub const ALL: [BatchSize; 4] = [BatchSize::One, BatchSize::Two, BatchSize::Five, BatchSize::Ten];

    pub fn get(self) -> usize {
        match self {
            BatchSize::One => 1,
            BatchSize::Two => 2,
            BatchSize::Five => 5,
            BatchSize::Ten => 10,
        }
    }

    /// `ceil(records / size)`
    pub fn chunk_count(self, records: usize) -> usize {
        records.div_ceil(self.get())
    }
}

impl TryFrom<usize> for BatchSize {
    type Error = SyncError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(BatchSize::One),
            2 => Ok(BatchSize::Two),
            5 => Ok(BatchSize::Five),
            10 => Ok(BatchSize::Ten),
            other => Err(SyncError::InvalidBatchSize(other)),
        }
    }
}

impl fmt::Display for BatchSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

pub struct BatchUpsertEngine {
    resolver: ConflictResolver,
    status: watch::Receiver<ConnectionStatus>,
    events: EventSink,
    busy: BusyFlag,
    progress: ProgressTracker,
    failed: Mutex<Vec<UserRecord>>,
}

impl BatchUpsertEngine {
    pub fn new(api: UserApi, status: watch::Receiver<ConnectionStatus>) -> Self {
        let events = api.events().clone();
        Self {
            resolver: ConflictResolver::new(api),
            status,
            progress: ProgressTracker::new(Pipeline::Upsert, events.clone()),
            events,
            busy: BusyFlag::new(Pipeline::Upsert),
            failed: Mutex::new(Vec::new()),
        }
    }

    pub fn progress(&self) -> u8 {
        self.progress.get()
    }

    pub fn is_running(&self) -> bool {
        self.busy.is_running()
    }

    /// Records that failed in the last run.
    pub fn failed_records(&self) -> Vec<UserRecord> {
        lock(&self.failed).clone()
    }

    pub fn clear_failed(&self) {
        lock(&self.failed).clear();
    }

    /// Run again over the records that failed last time.
    pub async fn retry_failed(
        &self,
        batch_size: BatchSize,
        cancel: &CancellationToken,
    ) -> SyncResult<UpsertSummary> {
        let records = self.failed_records();
        self.run(records, batch_size, cancel).await
    }

    /// Validate every record, then create or update them chunk by chunk.
    ///
    /// Records within a chunk are resolved concurrently; the next chunk
    /// starts only after the whole chunk has finished. `cancel` is checked
    /// between chunks.
    pub async fn run(
        &self,
        records: Vec<UserRecord>,
        batch_size: BatchSize,
        cancel: &CancellationToken,
    ) -> SyncResult<UpsertSummary> {
        let _guard = self.busy.try_acquire()?;
        ensure_connected(&self.status)?;

        let invalid = records.iter().filter(|r| !r.is_valid()).count();
        if invalid > 0 {
            let err = SyncError::Validation { invalid };
            self.events.error(err.to_string());
            return Err(err);
        }

        let run_id = Uuid::new_v4();
        let total = records.len();
        info!(%run_id, total, batch_size = batch_size.get(), "Upsert run started");
        self.events.info(format!(
            "Upserting {} record(s) in {} chunk(s) of {}",
            total,
            batch_size.chunk_count(total),
            batch_size
        ));
        self.progress.reset();

        let mut summary = UpsertSummary::default();
        let mut processed = 0;
        for chunk in records.chunks(batch_size.get()) {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let results = join_all(
                chunk
                    .iter()
                    .cloned()
                    .map(|record| self.resolver.resolve(record)),
            )
            .await;

            for result in results {
                if result.success {
                    summary.success_count += 1;
                } else {
                    summary.failed_records.push(result.record);
                }
            }
            summary.chunks += 1;
            processed += chunk.len();
            self.progress.advance(processed, total);
        }

        *lock(&self.failed) = summary.failed_records.clone();

        let message = format!(
            "Upsert {}: {} succeeded, {} failed",
            if summary.cancelled { "cancelled" } else { "finished" },
            summary.success_count,
            summary.failure_count()
        );
        if summary.failed_records.is_empty() {
            self.events.success(message);
        } else {
            warn!(%run_id, failed = summary.failure_count(), "Upsert run had failures");
            self.events.warning(message);
        }
        info!(%run_id, success = summary.success_count, chunks = summary.chunks, "Upsert run ended");
        self.progress.reset();
        Ok(summary)
    }
}
