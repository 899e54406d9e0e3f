use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{SyncError, SyncResult};
use crate::events::Pipeline;

/// Single-run flag owned by each pipeline.
#[derive(Debug)]
pub struct BusyFlag {
    pipeline: Pipeline,
    running: AtomicBool,
}

impl BusyFlag {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark the pipeline as running, or fail with [`SyncError::Busy`].
    pub fn try_acquire(&self) -> SyncResult<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| RunGuard { flag: self })
            .map_err(|_| SyncError::Busy(self.pipeline))
    }
}

/// Releases the flag when dropped, including on early return.
#[derive(Debug)]
pub struct RunGuard<'a> {
    flag: &'a BusyFlag,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.running.store(false, Ordering::SeqCst);
    }
}
