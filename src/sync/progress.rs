use std::sync::atomic::{AtomicU8, Ordering};

use crate::events::{EventSink, Pipeline};

/// `round(done / total * 100)`, capped at 100. An empty run is complete.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let done = done.min(total) as u64;
    let total = total as u64;
    ((done * 100 + total / 2) / total) as u8
}

/// Run progress that only moves forward between resets.
#[derive(Debug)]
pub struct ProgressTracker {
    pipeline: Pipeline,
    value: AtomicU8,
    events: EventSink,
}

impl ProgressTracker {
    pub fn new(pipeline: Pipeline, events: EventSink) -> Self {
        Self {
            pipeline,
            value: AtomicU8::new(0),
            events,
        }
    }

    pub fn get(&self) -> u8 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::SeqCst);
        self.events.progress(self.pipeline, 0);
    }

    /// Raise progress to `percent`; lower values are ignored.
    pub fn advance_to(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.value.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            self.events.progress(self.pipeline, percent);
        }
    }

    pub fn advance(&self, done: usize, total: usize) {
        self.advance_to(percent(done, total));
    }
}
