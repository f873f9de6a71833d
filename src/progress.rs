//! Delivery progress reporting.
//!
//! [`ProgressCallback`] observes frames as they reach the output sink. It
//! cannot stop the run; the only ways a run ends are end-of-stream, the
//! frame cap, or a fatal error.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framepipe::{FfmpegBackend, Pipeline, PipelineConfig, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("delivered {} frames", info.current);
//!     }
//! }
//!
//! let config = PipelineConfig::extract_to(".").with_progress(Arc::new(PrintProgress));
//! Pipeline::open(FfmpegBackend::new(), "input.mp4", config)?.run()?;
//! # Ok::<(), framepipe::PipelineError>(())
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

/// A snapshot of delivery progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Frames handed to the sink so far.
    pub current: u64,
    /// The frame cap, if one is configured.
    pub total: Option<u64>,
    /// Completion percentage from 0.0 to 100.0, if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time since the packet loop started.
    pub elapsed: Duration,
    /// Sequence number of the most recent frame. `None` on the final report.
    pub sequence_number: Option<u64>,
}

/// Trait for receiving progress updates.
///
/// Implementations must be [`Send`] and [`Sync`] so one callback can be
/// shared between runs.
pub trait ProgressCallback: Send + Sync {
    /// Called every `batch_size` delivered frames and once at the end.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. This is the default.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Tracks timing and fires the callback.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: Option<u64>,
    current: u64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, total: Option<u64>, batch_size: u64) -> Self {
        Self {
            callback,
            total,
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
        }
    }

    /// Restart the clock; called when the packet loop begins.
    pub(crate) fn start(&mut self) {
        self.start_time = Instant::now();
    }

    /// Record one delivered frame.
    pub(crate) fn advance(&mut self, sequence_number: u64) {
        self.current += 1;
        self.items_since_last_report += 1;

        if self.items_since_last_report >= self.batch_size {
            self.report(Some(sequence_number));
            self.items_since_last_report = 0;
        }
    }

    /// Unconditionally emit a final report.
    pub(crate) fn finish(&mut self) {
        self.report(None);
    }

    fn report(&self, sequence_number: Option<u64>) {
        let percentage = self
            .total
            .filter(|&total| total > 0)
            .map(|total| (self.current as f32 / total as f32) * 100.0);

        let info = ProgressInfo {
            current: self.current,
            total: self.total,
            percentage,
            elapsed: self.start_time.elapsed(),
            sequence_number,
        };

        self.callback.on_progress(&info);
    }
}
