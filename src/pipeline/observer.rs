//! Stage timing hooks
//!
//! The pipeline reports how long each stage took to a [`StageObserver`]
//! instead of printing timings itself.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Assemble,
    Components,
    Layout,
    Merge,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Assemble => write!(f, "assemble"),
            Stage::Components => write!(f, "components"),
            Stage::Layout => write!(f, "layout"),
            Stage::Merge => write!(f, "merge"),
        }
    }
}

/// Receives stage durations.
pub trait StageObserver: Send + Sync {
    fn stage_finished(&self, stage: Stage, elapsed: Duration);

    /// Called once per request, after the last stage that ran
    fn pipeline_finished(&self, _total: Duration) {}
}

/// Logs stage durations at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn stage_finished(&self, stage: Stage, elapsed: Duration) {
        debug!("Stage {} took {:.3}s", stage, elapsed.as_secs_f64());
    }

    fn pipeline_finished(&self, total: Duration) {
        debug!("build_graph took {:.3}s", total.as_secs_f64());
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {
    fn stage_finished(&self, _stage: Stage, _elapsed: Duration) {}
}

/// Remembers which stages ran, in order, and how many requests finished.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    stages: Mutex<Vec<Stage>>,
    finished: AtomicUsize,
}

impl RecordingObserver {
    pub fn stages(&self) -> Vec<Stage> {
        self.stages.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl StageObserver for RecordingObserver {
    fn stage_finished(&self, stage: Stage, _elapsed: Duration) {
        if let Ok(mut stages) = self.stages.lock() {
            stages.push(stage);
        }
    }

    fn pipeline_finished(&self, _total: Duration) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// Lap timer feeding an observer.
///
/// The total is reported when the watch is dropped, so requests that fail
/// partway still reach `pipeline_finished`.
pub struct Stopwatch<'a> {
    observer: &'a dyn StageObserver,
    started: Instant,
    lap: Instant,
}

impl<'a> Stopwatch<'a> {
    pub fn new(observer: &'a dyn StageObserver) -> Self {
        let now = Instant::now();
        Self {
            observer,
            started: now,
            lap: now,
        }
    }

    /// Close the current lap under `stage`.
    pub fn round(&mut self, stage: Stage) {
        let now = Instant::now();
        self.observer.stage_finished(stage, now - self.lap);
        self.lap = now;
    }

    pub fn total(self) {
        drop(self);
    }
}

impl Drop for Stopwatch<'_> {
    fn drop(&mut self) {
        self.observer.pipeline_finished(self.started.elapsed());
    }
}
