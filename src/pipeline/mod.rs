//! Per-stream processing.
//!
//! - `StreamPipeline`: the frame loop and its state machine
//! - `StreamSink` and friends: where annotated frames and plate events go
//! - `StreamSupervisor`: one worker thread per source, cooperative stop
//!
//! Workers share nothing mutable. Each owns its source, detector, OCR engine,
//! track store and debouncer; the sink is the only boundary another thread sees.

mod sink;
mod stream;
mod supervisor;

pub use sink::{
    CallbackSink, ChannelSink, PipelineEvent, PlateEvent, PlateSnapshot, SeenPlates, StreamSink,
};
pub use stream::{PipelineSettings, StreamPipeline};
pub use supervisor::StreamSupervisor;

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

/// Lifecycle of one stream worker.
///
/// `Idle -> Running -> Stopping -> Stopped`, or `Idle -> Failed` when the source
/// cannot be opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Idle,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Cooperative cancellation flag, checked once per frame iteration.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Paces output to a nominal frame interval.
///
/// Only the positive remainder of `interval - processing_time` is slept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacer {
    interval: Duration,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// `None` when `fps` is not a positive finite number.
    pub fn from_fps(fps: f64) -> Option<Self> {
        if fps.is_finite() && fps > 0.0 {
            Some(Self::new(Duration::from_secs_f64(1.0 / fps)))
        } else {
            None
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }

    /// Sleep for the remainder of the interval; returns the time slept.
    pub fn pace(&self, elapsed: Duration) -> Duration {
        let remaining = self.remaining(elapsed);
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
        remaining
    }
}

/// Outcome of one worker.
#[derive(Clone, Debug, Serialize)]
pub struct StreamReport {
    pub stream: usize,
    pub locator: String,
    pub final_state: StreamState,
    /// Annotated frames delivered to the sink.
    pub frames: u64,
    /// Plate text events delivered to the sink.
    pub events: u64,
    pub error: Option<String>,
}

impl StreamReport {
    pub(crate) fn new(stream: usize, locator: &str) -> Self {
        Self {
            stream,
            locator: locator.to_string(),
            final_state: StreamState::Idle,
            frames: 0,
            events: 0,
            error: None,
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
