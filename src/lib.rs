//! Plate Stream
//!
//! Multi-stream licence plate recognition: frames in, annotated frames and
//! de-duplicated plate text events out.
//!
//! # Architecture
//!
//! Each video source is processed by one worker that owns all of its state:
//!
//! 1. **Acquire**: pull a frame from the source (`ingest`).
//! 2. **Detect**: map the frame to typed, tracked detections (`detect`).
//! 3. **Read**: crop and enhance each plate region, OCR it, normalize the text
//!    against the configured regional patterns, and debounce (`plate`, `ocr`).
//! 4. **Annotate**: update per-track trails and draw overlays (`track`, `render`).
//! 5. **Deliver**: hand the annotated frame and any plate event to the sink,
//!    then pace to the source frame rate (`pipeline`).
//!
//! # Module Structure
//!
//! - `config`: YAML configuration and plate patterns, with env overrides
//! - `error`: `PipelineError` taxonomy
//! - `frame`: `Frame` input and `AnnotatedFrame` output (packed RGB24)
//! - `ingest`: `FrameSource` trait, `VideoSource` (synthetic + FFmpeg)
//! - `detect`: detector backends, `FrameDetectionAdapter`, `IouTracker`
//! - `ocr`: OCR engines
//! - `plate`: `PlateExtractor`, `PatternMatcher`, `EventDebouncer`
//! - `track`: `TrackStore`
//! - `render`: `Overlay`
//! - `pipeline`: `StreamPipeline`, sinks, `StreamSupervisor`

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod ocr;
pub mod pipeline;
pub mod plate;
pub mod render;
pub mod track;

pub use config::{PatternConfig, PlatePattern, StreamConfig, MAX_VIDEO_PATHS};
pub use detect::{
    BoundingBox, Detection, DetectorBackend, FrameDetectionAdapter, IouTracker, LabelSet,
    RawDetection, StubBackend,
};
pub use error::{PipelineError, PipelineResult};
pub use frame::{AnnotatedFrame, Frame};
pub use ingest::{FrameSource, VideoSource};
pub use ocr::{OcrEngine, StubOcr};
pub use pipeline::{
    CallbackSink, ChannelSink, Pacer, PipelineEvent, PipelineSettings, PlateEvent, PlateSnapshot,
    SeenPlates, StopFlag, StreamPipeline, StreamReport, StreamSink, StreamState,
    StreamSupervisor,
};
pub use plate::{EventDebouncer, PatternMatcher, PlateExtractor, PreparedPlate};
pub use track::{TrackStore, MAX_TRAIL_LEN};
