use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use anyhow::Result;

use super::{
    panic_reason, Pacer, PlateEvent, PlateSnapshot, StopFlag, StreamReport, StreamSink,
    StreamState,
};
use crate::config::{PatternConfig, StreamConfig};
use crate::detect::{self, Detection, FrameDetectionAdapter};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::{AnnotatedFrame, Frame};
use crate::ingest::{FrameSource, VideoSource};
use crate::ocr::{self, OcrEngine};
use crate::plate::{EventDebouncer, PatternMatcher, PlateExtractor};
use crate::render::Overlay;
use crate::track::TrackStore;

/// Loop tunables, usually taken from `StreamConfig`.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub plate_image_send_interval: u32,
    pub default_fps: f64,
    pub realtime: bool,
    pub max_decode_errors: u32,
    /// Stop after this many frames have been read (CLI `--max-frames`).
    pub max_frames: Option<u64>,
}

impl PipelineSettings {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            plate_image_send_interval: config.plate_image_send_interval,
            default_fps: config.default_fps,
            realtime: config.realtime,
            max_decode_errors: config.max_decode_errors,
            max_frames: None,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}

/// One stream's frame loop.
///
/// Per frame: detect and track, run every plate detection through
/// extract -> OCR -> normalize -> debounce, update trails, draw overlays,
/// deliver the annotated frame and pace to the source frame rate.
pub struct StreamPipeline {
    stream: usize,
    source: Box<dyn FrameSource>,
    detector: FrameDetectionAdapter,
    ocr: Box<dyn OcrEngine>,
    extractor: PlateExtractor,
    matcher: PatternMatcher,
    debouncer: EventDebouncer,
    tracks: TrackStore,
    overlay: Overlay,
    sink: Box<dyn StreamSink>,
    settings: PipelineSettings,
    state: StreamState,
}

impl StreamPipeline {
    pub fn new(
        stream: usize,
        source: Box<dyn FrameSource>,
        detector: FrameDetectionAdapter,
        ocr: Box<dyn OcrEngine>,
        sink: Box<dyn StreamSink>,
    ) -> Self {
        let config = StreamConfig::default();
        Self {
            stream,
            source,
            detector,
            ocr,
            extractor: PlateExtractor::new(stream),
            matcher: PatternMatcher::default(),
            debouncer: EventDebouncer::new(),
            tracks: TrackStore::new(config.max_tracks),
            overlay: Overlay::new(config.plate_classes.clone()),
            sink,
            settings: PipelineSettings::from_config(&config),
            state: StreamState::Idle,
        }
    }

    /// Build a worker for `locator` with the configured backends.
    pub fn from_config(
        stream: usize,
        locator: &str,
        config: &StreamConfig,
        patterns: &PatternConfig,
        sink: Box<dyn StreamSink>,
    ) -> Result<Self> {
        let detector = detect::adapter_from_config(config)?;
        let ocr = ocr::engine_from_config(&config.ocr)?;
        Ok(Self::new(
            stream,
            Box::new(VideoSource::new(locator)),
            detector,
            ocr,
            sink,
        )
        .with_patterns(PatternMatcher::new(&patterns.patterns))
        .with_settings(PipelineSettings::from_config(config))
        .with_overlay(Overlay::from_config(config))
        .with_track_capacity(config.max_tracks)
        .with_debug_dir(config.debug_dir.clone()))
    }

    pub fn with_patterns(mut self, matcher: PatternMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_track_capacity(mut self, capacity: usize) -> Self {
        self.tracks = TrackStore::new(capacity);
        self
    }

    pub fn with_debug_dir(mut self, dir: Option<std::path::PathBuf>) -> Self {
        self.extractor = PlateExtractor::new(self.stream).with_debug_dir(dir);
        self
    }

    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.settings.max_frames = max_frames;
        self
    }

    pub fn stream(&self) -> usize {
        self.stream
    }

    pub fn locator(&self) -> &str {
        self.source.locator()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    fn set_state(&mut self, state: StreamState) {
        log::debug!("stream[{}]: {} -> {}", self.stream, self.state, state);
        self.state = state;
        self.sink.on_state(self.stream, state);
    }

    /// Run until end of stream, stop request, or a fatal error. Errors and
    /// panics inside the frame loop end the stream through `Stopping`, and the
    /// source is always released before returning.
    pub fn run(&mut self, stop: &StopFlag) -> StreamReport {
        let mut report = StreamReport::new(self.stream, self.source.locator());

        if let Err(e) = self.source.open() {
            log::error!("stream[{}]: {}", self.stream, e);
            self.source.release();
            self.set_state(StreamState::Failed);
            report.final_state = StreamState::Failed;
            report.error = Some(e.to_string());
            return report;
        }
        if let Err(e) = self.detector.warm_up() {
            log::warn!("stream[{}]: detector warm-up: {}", self.stream, e);
        }
        self.set_state(StreamState::Running);

        let fps = self
            .source
            .nominal_fps()
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .unwrap_or(self.settings.default_fps);
        let pacer = Pacer::from_fps(fps);
        log::info!(
            "stream[{}]: running {} at {:.2} fps (realtime={})",
            self.stream,
            self.source.locator(),
            fps,
            self.settings.realtime
        );

        let mut frames_read = 0u64;
        let mut decode_errors = 0u32;
        loop {
            if stop.is_stopped() {
                log::info!("stream[{}]: stop requested", self.stream);
                break;
            }
            if self.settings.max_frames.is_some_and(|max| frames_read >= max) {
                log::info!("stream[{}]: frame limit reached", self.stream);
                break;
            }

            let started = Instant::now();
            let step = panic::catch_unwind(AssertUnwindSafe(|| {
                match self.source.read_frame() {
                    Ok(Some(frame)) => {
                        frames_read += 1;
                        Some(self.process_frame(frame))
                    }
                    Ok(None) => None,
                    Err(e) => Some(Err(e)),
                }
            }));
            let result = match step {
                Ok(Some(result)) => result,
                Ok(None) => {
                    log::info!("stream[{}]: end of stream", self.stream);
                    break;
                }
                Err(payload) => {
                    let reason = panic_reason(&*payload);
                    log::error!("stream[{}]: frame loop panicked: {}", self.stream, reason);
                    report.error = Some(format!("worker panicked: {}", reason));
                    break;
                }
            };

            match result {
                Ok(events) => {
                    decode_errors = 0;
                    report.frames += 1;
                    report.events += events;
                }
                Err(PipelineError::Decode(msg)) => {
                    decode_errors += 1;
                    log::warn!("stream[{}]: skipping frame: {}", self.stream, msg);
                    if decode_errors >= self.settings.max_decode_errors {
                        log::warn!(
                            "stream[{}]: {} consecutive decode errors, treating as end of stream",
                            self.stream,
                            decode_errors
                        );
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    log::error!("stream[{}]: {}", self.stream, e);
                    report.error = Some(e.to_string());
                    break;
                }
            }

            if self.settings.realtime {
                if let Some(pacer) = &pacer {
                    pacer.pace(started.elapsed());
                }
            }
        }

        self.set_state(StreamState::Stopping);
        self.source.release();
        self.set_state(StreamState::Stopped);
        report.final_state = StreamState::Stopped;
        log::info!(
            "stream[{}]: stopped after {} frames, {} plate events",
            self.stream,
            report.frames,
            report.events
        );
        report
    }

    /// Process one frame and deliver it. Returns the number of plate events emitted.
    fn process_frame(&mut self, frame: Frame) -> PipelineResult<u64> {
        let detections = match self.detector.detect_and_track(&frame) {
            Ok(detections) => detections,
            Err(PipelineError::Detection(msg)) => {
                log::warn!(
                    "stream[{}]: frame {}: {}; continuing without detections",
                    self.stream,
                    frame.index,
                    msg
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let send_snapshot = self.settings.plate_image_send_interval > 0
            && frame.index % self.settings.plate_image_send_interval as u64 == 0;
        // Crops come from the untouched frame, overlays go on the copy.
        let mut canvas = frame.image().clone();
        let mut events = 0u64;

        for detection in &detections {
            let text = if self.overlay.is_plate(&detection.class_name) {
                self.read_plate(&frame, detection, send_snapshot, &mut events)
            } else {
                None
            };

            if let Some(track_id) = detection.track_id {
                let trail = self.tracks.update(track_id, detection.bbox.centroid());
                let color = self.overlay.color_for(&detection.class_name);
                self.overlay.draw_trail(&mut canvas, trail, color);
            }
            self.overlay
                .draw_detection(&mut canvas, detection, text.as_deref());
        }

        self.sink
            .on_frame(AnnotatedFrame::from_image(self.stream, frame.index, canvas));
        Ok(events)
    }

    /// Extract, recognize, normalize and debounce one plate detection.
    /// Returns the normalized text for labelling, if any.
    fn read_plate(
        &mut self,
        frame: &Frame,
        detection: &Detection,
        send_snapshot: bool,
        events: &mut u64,
    ) -> Option<String> {
        let plate = match self.extractor.extract(frame, &detection.bbox) {
            Ok(plate) => plate,
            Err(e) => {
                log::debug!("stream[{}]: frame {}: {}", self.stream, frame.index, e);
                return None;
            }
        };

        if send_snapshot {
            self.sink.on_plate_image(PlateSnapshot {
                stream: self.stream,
                frame_index: frame.index,
                track_id: detection.track_id,
                crop: plate.crop.clone(),
            });
        }

        let raw = match self.ocr.recognize(&plate.prepared) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!(
                    "stream[{}]: frame {}: OCR failed: {:#}",
                    self.stream,
                    frame.index,
                    e
                );
                return None;
            }
        };
        let normalized = self.matcher.normalize(&raw);
        if self.debouncer.should_emit(&normalized) {
            log::info!("stream[{}]: plate {}", self.stream, normalized);
            self.sink.on_plate(PlateEvent {
                stream: self.stream,
                frame_index: frame.index,
                text: normalized.clone(),
                track_id: detection.track_id,
                confidence: detection.confidence,
            });
            *events += 1;
        }
        if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        }
    }
}
