use std::collections::HashSet;

use crossbeam_channel::Sender;
use image::RgbImage;
use serde::Serialize;

use super::StreamState;
use crate::frame::AnnotatedFrame;

/// An accepted (debounced) plate text event. `text` is never empty.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlateEvent {
    pub stream: usize,
    pub frame_index: u64,
    pub text: String,
    pub track_id: Option<u32>,
    pub confidence: f32,
}

/// Original-resolution plate crop, delivered every `plate_image_send_interval` frames.
#[derive(Clone, Debug)]
pub struct PlateSnapshot {
    pub stream: usize,
    pub frame_index: u64,
    pub track_id: Option<u32>,
    pub crop: RgbImage,
}

/// Consumer side of a stream worker.
///
/// Called from the worker thread in per-stream order. Implementations that
/// feed a shared consumer must handle calls from several workers at once.
pub trait StreamSink: Send {
    fn on_frame(&mut self, frame: AnnotatedFrame);

    fn on_plate(&mut self, event: PlateEvent);

    fn on_plate_image(&mut self, _snapshot: PlateSnapshot) {}

    fn on_state(&mut self, _stream: usize, _state: StreamState) {}
}

#[derive(Clone, Debug)]
pub enum PipelineEvent {
    Frame(AnnotatedFrame),
    Plate(PlateEvent),
    PlateImage(PlateSnapshot),
    State { stream: usize, state: StreamState },
}

/// Forwards everything into a channel. Clone it once per worker.
///
/// A dropped receiver is not an error for the worker; events are discarded.
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<PipelineEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<PipelineEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: PipelineEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("sink: receiver gone, event dropped");
        }
    }
}

impl StreamSink for ChannelSink {
    fn on_frame(&mut self, frame: AnnotatedFrame) {
        self.send(PipelineEvent::Frame(frame));
    }

    fn on_plate(&mut self, event: PlateEvent) {
        self.send(PipelineEvent::Plate(event));
    }

    fn on_plate_image(&mut self, snapshot: PlateSnapshot) {
        self.send(PipelineEvent::PlateImage(snapshot));
    }

    fn on_state(&mut self, stream: usize, state: StreamState) {
        self.send(PipelineEvent::State { stream, state });
    }
}

/// Frame and text callback pair.
pub struct CallbackSink<F, T>
where
    F: FnMut(AnnotatedFrame) + Send,
    T: FnMut(PlateEvent) + Send,
{
    on_frame: F,
    on_text: T,
}

impl<F, T> CallbackSink<F, T>
where
    F: FnMut(AnnotatedFrame) + Send,
    T: FnMut(PlateEvent) + Send,
{
    pub fn new(on_frame: F, on_text: T) -> Self {
        Self { on_frame, on_text }
    }
}

impl<F, T> StreamSink for CallbackSink<F, T>
where
    F: FnMut(AnnotatedFrame) + Send,
    T: FnMut(PlateEvent) + Send,
{
    fn on_frame(&mut self, frame: AnnotatedFrame) {
        (self.on_frame)(frame);
    }

    fn on_plate(&mut self, event: PlateEvent) {
        (self.on_text)(event);
    }
}

/// Session-wide registry of distinct plate strings, across all streams.
#[derive(Debug, Default)]
pub struct SeenPlates {
    seen: HashSet<String>,
    order: Vec<String>,
}

impl SeenPlates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `text`; true the first time it is seen this session.
    pub fn observe(&mut self, text: &str) -> bool {
        if text.is_empty() || self.seen.contains(text) {
            return false;
        }
        self.seen.insert(text.to_string());
        self.order.push(text.to_string());
        true
    }

    /// Distinct plates in first-seen order.
    pub fn plates(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
