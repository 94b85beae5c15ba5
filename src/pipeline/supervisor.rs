use std::thread::JoinHandle;

use anyhow::{anyhow, Context, Result};

use super::{
    panic_reason, StopFlag, StreamPipeline, StreamReport, StreamSink, StreamState,
};
use crate::config::{PatternConfig, StreamConfig, MAX_VIDEO_PATHS};

struct Worker {
    stream: usize,
    locator: String,
    handle: JoinHandle<StreamReport>,
}

/// Runs one named thread per stream and collects their reports.
///
/// All workers share a single `StopFlag`; `stop()` asks every worker to finish
/// its current frame and release its source.
pub struct StreamSupervisor {
    stop: StopFlag,
    workers: Vec<Worker>,
}

impl StreamSupervisor {
    pub fn new() -> Self {
        Self {
            stop: StopFlag::new(),
            workers: Vec::new(),
        }
    }

    /// Spawn a worker for every configured video path. `make_sink` is called
    /// once per stream with the stream index.
    pub fn from_config<F>(
        config: &StreamConfig,
        patterns: &PatternConfig,
        max_frames: Option<u64>,
        mut make_sink: F,
    ) -> Result<Self>
    where
        F: FnMut(usize) -> Box<dyn StreamSink>,
    {
        let mut supervisor = Self::new();
        for (stream, locator) in config.video_paths.iter().enumerate() {
            let pipeline =
                StreamPipeline::from_config(stream, locator, config, patterns, make_sink(stream))
                    .with_context(|| format!("stream[{}]: build pipeline for {}", stream, locator))?
                    .with_max_frames(max_frames);
            supervisor.spawn(pipeline)?;
        }
        Ok(supervisor)
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn spawn(&mut self, mut pipeline: StreamPipeline) -> Result<()> {
        if self.workers.len() >= MAX_VIDEO_PATHS {
            return Err(anyhow!(
                "at most {} concurrent streams are supported",
                MAX_VIDEO_PATHS
            ));
        }
        let stream = pipeline.stream();
        let locator = pipeline.locator().to_string();
        let stop = self.stop.clone();
        let handle = std::thread::Builder::new()
            .name(format!("stream-{}", stream))
            .spawn(move || pipeline.run(&stop))
            .with_context(|| format!("spawn worker for stream {}", stream))?;
        log::info!("supervisor: started stream[{}] {}", stream, locator);
        self.workers.push(Worker {
            stream,
            locator,
            handle,
        });
        Ok(())
    }

    pub fn stop(&self) {
        log::info!("supervisor: stopping {} streams", self.workers.len());
        self.stop.stop();
    }

    /// Wait for every worker. A worker that panicked outside its frame loop is
    /// reported as `Failed`.
    pub fn join(self) -> Vec<StreamReport> {
        self.workers
            .into_iter()
            .map(|worker| match worker.handle.join() {
                Ok(report) => report,
                Err(panic) => {
                    let reason = panic_reason(&*panic);
                    log::error!("stream[{}]: worker panicked: {}", worker.stream, reason);
                    let mut report = StreamReport::new(worker.stream, &worker.locator);
                    report.final_state = StreamState::Failed;
                    report.error = Some(format!("worker panicked: {}", reason));
                    report
                }
            })
            .collect()
    }
}

impl Default for StreamSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use crate::detect::{FrameDetectionAdapter, LabelSet, StubBackend};
    use crate::frame::AnnotatedFrame;
    use crate::ingest::VideoSource;
    use crate::ocr::StubOcr;
    use crate::pipeline::{CallbackSink, PipelineSettings, PlateEvent};

    /// Panics in `on_frame`, or on entering `panic_on` when set. Records every
    /// state it is told about.
    struct PanickingSink {
        states: Arc<Mutex<Vec<StreamState>>>,
        panic_on: Option<StreamState>,
    }

    impl StreamSink for PanickingSink {
        fn on_frame(&mut self, _frame: AnnotatedFrame) {
            panic!("sink exploded");
        }

        fn on_plate(&mut self, _event: PlateEvent) {}

        fn on_state(&mut self, _stream: usize, state: StreamState) {
            self.states.lock().unwrap().push(state);
            if self.panic_on == Some(state) {
                panic!("state handler exploded");
            }
        }
    }

    fn pipeline(stream: usize, locator: &str, sink: Box<dyn StreamSink>) -> StreamPipeline {
        StreamPipeline::new(
            stream,
            Box::new(VideoSource::new(locator)),
            FrameDetectionAdapter::new(Box::new(StubBackend::new()), LabelSet::default()),
            Box::new(StubOcr::new()),
            sink,
        )
        .with_settings(PipelineSettings {
            realtime: false,
            ..PipelineSettings::default()
        })
    }

    #[test]
    fn panicking_worker_does_not_affect_others() {
        let states = Arc::new(Mutex::new(Vec::new()));
        let mut supervisor = StreamSupervisor::new();
        supervisor
            .spawn(pipeline(
                0,
                "stub://a?frames=2&width=40&height=40",
                Box::new(PanickingSink {
                    states: Arc::clone(&states),
                    panic_on: None,
                }),
            ))
            .unwrap();
        supervisor
            .spawn(pipeline(
                1,
                "stub://b?frames=3&width=40&height=40",
                Box::new(CallbackSink::new(|_| {}, |_| {})),
            ))
            .unwrap();

        let reports = supervisor.join();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].final_state, StreamState::Stopped);
        assert_eq!(reports[0].frames, 0);
        assert!(reports[0].error.as_deref().unwrap().contains("sink exploded"));
        assert_eq!(
            *states.lock().unwrap(),
            vec![
                StreamState::Running,
                StreamState::Stopping,
                StreamState::Stopped
            ]
        );
        assert_eq!(reports[1].final_state, StreamState::Stopped);
        assert_eq!(reports[1].frames, 3);
    }

    #[test]
    fn panic_outside_frame_loop_is_reported_failed() {
        let mut supervisor = StreamSupervisor::new();
        supervisor
            .spawn(pipeline(
                0,
                "stub://a?frames=2&width=40&height=40",
                Box::new(PanickingSink {
                    states: Arc::new(Mutex::new(Vec::new())),
                    panic_on: Some(StreamState::Running),
                }),
            ))
            .unwrap();

        let reports = supervisor.join();
        assert_eq!(reports[0].final_state, StreamState::Failed);
        assert!(reports[0]
            .error
            .as_deref()
            .unwrap()
            .contains("state handler exploded"));
    }

    #[test]
    fn refuses_more_than_max_streams() {
        let mut supervisor = StreamSupervisor::new();
        supervisor.stop();
        for i in 0..MAX_VIDEO_PATHS {
            supervisor
                .spawn(pipeline(i, "stub://x", Box::new(CallbackSink::new(|_| {}, |_| {}))))
                .unwrap();
        }
        let extra = pipeline(99, "stub://x", Box::new(CallbackSink::new(|_| {}, |_| {})));
        assert!(supervisor.spawn(extra).is_err());
        let reports = supervisor.join();
        assert!(reports.iter().all(|r| r.final_state == StreamState::Stopped));
    }
}
