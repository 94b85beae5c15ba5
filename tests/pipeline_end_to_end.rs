use std::sync::{Arc, Mutex};

use plate_stream::{
    AnnotatedFrame, CallbackSink, ChannelSink, FrameDetectionAdapter, LabelSet, PatternConfig,
    PatternMatcher, PipelineEvent, PipelineSettings, PlateEvent, PlatePattern, RawDetection,
    StopFlag, StreamConfig, StreamPipeline, StreamSink, StreamState, StreamSupervisor,
    StubBackend, StubOcr, VideoSource,
};

fn ru_patterns() -> PatternMatcher {
    PatternMatcher::new(&[PlatePattern {
        pattern: r"^[A-Z]{2}\d{4}$".to_string(),
        region: "RU".to_string(),
    }])
}

fn offline() -> PipelineSettings {
    PipelineSettings {
        realtime: false,
        ..PipelineSettings::default()
    }
}

fn plate_box() -> RawDetection {
    RawDetection::new(1, [20.0, 5.0, 140.0, 35.0], 0.92).with_track(4)
}

#[derive(Default)]
struct Collected {
    frames: Vec<AnnotatedFrame>,
    texts: Vec<PlateEvent>,
}

fn collecting_sink(collected: &Arc<Mutex<Collected>>) -> Box<dyn StreamSink> {
    let frames = Arc::clone(collected);
    let texts = Arc::clone(collected);
    Box::new(CallbackSink::new(
        move |frame: AnnotatedFrame| frames.lock().unwrap().frames.push(frame),
        move |event: PlateEvent| texts.lock().unwrap().texts.push(event),
    ))
}

#[test]
fn five_frame_stream_emits_one_debounced_event() {
    let collected = Arc::new(Mutex::new(Collected::default()));
    let backend = StubBackend::scripted(vec![
        vec![],
        vec![plate_box()],
        vec![plate_box()],
        vec![plate_box()],
        vec![],
    ]);
    let ocr = StubOcr::scripted(["ab1234", "AB1234", "ab1234"]);

    let mut pipeline = StreamPipeline::new(
        0,
        Box::new(VideoSource::new("stub://e2e?frames=5&width=160&height=40")),
        FrameDetectionAdapter::new(Box::new(backend), LabelSet::default()),
        Box::new(ocr),
        collecting_sink(&collected),
    )
    .with_patterns(ru_patterns())
    .with_settings(offline());

    let report = pipeline.run(&StopFlag::new());
    assert_eq!(report.final_state, StreamState::Stopped);
    assert_eq!(report.frames, 5);
    assert_eq!(report.events, 1);
    assert!(report.error.is_none());

    let collected = collected.lock().unwrap();
    let texts: Vec<&str> = collected.texts.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["AB1234 RU"]);
    assert_eq!(collected.texts[0].frame_index, 1);
    assert_eq!(collected.texts[0].track_id, Some(4));

    let indices: Vec<u64> = collected.frames.iter().map(|f| f.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    for frame in &collected.frames {
        assert_eq!((frame.width, frame.height), (160, 40));
        assert_eq!(frame.data.len(), frame.stride() * frame.height as usize);
    }
    // Plate box outline drawn in white on a frame with a detection.
    assert_eq!(collected.frames[1].pixel(20, 5), Some([255, 255, 255]));
}

#[test]
fn invalid_source_fails_without_callbacks() {
    let collected = Arc::new(Mutex::new(Collected::default()));
    let mut pipeline = StreamPipeline::new(
        0,
        Box::new(VideoSource::new("/no/such/dir/video.mp4")),
        FrameDetectionAdapter::new(Box::new(StubBackend::new()), LabelSet::default()),
        Box::new(StubOcr::fixed("AB1234")),
        collecting_sink(&collected),
    )
    .with_patterns(ru_patterns())
    .with_settings(offline());

    let report = pipeline.run(&StopFlag::new());
    assert_eq!(report.final_state, StreamState::Failed);
    assert_eq!(report.frames, 0);
    assert!(report.error.as_deref().unwrap().contains("video source unavailable"));

    let collected = collected.lock().unwrap();
    assert!(collected.frames.is_empty());
    assert!(collected.texts.is_empty());
}

#[test]
fn stop_flag_ends_an_endless_stream() {
    let stop = StopFlag::new();
    let trigger = stop.clone();
    let sink = CallbackSink::new(
        move |frame: AnnotatedFrame| {
            if frame.index == 2 {
                trigger.stop();
            }
        },
        |_event: PlateEvent| {},
    );
    let mut pipeline = StreamPipeline::new(
        0,
        Box::new(VideoSource::new("stub://endless?width=80&height=40")),
        FrameDetectionAdapter::new(Box::new(StubBackend::new()), LabelSet::default()),
        Box::new(StubOcr::new()),
        Box::new(sink),
    )
    .with_settings(offline());

    let report = pipeline.run(&stop);
    assert_eq!(report.final_state, StreamState::Stopped);
    assert_eq!(report.frames, 3);
}

#[test]
fn flickering_text_re_emits_on_every_change() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let script = (0..4).map(|_| vec![plate_box()]).collect();
    let mut pipeline = StreamPipeline::new(
        2,
        Box::new(VideoSource::new("stub://flicker?frames=4&width=160&height=40")),
        FrameDetectionAdapter::new(Box::new(StubBackend::scripted(script)), LabelSet::default()),
        Box::new(StubOcr::scripted(["AB1234", "CD5678", "AB1234", "not a plate"])),
        Box::new(ChannelSink::new(tx)),
    )
    .with_patterns(ru_patterns())
    .with_settings(offline());

    pipeline.run(&StopFlag::new());
    drop(pipeline);

    let texts: Vec<String> = rx
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::Plate(event) => Some(event.text),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["AB1234 RU", "CD5678 RU", "AB1234 RU"]);
}

#[test]
fn supervisor_runs_configured_streams_independently() {
    let config = StreamConfig {
        video_paths: vec![
            "stub://lane-1?frames=3&width=200&height=60".to_string(),
            "/missing/lane-2.mp4".to_string(),
            "stub://lane-3?frames=5&width=200&height=60".to_string(),
        ],
        realtime: false,
        ..StreamConfig::default()
    };
    let (tx, rx) = crossbeam_channel::unbounded();
    let supervisor =
        StreamSupervisor::from_config(&config, &PatternConfig::default(), None, |_| {
            Box::new(ChannelSink::new(tx.clone())) as Box<dyn StreamSink>
        })
        .unwrap();
    drop(tx);
    assert_eq!(supervisor.len(), 3);

    let frame_count = rx
        .iter()
        .filter(|event| matches!(event, PipelineEvent::Frame(_)))
        .count();
    let reports = supervisor.join();

    assert_eq!(frame_count, 8);
    assert_eq!(reports[0].final_state, StreamState::Stopped);
    assert_eq!(reports[0].frames, 3);
    assert_eq!(reports[1].final_state, StreamState::Failed);
    assert_eq!(reports[2].final_state, StreamState::Stopped);
    assert_eq!(reports[2].frames, 5);
}
