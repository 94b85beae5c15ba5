//! plate_streamd - multi-stream licence plate recognition daemon
//!
//! This daemon:
//! 1. Loads the stream configuration and regional plate patterns
//! 2. Starts one worker per configured video source (up to 10)
//! 3. Writes each accepted plate event to stdout as one JSON line
//! 4. Stops all workers cooperatively on Ctrl-C and logs a per-stream report

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

use plate_stream::{
    ChannelSink, PatternConfig, PipelineEvent, PlateEvent, SeenPlates, StreamConfig, StreamSink,
    StreamState, StreamSupervisor,
};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Stream configuration (YAML).
    #[arg(long, env = "PLATE_CONFIG", default_value = "config.yaml")]
    config: PathBuf,
    /// Regional plate patterns (YAML).
    #[arg(long, env = "PLATE_PATTERNS", default_value = "configs/plate_patterns.yaml")]
    patterns: PathBuf,
    /// Video source; repeat for several streams. Overrides `video_paths`.
    #[arg(long = "video", value_name = "LOCATOR")]
    videos: Vec<String>,
    /// Process frames as fast as possible instead of at the source frame rate.
    #[arg(long)]
    no_realtime: bool,
    /// Stop each stream after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
}

#[derive(Serialize)]
struct PlateLine<'a> {
    #[serde(flatten)]
    event: &'a PlateEvent,
    /// First time this plate string was seen in this session (any stream).
    first_seen: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = StreamConfig::load_with_env(&args.config)?;
    if !args.videos.is_empty() {
        config.video_paths = args.videos.clone();
    }
    if args.no_realtime {
        config.realtime = false;
    }
    let patterns = PatternConfig::load_from(&args.patterns);
    log::info!(
        "plate_streamd: {} streams, {} plate patterns",
        config.video_paths.len(),
        patterns.patterns.len()
    );
    if config.video_paths.is_empty() {
        log::warn!("plate_streamd: no video sources configured, nothing to do");
        return Ok(());
    }

    let (tx, rx) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
    let supervisor = StreamSupervisor::from_config(
        &config,
        &patterns,
        args.max_frames,
        |_| -> Box<dyn StreamSink> { Box::new(ChannelSink::new(tx.clone())) },
    )?;
    drop(tx);

    let stop = supervisor.stop_flag();
    ctrlc::set_handler(move || {
        log::info!("shutdown signal received, stopping streams...");
        stop.stop();
    })
    .context("error setting Ctrl-C handler")?;

    let mut seen = SeenPlates::new();
    let stdout = std::io::stdout();
    for event in rx.iter() {
        match event {
            PipelineEvent::Plate(event) => {
                let line = PlateLine {
                    first_seen: seen.observe(&event.text),
                    event: &event,
                };
                let mut out = stdout.lock();
                writeln!(out, "{}", serde_json::to_string(&line)?)?;
                out.flush()?;
            }
            PipelineEvent::State { stream, state } => match state {
                StreamState::Failed => log::error!("stream[{}]: failed", stream),
                other => log::debug!("stream[{}]: {}", stream, other),
            },
            PipelineEvent::PlateImage(snapshot) => log::debug!(
                "stream[{}]: plate snapshot at frame {} ({}x{})",
                snapshot.stream,
                snapshot.frame_index,
                snapshot.crop.width(),
                snapshot.crop.height()
            ),
            PipelineEvent::Frame(_) => {}
        }
    }

    for report in supervisor.join() {
        match &report.error {
            Some(error) => log::warn!(
                "stream[{}] {}: {} after {} frames, {} events ({})",
                report.stream,
                report.locator,
                report.final_state,
                report.frames,
                report.events,
                error
            ),
            None => log::info!(
                "stream[{}] {}: {} after {} frames, {} events",
                report.stream,
                report.locator,
                report.final_state,
                report.frames,
                report.events
            ),
        }
    }
    log::info!("plate_streamd: {} distinct plates this session", seen.len());
    Ok(())
}
