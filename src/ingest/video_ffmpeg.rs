//! FFmpeg-backed video decoding.
//!
//! Handles local files and any network URL FFmpeg can open. Frames are converted
//! to RGB24 in-memory; at end of input the decoder is drained before reporting
//! end-of-stream.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;

pub(crate) struct FfmpegVideoSource {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    fps: Option<f64>,
    frame_count: u64,
    eof_sent: bool,
}

// SAFETY: every FFmpeg handle here is owned exclusively by this source, which
// is owned by a single stream worker and never accessed concurrently.
unsafe impl Send for FfmpegVideoSource {}

impl FfmpegVideoSource {
    pub(crate) fn open(locator: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&locator)
            .with_context(|| format!("failed to open '{}' with ffmpeg", locator))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("input has no video track"))?;
        let stream_index = input_stream.index();
        let rate = input_stream.avg_frame_rate();
        let fps = if rate.numerator() > 0 && rate.denominator() > 0 {
            Some(rate.numerator() as f64 / rate.denominator() as f64)
        } else {
            None
        };
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            fps,
            frame_count: 0,
            eof_sent: false,
        })
    }

    pub(crate) fn fps(&self) -> Option<f64> {
        self.fps
    }

    pub(crate) fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    pub(crate) fn next_frame(&mut self) -> PipelineResult<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = ffmpeg::frame::Video::empty();
                self.scaler
                    .run(&decoded, &mut rgb_frame)
                    .map_err(|e| PipelineError::Decode(format!("scale frame to RGB: {}", e)))?;
                let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
                let index = self.frame_count;
                self.frame_count += 1;
                return Frame::from_rgb(index, width, height, pixels).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            let next = self.input.packets().next();
            match next {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        // The frame is lost but the stream can continue.
                        self.frame_count += 1;
                        return Err(PipelineError::Decode(format!("send packet: {}", e)));
                    }
                }
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| PipelineError::Decode(format!("flush decoder: {}", e)))?;
                    self.eof_sent = true;
                }
            }
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> PipelineResult<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data[..row_bytes * height as usize].to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(data.get(start..end).ok_or_else(|| {
            PipelineError::Decode("ffmpeg frame row is out of bounds".to_string())
        })?);
    }

    Ok((pixels, width, height))
}
