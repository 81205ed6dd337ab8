//! macOS capture backend using ScreenCaptureKit.
//!
//! The stream always captures the full display at native pixel size; region
//! recordings are cropped in the output handler so the writer only ever sees
//! frames of the configured size.

use crate::{
    CoreResult, RecordingError,
    capture::{
        AudioChunk, BYTES_PER_PIXEL, CaptureBackend, CaptureStream, ContentFilter, DisplayInfo,
        MediaSample, PixelRect, SampleHandler, StreamConfig, SurfaceId, VideoFrame,
        backend::run_blocking_capture,
    },
};

use std::{panic::Location, sync::Arc, time::Instant};

use async_trait::async_trait;
use core_graphics::display::CGDisplay;
use error_location::ErrorLocation;
use screencapturekit::cm::AudioBuffer;
use screencapturekit::cv::CVPixelBufferLockFlags;
use screencapturekit::prelude::*;
use tracing::{debug, info, instrument, warn};

/// Capture backend backed by ScreenCaptureKit (macOS 12.3+).
#[derive(Debug, Default)]
pub struct ScreenCaptureKitBackend;

impl ScreenCaptureKitBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

#[track_caller]
fn shareable_content() -> CoreResult<SCShareableContent> {
    SCShareableContent::get().map_err(|e| RecordingError::CaptureFailed {
        reason: format!("Failed to get shareable content: {:?}", e),
        location: ErrorLocation::from(Location::caller()),
    })
}

fn list_displays() -> CoreResult<Vec<DisplayInfo>> {
    let content = shareable_content()?;

    let displays = content
        .displays()
        .iter()
        .map(|display| {
            let id = display.display_id();
            let cg = CGDisplay::new(id);
            let bounds = cg.bounds();
            let scale_factor = if bounds.size.height > 0.0 {
                cg.pixels_high() as f64 / bounds.size.height
            } else {
                1.0
            };

            DisplayInfo {
                id,
                width: bounds.size.width as u32,
                height: bounds.size.height as u32,
                scale_factor,
            }
        })
        .collect::<Vec<_>>();

    Ok(displays)
}

fn start_stream(
    filter: ContentFilter,
    config: StreamConfig,
    handler: Arc<dyn SampleHandler>,
) -> CoreResult<SCStream> {
    let content = shareable_content()?;

    let displays = content.displays();
    let display = displays
        .iter()
        .find(|d| d.display_id() == filter.display.id)
        .ok_or(RecordingError::DisplayDisconnected {
            display_id: filter.display.id,
            location: ErrorLocation::from(Location::caller()),
        })?;

    let windows = content.windows();
    let excluded: Vec<_> = windows
        .iter()
        .filter(|w| {
            filter
                .excluded_surface_ids
                .contains(&SurfaceId(w.window_id()))
        })
        .collect();

    if excluded.len() != filter.excluded_surface_ids.len() {
        warn!(
            requested = filter.excluded_surface_ids.len(),
            found = excluded.len(),
            "Some excluded surfaces are not on screen"
        );
    }

    let sc_filter = SCContentFilter::create()
        .with_display(display)
        .with_excluding_windows(&excluded)
        .build();

    let full = filter.display_pixels();
    let crop = filter.pixel_rect();

    let mut sc_config = SCStreamConfiguration::new()
        .with_width(full.width)
        .with_height(full.height)
        .with_pixel_format(PixelFormat::BGRA)
        .with_minimum_frame_interval(&CMTime::new(1, config.frame_rate as i32))
        .with_shows_cursor(config.shows_cursor);

    if config.captures_audio {
        sc_config = sc_config
            .with_captures_audio(true)
            .with_sample_rate(config.sample_rate.try_into().unwrap_or(48_000))
            .with_channel_count(config.channel_count.try_into().unwrap_or(2))
            .with_excludes_current_process_audio(true);
    }

    let forwarder = SampleForwarder {
        handler,
        clock: Instant::now(),
        crop,
        sample_rate: config.sample_rate,
        channels: config.channel_count,
    };

    let mut stream = SCStream::new(&sc_filter, &sc_config);
    if config.captures_audio {
        stream.add_output_handler(forwarder.clone(), SCStreamOutputType::Audio);
    }
    stream.add_output_handler(forwarder, SCStreamOutputType::Screen);

    stream
        .start_capture()
        .map_err(|e| RecordingError::CaptureFailed {
            reason: format!("Failed to start capture: {:?}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

    info!(
        display_id = filter.display.id,
        width = crop.width,
        height = crop.height,
        fps = config.frame_rate,
        audio = config.captures_audio,
        excluded = excluded.len(),
        "ScreenCaptureKit stream started"
    );

    Ok(stream)
}

#[async_trait]
impl CaptureBackend for ScreenCaptureKitBackend {
    #[instrument(skip(self))]
    async fn displays(&self) -> CoreResult<Vec<DisplayInfo>> {
        let displays = run_blocking_capture("display enumeration", list_displays).await?;
        debug!(count = displays.len(), "Enumerated displays");
        Ok(displays)
    }

    #[instrument(skip(self, handler))]
    async fn start(
        &self,
        filter: ContentFilter,
        config: StreamConfig,
        handler: Arc<dyn SampleHandler>,
    ) -> CoreResult<Box<dyn CaptureStream>> {
        let stream = run_blocking_capture("stream start", move || {
            start_stream(filter, config, handler)
        })
        .await?;
        Ok(Box::new(ScreenCaptureKitStream { stream }))
    }
}

struct ScreenCaptureKitStream {
    stream: SCStream,
}

#[async_trait]
impl CaptureStream for ScreenCaptureKitStream {
    #[instrument(skip(self))]
    async fn stop(self: Box<Self>) -> CoreResult<()> {
        let stream = self.stream;
        run_blocking_capture("stream stop", move || {
            stream
                .stop_capture()
                .map_err(|e| RecordingError::CaptureFailed {
                    reason: format!("Failed to stop capture: {:?}", e),
                    location: ErrorLocation::from(Location::caller()),
                })
        })
        .await?;

        info!("ScreenCaptureKit stream stopped");

        Ok(())
    }
}

/// Converts ScreenCaptureKit sample buffers into [`MediaSample`]s.
#[derive(Clone)]
struct SampleForwarder {
    handler: Arc<dyn SampleHandler>,
    clock: Instant,
    crop: PixelRect,
    sample_rate: u32,
    channels: u16,
}

impl SampleForwarder {
    fn invalid_frame(&self, pts: std::time::Duration) -> MediaSample {
        MediaSample::Video(VideoFrame {
            pts,
            width: self.crop.width,
            height: self.crop.height,
            bytes_per_row: self.crop.width as usize * BYTES_PER_PIXEL,
            data: Vec::new(),
            is_valid: false,
        })
    }

    fn forward_frame(&self, sample: CMSampleBuffer) {
        let pts = self.clock.elapsed();

        // Status-only frames (idle, blank) carry no image buffer.
        let Some(pixel_buffer) = sample.image_buffer() else {
            self.handler.handle_sample(self.invalid_frame(pts));
            return;
        };

        // Rows may be padded past width * 4.
        let stride = pixel_buffer.bytes_per_row();

        let Ok(guard) = pixel_buffer.lock(CVPixelBufferLockFlags::READ_ONLY) else {
            self.handler.handle_sample(self.invalid_frame(pts));
            return;
        };

        let data = guard.as_slice();
        if stride == 0 || data.is_empty() {
            self.handler.handle_sample(self.invalid_frame(pts));
            return;
        }

        let Some(cropped) = self.crop.crop_bgra(data, stride) else {
            self.handler.handle_sample(self.invalid_frame(pts));
            return;
        };

        self.handler.handle_sample(MediaSample::Video(VideoFrame {
            pts,
            width: self.crop.width,
            height: self.crop.height,
            bytes_per_row: self.crop.width as usize * BYTES_PER_PIXEL,
            data: cropped,
            is_valid: true,
        }));
    }

    fn forward_audio(&self, sample: CMSampleBuffer) {
        let pts = self.clock.elapsed();

        let Some(list) = sample.audio_buffer_list() else {
            return;
        };

        let data = match list.num_buffers() {
            0 => return,
            1 => match list.get(0) {
                Some(buffer) => buffer.data().to_vec(),
                None => return,
            },
            // Planar: one buffer per channel. Interleave the first two.
            _ => {
                let left: Option<&[u8]> = list.get(0).map(|b: &AudioBuffer| b.data());
                let right: Option<&[u8]> = list.get(1).map(|b: &AudioBuffer| b.data());
                let (Some(left), Some(right)) = (left, right) else {
                    return;
                };
                if left.len() != right.len() {
                    return;
                }
                let mut interleaved = Vec::with_capacity(left.len() * 2);
                for (l, r) in left.chunks_exact(4).zip(right.chunks_exact(4)) {
                    interleaved.extend_from_slice(l);
                    interleaved.extend_from_slice(r);
                }
                interleaved
            }
        };

        if data.is_empty() {
            return;
        }

        self.handler.handle_sample(MediaSample::Audio(AudioChunk {
            pts,
            sample_rate: self.sample_rate,
            channels: self.channels,
            data,
        }));
    }
}

impl SCStreamOutputTrait for SampleForwarder {
    fn did_output_sample_buffer(&self, sample: CMSampleBuffer, of_type: SCStreamOutputType) {
        match of_type {
            SCStreamOutputType::Screen => self.forward_frame(sample),
            SCStreamOutputType::Audio => self.forward_audio(sample),
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }
}
