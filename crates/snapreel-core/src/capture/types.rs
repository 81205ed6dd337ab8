use crate::{CoreResult, RecordingError};

use std::{collections::BTreeSet, panic::Location, time::Duration};

use error_location::ErrorLocation;
use serde::{Deserialize, Serialize};

/// Target capture rate in frames per second.
pub const TARGET_FRAME_RATE: u32 = 60;

/// Audio sample rate delivered by the capture subsystem and written to AAC.
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Audio channel count (stereo).
pub const AUDIO_CHANNELS: u16 = 2;

/// Bytes per BGRA pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Identifier of a physical display as reported by the OS.
pub type DisplayId = u32;

/// Identifier of an on-screen surface (window) to exclude from capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(pub u32);

/// A display that can be captured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    /// OS display identifier.
    pub id: DisplayId,
    /// Width in points.
    pub width: u32,
    /// Height in points.
    pub height: u32,
    /// Backing scale factor (pixels per point).
    pub scale_factor: f64,
}

/// A rectangle on a display, in points, relative to the display origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureRegion {
    /// Left edge in points.
    pub x: f64,
    /// Top edge in points.
    pub y: f64,
    /// Width in points.
    pub width: f64,
    /// Height in points.
    pub height: f64,
}

impl CaptureRegion {
    /// Check that the region is non-empty and fits inside `display`.
    #[track_caller]
    pub fn validate_within(&self, display: &DisplayInfo) -> CoreResult<()> {
        let values = [self.x, self.y, self.width, self.height];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(RecordingError::InvalidRegion {
                reason: format!("non-finite coordinates in {:?}", self),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(RecordingError::InvalidRegion {
                reason: format!("empty region {}x{}", self.width, self.height),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.x < 0.0
            || self.y < 0.0
            || self.x + self.width > f64::from(display.width)
            || self.y + self.height > f64::from(display.height)
        {
            return Err(RecordingError::InvalidRegion {
                reason: format!(
                    "region {:?} exceeds display {} bounds {}x{}",
                    self, display.id, display.width, display.height
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(())
    }
}

/// A rectangle in device pixels. Width and height are always even.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelRect {
    /// Copy this rectangle out of a BGRA image whose rows are `bytes_per_row`
    /// apart. The result is tightly packed. `None` if the rectangle does not
    /// fit inside `data`.
    pub fn crop_bgra(&self, data: &[u8], bytes_per_row: usize) -> Option<Vec<u8>> {
        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        let x_offset = self.x as usize * BYTES_PER_PIXEL;
        if x_offset + row_bytes > bytes_per_row {
            return None;
        }

        let mut cropped = Vec::with_capacity(row_bytes * self.height as usize);
        for row in self.y as usize..(self.y + self.height) as usize {
            let start = row * bytes_per_row + x_offset;
            cropped.extend_from_slice(data.get(start..start + row_bytes)?);
        }
        Some(cropped)
    }
}

/// H.264 with 4:2:0 chroma needs even dimensions.
fn even_pixels(points: f64, scale: f64) -> u32 {
    let pixels = (points * scale).round().max(2.0) as u32;
    pixels & !1
}

/// Which display, region and surfaces a capture stream covers.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentFilter {
    /// Display to capture.
    pub display: DisplayInfo,
    /// Sub-region of the display; `None` captures the whole display.
    pub region: Option<CaptureRegion>,
    /// Surfaces that must never appear in the output.
    pub excluded_surface_ids: BTreeSet<SurfaceId>,
}

impl ContentFilter {
    /// Full display size in device pixels.
    pub fn display_pixels(&self) -> PixelRect {
        let scale = self.display.scale_factor;
        PixelRect {
            x: 0,
            y: 0,
            width: even_pixels(f64::from(self.display.width), scale),
            height: even_pixels(f64::from(self.display.height), scale),
        }
    }

    /// Captured area in device pixels: the region, or the whole display.
    pub fn pixel_rect(&self) -> PixelRect {
        let full = self.display_pixels();
        let Some(region) = self.region else {
            return full;
        };

        let scale = self.display.scale_factor;
        let x = ((region.x * scale).round() as u32).min(full.width.saturating_sub(2));
        let y = ((region.y * scale).round() as u32).min(full.height.saturating_sub(2));
        let width = even_pixels(region.width, scale).min((full.width - x) & !1);
        let height = even_pixels(region.height, scale).min((full.height - y) & !1);

        PixelRect {
            x,
            y,
            width,
            height,
        }
    }
}

/// Pixel layout delivered by the capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit blue, green, red, alpha.
    Bgra,
}

impl PixelFormat {
    /// Name understood by ffmpeg's rawvideo demuxer.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            PixelFormat::Bgra => "bgra",
        }
    }
}

/// Capture stream configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Target frames per second.
    pub frame_rate: u32,
    /// Pixel layout of delivered frames.
    pub pixel_format: PixelFormat,
    /// Whether the cursor is drawn into frames.
    pub shows_cursor: bool,
    /// Whether system audio is delivered alongside video.
    pub captures_audio: bool,
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Audio channel count.
    pub channel_count: u16,
}

impl StreamConfig {
    /// Resolve a content filter into the stream configuration used for recording.
    pub fn for_filter(filter: &ContentFilter, captures_audio: bool) -> Self {
        let rect = filter.pixel_rect();
        Self {
            width: rect.width,
            height: rect.height,
            frame_rate: TARGET_FRAME_RATE,
            pixel_format: PixelFormat::Bgra,
            shows_cursor: true,
            captures_audio,
            sample_rate: AUDIO_SAMPLE_RATE,
            channel_count: AUDIO_CHANNELS,
        }
    }

    /// Shortest allowed gap between two delivered frames.
    pub fn minimum_frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }
}

/// One raw video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Presentation timestamp.
    pub pts: Duration,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row stride of `data` in bytes.
    pub bytes_per_row: usize,
    /// BGRA pixel data.
    pub data: Vec<u8>,
    /// False for idle/status frames that carry no usable image.
    pub is_valid: bool,
}

/// One chunk of interleaved f32 little-endian audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Presentation timestamp of the first sample.
    pub pts: Duration,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Raw interleaved samples.
    pub data: Vec<u8>,
}

impl AudioChunk {
    /// Number of sample frames (one sample per channel) in this chunk.
    pub fn frame_count(&self) -> usize {
        let frame_bytes = 4 * usize::from(self.channels.max(1));
        self.data.len() / frame_bytes
    }
}

/// A media sample pushed by the capture subsystem.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSample {
    /// A screen frame.
    Video(VideoFrame),
    /// A chunk of system audio.
    Audio(AudioChunk),
}

impl MediaSample {
    /// Presentation timestamp of the sample.
    pub fn pts(&self) -> Duration {
        match self {
            MediaSample::Video(frame) => frame.pts,
            MediaSample::Audio(chunk) => chunk.pts,
        }
    }
}
