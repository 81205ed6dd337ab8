mod backend;
#[cfg(all(target_os = "macos", feature = "screencapturekit"))]
mod sck;
mod types;

pub use {
    backend::{CaptureBackend, CaptureStream, SampleHandler},
    types::{
        AUDIO_CHANNELS, AUDIO_SAMPLE_RATE, AudioChunk, BYTES_PER_PIXEL, CaptureRegion,
        ContentFilter, DisplayId, DisplayInfo, MediaSample, PixelFormat, PixelRect, StreamConfig,
        SurfaceId, TARGET_FRAME_RATE, VideoFrame,
    },
};

#[cfg(all(target_os = "macos", feature = "screencapturekit"))]
pub use sck::ScreenCaptureKitBackend;

#[cfg(test)]
pub(crate) use backend::run_blocking_capture;
