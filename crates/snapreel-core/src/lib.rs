//! SnapReel Core Library
//!
//! Screen recording pipeline: a capture backend pushes frames and audio into
//! a lock-free sink, a container writer encodes them to a temp MP4, and the
//! exporter saves, trims, mutes or copies the result.
//!
//! # Example
//!
//! ```no_run
//! use snapreel_core::{
//!     CaptureBackend, CoreResult, ElapsedCallback, FfmpegWriterFactory, RecordingRequest,
//!     RecordingSession,
//! };
//!
//! use std::{sync::Arc, time::Duration};
//!
//! async fn record(capture: Arc<dyn CaptureBackend>) -> CoreResult<()> {
//!     let writers = Arc::new(FfmpegWriterFactory::new("/opt/homebrew/bin/ffmpeg"));
//!     let mut session = RecordingSession::new(capture, writers, std::env::temp_dir());
//!
//!     let on_elapsed: ElapsedCallback = Arc::new(|elapsed| println!("{:?}", elapsed));
//!     session
//!         .start_recording(RecordingRequest::display(1, true), on_elapsed)
//!         .await?;
//!     tokio::time::sleep(Duration::from_secs(3)).await;
//!     let recording = session.stop_recording().await?;
//!
//!     println!("Recorded {:.1}s to {:?}", recording.duration(), recording.temp_file());
//!     Ok(())
//! }
//! ```

mod capture;
mod error;
mod export;
mod media;
mod recording;
mod session;
mod writer;

pub use {
    capture::{
        AUDIO_CHANNELS, AUDIO_SAMPLE_RATE, AudioChunk, BYTES_PER_PIXEL, CaptureBackend,
        CaptureRegion, CaptureStream, ContentFilter, DisplayId, DisplayInfo, MediaSample,
        PixelFormat, PixelRect, SampleHandler, StreamConfig, SurfaceId, TARGET_FRAME_RATE,
        VideoFrame,
    },
    error::{ExportError, ExportResult, RecordingError, Result as CoreResult},
    export::{ClipboardService, Exporter, recording_file_name},
    media::{FfmpegFailure, FfmpegRemuxer, Remuxer, h264_encoder, locate_ffmpeg},
    recording::Recording,
    session::{
        ElapsedCallback, ElapsedTicker, RecordingRequest, RecordingSession, SessionState,
        StreamOutputSink, TICK_INTERVAL,
    },
    writer::{
        AUDIO_BITRATE, AudioSettings, ContainerWriter, FfmpegWriterFactory, FinishedContainer,
        VideoCodec, VideoSettings, WriterFactory, WriterInput, WriterSettings, video_bitrate,
    },
};

#[cfg(all(target_os = "macos", feature = "screencapturekit"))]
pub use capture::ScreenCaptureKitBackend;

#[cfg(test)]
mod tests;
