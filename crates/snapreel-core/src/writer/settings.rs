use crate::capture::{PixelFormat, StreamConfig};

/// AAC bitrate in bits per second.
pub const AUDIO_BITRATE: u32 = 128_000;

/// Video codec written to the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// H.264 / AVC.
    H264,
}

/// Video track settings.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSettings {
    /// Codec for the single video track.
    pub codec: VideoCodec,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frames per second.
    pub frame_rate: u32,
    /// Average bitrate in bits per second.
    pub bitrate: u64,
    /// Frames between keyframes.
    pub keyframe_interval: u32,
    /// Layout of incoming raw frames.
    pub pixel_format: PixelFormat,
}

/// Audio track settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// AAC bitrate in bits per second.
    pub bitrate: u32,
}

/// Everything a [`ContainerWriter`](crate::writer::ContainerWriter) needs to open its tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterSettings {
    /// The video track.
    pub video: VideoSettings,
    /// The audio track, present only when audio is captured.
    pub audio: Option<AudioSettings>,
}

impl WriterSettings {
    /// Derive writer settings from the capture stream configuration.
    pub fn for_stream(config: &StreamConfig) -> Self {
        let video = VideoSettings {
            codec: VideoCodec::H264,
            width: config.width,
            height: config.height,
            frame_rate: config.frame_rate,
            bitrate: video_bitrate(config.width, config.height, config.frame_rate),
            keyframe_interval: config.frame_rate.max(1),
            pixel_format: config.pixel_format,
        };

        let audio = config.captures_audio.then(|| AudioSettings {
            sample_rate: config.sample_rate,
            channels: config.channel_count,
            bitrate: AUDIO_BITRATE,
        });

        Self { video, audio }
    }
}

/// Bitrate heuristic: 0.1 bits per pixel per frame.
pub fn video_bitrate(width: u32, height: u32, frame_rate: u32) -> u64 {
    u64::from(width) * u64::from(height) * u64::from(frame_rate) / 10
}
