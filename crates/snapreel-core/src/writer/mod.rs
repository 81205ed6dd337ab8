mod ffmpeg;
mod settings;
mod traits;

pub use {
    ffmpeg::FfmpegWriterFactory,
    settings::{
        AUDIO_BITRATE, AudioSettings, VideoCodec, VideoSettings, WriterSettings, video_bitrate,
    },
    traits::{ContainerWriter, FinishedContainer, WriterFactory, WriterInput},
};

#[cfg(test)]
pub(crate) use ffmpeg::frame_slot;
