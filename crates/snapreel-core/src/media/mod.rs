pub(crate) mod ffmpeg;
mod remux;

pub use {
    ffmpeg::{FfmpegFailure, h264_encoder, locate_ffmpeg},
    remux::{FfmpegRemuxer, Remuxer},
};
