#[allow(clippy::module_inception)]
mod config;
mod ffmpeg_config;
mod output_config;
mod recording_config;

pub(crate) use {
    config::Config, ffmpeg_config::FfmpegConfig, output_config::OutputConfig,
    recording_config::RecordingConfig,
};

use std::path::PathBuf;

use directories::UserDirs;

pub(crate) const DEFAULT_CAPTURE_AUDIO: bool = true;
pub(crate) const DEFAULT_MUTE_AUDIO: bool = false;

pub(crate) fn default_capture_audio() -> bool {
    DEFAULT_CAPTURE_AUDIO
}

pub(crate) fn default_mute_audio() -> bool {
    DEFAULT_MUTE_AUDIO
}

/// The user's Desktop, falling back to the home directory.
pub(crate) fn default_save_directory() -> PathBuf {
    UserDirs::new()
        .map(|dirs| {
            dirs.desktop_dir()
                .map(|d| d.to_path_buf())
                .unwrap_or_else(|| dirs.home_dir().to_path_buf())
        })
        .unwrap_or_else(|| PathBuf::from("."))
}
