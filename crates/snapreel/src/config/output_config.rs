use crate::config::{default_mute_audio, default_save_directory};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where and how recordings are saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory saved recordings and clipboard copies land in.
    #[serde(default = "default_save_directory")]
    pub save_directory: PathBuf,

    /// Drop the audio track when saving unless the command says otherwise.
    #[serde(default = "default_mute_audio")]
    pub mute_audio: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_directory: default_save_directory(),
            mute_audio: default_mute_audio(),
        }
    }
}
