use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ffmpeg executable configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegConfig {
    /// Explicit path to ffmpeg. When unset, `PATH` and common install
    /// locations are searched.
    #[serde(default)]
    pub binary_path: Option<PathBuf>,
}
