use crate::config::default_capture_audio;

use serde::{Deserialize, Serialize};

/// Capture settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Record system audio alongside the screen.
    #[serde(default = "default_capture_audio")]
    pub capture_audio: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            capture_audio: default_capture_audio(),
        }
    }
}
