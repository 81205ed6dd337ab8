use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a [`RecordingSession`](crate::RecordingSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// No recording. The only state a start is accepted in.
    #[default]
    Idle,
    /// Writer and capture stream are being set up.
    Preparing,
    /// Samples are flowing into the writer.
    Recording,
    /// Capture has been asked to stop and the writer is finalizing.
    Stopping,
}

impl SessionState {
    /// Preparing, Recording or Stopping.
    pub fn is_active(self) -> bool {
        self != SessionState::Idle
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Preparing => "preparing",
            SessionState::Recording => "recording",
            SessionState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}
