//! The finished-recording value handed from the session to export.

use crate::capture::{CaptureRegion, DisplayId};

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// A finalized recording backed by a temp file.
///
/// Immutable apart from the saved path, which is recorded once by whoever
/// persisted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    id: Uuid,
    temp_file: PathBuf,
    capture_date: DateTime<Local>,
    source_display: DisplayId,
    source_region: Option<CaptureRegion>,
    duration: f64,
    has_audio: bool,
    saved_path: Option<PathBuf>,
}

impl Recording {
    /// Describe a freshly finalized temp file.
    pub fn new(
        temp_file: PathBuf,
        capture_date: DateTime<Local>,
        source_display: DisplayId,
        source_region: Option<CaptureRegion>,
        duration: f64,
        has_audio: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            temp_file,
            capture_date,
            source_display,
            source_region,
            duration,
            has_audio,
            saved_path: None,
        }
    }

    /// A copy of this recording's descriptor for a trimmed file: new id, new
    /// file and duration, not saved.
    pub(crate) fn trimmed(&self, temp_file: PathBuf, duration: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            temp_file,
            duration,
            saved_path: None,
            ..self.clone()
        }
    }

    /// Unique identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Temp file holding the container.
    pub fn temp_file(&self) -> &Path {
        &self.temp_file
    }

    /// Wall-clock time recording started.
    pub fn capture_date(&self) -> DateTime<Local> {
        self.capture_date
    }

    /// Display the recording was captured from.
    pub fn source_display(&self) -> DisplayId {
        self.source_display
    }

    /// Captured region; `None` for the full display.
    pub fn source_region(&self) -> Option<CaptureRegion> {
        self.source_region
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Whether the container has an audio track.
    pub fn has_audio(&self) -> bool {
        self.has_audio
    }

    /// Where the recording was persisted, if anywhere.
    pub fn saved_path(&self) -> Option<&Path> {
        self.saved_path.as_deref()
    }

    /// Whether the recording has been saved somewhere.
    pub fn is_saved(&self) -> bool {
        self.saved_path.is_some()
    }

    /// Record where the recording was persisted. Only the first call takes
    /// effect; returns whether this call set it.
    pub fn mark_saved(&mut self, path: impl Into<PathBuf>) -> bool {
        if self.saved_path.is_some() {
            return false;
        }
        self.saved_path = Some(path.into());
        true
    }

    /// Delete the temp file.
    pub async fn discard(self) {
        match tokio::fs::remove_file(&self.temp_file).await {
            Ok(()) => debug!(id = %self.id, path = ?self.temp_file, "Recording discarded"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(id = %self.id, error = %e, "Failed to remove recording temp file"),
        }
    }
}
