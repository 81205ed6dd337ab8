use crate::{
    ExportError, ExportResult, Recording,
    export::{
        ClipboardService,
        naming::{claim_destination, write_error},
    },
    media::Remuxer,
};

use std::{
    panic::Location,
    path::{Path, PathBuf},
    sync::Arc,
};

use error_location::ErrorLocation;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Save, trim and clipboard operations on finished recordings.
///
/// Stateless apart from its collaborators; distinct recordings can be
/// exported concurrently. Operations never mutate the input recording, so the
/// caller records a successful save with [`Recording::mark_saved`].
pub struct Exporter {
    remuxer: Arc<dyn Remuxer>,
    clipboard: Arc<dyn ClipboardService>,
    default_save_dir: PathBuf,
    temp_dir: PathBuf,
}

impl Exporter {
    /// Create an exporter saving to `default_save_dir` for clipboard copies
    /// and writing trimmed files into `temp_dir`.
    pub fn new(
        remuxer: Arc<dyn Remuxer>,
        clipboard: Arc<dyn ClipboardService>,
        default_save_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            remuxer,
            clipboard,
            default_save_dir: default_save_dir.into(),
            temp_dir: temp_dir.into(),
        }
    }

    /// Directory used by [`Exporter::copy_to_clipboard`].
    pub fn default_save_dir(&self) -> &Path {
        &self.default_save_dir
    }

    /// Persist `recording` into `destination_dir` under a collision-free name.
    ///
    /// With `mute_audio` and an audio track, only the video track is kept.
    ///
    /// # Errors
    ///
    /// `InvalidSaveLocation` if the directory is not writable, `DiskFull` if
    /// the volume fills up. Partial output is removed on failure.
    #[instrument(skip(self, recording), fields(id = %recording.id()))]
    pub async fn save(
        &self,
        recording: &Recording,
        destination_dir: &Path,
        mute_audio: bool,
    ) -> ExportResult<PathBuf> {
        check_writable(destination_dir)?;

        let destination = claim_destination(destination_dir, &recording.capture_date()).await?;
        let strip = mute_audio && recording.has_audio();

        let result = if strip {
            self.remuxer
                .strip_audio(recording.temp_file(), &destination)
                .await
        } else {
            tokio::fs::copy(recording.temp_file(), &destination)
                .await
                .map(|_| ())
                .map_err(|e| write_error(e, &destination))
        };

        if let Err(e) = result {
            warn!(path = ?destination, error = %e, "Save failed, removing partial file");
            let _ = tokio::fs::remove_file(&destination).await;
            return Err(e);
        }

        info!(path = ?destination, muted = strip, "Recording saved");

        Ok(destination)
    }

    /// Cut `[start, end)` seconds into a new recording.
    ///
    /// On success the original temp file is deleted and the returned
    /// recording owns the trimmed file.
    ///
    /// # Errors
    ///
    /// `InvalidTimeRange` unless `0 <= start < end <= duration`.
    #[instrument(skip(self, recording), fields(id = %recording.id()))]
    pub async fn trim(
        &self,
        recording: &Recording,
        start: f64,
        end: f64,
    ) -> ExportResult<Recording> {
        let duration = recording.duration();
        if !(start.is_finite() && end.is_finite() && 0.0 <= start && start < end && end <= duration)
        {
            return Err(ExportError::InvalidTimeRange {
                start,
                end,
                duration,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let destination = self
            .temp_dir
            .join(format!("trimmed-{}.mp4", Uuid::new_v4()));

        if let Err(e) = self
            .remuxer
            .extract_range(recording.temp_file(), &destination, start, end)
            .await
        {
            warn!(error = %e, "Trim failed, removing partial file");
            let _ = tokio::fs::remove_file(&destination).await;
            return Err(e);
        }

        if let Err(e) = tokio::fs::remove_file(recording.temp_file()).await {
            warn!(
                path = ?recording.temp_file(),
                error = %e,
                "Failed to remove untrimmed temp file"
            );
        }

        let trimmed = recording.trimmed(destination, end - start);

        info!(
            new_id = %trimmed.id(),
            start,
            end,
            duration = trimmed.duration(),
            "Recording trimmed"
        );

        Ok(trimmed)
    }

    /// Save to the default directory and put the saved file on the clipboard.
    #[instrument(skip(self, recording), fields(id = %recording.id()))]
    pub async fn copy_to_clipboard(
        &self,
        recording: &Recording,
        mute_audio: bool,
    ) -> ExportResult<PathBuf> {
        let path = self
            .save(recording, &self.default_save_dir, mute_audio)
            .await?;

        self.clipboard.publish_file(&path)?;

        info!(path = ?path, "Recording copied to clipboard");

        Ok(path)
    }
}

/// Probe `dir` by creating and removing a temp file in it.
#[track_caller]
fn check_writable(dir: &Path) -> ExportResult<()> {
    let invalid = |reason: String| ExportError::InvalidSaveLocation {
        path: dir.to_path_buf(),
        reason,
        location: ErrorLocation::from(Location::caller()),
    };

    if !dir.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }

    tempfile::Builder::new()
        .prefix(".snapreel-probe")
        .tempfile_in(dir)
        .map_err(|e| invalid(format!("not writable: {}", e)))?;

    debug!(dir = ?dir, "Save location writable");

    Ok(())
}
