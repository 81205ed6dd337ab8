use crate::{
    ExportError, ExportResult,
    media::ffmpeg::{self, FfmpegFailure},
};

use std::{
    panic::Location,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use error_location::ErrorLocation;
use tracing::{info, instrument};

/// Container-level passthrough operations. Nothing is decoded or re-encoded.
#[async_trait]
pub trait Remuxer: Send + Sync {
    /// Write `dst` with only the first video track of `src`.
    async fn strip_audio(&self, src: &Path, dst: &Path) -> ExportResult<()>;

    /// Write `dst` covering `[start, end)` seconds of `src`, all tracks kept.
    async fn extract_range(&self, src: &Path, dst: &Path, start: f64, end: f64)
    -> ExportResult<()>;
}

/// [`Remuxer`] that shells out to ffmpeg with stream copy.
#[derive(Debug, Clone)]
pub struct FfmpegRemuxer {
    ffmpeg: PathBuf,
}

impl FfmpegRemuxer {
    /// Use the ffmpeg executable at `ffmpeg`.
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

#[track_caller]
fn export_error(failure: FfmpegFailure, dst: &Path, trim: bool) -> ExportError {
    let location = ErrorLocation::from(Location::caller());
    if failure.disk_full {
        ExportError::DiskFull {
            path: dst.to_path_buf(),
            location,
        }
    } else if trim {
        ExportError::TrimFailed {
            reason: failure.reason,
            location,
        }
    } else {
        ExportError::ExportFailed {
            reason: failure.reason,
            location,
        }
    }
}

#[async_trait]
impl Remuxer for FfmpegRemuxer {
    #[instrument(skip(self))]
    async fn strip_audio(&self, src: &Path, dst: &Path) -> ExportResult<()> {
        let mut command = ffmpeg::command(&self.ffmpeg);
        command
            .arg("-i")
            .arg(src)
            .args(["-map", "0:v:0", "-c", "copy", "-an", "-movflags", "+faststart"])
            .arg(dst);

        ffmpeg::run(command)
            .await
            .map_err(|e| export_error(e, dst, false))?;

        info!(src = ?src, dst = ?dst, "Audio track stripped");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn extract_range(
        &self,
        src: &Path,
        dst: &Path,
        start: f64,
        end: f64,
    ) -> ExportResult<()> {
        let mut command = ffmpeg::command(&self.ffmpeg);
        command
            .arg("-ss")
            .arg(format!("{:.3}", start))
            .arg("-i")
            .arg(src)
            .arg("-t")
            .arg(format!("{:.3}", end - start))
            // Copying starts at the keyframe before `start`; the pre-roll keeps
            // negative timestamps and the mov muxer hides it with an edit list.
            .args(["-map", "0", "-c", "copy", "-movflags", "+faststart"])
            .arg(dst);

        ffmpeg::run(command)
            .await
            .map_err(|e| export_error(e, dst, true))?;

        info!(src = ?src, dst = ?dst, start, end, "Time range extracted");

        Ok(())
    }
}
