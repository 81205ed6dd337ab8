use crate::{ExportError, ExportResult};

use std::{
    io::ErrorKind,
    panic::Location,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use error_location::ErrorLocation;
use tokio::fs::OpenOptions;
use tracing::debug;

/// Collision suffixes tried before giving up.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// `Recording YYYY-MM-DD at HH.MM.SS.mp4`, with ` (n)` before the extension
/// when `index` is non-zero.
pub fn recording_file_name(date: &DateTime<Local>, index: u32) -> String {
    let stem = date.format("Recording %Y-%m-%d at %H.%M.%S");
    if index == 0 {
        format!("{}.mp4", stem)
    } else {
        format!("{} ({}).mp4", stem, index)
    }
}

/// Map an IO error while writing `path`, reporting a full volume as `DiskFull`.
#[track_caller]
pub(crate) fn write_error(source: std::io::Error, path: &Path) -> ExportError {
    if source.kind() == ErrorKind::StorageFull {
        ExportError::DiskFull {
            path: path.to_path_buf(),
            location: ErrorLocation::from(Location::caller()),
        }
    } else {
        ExportError::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Create an empty destination file under the first free name.
///
/// `create_new` makes the claim atomic, so two saves of the same capture
/// date never share a path.
pub(crate) async fn claim_destination(
    dir: &Path,
    date: &DateTime<Local>,
) -> ExportResult<PathBuf> {
    claim_destination_within(dir, date, MAX_NAME_ATTEMPTS).await
}

/// [`claim_destination`] trying at most `attempts` names.
pub(crate) async fn claim_destination_within(
    dir: &Path,
    date: &DateTime<Local>,
    attempts: u32,
) -> ExportResult<PathBuf> {
    for index in 0..attempts {
        let path = dir.join(recording_file_name(date, index));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => {
                debug!(path = ?path, "Destination claimed");
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(write_error(e, &path)),
        }
    }

    Err(ExportError::InvalidSaveLocation {
        path: dir.to_path_buf(),
        reason: format!("no free file name after {} attempts", attempts),
        location: ErrorLocation::from(Location::caller()),
    })
}
