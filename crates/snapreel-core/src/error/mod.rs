use std::{panic::Location, path::PathBuf};

use error_location::ErrorLocation;
use thiserror::Error;

/// Recording session errors with source location tracking.
#[derive(Error, Debug)]
pub enum RecordingError {
    /// A recording is already preparing, running or stopping.
    #[error("A recording is already in progress {location}")]
    AlreadyRecording {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Stop was requested while no recording is running.
    #[error("No recording in progress {location}")]
    NotRecording {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The requested display is no longer attached.
    #[error("Display {display_id} is disconnected {location}")]
    DisplayDisconnected {
        /// Identifier of the missing display.
        display_id: u32,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The capture region is empty or outside the display bounds.
    #[error("Invalid capture region: {reason} {location}")]
    InvalidRegion {
        /// Why the region was rejected.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The capture subsystem failed to start or stop.
    #[error("Capture failed: {reason} {location}")]
    CaptureFailed {
        /// Diagnostic from the capture subsystem.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The container writer failed to start or finalize.
    #[error("Writer failed: {reason} {location}")]
    WriterFailed {
        /// Diagnostic from the writer.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Session bookkeeping vanished while the session was active.
    #[error("Recording metadata lost: {reason} {location}")]
    MetadataLost {
        /// Which piece of bookkeeping was missing.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Filesystem error while preparing the output file.
    #[error("IO error: {source} {location}")]
    Io {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl From<std::io::Error> for RecordingError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        RecordingError::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Export, trim and clipboard errors with source location tracking.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The destination directory is missing or not writable.
    #[error("Cannot save to {path:?}: {reason} {location}")]
    InvalidSaveLocation {
        /// The rejected destination directory.
        path: PathBuf,
        /// Why the location was rejected.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The destination volume ran out of space.
    #[error("Disk full while writing {path:?} {location}")]
    DiskFull {
        /// File that was being written.
        path: PathBuf,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Trim bounds fall outside `0 <= start < end <= duration`.
    #[error("Invalid time range {start}s..{end}s for {duration}s recording {location}")]
    InvalidTimeRange {
        /// Requested start in seconds.
        start: f64,
        /// Requested end in seconds.
        end: f64,
        /// Recording duration in seconds.
        duration: f64,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Passthrough export or copy failed.
    #[error("Export failed: {reason} {location}")]
    ExportFailed {
        /// Diagnostic from the export backend.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Passthrough time-range extraction failed.
    #[error("Trim failed: {reason} {location}")]
    TrimFailed {
        /// Diagnostic from the export backend.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Publishing the saved file to the clipboard failed.
    #[error("Clipboard error: {reason} {location}")]
    Clipboard {
        /// Diagnostic from the clipboard service.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// IO error from filesystem operations.
    #[error("IO error: {source} {location}")]
    Io {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl From<std::io::Error> for ExportError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        ExportError::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Result type alias using [`RecordingError`].
pub type Result<T> = std::result::Result<T, RecordingError>;

/// Result type alias using [`ExportError`].
pub type ExportResult<T> = std::result::Result<T, ExportError>;
