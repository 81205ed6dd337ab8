use snapreel_core::{ExportError, RecordingError};

use std::{panic::Location, result::Result as StdResult};

use error_location::ErrorLocation;
use thiserror::Error;

/// Application-level errors for the snapreel binary.
///
/// All variants include `ErrorLocation` for call-site tracking.
#[derive(Error, Debug)]
pub enum AppError {
    /// Recording session error from snapreel-core.
    #[error("Recording error: {source} {location}")]
    Recording {
        /// The underlying recording error.
        #[source]
        source: RecordingError,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Save, trim or clipboard export error from snapreel-core.
    #[error("Export error: {source} {location}")]
    Export {
        /// The underlying export error.
        #[source]
        source: ExportError,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// An export command arrived with no recording to act on.
    #[error("No recording to export {location}")]
    NoRecording {
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Failed to access the system clipboard.
    #[error("Clipboard error: {reason} {location}")]
    ClipboardError {
        /// Human-readable reason for failure.
        reason: String,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Failed to send message through async channel.
    #[error("Channel send failed: {message} {location}")]
    ChannelSendFailed {
        /// Human-readable error message.
        message: String,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// Configuration loading or saving error.
    #[error("Configuration error: {reason} {location}")]
    ConfigError {
        /// Human-readable reason for failure.
        reason: String,
        /// Location where this error was created.
        location: ErrorLocation,
    },

    /// IO error from filesystem operations.
    #[error("IO error: {source} {location}")]
    IoError {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
        /// Location where this error was created.
        location: ErrorLocation,
    },
}

// Manual From impls with location tracking.
// Cannot use #[from] because it does not support extra fields.
impl From<RecordingError> for AppError {
    #[track_caller]
    fn from(source: RecordingError) -> Self {
        AppError::Recording {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ExportError> for AppError {
    #[track_caller]
    fn from(source: ExportError) -> Self {
        AppError::Export {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<std::io::Error> for AppError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        AppError::IoError {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

/// Convenience type alias for Results using `AppError`.
pub type Result<T> = StdResult<T, AppError>;
