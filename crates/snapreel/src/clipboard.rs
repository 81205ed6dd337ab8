//! Clipboard integration for saved recordings.

use crate::{AppError, AppResult};

use snapreel_core::{ClipboardService, ExportError, ExportResult};

use std::{panic::Location, path::Path, sync::Mutex};

use arboard::Clipboard;
use error_location::ErrorLocation;
use tracing::{debug, info, instrument};

/// [`ClipboardService`] backed by the system clipboard.
pub struct ArboardClipboard {
    pub(crate) clipboard: Mutex<Clipboard>,
}

impl ArboardClipboard {
    /// Open the system clipboard.
    #[track_caller]
    #[instrument]
    pub fn new() -> AppResult<Self> {
        let clipboard = Clipboard::new().map_err(|e| AppError::ClipboardError {
            reason: format!("Failed to initialize clipboard: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!("Clipboard initialized");

        Ok(Self {
            clipboard: Mutex::new(clipboard),
        })
    }
}

impl ClipboardService for ArboardClipboard {
    #[instrument(skip(self))]
    fn publish_file(&self, path: &Path) -> ExportResult<()> {
        let mut clipboard = self.clipboard.lock().map_err(|e| ExportError::Clipboard {
            reason: format!("Clipboard lock poisoned: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        clipboard
            .set()
            .file_list(&[path])
            .map_err(|e| ExportError::Clipboard {
                reason: format!("Failed to set clipboard: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        debug!(path = ?path, "File published to clipboard");

        Ok(())
    }
}
