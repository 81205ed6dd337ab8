use snapreel_core::CaptureRegion;

/// Commands sent from the console to the main application.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Start recording the main display.
    StartRecording {
        /// Sub-region in points; `None` records the whole display.
        region: Option<CaptureRegion>,
    },
    /// Stop the current recording.
    StopRecording,
    /// Save the last recording to the configured directory.
    Save {
        /// Override the configured mute setting.
        mute: Option<bool>,
    },
    /// Replace the last recording with a time range of it.
    Trim {
        /// Start in seconds.
        from: f64,
        /// End in seconds.
        to: f64,
    },
    /// Save the last recording and put it on the clipboard.
    CopyToClipboard {
        /// Override the configured mute setting.
        mute: Option<bool>,
    },
    /// Delete the last recording without saving.
    Discard,
    /// Request application shutdown.
    Shutdown,
}
