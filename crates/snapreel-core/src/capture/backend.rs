use crate::{
    CoreResult, RecordingError,
    capture::{ContentFilter, DisplayInfo, MediaSample, StreamConfig},
};

use std::{panic::Location, sync::Arc};

use async_trait::async_trait;
use error_location::ErrorLocation;

/// Receives samples pushed by a capture stream.
///
/// Called on the capture subsystem's delivery thread. Implementations must
/// return promptly and never block on the control task.
pub trait SampleHandler: Send + Sync {
    /// Consume one sample.
    fn handle_sample(&self, sample: MediaSample);
}

/// A running capture stream.
#[async_trait]
pub trait CaptureStream: Send {
    /// Stop the stream. Once this returns, no further samples are delivered.
    async fn stop(self: Box<Self>) -> CoreResult<()>;
}

/// OS capture subsystem.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Displays currently available for capture.
    async fn displays(&self) -> CoreResult<Vec<DisplayInfo>>;

    /// Start capturing `filter` with `config`, delivering samples to `handler`.
    ///
    /// Resolves once the stream has confirmed capture start.
    async fn start(
        &self,
        filter: ContentFilter,
        config: StreamConfig,
        handler: Arc<dyn SampleHandler>,
    ) -> CoreResult<Box<dyn CaptureStream>>;
}

/// Run a synchronous capture-framework call on the blocking pool so the
/// calling runtime thread stays free.
#[cfg_attr(
    not(any(test, all(target_os = "macos", feature = "screencapturekit"))),
    allow(dead_code)
)]
pub(crate) async fn run_blocking_capture<T, F>(what: &'static str, f: F) -> CoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> CoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RecordingError::CaptureFailed {
            reason: format!("{} task failed: {}", what, e),
            location: ErrorLocation::from(Location::caller()),
        })?
}
