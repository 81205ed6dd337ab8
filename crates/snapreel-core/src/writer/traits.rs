use crate::{CoreResult, capture::MediaSample, writer::WriterSettings};

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;

/// One track input of a container writer.
///
/// All methods are non-blocking and callable from the capture delivery thread.
pub trait WriterInput: Send + Sync {
    /// Whether the input can take another sample right now.
    fn is_ready(&self) -> bool;

    /// Hand a sample to the writer. Returns `false` if it was not accepted.
    fn append(&self, sample: MediaSample) -> bool;

    /// No more samples will be appended.
    fn mark_finished(&self);
}

/// A finalized container and the tracks it ended up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedContainer {
    /// Final output path.
    pub path: PathBuf,
    /// An audio track was written. False when audio was configured but no
    /// audio sample ever arrived.
    pub has_audio: bool,
}

/// A container file being written in real time.
#[async_trait]
pub trait ContainerWriter: Send {
    /// Input for the video track.
    fn video_input(&self) -> Arc<dyn WriterInput>;

    /// Input for the audio track, if the container has one.
    fn audio_input(&self) -> Option<Arc<dyn WriterInput>>;

    /// Begin writing. Samples are accepted from now on; the timeline starts
    /// at the first appended sample.
    fn start(&mut self) -> CoreResult<()>;

    /// Flush all tracks and finalize the container.
    async fn finish(self: Box<Self>) -> CoreResult<FinishedContainer>;

    /// Abandon the output and remove any partial files.
    async fn cancel(self: Box<Self>);
}

/// Creates container writers.
pub trait WriterFactory: Send + Sync {
    /// Create a writer for `output` configured with `settings`.
    fn create(
        &self,
        output: &Path,
        settings: &WriterSettings,
    ) -> CoreResult<Box<dyn ContainerWriter>>;
}
