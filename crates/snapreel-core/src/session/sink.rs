use crate::{
    capture::{MediaSample, SampleHandler},
    writer::WriterInput,
};

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use tracing::debug;

/// Routes captured samples into the writer inputs.
///
/// The first valid video frame anchors the timeline; every appended sample is
/// rebased so that frame lands at zero. Anything arriving before the anchor,
/// or while an input is not ready, is dropped.
pub struct StreamOutputSink {
    video: Arc<dyn WriterInput>,
    audio: Option<Arc<dyn WriterInput>>,
    anchor: OnceLock<Duration>,
}

impl StreamOutputSink {
    /// Wire a sink to the given inputs. `audio` is `None` when audio is off.
    pub fn new(video: Arc<dyn WriterInput>, audio: Option<Arc<dyn WriterInput>>) -> Self {
        Self {
            video,
            audio,
            anchor: OnceLock::new(),
        }
    }

    /// Timestamp of the first accepted video frame, once one has arrived.
    pub fn anchor(&self) -> Option<Duration> {
        self.anchor.get().copied()
    }

    /// Mark every input finished.
    pub fn finish_inputs(&self) {
        self.video.mark_finished();
        if let Some(audio) = &self.audio {
            audio.mark_finished();
        }
    }

    fn handle_video(&self, mut sample: MediaSample) {
        let MediaSample::Video(frame) = &mut sample else {
            return;
        };
        if !frame.is_valid {
            return;
        }

        let anchor = *self.anchor.get_or_init(|| {
            debug!(pts = ?frame.pts, "Timeline anchored on first video frame");
            frame.pts
        });

        let Some(pts) = frame.pts.checked_sub(anchor) else {
            return;
        };
        frame.pts = pts;

        if self.video.is_ready() {
            self.video.append(sample);
        }
    }

    fn handle_audio(&self, mut sample: MediaSample) {
        let Some(input) = &self.audio else {
            return;
        };
        let Some(anchor) = self.anchor.get().copied() else {
            return;
        };
        let MediaSample::Audio(chunk) = &mut sample else {
            return;
        };
        let Some(pts) = chunk.pts.checked_sub(anchor) else {
            return;
        };
        chunk.pts = pts;

        if input.is_ready() {
            input.append(sample);
        }
    }
}

impl SampleHandler for StreamOutputSink {
    fn handle_sample(&self, sample: MediaSample) {
        match sample {
            MediaSample::Video(_) => self.handle_video(sample),
            MediaSample::Audio(_) => self.handle_audio(sample),
        }
    }
}
