//! In-memory stand-ins for the capture, writer, remux and clipboard ports.

use crate::{
    AudioChunk, CaptureBackend, CaptureStream, ClipboardService, ContainerWriter, ContentFilter,
    CoreResult, DisplayInfo, ExportError, ExportResult, FinishedContainer, MediaSample,
    RecordingError, Remuxer, SampleHandler, StreamConfig, VideoFrame, WriterFactory, WriterInput,
    WriterSettings,
};

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use error_location::ErrorLocation;

pub const MAIN_DISPLAY_ID: u32 = 1;

/// 1920x1080 points at 2x.
pub fn retina_display() -> DisplayInfo {
    DisplayInfo {
        id: MAIN_DISPLAY_ID,
        width: 1920,
        height: 1080,
        scale_factor: 2.0,
    }
}

pub fn video_frame(pts_ms: u64, valid: bool) -> MediaSample {
    MediaSample::Video(VideoFrame {
        pts: Duration::from_millis(pts_ms),
        width: 4,
        height: 2,
        bytes_per_row: 16,
        data: vec![0u8; 32],
        is_valid: valid,
    })
}

pub fn audio_chunk(pts_ms: u64) -> MediaSample {
    MediaSample::Audio(AudioChunk {
        pts: Duration::from_millis(pts_ms),
        sample_rate: 48_000,
        channels: 2,
        data: vec![0u8; 8 * 480],
    })
}

#[track_caller]
fn location() -> ErrorLocation {
    ErrorLocation::from(std::panic::Location::caller())
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Writer input that records what it accepted.
#[derive(Default)]
pub struct FakeWriterInput {
    pub busy: AtomicBool,
    pub finished: AtomicBool,
    pub appended: Mutex<Vec<MediaSample>>,
}

impl FakeWriterInput {
    pub fn appended_pts(&self) -> Vec<Duration> {
        self.appended.lock().unwrap().iter().map(|s| s.pts()).collect()
    }
}

impl WriterInput for FakeWriterInput {
    fn is_ready(&self) -> bool {
        !self.busy.load(Ordering::SeqCst) && !self.finished.load(Ordering::SeqCst)
    }

    fn append(&self, sample: MediaSample) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.appended.lock().unwrap().push(sample);
        true
    }

    fn mark_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}

/// What happened to one fake writer.
pub struct WriterRecord {
    pub output: PathBuf,
    pub settings: WriterSettings,
    pub video: Arc<FakeWriterInput>,
    pub audio: Option<Arc<FakeWriterInput>>,
    pub started: AtomicBool,
    pub finished: AtomicBool,
    pub cancelled: AtomicBool,
    pub dropped: AtomicBool,
}

pub struct FakeWriter {
    record: Arc<WriterRecord>,
    fail_start: bool,
    fail_finish: bool,
}

#[async_trait]
impl ContainerWriter for FakeWriter {
    fn video_input(&self) -> Arc<dyn WriterInput> {
        self.record.video.clone()
    }

    fn audio_input(&self) -> Option<Arc<dyn WriterInput>> {
        self.record
            .audio
            .clone()
            .map(|a| a as Arc<dyn WriterInput>)
    }

    fn start(&mut self) -> CoreResult<()> {
        if self.fail_start {
            return Err(RecordingError::WriterFailed {
                reason: "encoder unavailable".to_string(),
                location: location(),
            });
        }
        self.record.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> CoreResult<FinishedContainer> {
        tokio::fs::write(&self.record.output, b"fake mp4").await?;
        if self.fail_finish {
            return Err(RecordingError::WriterFailed {
                reason: "finalize failed".to_string(),
                location: location(),
            });
        }
        self.record.finished.store(true, Ordering::SeqCst);
        // Like the real writer: an audio track exists only if audio arrived.
        let has_audio = self
            .record
            .audio
            .as_ref()
            .is_some_and(|a| !a.appended.lock().unwrap().is_empty());
        Ok(FinishedContainer {
            path: self.record.output.clone(),
            has_audio,
        })
    }

    async fn cancel(self: Box<Self>) {
        self.record.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Drop for FakeWriter {
    fn drop(&mut self) {
        self.record.dropped.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeWriterFactory {
    pub fail_start: AtomicBool,
    pub fail_finish: AtomicBool,
    pub writers: Mutex<Vec<Arc<WriterRecord>>>,
}

impl FakeWriterFactory {
    pub fn last(&self) -> Arc<WriterRecord> {
        self.writers.lock().unwrap().last().cloned().unwrap()
    }

    pub fn created(&self) -> usize {
        self.writers.lock().unwrap().len()
    }
}

impl WriterFactory for FakeWriterFactory {
    fn create(
        &self,
        output: &Path,
        settings: &WriterSettings,
    ) -> CoreResult<Box<dyn ContainerWriter>> {
        let record = Arc::new(WriterRecord {
            output: output.to_path_buf(),
            settings: settings.clone(),
            video: Arc::new(FakeWriterInput::default()),
            audio: settings
                .audio
                .as_ref()
                .map(|_| Arc::new(FakeWriterInput::default())),
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            dropped: AtomicBool::new(false),
        });
        self.writers.lock().unwrap().push(Arc::clone(&record));

        Ok(Box::new(FakeWriter {
            record,
            fail_start: self.fail_start.load(Ordering::SeqCst),
            fail_finish: self.fail_finish.load(Ordering::SeqCst),
        }))
    }
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

pub struct FakeCaptureBackend {
    pub displays: Vec<DisplayInfo>,
    pub fail_start: AtomicBool,
    pub hang_on_start: AtomicBool,
    pub starts: Mutex<Vec<(ContentFilter, StreamConfig)>>,
    pub stops: Arc<AtomicUsize>,
    handler: Arc<Mutex<Option<Arc<dyn SampleHandler>>>>,
}

impl FakeCaptureBackend {
    pub fn new(displays: Vec<DisplayInfo>) -> Self {
        Self {
            displays,
            fail_start: AtomicBool::new(false),
            hang_on_start: AtomicBool::new(false),
            starts: Mutex::new(Vec::new()),
            stops: Arc::new(AtomicUsize::new(0)),
            handler: Arc::new(Mutex::new(None)),
        }
    }

    /// Deliver a sample as the capture thread would. Dropped once stopped.
    pub fn push(&self, sample: MediaSample) {
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler.handle_sample(sample);
        }
    }

    pub fn last_start(&self) -> (ContentFilter, StreamConfig) {
        self.starts.lock().unwrap().last().cloned().unwrap()
    }

    pub fn start_count(&self) -> usize {
        self.starts.lock().unwrap().len()
    }
}

struct FakeStream {
    stops: Arc<AtomicUsize>,
    handler: Arc<Mutex<Option<Arc<dyn SampleHandler>>>>,
}

#[async_trait]
impl CaptureStream for FakeStream {
    async fn stop(self: Box<Self>) -> CoreResult<()> {
        self.handler.lock().unwrap().take();
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl CaptureBackend for FakeCaptureBackend {
    async fn displays(&self) -> CoreResult<Vec<DisplayInfo>> {
        Ok(self.displays.clone())
    }

    async fn start(
        &self,
        filter: ContentFilter,
        config: StreamConfig,
        handler: Arc<dyn SampleHandler>,
    ) -> CoreResult<Box<dyn CaptureStream>> {
        self.starts.lock().unwrap().push((filter, config));

        if self.hang_on_start.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        if self.fail_start.load(Ordering::SeqCst) {
            return Err(RecordingError::CaptureFailed {
                reason: "screen recording permission denied".to_string(),
                location: location(),
            });
        }

        *self.handler.lock().unwrap() = Some(handler);

        Ok(Box::new(FakeStream {
            stops: Arc::clone(&self.stops),
            handler: Arc::clone(&self.handler),
        }))
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeRemuxer {
    pub fail: AtomicBool,
    pub strip_calls: Mutex<Vec<(PathBuf, PathBuf)>>,
    pub extract_calls: Mutex<Vec<(PathBuf, PathBuf, f64, f64)>>,
}

#[async_trait]
impl Remuxer for FakeRemuxer {
    async fn strip_audio(&self, src: &Path, dst: &Path) -> ExportResult<()> {
        self.strip_calls
            .lock()
            .unwrap()
            .push((src.to_path_buf(), dst.to_path_buf()));

        if self.fail.load(Ordering::SeqCst) {
            tokio::fs::write(dst, b"partial").await?;
            return Err(ExportError::ExportFailed {
                reason: "remux failed".to_string(),
                location: location(),
            });
        }

        tokio::fs::write(dst, b"video only").await?;
        Ok(())
    }

    async fn extract_range(
        &self,
        src: &Path,
        dst: &Path,
        start: f64,
        end: f64,
    ) -> ExportResult<()> {
        self.extract_calls
            .lock()
            .unwrap()
            .push((src.to_path_buf(), dst.to_path_buf(), start, end));

        if self.fail.load(Ordering::SeqCst) {
            tokio::fs::write(dst, b"partial").await?;
            return Err(ExportError::TrimFailed {
                reason: "extract failed".to_string(),
                location: location(),
            });
        }

        tokio::fs::write(dst, b"trimmed").await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeClipboard {
    pub fail: AtomicBool,
    pub published: Mutex<Vec<PathBuf>>,
}

impl ClipboardService for FakeClipboard {
    fn publish_file(&self, path: &Path) -> ExportResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExportError::Clipboard {
                reason: "pasteboard unavailable".to_string(),
                location: location(),
            });
        }
        self.published.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}
