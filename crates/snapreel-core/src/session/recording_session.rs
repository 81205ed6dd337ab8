use crate::{
    CoreResult, Recording, RecordingError,
    capture::{
        CaptureBackend, CaptureRegion, CaptureStream, ContentFilter, DisplayId, DisplayInfo,
        SampleHandler, StreamConfig, SurfaceId,
    },
    session::{ElapsedCallback, ElapsedTicker, SessionState, StreamOutputSink},
    writer::{ContainerWriter, WriterFactory, WriterSettings},
};

use std::{
    collections::BTreeSet,
    panic::Location,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Local};
use error_location::ErrorLocation;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// What to record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingRequest {
    /// Display to capture.
    pub display: DisplayId,
    /// Sub-region in points; `None` records the whole display.
    pub region: Option<CaptureRegion>,
    /// Surfaces (overlay windows) kept out of the recording.
    pub excluded_surfaces: BTreeSet<SurfaceId>,
    /// Record system audio alongside video.
    pub capture_audio: bool,
}

impl RecordingRequest {
    /// Full-display request with no exclusions.
    pub fn display(display: DisplayId, capture_audio: bool) -> Self {
        Self {
            display,
            region: None,
            excluded_surfaces: BTreeSet::new(),
            capture_audio,
        }
    }
}

/// Bookkeeping for the active recording.
#[derive(Debug)]
struct SessionMetadata {
    session_id: Uuid,
    output_path: PathBuf,
    display: DisplayId,
    region: Option<CaptureRegion>,
    has_audio: bool,
    started_at: Option<Instant>,
    capture_date: Option<DateTime<Local>>,
}

/// Handles that live exactly as long as the capture does.
struct RunningCapture {
    stream: Box<dyn CaptureStream>,
    writer: Box<dyn ContainerWriter>,
    sink: Arc<StreamOutputSink>,
    ticker: ElapsedTicker,
}

/// Capture stream and writer wired together, not yet committed.
struct Prepared {
    stream: Box<dyn CaptureStream>,
    writer: Box<dyn ContainerWriter>,
    sink: Arc<StreamOutputSink>,
}

/// Resets the session to Idle when dropped unless disarmed.
///
/// Covers early returns and futures dropped mid-await, so the session never
/// stays Preparing or Stopping.
struct ResetGuard<'a> {
    state: &'a mut SessionState,
    metadata: &'a mut Option<SessionMetadata>,
    armed: bool,
}

impl<'a> ResetGuard<'a> {
    fn new(state: &'a mut SessionState, metadata: &'a mut Option<SessionMetadata>) -> Self {
        Self {
            state,
            metadata,
            armed: true,
        }
    }

    /// Preparing succeeded: become Recording and stamp the start.
    fn commit(mut self, started_at: Instant, capture_date: DateTime<Local>) {
        if let Some(metadata) = self.metadata.as_mut() {
            metadata.started_at = Some(started_at);
            metadata.capture_date = Some(capture_date);
        }
        *self.state = SessionState::Recording;
        self.armed = false;
    }
}

impl Drop for ResetGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if *self.state != SessionState::Idle {
                debug!(from = %self.state, "Session reset to idle");
            }
            *self.state = SessionState::Idle;
            *self.metadata = None;
        }
    }
}

/// Owns one recording at a time: capture stream, writer and their lifecycle.
///
/// # Thread Safety
///
/// Control operations take `&mut self`; share the session behind an async
/// mutex. Sample delivery never touches the session, only the sink.
pub struct RecordingSession {
    capture: Arc<dyn CaptureBackend>,
    writers: Arc<dyn WriterFactory>,
    temp_dir: PathBuf,
    state: SessionState,
    metadata: Option<SessionMetadata>,
    running: Option<RunningCapture>,
}

impl RecordingSession {
    /// Create an idle session writing temp files into `temp_dir`.
    pub fn new(
        capture: Arc<dyn CaptureBackend>,
        writers: Arc<dyn WriterFactory>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            capture,
            writers,
            temp_dir: temp_dir.into(),
            state: SessionState::Idle,
            metadata: None,
            running: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Directory temp recordings are written to.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Displays the capture backend can record.
    pub async fn displays(&self) -> CoreResult<Vec<DisplayInfo>> {
        self.capture.displays().await
    }

    /// Time since recording started; zero unless Recording.
    pub fn elapsed_time(&self) -> Duration {
        if self.state != SessionState::Recording {
            return Duration::ZERO;
        }
        self.metadata
            .as_ref()
            .and_then(|m| m.started_at)
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    /// Start recording.
    ///
    /// Resolves once the capture stream has confirmed start. `on_elapsed` is
    /// called every 100 ms with the elapsed time until the recording stops.
    ///
    /// # Errors
    ///
    /// `AlreadyRecording` unless Idle. Any failure while preparing leaves the
    /// session Idle with partial output removed.
    #[instrument(skip(self, on_elapsed))]
    pub async fn start_recording(
        &mut self,
        request: RecordingRequest,
        on_elapsed: ElapsedCallback,
    ) -> CoreResult<()> {
        if self.state != SessionState::Idle {
            warn!(state = %self.state, "Start rejected, session busy");
            return Err(RecordingError::AlreadyRecording {
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let session_id = Uuid::new_v4();
        let output_path = self.temp_dir.join(format!("recording-{}.mp4", session_id));

        self.metadata = Some(SessionMetadata {
            session_id,
            output_path: output_path.clone(),
            display: request.display,
            region: request.region,
            has_audio: request.capture_audio,
            started_at: None,
            capture_date: None,
        });
        self.state = SessionState::Preparing;
        let guard = ResetGuard::new(&mut self.state, &mut self.metadata);

        let prepared = prepare(
            self.capture.as_ref(),
            self.writers.as_ref(),
            &self.temp_dir,
            &output_path,
            &request,
        )
        .await?;

        let started_at = Instant::now();
        let ticker = ElapsedTicker::start(started_at, on_elapsed);
        guard.commit(started_at, Local::now());

        self.running = Some(RunningCapture {
            stream: prepared.stream,
            writer: prepared.writer,
            sink: prepared.sink,
            ticker,
        });

        info!(
            session_id = %session_id,
            display = request.display,
            region = ?request.region,
            audio = request.capture_audio,
            "Recording started"
        );

        Ok(())
    }

    /// Stop recording and finalize the temp file.
    ///
    /// # Errors
    ///
    /// `NotRecording` unless Recording. On a writer failure the temp file is
    /// removed. The session is Idle afterwards in every case.
    #[instrument(skip(self))]
    pub async fn stop_recording(&mut self) -> CoreResult<Recording> {
        if self.state != SessionState::Recording {
            warn!(state = %self.state, "Stop rejected, not recording");
            return Err(RecordingError::NotRecording {
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let stopped_at = Instant::now();
        self.state = SessionState::Stopping;

        let running = self.running.take();
        let metadata = self.metadata.take();
        let _reset = ResetGuard::new(&mut self.state, &mut self.metadata);

        let (Some(running), Some(metadata)) = (running, metadata) else {
            error!("Recording bookkeeping missing at stop");
            return Err(RecordingError::MetadataLost {
                reason: "running capture or session metadata missing".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let (Some(started_at), Some(capture_date)) = (metadata.started_at, metadata.capture_date)
        else {
            error!(session_id = %metadata.session_id, "Start instant missing at stop");
            running.writer.cancel().await;
            return Err(RecordingError::MetadataLost {
                reason: "start instant missing".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let duration = stopped_at.duration_since(started_at).as_secs_f64();

        let RunningCapture {
            stream,
            writer,
            sink,
            ticker,
        } = running;

        if let Err(e) = stream.stop().await {
            warn!(error = %e, "Capture stream did not confirm stop, finalizing anyway");
        }
        ticker.cancel();
        sink.finish_inputs();

        let finished = match writer.finish().await {
            Ok(finished) => finished,
            Err(e) => {
                error!(session_id = %metadata.session_id, error = %e, "Finalize failed");
                if let Err(rm) = tokio::fs::remove_file(&metadata.output_path).await
                    && rm.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(path = ?metadata.output_path, error = %rm, "Failed to remove temp file");
                }
                return Err(e);
            }
        };

        if metadata.has_audio && !finished.has_audio {
            warn!(session_id = %metadata.session_id, "Audio was requested but none was written");
        }

        info!(
            session_id = %metadata.session_id,
            duration_secs = duration,
            path = ?finished.path,
            has_audio = finished.has_audio,
            "Recording stopped"
        );

        Ok(Recording::new(
            finished.path,
            capture_date,
            metadata.display,
            metadata.region,
            duration,
            finished.has_audio,
        ))
    }
}

#[track_caller]
fn display_disconnected(display_id: DisplayId) -> RecordingError {
    RecordingError::DisplayDisconnected {
        display_id,
        location: ErrorLocation::from(Location::caller()),
    }
}

/// Resolve the display, create and start the writer, then start capture.
/// The writer is cancelled if anything after its creation fails.
async fn prepare(
    capture: &dyn CaptureBackend,
    writers: &dyn WriterFactory,
    temp_dir: &Path,
    output_path: &Path,
    request: &RecordingRequest,
) -> CoreResult<Prepared> {
    let display = capture
        .displays()
        .await?
        .into_iter()
        .find(|d| d.id == request.display)
        .ok_or_else(|| display_disconnected(request.display))?;

    if let Some(region) = &request.region {
        region.validate_within(&display)?;
    }

    let filter = ContentFilter {
        display,
        region: request.region,
        excluded_surface_ids: request.excluded_surfaces.clone(),
    };
    let config = StreamConfig::for_filter(&filter, request.capture_audio);
    let settings = WriterSettings::for_stream(&config);

    debug!(
        width = config.width,
        height = config.height,
        fps = config.frame_rate,
        bitrate = settings.video.bitrate,
        "Stream configured"
    );

    tokio::fs::create_dir_all(temp_dir).await?;

    let mut writer = writers.create(output_path, &settings)?;
    if let Err(e) = writer.start() {
        writer.cancel().await;
        return Err(e);
    }

    let sink = Arc::new(StreamOutputSink::new(
        writer.video_input(),
        writer.audio_input(),
    ));
    let handler: Arc<dyn SampleHandler> = Arc::clone(&sink) as Arc<dyn SampleHandler>;

    match capture.start(filter, config, handler).await {
        Ok(stream) => Ok(Prepared {
            stream,
            writer,
            sink,
        }),
        Err(e) => {
            writer.cancel().await;
            Err(e)
        }
    }
}
