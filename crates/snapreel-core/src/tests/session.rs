use crate::{
    CaptureRegion, ElapsedCallback, RecordingError, RecordingRequest, RecordingSession,
    SessionState, SurfaceId,
    tests::fakes::{
        FakeCaptureBackend, FakeWriterFactory, MAIN_DISPLAY_ID, audio_chunk, retina_display,
        video_frame,
    },
};

use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tempfile::TempDir;
use tokio::time::{sleep, timeout};

const DURATION_TOLERANCE: f64 = 0.2;

struct Harness {
    capture: Arc<FakeCaptureBackend>,
    writers: Arc<FakeWriterFactory>,
    session: RecordingSession,
    _temp: TempDir,
}

fn harness() -> Harness {
    let temp = TempDir::new().unwrap();
    let capture = Arc::new(FakeCaptureBackend::new(vec![retina_display()]));
    let writers = Arc::new(FakeWriterFactory::default());
    let session = RecordingSession::new(capture.clone(), writers.clone(), temp.path());
    Harness {
        capture,
        writers,
        session,
        _temp: temp,
    }
}

fn no_op() -> ElapsedCallback {
    Arc::new(|_| {})
}

fn request() -> RecordingRequest {
    RecordingRequest::display(MAIN_DISPLAY_ID, true)
}

/// WHAT: A successful start moves the session to Recording
/// WHY: Recording state is what gates stop and the elapsed timer
#[tokio::test]
async fn given_idle_session_when_starting_then_recording_with_started_writer() {
    // Given: An idle session
    let mut h = harness();
    assert_eq!(h.session.state(), SessionState::Idle);

    // When: Starting a full-display recording
    let result = h.session.start_recording(request(), no_op()).await;

    // Then: Recording, writer started before capture, output under the temp dir
    assert!(result.is_ok());
    assert_eq!(h.session.state(), SessionState::Recording);
    let writer = h.writers.last();
    assert!(writer.started.load(Ordering::SeqCst));
    assert!(writer.output.starts_with(h.session.temp_dir()));
    let name = writer.output.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("recording-") && name.ends_with(".mp4"));
    assert_eq!(h.capture.start_count(), 1);
}

/// WHAT: Full-display capture on a 2x display configures 3840x2160 at 60 fps
/// WHY: The capture stream and writer must agree on native resolution
#[tokio::test]
async fn given_retina_display_when_starting_then_stream_and_writer_use_native_pixels() {
    // Given: An idle session on a 1920x1080@2x display
    let mut h = harness();

    // When: Starting
    h.session.start_recording(request(), no_op()).await.unwrap();

    // Then: Stream and writer are 3840x2160 at 60 fps
    let (_, config) = h.capture.last_start();
    assert_eq!((config.width, config.height, config.frame_rate), (3840, 2160, 60));
    let settings = &h.writers.last().settings;
    assert_eq!((settings.video.width, settings.video.height), (3840, 2160));
}

/// WHAT: A second start fails and leaves the running recording alone
/// WHY: Only one recording may exist at a time
#[tokio::test]
async fn given_recording_when_starting_again_then_already_recording() {
    // Given: A recording session
    let mut h = harness();
    h.session.start_recording(request(), no_op()).await.unwrap();

    // When: Starting again
    let result = h.session.start_recording(request(), no_op()).await;

    // Then: AlreadyRecording, state unchanged, no second writer
    assert!(matches!(result, Err(RecordingError::AlreadyRecording { .. })));
    assert_eq!(h.session.state(), SessionState::Recording);
    assert_eq!(h.writers.created(), 1);
}

/// WHAT: Stopping an idle session fails
/// WHY: There is nothing to finalize
#[tokio::test]
async fn given_idle_session_when_stopping_then_not_recording() {
    // Given: An idle session
    let mut h = harness();

    // When: Stopping
    let result = h.session.stop_recording().await;

    // Then: NotRecording and still idle
    assert!(matches!(result, Err(RecordingError::NotRecording { .. })));
    assert_eq!(h.session.state(), SessionState::Idle);
}

/// WHAT: An unknown display fails with DisplayDisconnected before allocating anything
/// WHY: The display may have been unplugged since it was picked
#[tokio::test]
async fn given_missing_display_when_starting_then_display_disconnected() {
    // Given: An idle session
    let mut h = harness();

    // When: Starting on a display that does not exist
    let result = h
        .session
        .start_recording(RecordingRequest::display(42, false), no_op())
        .await;

    // Then: DisplayDisconnected, idle, no writer created
    assert!(matches!(
        result,
        Err(RecordingError::DisplayDisconnected { display_id: 42, .. })
    ));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.writers.created(), 0);
}

/// WHAT: A region outside the display is rejected
/// WHY: Invalid bounds must fail before capture starts
#[tokio::test]
async fn given_out_of_bounds_region_when_starting_then_invalid_region() {
    // Given: A region hanging off the right edge
    let mut h = harness();
    let mut req = request();
    req.region = Some(CaptureRegion { x: 1800.0, y: 0.0, width: 400.0, height: 300.0 });

    // When: Starting
    let result = h.session.start_recording(req, no_op()).await;

    // Then: InvalidRegion and idle
    assert!(matches!(result, Err(RecordingError::InvalidRegion { .. })));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.capture.start_count(), 0);
}

/// WHAT: A capture start failure cancels the writer and resets to Idle
/// WHY: Failed starts must not leave partial files or a stuck state
#[tokio::test]
async fn given_capture_failure_when_starting_then_writer_cancelled_and_idle() {
    // Given: A backend that refuses to start
    let mut h = harness();
    h.capture.fail_start.store(true, Ordering::SeqCst);

    // When: Starting
    let result = h.session.start_recording(request(), no_op()).await;

    // Then: CaptureFailed, writer cancelled, idle, elapsed zero
    assert!(matches!(result, Err(RecordingError::CaptureFailed { .. })));
    assert!(h.writers.last().cancelled.load(Ordering::SeqCst));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert_eq!(h.session.elapsed_time(), Duration::ZERO);
}

/// WHAT: A writer start failure never starts capture
/// WHY: The writer must be accepting before the first sample can arrive
#[tokio::test]
async fn given_writer_failure_when_starting_then_capture_not_started() {
    // Given: A writer that fails to start
    let mut h = harness();
    h.writers.fail_start.store(true, Ordering::SeqCst);

    // When: Starting
    let result = h.session.start_recording(request(), no_op()).await;

    // Then: WriterFailed, no capture, idle
    assert!(matches!(result, Err(RecordingError::WriterFailed { .. })));
    assert_eq!(h.capture.start_count(), 0);
    assert_eq!(h.session.state(), SessionState::Idle);
}

/// WHAT: Dropping the start future mid-preparation resets to Idle
/// WHY: A cancelled start must not leave the session stuck in Preparing
#[tokio::test]
async fn given_start_future_dropped_while_preparing_then_idle() {
    // Given: A backend whose start never confirms
    let mut h = harness();
    h.capture.hang_on_start.store(true, Ordering::SeqCst);

    // When: The start call times out and is dropped
    let result = timeout(
        Duration::from_millis(50),
        h.session.start_recording(request(), no_op()),
    )
    .await;

    // Then: Idle again, the writer released, and a new start is accepted
    assert!(result.is_err());
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.writers.last().dropped.load(Ordering::SeqCst));

    h.capture.hang_on_start.store(false, Ordering::SeqCst);
    assert!(h.session.start_recording(request(), no_op()).await.is_ok());
}

/// WHAT: Region recording without audio has no audio track anywhere
/// WHY: has_audio drives mute handling at export time
#[tokio::test]
async fn given_region_without_audio_when_recording_then_no_audio_track() {
    // Given: A region request with audio disabled and an excluded overlay
    let mut h = harness();
    let req = RecordingRequest {
        display: MAIN_DISPLAY_ID,
        region: Some(CaptureRegion { x: 100.0, y: 100.0, width: 640.0, height: 360.0 }),
        excluded_surfaces: BTreeSet::from([SurfaceId(7)]),
        capture_audio: false,
    };

    // When: Recording and stopping
    h.session.start_recording(req, no_op()).await.unwrap();
    h.capture.push(video_frame(0, true));
    let recording = h.session.stop_recording().await.unwrap();

    // Then: No audio anywhere, filter carries the region and exclusion
    assert!(!recording.has_audio());
    let writer = h.writers.last();
    assert!(writer.audio.is_none());
    assert!(writer.settings.audio.is_none());
    let (filter, config) = h.capture.last_start();
    assert!(!config.captures_audio);
    assert!(filter.excluded_surface_ids.contains(&SurfaceId(7)));
    assert_eq!((config.width, config.height), (1280, 720));
    assert!(recording.source_region().is_some());
}

/// WHAT: Samples pushed by the capture backend reach the writer rebased to zero
/// WHY: The session wires the sink between capture and writer
#[tokio::test]
async fn given_recording_when_samples_arrive_then_writer_receives_rebased_samples() {
    // Given: A recording session
    let mut h = harness();
    h.session.start_recording(request(), no_op()).await.unwrap();

    // When: Audio, then video, then audio arrive
    h.capture.push(audio_chunk(9_950));
    h.capture.push(video_frame(10_000, true));
    h.capture.push(audio_chunk(10_020));

    // Then: Early audio dropped, the rest rebased
    let writer = h.writers.last();
    assert_eq!(writer.video.appended_pts(), vec![Duration::ZERO]);
    assert_eq!(
        writer.audio.as_ref().unwrap().appended_pts(),
        vec![Duration::from_millis(20)]
    );
}

/// WHAT: Stopping finalizes the writer and returns the Recording
/// WHY: The Recording is the hand-off to export
#[tokio::test]
async fn given_recording_when_stopping_then_recording_returned_and_idle() {
    // Given: A recording session with one frame and one audio chunk
    let mut h = harness();
    h.session.start_recording(request(), no_op()).await.unwrap();
    h.capture.push(video_frame(0, true));
    h.capture.push(audio_chunk(10));

    // When: Stopping
    let recording = h.session.stop_recording().await.unwrap();

    // Then: Stream stopped, inputs finished, file exists, idle
    let writer = h.writers.last();
    assert_eq!(h.capture.stops.load(Ordering::SeqCst), 1);
    assert!(writer.video.finished.load(Ordering::SeqCst));
    assert!(writer.audio.as_ref().unwrap().finished.load(Ordering::SeqCst));
    assert!(writer.finished.load(Ordering::SeqCst));
    assert_eq!(recording.temp_file(), writer.output.as_path());
    assert!(recording.temp_file().exists());
    assert!(recording.has_audio());
    assert!(!recording.is_saved());
    assert_eq!(recording.source_display(), MAIN_DISPLAY_ID);
    assert_eq!(h.session.state(), SessionState::Idle);
}

/// WHAT: Audio requested but never delivered yields a Recording without audio
/// WHY: has_audio must describe the container, not the request
#[tokio::test]
async fn given_audio_requested_when_no_audio_arrives_then_recording_has_no_audio() {
    // Given: An audio-enabled recording that only receives video
    let mut h = harness();
    h.session.start_recording(request(), no_op()).await.unwrap();
    h.capture.push(video_frame(0, true));
    h.capture.push(video_frame(16, true));

    // When: Stopping
    let recording = h.session.stop_recording().await.unwrap();

    // Then: The writer had an audio input, but the Recording reports no audio
    assert!(h.writers.last().audio.is_some());
    assert!(!recording.has_audio());
}

/// WHAT: Recording duration matches the time between start and stop
/// WHY: Trim bounds are validated against it
#[tokio::test(start_paused = true)]
async fn given_two_second_recording_when_stopping_then_duration_about_two_seconds() {
    // Given: A recording session
    let mut h = harness();
    h.session.start_recording(request(), no_op()).await.unwrap();

    // When: Two seconds pass before stopping
    sleep(Duration::from_secs(2)).await;
    assert!(h.session.elapsed_time() >= Duration::from_secs(2));
    let recording = h.session.stop_recording().await.unwrap();

    // Then: Duration is two seconds give or take
    assert!(
        (recording.duration() - 2.0).abs() <= DURATION_TOLERANCE,
        "duration {}",
        recording.duration()
    );
    assert_eq!(h.session.elapsed_time(), Duration::ZERO);
}

/// WHAT: The elapsed callback fires while recording and stops afterwards
/// WHY: The UI timer must stop with the recording
#[tokio::test(start_paused = true)]
async fn given_recording_when_time_passes_then_elapsed_callback_fires_until_stop() {
    // Given: A recording with a counting callback
    let mut h = harness();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let callback: ElapsedCallback = Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    h.session.start_recording(request(), callback).await.unwrap();

    // When: Time passes, then the recording stops
    sleep(Duration::from_millis(550)).await;
    h.session.stop_recording().await.unwrap();
    let at_stop = calls.load(Ordering::SeqCst);
    sleep(Duration::from_secs(1)).await;

    // Then: Five ticks while recording, none after
    assert_eq!(at_stop, 5);
    assert_eq!(calls.load(Ordering::SeqCst), at_stop);
}

/// WHAT: A finalize failure removes the temp file and resets to Idle
/// WHY: A broken container must never reach export
#[tokio::test]
async fn given_finalize_failure_when_stopping_then_temp_removed_and_idle() {
    // Given: A writer that fails to finalize
    let mut h = harness();
    h.writers.fail_finish.store(true, Ordering::SeqCst);
    h.session.start_recording(request(), no_op()).await.unwrap();

    // When: Stopping
    let result = h.session.stop_recording().await;

    // Then: WriterFailed, file gone, idle
    assert!(matches!(result, Err(RecordingError::WriterFailed { .. })));
    assert!(!h.writers.last().output.exists());
    assert_eq!(h.session.state(), SessionState::Idle);
}
