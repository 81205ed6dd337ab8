//! Container writer that encodes through ffmpeg child processes.
//!
//! Each track has a depth-one channel feeding a worker thread that owns an
//! encoder process. Video is piped as raw frames into an H.264 encoder; audio
//! is piped as f32le into an AAC encoder. On finish the two intermediates are
//! muxed with stream copy into the final MP4.

use crate::{
    CoreResult, RecordingError,
    capture::{BYTES_PER_PIXEL, MediaSample, VideoFrame},
    media::ffmpeg as ffmpeg_cmd,
    writer::{
        AudioSettings, ContainerWriter, FinishedContainer, VideoSettings, WriterFactory,
        WriterInput, WriterSettings,
    },
};

use std::{
    io::{Read, Write},
    panic::Location,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
};

use async_trait::async_trait;
use error_location::ErrorLocation;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Samples queued per track. One means at most one sample in flight.
const TRACK_QUEUE_DEPTH: usize = 1;

/// Audio gaps shorter than this many milliseconds are not padded.
const AUDIO_GAP_TOLERANCE_MS: u64 = 20;

/// Sample frames of silence written per padding block.
const SILENCE_BLOCK_FRAMES: u64 = 4096;

/// Creates [`FfmpegWriter`]s.
#[derive(Debug, Clone)]
pub struct FfmpegWriterFactory {
    ffmpeg: PathBuf,
}

impl FfmpegWriterFactory {
    /// Use the ffmpeg executable at `ffmpeg`.
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl WriterFactory for FfmpegWriterFactory {
    fn create(
        &self,
        output: &Path,
        settings: &WriterSettings,
    ) -> CoreResult<Box<dyn ContainerWriter>> {
        Ok(Box::new(FfmpegWriter::new(&self.ffmpeg, output, settings)))
    }
}

enum Packet {
    Sample(MediaSample),
    Finish,
}

struct TrackInput {
    label: &'static str,
    tx: mpsc::Sender<Packet>,
    accepting: AtomicBool,
    finished: AtomicBool,
}

impl TrackInput {
    fn open(&self) -> bool {
        self.accepting.load(Ordering::Acquire) && !self.finished.load(Ordering::Acquire)
    }
}

impl WriterInput for TrackInput {
    fn is_ready(&self) -> bool {
        self.open() && self.tx.capacity() > 0
    }

    fn append(&self, sample: MediaSample) -> bool {
        self.open() && self.tx.try_send(Packet::Sample(sample)).is_ok()
    }

    fn mark_finished(&self) {
        if !self.finished.swap(true, Ordering::AcqRel) {
            debug!(track = self.label, "Track input finished");
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TrackReport {
    /// Video frames or audio sample frames written to the encoder.
    units_written: u64,
}

type WorkerHandle = JoinHandle<Result<TrackReport, String>>;

struct Track {
    input: Arc<TrackInput>,
    rx: Option<mpsc::Receiver<Packet>>,
    worker: Option<WorkerHandle>,
    intermediate: PathBuf,
}

impl Track {
    fn new(label: &'static str, intermediate: PathBuf) -> Self {
        let (tx, rx) = mpsc::channel(TRACK_QUEUE_DEPTH);
        Self {
            input: Arc::new(TrackInput {
                label,
                tx,
                accepting: AtomicBool::new(false),
                finished: AtomicBool::new(false),
            }),
            rx: Some(rx),
            worker: None,
            intermediate,
        }
    }

    /// Close the input and wake the worker.
    async fn close(&self) {
        self.input.mark_finished();
        // Err means the worker already exited.
        let _ = self.input.tx.send(Packet::Finish).await;
    }

    /// Close without waiting for queue space; the worker checks the cancel
    /// flag after every packet.
    fn close_now(&self) {
        self.input.mark_finished();
        let _ = self.input.tx.try_send(Packet::Finish);
    }

    async fn join(&mut self) -> Result<TrackReport, String> {
        let Some(handle) = self.worker.take() else {
            return Err(format!("{} worker was never started", self.input.label));
        };
        let label = self.input.label;

        let joined = tokio::task::spawn_blocking(move || handle.join())
            .await
            .map_err(|e| format!("Failed to join {} worker: {}", label, e))?;

        joined.map_err(|_| format!("{} worker panicked", label))?
    }
}

/// An encoder child process with its stdin pipe and a stderr drain.
struct Encoder {
    label: &'static str,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<Vec<u8>>>,
}

impl Encoder {
    fn spawn(label: &'static str, mut command: Command) -> Result<Self, String> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| format!("Failed to spawn {} encoder: {}", label, e))?;

        let stdin = child.stdin.take();
        // Drained on its own thread so a chatty encoder never blocks on a full pipe.
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        Ok(Self {
            label,
            child,
            stdin,
            stderr,
        })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), String> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| format!("{} encoder stdin closed", self.label))?;
        stdin
            .write_all(bytes)
            .map_err(|e| format!("Failed to write to {} encoder: {}", self.label, e))
    }

    fn finish(mut self) -> Result<(), String> {
        drop(self.stdin.take());

        let status = self
            .child
            .wait()
            .map_err(|e| format!("Failed to wait for {} encoder: {}", self.label, e))?;

        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(format!(
                "{} encoder exited with {}: {}",
                self.label,
                status,
                ffmpeg_cmd::stderr_tail(&stderr)
            ))
        }
    }

    fn kill(mut self) {
        drop(self.stdin.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn encoder_command(ffmpeg: &Path) -> Command {
    let mut command = Command::new(ffmpeg);
    command.args(["-hide_banner", "-nostats", "-loglevel", "error", "-y"]);
    command
}

fn video_encoder_command(ffmpeg: &Path, video: &VideoSettings, output: &Path) -> Command {
    let encoder = ffmpeg_cmd::h264_encoder();
    let mut command = encoder_command(ffmpeg);
    command
        .args(["-f", "rawvideo", "-pixel_format", video.pixel_format.ffmpeg_name()])
        .arg("-video_size")
        .arg(format!("{}x{}", video.width, video.height))
        .arg("-framerate")
        .arg(video.frame_rate.to_string())
        .args(["-i", "-", "-c:v", encoder])
        .arg("-b:v")
        .arg(video.bitrate.to_string())
        .arg("-g")
        .arg(video.keyframe_interval.to_string())
        .args(["-pix_fmt", "yuv420p"]);

    if encoder == "libx264" {
        command.args(["-preset", "veryfast", "-tune", "zerolatency"]);
    } else {
        command.args(["-realtime", "1"]);
    }

    command.args(["-movflags", "+faststart"]).arg(output);
    command
}

fn audio_encoder_command(ffmpeg: &Path, audio: &AudioSettings, output: &Path) -> Command {
    let mut command = encoder_command(ffmpeg);
    command
        .args(["-f", "f32le", "-ar"])
        .arg(audio.sample_rate.to_string())
        .arg("-ac")
        .arg(audio.channels.to_string())
        .args(["-i", "-", "-c:a", "aac", "-b:a"])
        .arg(audio.bitrate.to_string())
        .arg(output);
    command
}

/// Copy a frame into tightly packed rows.
fn pack_rows(frame: VideoFrame, row_bytes: usize) -> Option<Vec<u8>> {
    let height = frame.height as usize;
    if frame.bytes_per_row == row_bytes {
        return (frame.data.len() >= row_bytes * height).then(|| {
            let mut data = frame.data;
            data.truncate(row_bytes * height);
            data
        });
    }

    if frame.bytes_per_row < row_bytes {
        return None;
    }

    let mut packed = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * frame.bytes_per_row;
        packed.extend_from_slice(frame.data.get(start..start + row_bytes)?);
    }
    Some(packed)
}

/// Timeline slot of a presentation timestamp at `frame_rate`.
pub(crate) fn frame_slot(pts: std::time::Duration, frame_rate: u32) -> u64 {
    (pts.as_secs_f64() * f64::from(frame_rate)).round() as u64
}

/// Feeds video frames into the encoder at a constant frame rate.
///
/// Each frame lands in the slot its timestamp maps to. Slots skipped by
/// dropped frames repeat the previous frame; a second frame for an already
/// written slot is discarded.
fn run_video_worker(
    mut rx: mpsc::Receiver<Packet>,
    mut encoder: Encoder,
    video: VideoSettings,
    cancelled: Arc<AtomicBool>,
) -> Result<TrackReport, String> {
    let row_bytes = video.width as usize * BYTES_PER_PIXEL;
    let mut next_slot = 0u64;
    let mut previous: Option<Vec<u8>> = None;
    let mut report = TrackReport::default();

    while let Some(packet) = rx.blocking_recv() {
        if cancelled.load(Ordering::Acquire) {
            break;
        }

        let frame = match packet {
            Packet::Finish => break,
            Packet::Sample(MediaSample::Video(frame)) => frame,
            Packet::Sample(MediaSample::Audio(_)) => continue,
        };

        if frame.width != video.width || frame.height != video.height {
            warn!(
                expected = ?(video.width, video.height),
                actual = ?(frame.width, frame.height),
                "Frame size mismatch, skipping"
            );
            continue;
        }

        let slot = frame_slot(frame.pts, video.frame_rate);
        if slot < next_slot {
            continue;
        }

        let Some(pixels) = pack_rows(frame, row_bytes) else {
            warn!("Truncated frame, skipping");
            continue;
        };

        let step = (|| {
            let filler = previous.as_deref().unwrap_or(pixels.as_slice());
            while next_slot < slot {
                encoder.write(filler)?;
                next_slot += 1;
                report.units_written += 1;
            }
            encoder.write(&pixels)?;
            next_slot += 1;
            report.units_written += 1;
            Ok::<(), String>(())
        })();

        if let Err(e) = step {
            encoder.kill();
            return Err(e);
        }

        previous = Some(pixels);
    }

    if cancelled.load(Ordering::Acquire) {
        encoder.kill();
        return Err("video track cancelled".to_string());
    }

    encoder.finish()?;

    debug!(frames = report.units_written, "Video encoder finished");

    Ok(report)
}

/// Feeds interleaved f32 audio into the encoder, padding gaps with silence so
/// audio stays aligned with the video timeline.
fn run_audio_worker(
    mut rx: mpsc::Receiver<Packet>,
    mut encoder: Encoder,
    audio: AudioSettings,
    cancelled: Arc<AtomicBool>,
) -> Result<TrackReport, String> {
    let frame_bytes = 4 * usize::from(audio.channels.max(1));
    let rate = u64::from(audio.sample_rate);
    let tolerance = rate * AUDIO_GAP_TOLERANCE_MS / 1000;
    let silence = vec![0u8; SILENCE_BLOCK_FRAMES as usize * frame_bytes];
    let mut report = TrackReport::default();

    while let Some(packet) = rx.blocking_recv() {
        if cancelled.load(Ordering::Acquire) {
            break;
        }

        let chunk = match packet {
            Packet::Finish => break,
            Packet::Sample(MediaSample::Audio(chunk)) => chunk,
            Packet::Sample(MediaSample::Video(_)) => continue,
        };

        let expected = (chunk.pts.as_secs_f64() * rate as f64).round() as u64;

        let step = (|| {
            if expected > report.units_written + tolerance {
                let mut missing = expected - report.units_written;
                while missing > 0 {
                    let block = missing.min(SILENCE_BLOCK_FRAMES);
                    encoder.write(&silence[..block as usize * frame_bytes])?;
                    missing -= block;
                }
                report.units_written = expected;
            }

            let whole = chunk.data.len() - chunk.data.len() % frame_bytes;
            encoder.write(&chunk.data[..whole])?;
            report.units_written += (whole / frame_bytes) as u64;
            Ok::<(), String>(())
        })();

        if let Err(e) = step {
            encoder.kill();
            return Err(e);
        }
    }

    if cancelled.load(Ordering::Acquire) {
        encoder.kill();
        return Err("audio track cancelled".to_string());
    }

    encoder.finish()?;

    debug!(sample_frames = report.units_written, "Audio encoder finished");

    Ok(report)
}

/// Real-time MP4 writer backed by ffmpeg encoder processes.
pub struct FfmpegWriter {
    ffmpeg: PathBuf,
    output: PathBuf,
    settings: WriterSettings,
    video: Track,
    audio: Option<Track>,
    cancelled: Arc<AtomicBool>,
    started: bool,
    settled: bool,
}

impl FfmpegWriter {
    fn new(ffmpeg: &Path, output: &Path, settings: &WriterSettings) -> Self {
        let video = Track::new("video", output.with_extension("video.mp4"));
        let audio = settings
            .audio
            .as_ref()
            .map(|_| Track::new("audio", output.with_extension("audio.m4a")));

        Self {
            ffmpeg: ffmpeg.to_path_buf(),
            output: output.to_path_buf(),
            settings: settings.clone(),
            video,
            audio,
            cancelled: Arc::new(AtomicBool::new(false)),
            started: false,
            settled: false,
        }
    }

    fn tracks(&self) -> impl Iterator<Item = &Track> {
        std::iter::once(&self.video).chain(self.audio.as_ref())
    }

    fn start_video(&mut self) -> Result<(), String> {
        let rx = self
            .video
            .rx
            .take()
            .ok_or_else(|| "video track already started".to_string())?;
        let command =
            video_encoder_command(&self.ffmpeg, &self.settings.video, &self.video.intermediate);
        let encoder = Encoder::spawn("video", command)?;
        let settings = self.settings.video.clone();
        let cancelled = Arc::clone(&self.cancelled);

        self.video.worker = Some(
            std::thread::Builder::new()
                .name("snapreel-video-writer".to_string())
                .spawn(move || run_video_worker(rx, encoder, settings, cancelled))
                .map_err(|e| format!("Failed to spawn video worker: {}", e))?,
        );

        Ok(())
    }

    fn start_audio(&mut self) -> Result<(), String> {
        let (Some(track), Some(settings)) = (self.audio.as_mut(), self.settings.audio.clone())
        else {
            return Ok(());
        };
        let rx = track
            .rx
            .take()
            .ok_or_else(|| "audio track already started".to_string())?;
        let command = audio_encoder_command(&self.ffmpeg, &settings, &track.intermediate);
        let encoder = Encoder::spawn("audio", command)?;
        let cancelled = Arc::clone(&self.cancelled);

        track.worker = Some(
            std::thread::Builder::new()
                .name("snapreel-audio-writer".to_string())
                .spawn(move || run_audio_worker(rx, encoder, settings, cancelled))
                .map_err(|e| format!("Failed to spawn audio worker: {}", e))?,
        );

        Ok(())
    }

    async fn remove_outputs(&self) {
        let paths = self
            .tracks()
            .map(|t| t.intermediate.clone())
            .chain(std::iter::once(self.output.clone()));
        for path in paths {
            if let Err(e) = tokio::fs::remove_file(&path).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                warn!(path = ?path, error = %e, "Failed to remove writer output");
            }
        }
    }

    #[track_caller]
    fn failed(reason: String) -> RecordingError {
        RecordingError::WriterFailed {
            reason,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    async fn finalize(&mut self) -> CoreResult<FinishedContainer> {
        if !self.started {
            return Err(Self::failed("writer was never started".to_string()));
        }

        for track in self.tracks() {
            track.close().await;
        }

        let video = self.video.join().await.map_err(Self::failed)?;
        let audio = match self.audio.as_mut() {
            Some(track) => Some(track.join().await.map_err(Self::failed)?),
            None => None,
        };

        if video.units_written == 0 {
            return Err(Self::failed("no video frames were captured".to_string()));
        }

        let audio_path = self
            .audio
            .as_ref()
            .filter(|_| audio.is_some_and(|a| a.units_written > 0))
            .map(|t| t.intermediate.clone());

        let has_audio = audio_path.is_some();

        match audio_path {
            Some(audio_path) => {
                let mut command = ffmpeg_cmd::command(&self.ffmpeg);
                command
                    .arg("-i")
                    .arg(&self.video.intermediate)
                    .arg("-i")
                    .arg(&audio_path)
                    .args([
                        "-map", "0:v:0", "-map", "1:a:0", "-c", "copy", "-movflags", "+faststart",
                    ])
                    .arg(&self.output);

                ffmpeg_cmd::run(command)
                    .await
                    .map_err(|e| Self::failed(format!("Failed to mux tracks: {}", e)))?;

                let _ = tokio::fs::remove_file(&self.video.intermediate).await;
                let _ = tokio::fs::remove_file(&audio_path).await;
            }
            None => {
                if self.audio.is_some() {
                    warn!("No audio samples arrived, writing video-only container");
                }
                tokio::fs::rename(&self.video.intermediate, &self.output).await?;
                if let Some(track) = &self.audio {
                    let _ = tokio::fs::remove_file(&track.intermediate).await;
                }
            }
        }

        info!(
            output = ?self.output,
            frames = video.units_written,
            audio_frames = audio.map(|a| a.units_written).unwrap_or(0),
            "Container finalized"
        );

        Ok(FinishedContainer {
            path: self.output.clone(),
            has_audio,
        })
    }
}

#[async_trait]
impl ContainerWriter for FfmpegWriter {
    fn video_input(&self) -> Arc<dyn WriterInput> {
        Arc::clone(&self.video.input) as Arc<dyn WriterInput>
    }

    fn audio_input(&self) -> Option<Arc<dyn WriterInput>> {
        self.audio
            .as_ref()
            .map(|t| Arc::clone(&t.input) as Arc<dyn WriterInput>)
    }

    #[instrument(skip(self), fields(output = ?self.output))]
    fn start(&mut self) -> CoreResult<()> {
        if self.started {
            return Err(Self::failed("writer already started".to_string()));
        }

        let result = self.start_video().and_then(|()| self.start_audio());
        self.started = true;

        if let Err(reason) = result {
            self.cancelled.store(true, Ordering::Release);
            for track in self.tracks() {
                track.close_now();
            }
            return Err(Self::failed(reason));
        }

        for track in self.tracks() {
            track.input.accepting.store(true, Ordering::Release);
        }

        info!(
            width = self.settings.video.width,
            height = self.settings.video.height,
            fps = self.settings.video.frame_rate,
            bitrate = self.settings.video.bitrate,
            audio = self.audio.is_some(),
            encoder = ffmpeg_cmd::h264_encoder(),
            "Writer started, waiting for first sample"
        );

        Ok(())
    }

    #[instrument(skip(self), fields(output = ?self.output))]
    async fn finish(self: Box<Self>) -> CoreResult<FinishedContainer> {
        let mut this = self;
        this.settled = true;
        let result = this.finalize().await;
        if let Err(e) = &result {
            error!(error = %e, "Writer finalize failed");
            this.remove_outputs().await;
        }
        result
    }

    #[instrument(skip(self), fields(output = ?self.output))]
    async fn cancel(self: Box<Self>) {
        let mut this = self;
        this.settled = true;
        this.cancelled.store(true, Ordering::Release);

        for track in this.tracks() {
            track.close_now();
        }

        let _ = this.video.join().await;
        if let Some(track) = this.audio.as_mut() {
            let _ = track.join().await;
        }

        this.remove_outputs().await;

        info!("Writer cancelled");
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // Abandoned without finish or cancel: workers kill their encoders.
        self.cancelled.store(true, Ordering::Release);
        for track in self.tracks() {
            track.close_now();
        }
    }
}
