use crate::{AppCommand, AppError, AppResult, config::Config};

use snapreel_core::{
    CaptureRegion, ElapsedCallback, Exporter, Recording, RecordingRequest, RecordingSession,
};

use std::{panic::Location, sync::Arc, time::Duration};

use error_location::ErrorLocation;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{error, info, instrument, warn};

/// Main application state.
///
/// Owns the recording session and the most recent finished recording. All
/// commands are handled sequentially on this task.
pub struct App {
    pub(crate) session: Arc<Mutex<RecordingSession>>,
    pub(crate) exporter: Exporter,
    pub(crate) config: Config,
    pub(crate) command_rx: mpsc::Receiver<AppCommand>,
    pub(crate) shutdown_tx: watch::Sender<bool>,
    pub(crate) current: Option<Recording>,
}

impl App {
    /// Run the main application event loop.
    #[instrument(skip(self))]
    pub(crate) async fn run(mut self) -> AppResult<()> {
        info!("SnapReel starting");

        let (elapsed_tx, elapsed_rx) = watch::channel(Duration::ZERO);
        let status = tokio::spawn(report_elapsed(elapsed_rx));
        let on_elapsed: ElapsedCallback = Arc::new(move |elapsed| {
            elapsed_tx.send_replace(elapsed);
        });

        while let Some(cmd) = self.command_rx.recv().await {
            if cmd == AppCommand::Shutdown {
                info!("Shutdown requested");
                break;
            }

            if let Err(e) = self.handle_command(cmd.clone(), &on_elapsed).await {
                error!(command = ?cmd, error = %e, "Command failed");
            }
        }

        self.shutdown().await;
        status.abort();

        let _ = self.shutdown_tx.send(true);
        info!("SnapReel shut down successfully");

        Ok(())
    }

    async fn handle_command(
        &mut self,
        cmd: AppCommand,
        on_elapsed: &ElapsedCallback,
    ) -> AppResult<()> {
        match cmd {
            AppCommand::StartRecording { region } => {
                self.start_recording(region, Arc::clone(on_elapsed)).await
            }
            AppCommand::StopRecording => self.stop_recording().await,
            AppCommand::Save { mute } => self.save(mute).await,
            AppCommand::Trim { from, to } => self.trim(from, to).await,
            AppCommand::CopyToClipboard { mute } => self.copy_to_clipboard(mute).await,
            AppCommand::Discard => {
                self.discard_current().await;
                Ok(())
            }
            AppCommand::Shutdown => Ok(()),
        }
    }

    /// Start recording the main display.
    #[instrument(skip(self, on_elapsed))]
    async fn start_recording(
        &mut self,
        region: Option<CaptureRegion>,
        on_elapsed: ElapsedCallback,
    ) -> AppResult<()> {
        let mut session = self.session.lock().await;

        let display = session
            .displays()
            .await?
            .first()
            .map(|d| d.id)
            .ok_or_else(|| AppError::ConfigError {
                reason: "No display available for capture".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let request = RecordingRequest {
            region,
            ..RecordingRequest::display(display, self.config.recording.capture_audio)
        };

        session.start_recording(request, on_elapsed).await?;
        drop(session);

        // A new recording replaces the previous one.
        if let Some(previous) = self.current.take() {
            if !previous.is_saved() {
                warn!(id = %previous.id(), "Discarding unsaved recording");
            }
            previous.discard().await;
        }

        let display_id = display;
        info!(display = display_id, region = ?region, "Recording");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop_recording(&mut self) -> AppResult<()> {
        let recording = self.session.lock().await.stop_recording().await?;

        info!(
            id = %recording.id(),
            duration_secs = recording.duration(),
            has_audio = recording.has_audio(),
            "Recording ready: save, trim, copy or discard"
        );

        self.current = Some(recording);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn save(&mut self, mute: Option<bool>) -> AppResult<()> {
        let mute = mute.unwrap_or(self.config.output.mute_audio);
        let recording = self.current.as_mut().ok_or_else(no_recording)?;

        let path = self
            .exporter
            .save(recording, &self.config.output.save_directory, mute)
            .await?;
        recording.mark_saved(&path);

        info!(path = ?path, "Saved");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn trim(&mut self, from: f64, to: f64) -> AppResult<()> {
        let recording = self.current.as_ref().ok_or_else(no_recording)?;

        let trimmed = self.exporter.trim(recording, from, to).await?;

        info!(id = %trimmed.id(), duration_secs = trimmed.duration(), "Trimmed");

        self.current = Some(trimmed);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn copy_to_clipboard(&mut self, mute: Option<bool>) -> AppResult<()> {
        let mute = mute.unwrap_or(self.config.output.mute_audio);
        let recording = self.current.as_mut().ok_or_else(no_recording)?;

        let path = self.exporter.copy_to_clipboard(recording, mute).await?;
        recording.mark_saved(&path);

        info!(path = ?path, "Copied to clipboard");

        Ok(())
    }

    async fn discard_current(&mut self) {
        match self.current.take() {
            Some(recording) => {
                info!(id = %recording.id(), "Recording discarded");
                recording.discard().await;
            }
            None => warn!("Nothing to discard"),
        }
    }

    /// Stop an in-flight recording and remove temp files.
    async fn shutdown(&mut self) {
        let mut session = self.session.lock().await;
        if session.state().is_active() {
            match session.stop_recording().await {
                Ok(recording) => {
                    warn!(id = %recording.id(), "Recording stopped by shutdown, discarding");
                    recording.discard().await;
                }
                Err(e) => error!(error = %e, "Failed to stop recording on shutdown"),
            }
        }
        drop(session);

        if let Some(recording) = self.current.take() {
            if !recording.is_saved() {
                warn!(id = %recording.id(), "Discarding unsaved recording");
            }
            recording.discard().await;
        }
    }
}

#[track_caller]
fn no_recording() -> AppError {
    AppError::NoRecording {
        location: ErrorLocation::from(Location::caller()),
    }
}

/// Log elapsed recording time once per whole second.
async fn report_elapsed(mut elapsed_rx: watch::Receiver<Duration>) {
    let mut last = 0;
    while elapsed_rx.changed().await.is_ok() {
        let secs = elapsed_rx.borrow_and_update().as_secs();
        if secs != last {
            last = secs;
            info!(elapsed_secs = secs, "Recording");
        }
    }
}
