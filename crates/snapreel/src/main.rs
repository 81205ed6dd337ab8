//! SnapReel: screen recording with passthrough save, trim and mute.

mod app;
mod app_command;
mod clipboard;
mod config;
mod console;
mod error;
#[cfg(test)]
mod tests;

pub(crate) use {
    app::App,
    app_command::AppCommand,
    clipboard::ArboardClipboard,
    console::CommandConsole,
    error::{AppError, Result as AppResult},
};

use crate::config::Config;

use snapreel_core::{
    CaptureBackend, Exporter, FfmpegRemuxer, FfmpegWriterFactory, RecordingSession, locate_ffmpeg,
};

use std::{panic::Location, sync::Arc, time::Duration};

use error_location::ErrorLocation;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Default log filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "snapreel=debug,snapreel_core=debug";

/// Application entry point.
fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:?}", e);
            std::process::exit(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {:?}", e);
            std::process::exit(1);
        }
    };

    let result = rt.block_on(run(config));

    // The console forwarder may still be parked on stdin.
    rt.shutdown_timeout(Duration::from_secs(1));

    if let Err(e) = result {
        error!(error = ?e, "SnapReel failed");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> AppResult<()> {
    let ffmpeg = locate_ffmpeg(config.ffmpeg.binary_path.as_deref()).ok_or_else(|| {
        AppError::ConfigError {
            reason: "ffmpeg not found. Install it or set [ffmpeg] binary_path".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    })?;
    info!(ffmpeg = ?ffmpeg, "Using ffmpeg");

    let temp_dir = Config::temp_directory();
    let session = RecordingSession::new(
        capture_backend()?,
        Arc::new(FfmpegWriterFactory::new(&ffmpeg)),
        &temp_dir,
    );

    let exporter = Exporter::new(
        Arc::new(FfmpegRemuxer::new(&ffmpeg)),
        Arc::new(ArboardClipboard::new()?),
        config.output.save_directory.clone(),
        &temp_dir,
    );

    let (command_tx, command_rx) = mpsc::channel(32);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let console = CommandConsole::new(command_tx);

    let app = App {
        session: Arc::new(Mutex::new(session)),
        exporter,
        config,
        command_rx,
        shutdown_tx,
        current: None,
    };

    let (console_result, app_result) = tokio::join!(console.run(shutdown_rx), app.run());

    if let Err(e) = console_result {
        error!(error = ?e, "Console error");
    }

    app_result
}

#[cfg(target_os = "macos")]
fn capture_backend() -> AppResult<Arc<dyn CaptureBackend>> {
    Ok(Arc::new(snapreel_core::ScreenCaptureKitBackend::new()))
}

#[cfg(not(target_os = "macos"))]
#[track_caller]
fn capture_backend() -> AppResult<Arc<dyn CaptureBackend>> {
    Err(snapreel_core::RecordingError::CaptureFailed {
        reason: "screen capture is only available on macOS".to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
    .into())
}
