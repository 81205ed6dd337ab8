//! Locating and invoking the ffmpeg executable.

use std::{
    env,
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;
use tracing::{debug, instrument};

/// Directories checked after `PATH` (Homebrew, MacPorts, system).
const COMMON_LOCATIONS: &[&str] = &[
    "/opt/homebrew/bin",
    "/usr/local/bin",
    "/usr/bin",
    "/opt/local/bin",
];

/// Lines of ffmpeg stderr kept in error diagnostics.
const STDERR_TAIL_LINES: usize = 8;

const EXECUTABLE: &str = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };

/// Find an ffmpeg executable.
///
/// A configured path wins if it exists. Otherwise `PATH` is searched, then
/// the usual package-manager locations.
#[instrument]
pub fn locate_ffmpeg(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        debug!(path = ?path, "Configured ffmpeg path does not exist, searching");
    }

    let from_path = env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).collect::<Vec<_>>())
        .unwrap_or_default();

    from_path
        .into_iter()
        .chain(COMMON_LOCATIONS.iter().map(PathBuf::from))
        .map(|dir| dir.join(EXECUTABLE))
        .find(|candidate| candidate.is_file())
}

/// H.264 encoder to use: VideoToolbox on macOS, x264 elsewhere.
pub fn h264_encoder() -> &'static str {
    if cfg!(target_os = "macos") {
        "h264_videotoolbox"
    } else {
        "libx264"
    }
}

/// A failed ffmpeg invocation.
#[derive(Debug, Clone)]
pub struct FfmpegFailure {
    /// Exit status or spawn error followed by the tail of stderr.
    pub reason: String,
    /// ffmpeg reported that the output volume is full.
    pub disk_full: bool,
}

impl fmt::Display for FfmpegFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Last few lines of ffmpeg's stderr.
pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

pub(crate) fn is_disk_full(stderr: &str) -> bool {
    stderr.contains("No space left on device")
}

/// Base command with the flags every invocation shares.
pub(crate) fn command(ffmpeg: &Path) -> Command {
    let mut command = Command::new(ffmpeg);
    command
        .args(["-hide_banner", "-nostdin", "-nostats", "-loglevel", "error", "-y"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// Run an ffmpeg command to completion.
pub(crate) async fn run(mut command: Command) -> Result<(), FfmpegFailure> {
    debug!(command = ?command.as_std(), "Running ffmpeg");

    let output = command.output().await.map_err(|e| FfmpegFailure {
        reason: format!("Failed to run ffmpeg: {}", e),
        disk_full: false,
    })?;

    if output.status.success() {
        return Ok(());
    }

    let tail = stderr_tail(&output.stderr);
    Err(FfmpegFailure {
        disk_full: is_disk_full(&tail),
        reason: format!("ffmpeg exited with {}: {}", output.status, tail),
    })
}
