//! Line-based command console.
//!
//! Reads commands from stdin on a blocking forwarder task and sends them to
//! the main application as [`AppCommand`]s.

use crate::{AppCommand, AppError, AppResult};

use snapreel_core::CaptureRegion;

use std::{io::BufRead, panic::Location, time::Duration};

use error_location::ErrorLocation;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// Console usage, printed for `help` and unknown commands.
pub const USAGE: &str = "commands: start [x y w h] | stop | save [mute|unmute] | \
trim <from> <to> | copy [mute|unmute] | discard | quit";

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<AppCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("start", []) => AppCommand::StartRecording { region: None },
        ("start", [x, y, w, h]) => AppCommand::StartRecording {
            region: Some(CaptureRegion {
                x: number(x)?,
                y: number(y)?,
                width: number(w)?,
                height: number(h)?,
            }),
        },
        ("stop", []) => AppCommand::StopRecording,
        ("save", rest) => AppCommand::Save { mute: mute_flag(rest)? },
        ("copy", rest) => AppCommand::CopyToClipboard { mute: mute_flag(rest)? },
        ("trim", [from, to]) => AppCommand::Trim {
            from: number(from)?,
            to: number(to)?,
        },
        ("discard", []) => AppCommand::Discard,
        ("quit" | "exit", []) => AppCommand::Shutdown,
        _ => return Err(format!("unrecognised command '{}'", line.trim())),
    };

    Ok(Some(command))
}

fn number(word: &str) -> Result<f64, String> {
    word.parse::<f64>()
        .map_err(|_| format!("'{}' is not a number", word))
}

fn mute_flag(args: &[&str]) -> Result<Option<bool>, String> {
    match args {
        [] => Ok(None),
        ["mute"] => Ok(Some(true)),
        ["unmute"] => Ok(Some(false)),
        _ => Err(format!("expected 'mute' or 'unmute', got '{}'", args.join(" "))),
    }
}

/// Forwards console lines to the application.
pub struct CommandConsole {
    command_tx: mpsc::Sender<AppCommand>,
}

impl CommandConsole {
    /// Create a console that sends parsed commands on `command_tx`.
    pub fn new(command_tx: mpsc::Sender<AppCommand>) -> Self {
        Self { command_tx }
    }

    /// Run the console loop until shutdown is signalled or stdin closes.
    #[instrument(skip_all)]
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> AppResult<()> {
        let (line_tx, mut line_rx) = mpsc::channel::<String>(32);

        // Single persistent blocking task. Stdin has no async read here, and
        // when line_rx is dropped the next blocking_send fails and ends it.
        let handle = tokio::task::spawn_blocking(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line_tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });

        info!("{}", USAGE);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Console shutting down");
                    break;
                }
                line = line_rx.recv() => {
                    let Some(line) = line else {
                        info!("Console input closed");
                        self.send(AppCommand::Shutdown).await?;
                        break;
                    };
                    match parse_command(&line) {
                        Ok(Some(command)) => {
                            let shutdown = command == AppCommand::Shutdown;
                            self.send(command).await?;
                            if shutdown {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(reason) => warn!(reason = %reason, "{}", USAGE),
                    }
                }
            }
        }

        drop(line_rx);

        // The blocking task may be parked in read_line until the next line.
        match tokio::time::timeout(Duration::from_secs(1), handle).await {
            Ok(Ok(())) => debug!("Console forwarder stopped cleanly"),
            Ok(Err(e)) => warn!(error = ?e, "Console forwarder task panicked"),
            Err(_) => debug!(
                "Console forwarder did not stop within timeout, \
                   will be cleaned up on exit"
            ),
        }

        Ok(())
    }

    async fn send(&self, command: AppCommand) -> AppResult<()> {
        debug!(command = ?command, "Forwarding command");
        self.command_tx
            .send(command)
            .await
            .map_err(|e| AppError::ChannelSendFailed {
                message: format!("Failed to send command: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}
