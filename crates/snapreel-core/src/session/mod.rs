mod recording_session;
mod sink;
mod state;
mod ticker;

pub use {
    recording_session::{RecordingRequest, RecordingSession},
    sink::StreamOutputSink,
    state::SessionState,
    ticker::{ElapsedCallback, ElapsedTicker, TICK_INTERVAL},
};
