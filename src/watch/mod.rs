// Watch tracking: decides when a video session counts as a completed exercise

pub mod handle;
pub mod monitor;
pub mod replay;
pub mod sampler;
pub mod video;

use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;

// Re-export commonly used types
pub use handle::{PlaybackHandle, SimulatedPlayer};
pub use monitor::{
    DEFAULT_COMPLETION_THRESHOLD, DEFAULT_SAMPLE_INTERVAL, MonitorConfig, SampleOutcome,
    TrackingGuard, WatchRatioMonitor, WatchSession,
};
pub use replay::{PlaybackLog, PlaybackRecord, ReplayReport};
pub use sampler::{SessionEnd, SessionOutcome, run_session};
pub use video::VideoId;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Playing,
    Paused,
    Ended,
}

/// Notifications delivered to a running session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackEvent {
    StateChanged(PlayState),
    /// The session is going away (another video loaded, player disposed).
    Teardown,
}

/// Emitted at most once per session, when the watch ratio first reaches the
/// completion threshold.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CompletionEvent {
    pub video_id: VideoId,
    pub duration_seconds: f64,
    /// Whole seconds watched, truncated
    pub watch_time_seconds: u64,
    /// Watch ratio at the moment of completion, within `[0, 1]`
    pub completion_rate: f64,
}

/// Receives completion events from a [`WatchRatioMonitor`].
pub trait CompletionHandler {
    fn on_complete(&mut self, event: &CompletionEvent);
}

impl<F> CompletionHandler for F
where
    F: FnMut(&CompletionEvent),
{
    fn on_complete(&mut self, event: &CompletionEvent) {
        self(event)
    }
}

/// Forwards completion events to a channel, for consumers on another thread.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    sender: Sender<CompletionEvent>,
}

impl ChannelHandler {
    pub fn new(sender: Sender<CompletionEvent>) -> Self {
        Self { sender }
    }
}

impl CompletionHandler for ChannelHandler {
    fn on_complete(&mut self, event: &CompletionEvent) {
        if let Err(e) = self.sender.send(event.clone()) {
            log::warn!("Completion for {} dropped, receiver gone: {}", event.video_id, e);
        }
    }
}
