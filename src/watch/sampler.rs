use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Instant;

use super::{
    CompletionEvent, CompletionHandler, PlayState, PlaybackEvent, PlaybackHandle, SampleOutcome,
    VideoId, WatchRatioMonitor, WatchSession,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// A `Teardown` event was received
    Teardown,
    /// Every event sender was dropped
    Disconnected,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionOutcome {
    pub session: Option<WatchSession>,
    pub completion: Option<CompletionEvent>,
    pub end: SessionEnd,
}

/// Drive one tracking session until it is torn down.
///
/// Samples are taken on the monitor's cadence while the player is playing;
/// while it is not, the driver just waits for the next event. Play state
/// changes can come from any thread through `events`. An `Ended` state does
/// not end the session, the viewer may seek back and play again, only
/// `Teardown` or a disconnected channel does. Tracking is stopped on every
/// exit path.
pub fn run_session<H: CompletionHandler>(
    monitor: &mut WatchRatioMonitor<H>,
    video_id: VideoId,
    handle: impl PlaybackHandle + 'static,
    events: &Receiver<PlaybackEvent>,
) -> SessionOutcome {
    let interval = monitor.sample_interval();
    let mut guard = monitor.track(video_id, handle);
    let mut completion = None;
    let mut next_tick = Instant::now() + interval;

    let end = loop {
        let received = if guard.is_playing() {
            events.recv_timeout(next_tick.saturating_duration_since(Instant::now()))
        } else {
            events.recv().map_err(|_| RecvTimeoutError::Disconnected)
        };

        match received {
            Ok(PlaybackEvent::StateChanged(state)) => {
                let was_playing = guard.is_playing();
                if let Some(event) = guard.on_play_state(state) {
                    completion = Some(event);
                }
                if state == PlayState::Playing && !was_playing {
                    // cadence restarts from the moment playback resumes
                    next_tick = Instant::now() + interval;
                }
            }
            Ok(PlaybackEvent::Teardown) => break SessionEnd::Teardown,
            Err(RecvTimeoutError::Timeout) => {
                match guard.sample() {
                    SampleOutcome::Completed(event) => completion = Some(event),
                    outcome => log::trace!("sample: {:?}", outcome),
                }
                next_tick += interval;
                let now = Instant::now();
                if next_tick <= now {
                    // fell behind, skip the missed ticks instead of bursting
                    next_tick = now + interval;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break SessionEnd::Disconnected,
        }
    };

    SessionOutcome {
        session: guard.finish(),
        completion,
        end,
    }
}
