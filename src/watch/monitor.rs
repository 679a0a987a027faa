use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use crate::report::{ErrorReporter, LogReporter};

use super::{CompletionEvent, CompletionHandler, PlayState, PlaybackHandle, VideoId};

/// Watch ratio at which a session counts as complete. Closed bound.
pub const DEFAULT_COMPLETION_THRESHOLD: f64 = 0.8;
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MonitorConfig {
    pub threshold: f64,
    pub sample_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_COMPLETION_THRESHOLD,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

/// State of one tracked video. Returned by [`WatchRatioMonitor::stop_tracking`].
#[derive(Clone, Debug, PartialEq)]
pub struct WatchSession {
    pub video_id: VideoId,
    /// Known once the player reports a positive finite duration
    pub duration_seconds: Option<f64>,
    pub last_position_seconds: Option<f64>,
    /// Ratio at the latest successful sample, within `[0, 1]`
    pub completion_ratio: f64,
    /// Set once the completion handler has been invoked
    pub completed: bool,
    pub play_state: Option<PlayState>,
    pub samples_taken: u64,
    pub samples_skipped: u64,
}

impl WatchSession {
    fn new(video_id: VideoId) -> Self {
        Self {
            video_id,
            duration_seconds: None,
            last_position_seconds: None,
            completion_ratio: 0.,
            completed: false,
            play_state: None,
            samples_taken: 0,
            samples_skipped: 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.play_state == Some(PlayState::Playing)
    }
}

/// What a single call to [`WatchRatioMonitor::sample`] did.
#[derive(Clone, Debug, PartialEq)]
pub enum SampleOutcome {
    /// Not tracking, or the player is not playing
    Idle,
    /// Duration not known yet
    Inert,
    /// The player failed to answer, sample dropped
    Skipped,
    Sampled { ratio: f64 },
    Completed(CompletionEvent),
}

struct ActiveSession {
    state: WatchSession,
    handle: Box<dyn PlaybackHandle>,
}

/// Polls a playback handle and fires the completion handler once per session
/// when the watch ratio reaches the threshold.
///
/// The monitor does no scheduling of its own. A driver calls [`sample`] on
/// the configured cadence and forwards play state changes, see
/// [`run_session`](super::run_session).
///
/// [`sample`]: WatchRatioMonitor::sample
pub struct WatchRatioMonitor<H: CompletionHandler> {
    handler: H,
    config: MonitorConfig,
    reporter: Arc<dyn ErrorReporter>,
    active: Option<ActiveSession>,
}

impl<H: CompletionHandler> WatchRatioMonitor<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            config: MonitorConfig::default(),
            reporter: Arc::new(LogReporter),
            active: None,
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn sample_interval(&self) -> Duration {
        self.config.sample_interval
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Begin a fresh, unfired session. Any previous session is stopped first.
    pub fn start_tracking(&mut self, video_id: VideoId, handle: impl PlaybackHandle + 'static) {
        if let Some(previous) = self.stop_tracking() {
            log::debug!("Session for {} superseded", previous.video_id);
        }
        log::info!("Tracking {}", video_id);
        self.active = Some(ActiveSession {
            state: WatchSession::new(video_id),
            handle: Box::new(handle),
        });
    }

    /// Like [`start_tracking`](Self::start_tracking), but tracking stops when
    /// the returned guard goes out of scope.
    pub fn track(
        &mut self,
        video_id: VideoId,
        handle: impl PlaybackHandle + 'static,
    ) -> TrackingGuard<'_, H> {
        self.start_tracking(video_id, handle);
        TrackingGuard { monitor: self }
    }

    /// Halt sampling and release the handle. Idempotent.
    pub fn stop_tracking(&mut self) -> Option<WatchSession> {
        let active = self.active.take()?;
        log::debug!(
            "Stopped tracking {} after {} samples ({} skipped), completed: {}",
            active.state.video_id,
            active.state.samples_taken,
            active.state.samples_skipped,
            active.state.completed
        );
        Some(active.state)
    }

    pub fn session(&self) -> Option<&WatchSession> {
        self.active.as_ref().map(|active| &active.state)
    }

    pub fn is_tracking(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.session().is_some_and(WatchSession::is_playing)
    }

    /// Apply a play state transition. Reaching `Ended` without having fired
    /// triggers a final evaluation, whose completion is returned.
    pub fn on_play_state(&mut self, state: PlayState) -> Option<CompletionEvent> {
        let active = self.active.as_mut()?;
        if active.state.play_state != Some(state) {
            log::debug!("{} is now {:?}", active.state.video_id, state);
        }
        active.state.play_state = Some(state);

        if state != PlayState::Ended || active.state.completed {
            return None;
        }

        let Some(duration) = known_duration(active, self.reporter.as_ref()) else {
            log::info!("{} ended before its duration was known", active.state.video_id);
            return None;
        };
        let position = match active.handle.current_position_seconds() {
            Ok(position) if position.is_finite() => Some(position),
            Ok(_) => active.state.last_position_seconds,
            Err(e) => {
                self.reporter.report("watch.ended", &e);
                active.state.last_position_seconds
            }
        };
        let Some(position) = position else {
            log::info!("{} ended without a known position, no credit", active.state.video_id);
            return None;
        };

        let completion = evaluate(
            &mut active.state,
            duration,
            position,
            self.config.threshold,
            &mut self.handler,
        );
        if completion.is_none() {
            log::info!(
                "{} ended at {:.1}% watched, below the threshold",
                active.state.video_id,
                active.state.completion_ratio * 100.
            );
        }
        completion
    }

    /// Take one sample. Does nothing unless a session is playing.
    pub fn sample(&mut self) -> SampleOutcome {
        let Some(active) = self.active.as_mut() else {
            return SampleOutcome::Idle;
        };
        if !active.state.is_playing() {
            return SampleOutcome::Idle;
        }

        let Some(duration) = known_duration(active, self.reporter.as_ref()) else {
            return SampleOutcome::Inert;
        };

        let position = match active.handle.current_position_seconds() {
            Ok(position) if position.is_finite() => position,
            Ok(position) => {
                log::debug!("Ignoring non-finite position {}", position);
                active.state.samples_skipped += 1;
                return SampleOutcome::Skipped;
            }
            Err(e) => {
                self.reporter.report("watch.sample", &e);
                active.state.samples_skipped += 1;
                return SampleOutcome::Skipped;
            }
        };

        match evaluate(
            &mut active.state,
            duration,
            position,
            self.config.threshold,
            &mut self.handler,
        ) {
            Some(event) => SampleOutcome::Completed(event),
            None => SampleOutcome::Sampled {
                ratio: active.state.completion_ratio,
            },
        }
    }
}

/// Duration of the session, querying the player until it reports a usable one.
fn known_duration(active: &mut ActiveSession, reporter: &dyn ErrorReporter) -> Option<f64> {
    if let Some(duration) = active.state.duration_seconds {
        return Some(duration);
    }
    match active.handle.duration_seconds() {
        Ok(duration) if duration.is_finite() && duration > 0. => {
            log::debug!("{} is {:.1}s long", active.state.video_id, duration);
            active.state.duration_seconds = Some(duration);
            Some(duration)
        }
        Ok(_) => None,
        Err(e) => {
            reporter.report("watch.duration", &e);
            None
        }
    }
}

/// Watched fraction, clamped to `[0, 1]`.
pub(crate) fn watch_ratio(position_seconds: f64, duration_seconds: f64) -> f64 {
    (position_seconds / duration_seconds).clamp(0., 1.)
}

fn evaluate<H: CompletionHandler>(
    session: &mut WatchSession,
    duration: f64,
    position: f64,
    threshold: f64,
    handler: &mut H,
) -> Option<CompletionEvent> {
    let ratio = watch_ratio(position, duration);
    session.samples_taken += 1;
    session.last_position_seconds = Some(position);
    session.completion_ratio = ratio;

    if session.completed || ratio < threshold {
        return None;
    }

    session.completed = true;
    let event = CompletionEvent {
        video_id: session.video_id.clone(),
        duration_seconds: duration,
        watch_time_seconds: position.clamp(0., duration).floor() as u64,
        completion_rate: ratio,
    };
    log::info!(
        "{} completed: {}s of {:.0}s watched",
        event.video_id,
        event.watch_time_seconds,
        duration
    );
    handler.on_complete(&event);
    Some(event)
}

/// Scoped tracking session. Dropping the guard stops tracking, on every exit
/// path.
pub struct TrackingGuard<'a, H: CompletionHandler> {
    monitor: &'a mut WatchRatioMonitor<H>,
}

impl<H: CompletionHandler> TrackingGuard<'_, H> {
    /// Stop tracking now and hand back the session state.
    pub fn finish(self) -> Option<WatchSession> {
        self.monitor.stop_tracking()
    }
}

impl<H: CompletionHandler> Deref for TrackingGuard<'_, H> {
    type Target = WatchRatioMonitor<H>;

    fn deref(&self) -> &Self::Target {
        self.monitor
    }
}

impl<H: CompletionHandler> DerefMut for TrackingGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.monitor
    }
}

impl<H: CompletionHandler> Drop for TrackingGuard<'_, H> {
    fn drop(&mut self) {
        self.monitor.stop_tracking();
    }
}
