use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use crate::TetsundoError;

/// Read side of an embedded video player.
///
/// Both queries may fail at any time, typically because the player was torn
/// down between two samples. Callers treat failures as transient.
pub trait PlaybackHandle {
    /// Total length of the loaded video in seconds.
    ///
    /// Players report zero or a non-finite value until the video metadata has
    /// loaded; that is not an error.
    fn duration_seconds(&mut self) -> Result<f64, TetsundoError>;

    /// Current playhead position in seconds.
    fn current_position_seconds(&mut self) -> Result<f64, TetsundoError>;
}

impl<T: PlaybackHandle + ?Sized> PlaybackHandle for Box<T> {
    fn duration_seconds(&mut self) -> Result<f64, TetsundoError> {
        (**self).duration_seconds()
    }

    fn current_position_seconds(&mut self) -> Result<f64, TetsundoError> {
        (**self).current_position_seconds()
    }
}

#[derive(Debug)]
struct Clock {
    started: Instant,
    origin_seconds: f64,
    speed: f64,
    /// Playhead stops here, unless it was sought past it
    hold_at: Option<f64>,
}

#[derive(Debug, Default)]
struct PlayerState {
    duration: f64,
    position: f64,
    pending_failures: u32,
    destroyed: bool,
    clock: Option<Clock>,
}

impl PlayerState {
    fn position(&self) -> f64 {
        match &self.clock {
            Some(clock) => {
                let elapsed = clock.started.elapsed().as_secs_f64() * clock.speed;
                let mut position = clock.origin_seconds + elapsed;
                if let Some(hold_at) = clock.hold_at.filter(|h| *h >= clock.origin_seconds) {
                    position = position.min(hold_at);
                }
                if self.duration > 0. {
                    position.min(self.duration)
                } else {
                    position
                }
            }
            None => self.position,
        }
    }

    fn check_available(&mut self) -> Result<(), TetsundoError> {
        if self.destroyed {
            return Err(TetsundoError::PlaybackHandleError {
                description: "player has been destroyed".to_string(),
            });
        }
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err(TetsundoError::PlaybackHandleError {
                description: "player did not answer the query".to_string(),
            });
        }
        Ok(())
    }
}

/// In-process stand-in for an embedded player.
///
/// Clones share the same state, so a test (or the replay driver) can keep one
/// clone to seek or inject faults while the monitor owns another.
///
/// By default the playhead only moves through [`SimulatedPlayer::seek`]. A
/// [`SimulatedPlayer::realtime`] player advances with the wall clock instead.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPlayer {
    state: Rc<RefCell<PlayerState>>,
}

impl SimulatedPlayer {
    /// A player whose metadata has not loaded yet (duration 0).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(duration_seconds: f64) -> Self {
        let player = Self::new();
        player.set_duration(duration_seconds);
        player
    }

    /// A player that starts at 0 and plays at `speed` times real time,
    /// stopping at the end of the video.
    pub fn realtime(duration_seconds: f64, speed: f64) -> Self {
        let player = Self::with_duration(duration_seconds);
        player.state.borrow_mut().clock = Some(Clock {
            started: Instant::now(),
            origin_seconds: 0.,
            speed,
            hold_at: None,
        });
        player
    }

    /// Make a realtime player stop advancing once it reaches
    /// `position_seconds`, as if the viewer paused there.
    pub fn holding_at(self, position_seconds: f64) -> Self {
        if let Some(clock) = self.state.borrow_mut().clock.as_mut() {
            clock.hold_at = Some(position_seconds);
        }
        self
    }

    pub fn set_duration(&self, duration_seconds: f64) {
        self.state.borrow_mut().duration = duration_seconds;
    }

    /// Move the playhead. Positions past the end are kept as given, some
    /// players report them.
    pub fn seek(&self, position_seconds: f64) {
        let mut state = self.state.borrow_mut();
        match state.clock.as_mut() {
            Some(clock) => {
                clock.started = Instant::now();
                clock.origin_seconds = position_seconds;
            }
            None => state.position = position_seconds,
        }
    }

    pub fn position(&self) -> f64 {
        self.state.borrow().position()
    }

    /// Make the next `count` queries fail.
    pub fn fail_next_queries(&self, count: u32) {
        self.state.borrow_mut().pending_failures += count;
    }

    /// Every query fails from now on.
    pub fn destroy(&self) {
        self.state.borrow_mut().destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }
}

impl PlaybackHandle for SimulatedPlayer {
    fn duration_seconds(&mut self) -> Result<f64, TetsundoError> {
        let mut state = self.state.borrow_mut();
        state.check_available()?;
        Ok(state.duration)
    }

    fn current_position_seconds(&mut self) -> Result<f64, TetsundoError> {
        let mut state = self.state.borrow_mut();
        state.check_available()?;
        Ok(state.position())
    }
}
