//! Playback position shared between the real-time consumer and callers.
//!
//! The consumer is the only writer. It takes the lock blockingly exactly once
//! per stream, to set the start reference, and once more when the stream ends.
//! Every other update is a `try_lock` that is skipped under contention, so a
//! reader may see a slightly stale position but never a torn one.

use std::sync::{Mutex, PoisonError, TryLockError, Weak};
use std::time::Duration;

use crate::common::assert_error_traits;

/// Why no playback time could be reported.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum TimeError {
    /// The output this handle watched no longer exists.
    #[error("the output has been deleted")]
    NoInstance,
    /// No stream is armed on the output.
    #[error("no stream is playing on this output")]
    NoClock,
    /// The clock lock could not be taken.
    #[error("the playback clock is unavailable")]
    LockFailed,
}
assert_error_traits! {TimeError}

#[derive(Debug, Default, Clone, Copy)]
struct ClockState {
    armed: bool,
    is_playing: bool,
    /// Seconds. `None` until the first slot is played.
    start: Option<f64>,
    current: Option<f64>,
}

/// Mutex-guarded playback position of one output.
#[derive(Debug, Default)]
pub struct PlaybackClock {
    state: Mutex<ClockState>,
}

impl PlaybackClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Whether the consumer is currently playing stream data.
    pub fn is_playing(&self) -> bool {
        self.state.lock().map(|state| state.is_playing).unwrap_or(false)
    }

    /// Time elapsed between the first played slot and the most recently
    /// played one. Zero until the first slot has been played.
    pub fn time_in_playback(&self) -> Result<Duration, TimeError> {
        let state = *self.state.lock().map_err(|_| TimeError::LockFailed)?;
        if !state.armed {
            return Err(TimeError::NoClock);
        }
        let elapsed = match (state.start, state.current) {
            (Some(start), Some(current)) => (current - start).max(0.0),
            _ => 0.0,
        };
        Ok(Duration::from_secs_f64(elapsed))
    }

    /// Resets all fields and enables reporting for a new stream.
    pub(crate) fn arm(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ClockState {
            armed: true,
            ..ClockState::default()
        };
    }

    /// Resets all fields to uninitialised and disables reporting.
    pub(crate) fn disarm(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = ClockState::default();
        // a panic while holding the lock must not outlive the stream
        self.state.clear_poison();
    }

    /// Sets the start reference. Blocks until the lock is free.
    pub(crate) fn start_at(&self, position: f64) -> bool {
        match self.state.lock() {
            Ok(mut state) => {
                state.start = Some(0.0);
                state.current = Some(position);
                state.is_playing = true;
                true
            }
            Err(_) => false,
        }
    }

    /// Moves the current position if nobody holds the lock.
    pub(crate) fn try_advance(&self, position: f64) -> bool {
        match self.state.try_lock() {
            Ok(mut state) => {
                state.current = Some(position);
                state.is_playing = true;
                true
            }
            Err(TryLockError::WouldBlock) | Err(TryLockError::Poisoned(_)) => false,
        }
    }

    pub(crate) fn mark_stopped(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.is_playing = false;
        }
    }

    #[cfg(test)]
    fn hold(&self) -> std::sync::MutexGuard<'_, ClockState> {
        self.state.lock().unwrap()
    }
}

/// Read-only view of an output's clock that can be moved to other threads.
///
/// Reports [`TimeError::NoInstance`] once the output has been deleted.
#[derive(Debug, Clone)]
pub struct ClockHandle {
    clock: Weak<PlaybackClock>,
}

impl ClockHandle {
    pub(crate) fn new(clock: Weak<PlaybackClock>) -> Self {
        Self { clock }
    }

    /// See [`PlaybackClock::is_playing`]. False once the output is gone.
    pub fn is_playing(&self) -> bool {
        self.clock
            .upgrade()
            .is_some_and(|clock| clock.is_playing())
    }

    /// See [`PlaybackClock::time_in_playback`].
    pub fn time_in_playback(&self) -> Result<Duration, TimeError> {
        self.clock
            .upgrade()
            .ok_or(TimeError::NoInstance)?
            .time_in_playback()
    }
}
