//! Audio clocks
//!
//! The scheduler never sleeps on a clock; it only asks what time it is and
//! places notes at absolute times ahead of that. A clock must be monotonic.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),
}

/// A monotonically increasing time source in seconds
pub trait AudioClock: Send {
    /// Current clock time in seconds
    fn now(&self) -> f64;

    /// Leave a suspended state. Must succeed before anything is scheduled.
    fn resume(&mut self) -> Result<(), ClockError> {
        Ok(())
    }
}

impl<C: AudioClock + ?Sized> AudioClock for Box<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn resume(&mut self) -> Result<(), ClockError> {
        (**self).resume()
    }
}

/// Wall-clock seconds since construction
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// The instant corresponding to clock time `secs`
    pub fn instant_at(&self, secs: f64) -> Instant {
        self.origin + std::time::Duration::from_secs_f64(secs.max(0.0))
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so one handle can drive a scheduler while
/// another advances it. Used for tests and offline schedule dumps.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    // f64 stored as bits for atomic access
    now: Arc<AtomicU64>,
    unavailable: Arc<AtomicBool>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(secs: f64) -> Self {
        let clock = Self::new();
        clock.set(secs);
        clock
    }

    pub fn set(&self, secs: f64) {
        self.now.store(secs.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: f64) {
        self.set(self.now() + secs);
    }

    /// Make `resume` fail, as if the output device disappeared
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.now.load(Ordering::SeqCst))
    }

    fn resume(&mut self) -> Result<(), ClockError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(ClockError::Unavailable("manual clock marked unavailable".into()))
        } else {
            Ok(())
        }
    }
}
