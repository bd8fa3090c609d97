//! Transport state: stopped or running, and where the next column goes

use super::playhead::CancellationToken;
use crate::types::Grid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Running,
}

/// Everything that lives only while a session is running
#[derive(Debug)]
pub(crate) struct Session {
    pub grid: Grid,
    pub seconds_per_column: f64,
    /// Columns committed so far; never decreases within a session
    pub next_column: u64,
    /// Clock time at which `next_column` sounds
    pub next_column_time: f64,
    pub token: CancellationToken,
}

impl Session {
    /// Grid column for the next batch
    pub fn column(&self) -> usize {
        (self.next_column % self.grid.width() as u64) as usize
    }

    pub fn advance(&mut self) {
        self.next_column += 1;
        self.next_column_time += self.seconds_per_column;
    }
}

/// Owned by the scheduler; nothing else mutates it
#[derive(Debug, Default)]
pub struct Transport {
    session: Option<Session>,
    /// Bumped each time a periodic wake-up is armed; `None` while disarmed
    wakeup: Option<u64>,
    generations: u64,
}

impl Transport {
    pub fn state(&self) -> TransportState {
        if self.session.is_some() {
            TransportState::Running
        } else {
            TransportState::Stopped
        }
    }

    pub(crate) fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub(crate) fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// Begin a session and arm a fresh wake-up, replacing any previous one
    pub(crate) fn arm(&mut self, session: Session) {
        if let Some(old) = self.session.replace(session) {
            old.token.cancel();
        }
        self.generations += 1;
        self.wakeup = Some(self.generations);
    }

    /// End the session and disarm the wake-up. Returns the ended session.
    pub(crate) fn disarm(&mut self) -> Option<Session> {
        self.wakeup = None;
        let session = self.session.take();
        if let Some(s) = &session {
            s.token.cancel();
        }
        session
    }

    /// Identifier of the armed wake-up, if any. Changes on every restart.
    pub fn wakeup_generation(&self) -> Option<u64> {
        self.wakeup
    }

    /// Number of armed periodic wake-ups: zero or one
    pub fn armed_wakeups(&self) -> usize {
        self.wakeup.iter().count()
    }

    /// Column index that will be scheduled next, before wrapping
    pub fn next_column_index(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.next_column)
    }

    /// Clock time of the next column to schedule
    pub fn next_column_time(&self) -> Option<f64> {
        self.session.as_ref().map(|s| s.next_column_time)
    }
}
