//! The voice bank seam
//!
//! A voice bank owns one loaded instrument per palette voice and plays notes
//! at absolute clock times. It is built once by its owner and shared with the
//! scheduler; sessions never reload it.

use crate::types::{NoteOptions, Palette, PitchName, ScheduledEvent, VoiceId, VoiceSpec};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    #[error("voice {0} is not loaded")]
    NotLoaded(String),
    #[error("voice {voice} failed to play: {reason}")]
    Playback { voice: String, reason: String },
    #[error("voice bank is closed")]
    Closed,
}

/// Something that can sound palette voices at scheduled times
pub trait VoiceBank: Send + Sync {
    /// The voices this bank can play
    fn voices(&self) -> &Palette;

    /// True once every voice is ready to play
    fn is_loaded(&self) -> bool {
        !self.voices().is_empty()
    }

    /// Queue `note` on `voice` to start at absolute clock time `at`
    fn play_note(
        &self,
        voice: &VoiceSpec,
        note: PitchName,
        at: f64,
        options: NoteOptions,
    ) -> Result<(), VoiceError>;

    /// Silence everything, including notes queued for the future
    fn stop_all(&self);
}

/// A voice bank that records what it is asked to play.
///
/// Backs the offline `dump` command and the scheduler tests.
#[derive(Debug)]
pub struct EventLog {
    palette: Palette,
    events: Mutex<Vec<ScheduledEvent>>,
    failing: Mutex<HashSet<VoiceId>>,
    loaded: AtomicBool,
    stop_all_calls: AtomicUsize,
}

impl EventLog {
    pub fn new(palette: Palette) -> Self {
        Self {
            palette,
            events: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            loaded: AtomicBool::new(true),
            stop_all_calls: AtomicUsize::new(0),
        }
    }

    /// Everything recorded so far, in dispatch order
    pub fn events(&self) -> Vec<ScheduledEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<ScheduledEvent> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }

    /// Make every note on `voice` fail from now on
    pub fn fail_voice(&self, voice: VoiceId) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(voice);
        }
    }

    pub fn set_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::SeqCst);
    }

    pub fn stop_all_calls(&self) -> usize {
        self.stop_all_calls.load(Ordering::SeqCst)
    }
}

impl VoiceBank for EventLog {
    fn voices(&self) -> &Palette {
        &self.palette
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst) && !self.palette.is_empty()
    }

    fn play_note(
        &self,
        voice: &VoiceSpec,
        note: PitchName,
        at: f64,
        options: NoteOptions,
    ) -> Result<(), VoiceError> {
        let failing = self
            .failing
            .lock()
            .map(|f| f.contains(&voice.id))
            .unwrap_or(false);
        if failing {
            return Err(VoiceError::Playback {
                voice: voice.name.clone(),
                reason: "injected failure".into(),
            });
        }

        let mut events = self.events.lock().map_err(|_| VoiceError::Closed)?;
        events.push(ScheduledEvent {
            voice: voice.id,
            note,
            time: at,
            duration: options.duration,
            gain: options.gain,
        });
        Ok(())
    }

    fn stop_all(&self) {
        self.stop_all_calls.fetch_add(1, Ordering::SeqCst);
    }
}
