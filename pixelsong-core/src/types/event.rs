//! Timed note events handed to a voice bank

use super::palette::VoiceId;
use super::pitch::PitchName;

/// Per-note playback options
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteOptions {
    /// Seconds the note rings
    pub duration: f64,
    /// Linear gain, 0.0-1.0
    pub gain: f32,
}

/// One note committed to a voice bank at an absolute clock time
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledEvent {
    pub voice: VoiceId,
    pub note: PitchName,
    /// Absolute audio clock time in seconds
    pub time: f64,
    pub duration: f64,
    pub gain: f32,
}
