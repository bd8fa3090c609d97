//! Palette voices and the per-voice duration policy
//!
//! Every palette colour names one instrument voice. Custom colours painted
//! outside the palette resolve to the nearest palette colour in RGB space.

use super::color::Color;
use std::fmt;
use thiserror::Error;

/// A voice is identified by its defining palette colour
pub type VoiceId = Color;

/// How long a voice's notes ring relative to one column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Articulation {
    /// Very short hits (woodblock, brushes)
    Percussive,
    /// Short plucked notes (upright bass)
    Plucky,
    /// Slightly longer than a column so adjacent notes overlap
    Legato,
}

impl Articulation {
    /// Multiple of the column duration a note lasts
    pub fn factor(self) -> f64 {
        match self {
            Articulation::Percussive => 0.2,
            Articulation::Plucky => 0.6,
            Articulation::Legato => 1.1,
        }
    }

    /// Note duration in seconds at the given column length
    pub fn duration(self, seconds_per_column: f64) -> f64 {
        seconds_per_column * self.factor()
    }

    pub fn name(self) -> &'static str {
        match self {
            Articulation::Percussive => "percussive",
            Articulation::Plucky => "plucky",
            Articulation::Legato => "legato",
        }
    }
}

/// The sound a voice is rendered with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sound {
    /// Soundfont-style instrument name (e.g. `acoustic_bass`)
    pub name: String,
    /// General MIDI program number (0-127)
    pub gm_program: u8,
}

/// One playable palette voice
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceSpec {
    pub id: VoiceId,
    pub name: String,
    pub sound: Sound,
    pub articulation: Articulation,
}

impl VoiceSpec {
    pub fn new(
        id: VoiceId,
        name: impl Into<String>,
        sound: impl Into<String>,
        gm_program: u8,
        articulation: Articulation,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            sound: Sound {
                name: sound.into(),
                gm_program: gm_program & 0x7F,
            },
            articulation,
        }
    }
}

impl fmt::Display for VoiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaletteError {
    #[error("a palette needs at least one voice")]
    Empty,
    #[error("colour {0} is declared twice")]
    DuplicateVoice(VoiceId),
}

/// Ordered set of voices. Declaration order breaks nearest-colour ties.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    voices: Vec<VoiceSpec>,
}

impl Palette {
    pub fn new(voices: Vec<VoiceSpec>) -> Result<Self, PaletteError> {
        if voices.is_empty() {
            return Err(PaletteError::Empty);
        }
        for (i, voice) in voices.iter().enumerate() {
            if voices[..i].iter().any(|v| v.id == voice.id) {
                return Err(PaletteError::DuplicateVoice(voice.id));
            }
        }
        Ok(Self { voices })
    }

    /// The eight-voice jazz combo palette
    pub fn standard() -> Self {
        use Articulation::*;
        Self {
            voices: vec![
                VoiceSpec::new(Color::rgb(0xD2, 0x60, 0x64), "Muted Trumpet", "trumpet", 56, Legato),
                VoiceSpec::new(Color::rgb(0xF8, 0x96, 0x1E), "Rhodes Electric Piano", "electric_piano_1", 4, Legato),
                VoiceSpec::new(Color::rgb(0xF9, 0xC7, 0x4F), "Vibraphone", "vibraphone", 11, Legato),
                VoiceSpec::new(Color::rgb(0x9B, 0xA6, 0x5D), "Upright Bass", "acoustic_bass", 32, Plucky),
                VoiceSpec::new(Color::rgb(0x59, 0x82, 0x9E), "Jazz Organ", "drawbar_organ", 16, Legato),
                VoiceSpec::new(Color::rgb(0xA6, 0xB8, 0xC7), "Brushed Cymbal", "woodblock", 115, Percussive),
                VoiceSpec::new(Color::rgb(0xB5, 0xA6, 0xC7), "Saxophone", "alto_sax", 65, Legato),
                VoiceSpec::new(Color::rgb(0x7E, 0x7A, 0x84), "Acoustic Piano", "acoustic_grand_piano", 0, Legato),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VoiceSpec> {
        self.voices.iter()
    }

    /// Exact lookup by palette colour
    pub fn get(&self, id: VoiceId) -> Option<&VoiceSpec> {
        self.voices.iter().find(|v| v.id == id)
    }

    /// Declaration index of a voice (used for channel assignment)
    pub fn index_of(&self, id: VoiceId) -> Option<usize> {
        self.voices.iter().position(|v| v.id == id)
    }

    /// The voice whose colour is closest to `color`; the first declared wins ties
    pub fn nearest(&self, color: Color) -> &VoiceSpec {
        let mut best = &self.voices[0];
        let mut best_distance = u32::MAX;
        for voice in &self.voices {
            let d = voice.id.distance_squared(&color);
            if d < best_distance {
                best = voice;
                best_distance = d;
            }
        }
        best
    }

    /// Exact palette match, else nearest colour
    pub fn resolve(&self, color: Color) -> &VoiceSpec {
        self.get(color).unwrap_or_else(|| self.nearest(color))
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::standard()
    }
}
