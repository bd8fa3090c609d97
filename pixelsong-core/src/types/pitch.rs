//! Pitch names and the row-to-pitch table
//!
//! Rows map onto a fixed pentatonic table spanning four octaves, so any
//! combination of painted rows in one column stays consonant.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid pitch name '{0}', expected something like C4, F#3 or Bb2")]
pub struct PitchParseError(pub String);

/// A pitch in scientific notation (C4 = middle C)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PitchName {
    octave: i8,
    pitch_class: u8, // 0-11, C = 0
}

impl PitchName {
    /// Build from a chromatic pitch class (0-11) and octave
    pub const fn new(pitch_class: u8, octave: i8) -> Self {
        Self {
            pitch_class: pitch_class % 12,
            octave,
        }
    }

    pub fn pitch_class(&self) -> u8 {
        self.pitch_class
    }

    pub fn octave(&self) -> i8 {
        self.octave
    }

    /// MIDI note number, clamped to 0-127 (C4 = 60)
    pub fn midi_number(&self) -> u8 {
        let n = (self.octave as i16 + 1) * 12 + self.pitch_class as i16;
        n.clamp(0, 127) as u8
    }

    /// Equal-tempered frequency in Hz, A4 = 440
    pub fn frequency(&self) -> f32 {
        let semitones_from_a4 =
            (self.octave as i32 + 1) * 12 + self.pitch_class as i32 - 69;
        440.0 * 2.0_f32.powf(semitones_from_a4 as f32 / 12.0)
    }

    fn class_name(pitch_class: u8) -> &'static str {
        match pitch_class {
            0 => "C",
            1 => "C#",
            2 => "D",
            3 => "D#",
            4 => "E",
            5 => "F",
            6 => "F#",
            7 => "G",
            8 => "G#",
            9 => "A",
            10 => "A#",
            _ => "B",
        }
    }
}

impl FromStr for PitchName {
    type Err = PitchParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PitchParseError(s.to_string());
        let mut chars = s.trim().chars().peekable();

        let base: i16 = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => 0,
            Some('D') => 2,
            Some('E') => 4,
            Some('F') => 5,
            Some('G') => 7,
            Some('A') => 9,
            Some('B') => 11,
            _ => return Err(err()),
        };

        let accidental: i16 = match chars.peek() {
            Some('#') => {
                chars.next();
                1
            }
            Some('b') => {
                chars.next();
                -1
            }
            _ => 0,
        };

        let octave: i16 = chars.collect::<String>().parse().map_err(|_| err())?;
        // Cb4 is B3, B#3 is C4
        let absolute = octave * 12 + base + accidental;
        let octave = absolute.div_euclid(12);
        let octave = i8::try_from(octave).map_err(|_| err())?;

        Ok(PitchName::new(absolute.rem_euclid(12) as u8, octave))
    }
}

impl fmt::Display for PitchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::class_name(self.pitch_class), self.octave)
    }
}

const B: u8 = 11;
const A: u8 = 9;
const G: u8 = 7;
const E: u8 = 4;
const D: u8 = 2;

/// Row 0 is the highest pitch; degrees B A G E D repeat down four octaves
pub const ROW_PITCHES: [PitchName; 20] = [
    PitchName::new(B, 5),
    PitchName::new(A, 5),
    PitchName::new(G, 5),
    PitchName::new(E, 5),
    PitchName::new(D, 5),
    PitchName::new(B, 4),
    PitchName::new(A, 4),
    PitchName::new(G, 4),
    PitchName::new(E, 4),
    PitchName::new(D, 4),
    PitchName::new(B, 3),
    PitchName::new(A, 3),
    PitchName::new(G, 3),
    PitchName::new(E, 3),
    PitchName::new(D, 3),
    PitchName::new(B, 2),
    PitchName::new(A, 2),
    PitchName::new(G, 2),
    PitchName::new(E, 2),
    PitchName::new(D, 2),
];

/// Pitch for a grid row. Rows past the table clamp to its lowest pitch.
pub fn note_for_row(row: usize) -> PitchName {
    ROW_PITCHES[row.min(ROW_PITCHES.len() - 1)]
}
