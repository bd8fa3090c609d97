//! Pitched tone generator for the software synth
//!
//! A `Tone` is one note: a waveform at a fixed frequency shaped by an ADSR
//! envelope, released automatically after its scheduled length.

use super::adsr::{AdsrEnvelope, AdsrParams};
use std::f32::consts::PI;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Saw,
    Square,
    Triangle,
}

impl Waveform {
    /// Value at `phase` in 0.0-1.0
    #[inline]
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (2.0 * PI * phase).sin(),
            Waveform::Saw => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => {
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
        }
    }
}

impl FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sine" | "sin" => Ok(Waveform::Sine),
            "saw" | "sawtooth" => Ok(Waveform::Saw),
            "square" | "sq" => Ok(Waveform::Square),
            "triangle" | "tri" => Ok(Waveform::Triangle),
            other => Err(format!("unknown waveform '{}'", other)),
        }
    }
}

/// One sounding note
#[derive(Debug, Clone)]
pub struct Tone {
    frequency: f32,
    sample_rate: f32,
    phase: f32,
    waveform: Waveform,
    envelope: AdsrEnvelope,
    gain: f32,
    /// Samples left before the envelope is released
    remaining: u64,
}

impl Tone {
    pub fn new(
        frequency: f32,
        sample_rate: f32,
        waveform: Waveform,
        params: AdsrParams,
        gain: f32,
        length: u64,
    ) -> Self {
        let mut envelope = AdsrEnvelope::new(params, sample_rate);
        envelope.trigger();
        Self {
            frequency,
            sample_rate,
            phase: 0.0,
            waveform,
            envelope,
            gain,
            remaining: length,
        }
    }

    /// Jump straight to the release tail
    pub fn release(&mut self) {
        self.remaining = 0;
        self.envelope.release();
    }

    pub fn is_finished(&self) -> bool {
        self.envelope.is_finished()
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.remaining == 0 {
            self.envelope.release();
        } else {
            self.remaining -= 1;
        }

        let value = self.waveform.sample(self.phase);
        self.phase += self.frequency / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        value * self.envelope.next_sample() * self.gain
    }
}
