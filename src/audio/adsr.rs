//! ADSR amplitude envelope for synthesized voices
//!
//! Exponential segments, sample-rate independent: times are in seconds and
//! converted to per-sample coefficients once at construction.

use pixelsong_core::types::Articulation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Envelope shape
///
/// `sustain` is a level in 0.0-1.0; the other three are durations in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrParams {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl AdsrParams {
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            // 1 ms floor on both edges keeps note boundaries click-free
            attack: attack.max(0.001),
            decay: decay.max(0.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.max(0.001),
        }
    }

    /// Short hits that never reach a sustain
    pub fn percussive() -> Self {
        Self::new(0.001, 0.08, 0.0, 0.03)
    }

    /// Plucked strings: fast attack, falling body
    pub fn plucky() -> Self {
        Self::new(0.002, 0.25, 0.2, 0.08)
    }

    /// Held tones that overlap the next column slightly
    pub fn legato() -> Self {
        Self::new(0.015, 0.12, 0.75, 0.18)
    }

    pub fn for_articulation(articulation: Articulation) -> Self {
        match articulation {
            Articulation::Percussive => Self::percussive(),
            Articulation::Plucky => Self::plucky(),
            Articulation::Legato => Self::legato(),
        }
    }
}

impl Default for AdsrParams {
    fn default() -> Self {
        Self::legato()
    }
}

/// Coefficient that closes 99.9% of the gap to a target in `seconds`
fn coefficient(seconds: f32, sample_rate: f32) -> f32 {
    // ln(1000)
    const CONVERGENCE: f32 = 6.9;
    if seconds <= 0.0 {
        1.0
    } else {
        1.0 - (-CONVERGENCE / (seconds * sample_rate)).exp()
    }
}

/// Per-note envelope generator
#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    sustain: f32,
    stage: EnvelopeStage,
    level: f32,
    attack_coeff: f32,
    decay_coeff: f32,
    release_coeff: f32,
}

impl AdsrEnvelope {
    pub fn new(params: AdsrParams, sample_rate: f32) -> Self {
        Self {
            sustain: params.sustain,
            stage: EnvelopeStage::Idle,
            level: 0.0,
            attack_coeff: coefficient(params.attack, sample_rate),
            decay_coeff: coefficient(params.decay, sample_rate),
            release_coeff: coefficient(params.release, sample_rate),
        }
    }

    /// Start the attack from the current level
    pub fn trigger(&mut self) {
        self.stage = EnvelopeStage::Attack;
    }

    pub fn release(&mut self) {
        if self.stage != EnvelopeStage::Idle {
            self.stage = EnvelopeStage::Release;
        }
    }

    /// Cut to silence without a release tail
    pub fn force_stop(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn is_finished(&self) -> bool {
        self.stage == EnvelopeStage::Idle
    }

    /// Advance one sample and return the amplitude, 0.0-1.0
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => self.level = 0.0,
            EnvelopeStage::Attack => {
                self.level += (1.0 - self.level) * self.attack_coeff;
                if self.level >= 0.999 {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                self.level += (self.sustain - self.level) * self.decay_coeff;
                if (self.level - self.sustain).abs() < 0.001 {
                    self.level = self.sustain;
                    self.stage = if self.sustain > 0.0 {
                        EnvelopeStage::Sustain
                    } else {
                        EnvelopeStage::Idle
                    };
                }
            }
            EnvelopeStage::Sustain => self.level = self.sustain,
            EnvelopeStage::Release => {
                self.level -= self.level * self.release_coeff;
                if self.level < 0.0001 {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }
        self.level
    }
}
