//! Percussion voice for the software synth
//!
//! The percussive palette voice (a woodblock) is a short pitched knock plus a
//! burst of high-passed noise, tuned to the note's frequency so rows still
//! read as different pitches.

use std::f32::consts::PI;

/// Xorshift noise source
#[derive(Debug, Clone)]
struct Noise {
    state: u32,
}

impl Noise {
    fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    fn next(&mut self) -> f32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        (self.state as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

/// A one-shot woodblock hit
#[derive(Debug, Clone)]
pub struct WoodblockHit {
    frequency: f32,
    sample_rate: f32,
    elapsed: usize,
    length: usize,
    gain: f32,
    noise: Noise,
    last_noise: f32,
    high_pass: f32,
}

impl WoodblockHit {
    /// Knocks ring for at most this long regardless of the scheduled duration
    const MAX_SECONDS: f32 = 0.12;

    pub fn new(frequency: f32, sample_rate: f32, gain: f32, duration: f32) -> Self {
        let seconds = duration.clamp(0.005, Self::MAX_SECONDS);
        Self {
            frequency,
            sample_rate,
            elapsed: 0,
            length: (seconds * sample_rate).round() as usize,
            gain,
            noise: Noise::new(frequency.to_bits()),
            last_noise: 0.0,
            high_pass: 0.0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.length
    }

    /// Cut the hit short
    pub fn release(&mut self) {
        self.elapsed = self.length;
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.is_finished() {
            return 0.0;
        }
        let t = self.elapsed as f32 / self.sample_rate;

        // Body: two partials at the note and a woody inharmonic overtone
        let body = (2.0 * PI * self.frequency * t).sin() * 0.7
            + (2.0 * PI * self.frequency * 2.76 * t).sin() * 0.3;
        let body_env = (-t * 45.0).exp();

        // Attack click
        let noise = self.noise.next();
        self.high_pass = 0.85 * (self.high_pass + noise - self.last_noise);
        self.last_noise = noise;
        let click_env = (-t * 400.0).exp();

        self.elapsed += 1;
        (body * body_env * 0.8 + self.high_pass * click_env * 0.3) * self.gain
    }
}
