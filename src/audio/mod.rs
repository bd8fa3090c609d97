pub mod adsr;
pub mod midi;
pub mod oscillator;
pub mod percussion;
pub mod synth;

pub use midi::MidiVoiceBank;
pub use synth::{StreamClock, SynthVoiceBank};
