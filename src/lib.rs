//! # Pixelsong
//!
//! Paint a small square pixel grid and hear it as a looping melody. Columns
//! are beats played left to right, rows are pitches on a pentatonic scale and
//! each palette colour is an instrument voice.
//!
//! The scheduling itself lives in `pixelsong-core`; this crate supplies the
//! parts that touch the outside world.
//!
//! ## Modules
//!
//! - `audio`: voice banks. A cpal software synth whose clock counts rendered
//!   frames, and a midir backend that drives an external synth.
//! - `engine`: moves a scheduler onto its own thread and wakes it
//!   periodically while a session is running.
//! - `commands` and `repl`: the interactive prompt and its command registry,
//!   plus a file watcher that reloads the sketch when it changes.
//! - `config`: TOML player configuration.
//! - `sketch`: JSON sketch files.
//! - `dump`: prints a schedule offline, without an audio device.

pub mod audio;
pub mod commands;
pub mod config;
pub mod dump;
pub mod engine;
pub mod repl;
pub mod sketch;

pub use crate::config::{Backend, PlayerConfig};
pub use crate::engine::PlaybackEngine;
pub use crate::sketch::Sketch;
