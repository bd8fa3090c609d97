//! # Pixelsong Core
//!
//! Device-free core of pixelsong: turns a square pixel grid into a looping
//! melody. Each column is a time step, each painted row a note on the voice
//! its colour selects.
//!
//! ## Features
//!
//! - **colored**: terminal swatches and grid rendering (on by default)
//!
//! ## Example
//!
//! ```
//! use pixelsong_core::playback::{EventLog, ManualClock, Scheduler, SchedulerConfig};
//! use pixelsong_core::types::{Color, Grid, Palette, Tempo};
//! use std::sync::Arc;
//!
//! let bank = Arc::new(EventLog::new(Palette::standard()));
//! let mut scheduler =
//!     Scheduler::new(ManualClock::new(), bank.clone(), SchedulerConfig::default()).unwrap();
//! let grid = Grid::blank(8).unwrap().with_cell(0, 0, Color::rgb(0xD2, 0x60, 0x64)).unwrap();
//! scheduler.start(grid, Tempo::default()).unwrap();
//! assert_eq!(bank.events().len(), 1);
//! ```

pub mod playback;
pub mod types;

// Re-export commonly used types
pub use playback::{AudioClock, Playhead, Scheduler, SchedulerConfig, StartOutcome, VoiceBank};
pub use types::{Color, Grid, Palette, PitchName, Tempo, VoiceSpec};
