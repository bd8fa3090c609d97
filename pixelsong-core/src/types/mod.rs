// pixelsong-core/src/types/mod.rs

pub mod color;
pub mod event;
pub mod grid;
pub mod palette;
pub mod pitch;

pub use color::{Color, ColorParseError};
pub use event::{NoteOptions, ScheduledEvent};
pub use grid::{Grid, GridError, Tempo, BACKGROUND, DEFAULT_SIDE};
pub use palette::{Articulation, Palette, PaletteError, Sound, VoiceId, VoiceSpec};
pub use pitch::{note_for_row, PitchName, PitchParseError, ROW_PITCHES};
