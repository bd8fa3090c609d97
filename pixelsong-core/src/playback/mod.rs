// pixelsong-core/src/playback/mod.rs

pub mod clock;
pub mod expand;
pub mod playhead;
pub mod scheduler;
pub mod transport;
pub mod voice_bank;

pub use clock::{AudioClock, ClockError, ManualClock, MonotonicClock};
pub use expand::{expand_column, VoiceGroup};
pub use playhead::{CancellationToken, Playhead, PlayheadUpdate};
pub use scheduler::{
    ColumnBatch, Scheduler, SchedulerConfig, SchedulerError, StartOutcome, TickReport,
};
pub use transport::{Transport, TransportState};
pub use voice_bank::{EventLog, VoiceBank, VoiceError};
