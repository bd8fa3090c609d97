//! Lookahead note scheduler
//!
//! The scheduler converts a grid snapshot into notes placed at absolute audio
//! clock times. It never sleeps: the host calls [`Scheduler::tick`] on a
//! periodic wake-up and each pass commits every column whose start time falls
//! inside the lookahead window. Wake-up jitter therefore shifts nothing
//! audible, as long as the window is longer than the wake-up period.

use super::clock::{AudioClock, ClockError};
use super::expand::expand_column;
use super::playhead::{CancellationToken, Playhead, PlayheadUpdate};
use super::transport::{Session, Transport, TransportState};
use super::voice_bank::VoiceBank;
use crate::types::{Grid, NoteOptions, ScheduledEvent, Tempo};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    AudioUnavailable(#[from] ClockError),
    #[error("instrument voices are not loaded yet")]
    VoicesNotLoaded,
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(String),
}

/// Timing constants for the scheduler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// How far ahead of the clock columns are committed
    pub lookahead: Duration,
    /// How often the host should call `tick`
    pub wake_period: Duration,
    /// Gap between `start` and the first column
    pub start_delay: Duration,
    /// Gain applied to every note
    pub gain: f32,
}

impl SchedulerConfig {
    pub const DEFAULT_LOOKAHEAD: Duration = Duration::from_millis(150);
    pub const DEFAULT_WAKE_PERIOD: Duration = Duration::from_millis(50);
    pub const DEFAULT_START_DELAY: Duration = Duration::from_millis(50);
    pub const DEFAULT_GAIN: f32 = 0.85;

    /// Check that a late wake-up can never leave a gap in the schedule
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.wake_period.is_zero() {
            return Err(SchedulerError::InvalidConfig(
                "wake period must be greater than zero".into(),
            ));
        }
        if self.lookahead <= self.wake_period {
            return Err(SchedulerError::InvalidConfig(format!(
                "lookahead ({} ms) must exceed the wake period ({} ms)",
                self.lookahead.as_millis(),
                self.wake_period.as_millis()
            )));
        }
        if !(0.0..=1.0).contains(&self.gain) {
            return Err(SchedulerError::InvalidConfig(format!(
                "gain must be between 0 and 1, got {}",
                self.gain
            )));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead: Self::DEFAULT_LOOKAHEAD,
            wake_period: Self::DEFAULT_WAKE_PERIOD,
            start_delay: Self::DEFAULT_START_DELAY,
            gain: Self::DEFAULT_GAIN,
        }
    }
}

/// The notes committed for one grid column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBatch {
    pub column: usize,
    /// Absolute clock time the column sounds
    pub time: f64,
    /// Notes the voice bank accepted, in dispatch order
    pub events: Vec<ScheduledEvent>,
}

/// What one scheduling pass did
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub batches: Vec<ColumnBatch>,
    /// Notes the voice bank refused
    pub failures: usize,
    /// Playhead moves for the host to fire after their delay
    pub playhead_updates: Vec<PlayheadUpdate>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.batches.iter().map(|b| b.events.len()).sum()
    }

    /// All committed events in time order
    pub fn events(&self) -> impl Iterator<Item = &ScheduledEvent> {
        self.batches.iter().flat_map(|b| b.events.iter())
    }

    /// Fold a later pass into this one
    pub fn merge(&mut self, other: TickReport) {
        self.batches.extend(other.batches);
        self.failures += other.failures;
        self.playhead_updates.extend(other.playhead_updates);
    }
}

/// Result of a successful `start` call
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// Playback is running; carries the first scheduling pass
    Started(TickReport),
    /// Nothing is painted, so nothing was started
    EmptyCanvas,
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, StartOutcome::Started(_))
    }
}

/// Clock-relative lookahead scheduler.
///
/// The voice bank is shared (`Arc`) because its owner builds it before any
/// session exists and may hand it to several schedulers over the process
/// lifetime. The scheduler itself is single-owner.
pub struct Scheduler<C: AudioClock, B: VoiceBank + ?Sized> {
    clock: C,
    bank: Arc<B>,
    config: SchedulerConfig,
    transport: Transport,
    playhead: Playhead,
    shut_down: bool,
}

impl<C: AudioClock, B: VoiceBank + ?Sized> Scheduler<C, B> {
    pub fn new(clock: C, bank: Arc<B>, config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self {
            clock,
            bank,
            config,
            transport: Transport::default(),
            playhead: Playhead::new(),
            shut_down: false,
        })
    }

    /// Begin looping `grid` at `tempo`, restarting from column 0 if already running.
    ///
    /// An empty canvas is not an error: the call returns
    /// [`StartOutcome::EmptyCanvas`] and leaves the transport as it was.
    /// Any other failure stops a running session.
    pub fn start(&mut self, grid: Grid, tempo: Tempo) -> Result<StartOutcome, SchedulerError> {
        if let Err(e) = self.clock.resume() {
            error!("Could not resume audio output: {}", e);
            self.stop();
            return Err(e.into());
        }
        if !self.bank.is_loaded() {
            warn!("Start requested before voices finished loading");
            self.stop();
            return Err(SchedulerError::VoicesNotLoaded);
        }
        if !grid.has_content() {
            warn!("Canvas is empty; paint something to hear it");
            return Ok(StartOutcome::EmptyCanvas);
        }

        self.stop();

        let now = self.clock.now();
        let session = Session {
            seconds_per_column: tempo.seconds_per_column(),
            next_column: 0,
            next_column_time: now + self.config.start_delay.as_secs_f64(),
            token: CancellationToken::new(),
            grid,
        };
        info!(
            bpm = tempo.bpm(),
            width = session.grid.width(),
            painted = session.grid.painted_cells(),
            "Playback started"
        );
        self.transport.arm(session);

        Ok(StartOutcome::Started(self.tick()))
    }

    /// One wake-up: commit every column that starts inside the lookahead window
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let now = self.clock.now();
        let horizon = now + self.config.lookahead.as_secs_f64();
        let gain = self.config.gain;
        let bank = &self.bank;

        let Some(session) = self.transport.session_mut() else {
            return report;
        };
        let palette = bank.voices();

        while session.next_column_time < horizon {
            let column = session.column();
            let when = session.next_column_time;
            let mut events = Vec::new();

            for group in expand_column(&session.grid, palette, column) {
                let options = NoteOptions {
                    duration: group
                        .voice
                        .articulation
                        .duration(session.seconds_per_column),
                    gain,
                };
                for note in group.notes {
                    match bank.play_note(group.voice, note, when, options) {
                        Ok(()) => events.push(ScheduledEvent {
                            voice: group.voice.id,
                            note,
                            time: when,
                            duration: options.duration,
                            gain,
                        }),
                        Err(e) => {
                            report.failures += 1;
                            error!(
                                voice = %group.voice.name,
                                color = %group.voice.id,
                                "Failed to play {}: {}",
                                note,
                                e
                            );
                        }
                    }
                }
            }

            debug!(column, time = when, notes = events.len(), "Scheduled column");
            let delay = Duration::from_secs_f64((when - now).max(0.0));
            report
                .playhead_updates
                .push(PlayheadUpdate::new(column, delay, session.token.clone()));
            report.batches.push(ColumnBatch {
                column,
                time: when,
                events,
            });
            session.advance();
        }

        report
    }

    /// Stop the session. Notes already handed to the voice bank still sound.
    pub fn stop(&mut self) {
        if let Some(session) = self.transport.disarm() {
            info!(columns = session.next_column, "Playback stopped");
        }
        self.playhead.clear();
    }

    /// Same as [`Scheduler::stop`]; the next `start` begins at column 0
    pub fn pause(&mut self) {
        self.stop();
    }

    /// Stop and silence the voice bank. Later calls do nothing.
    pub fn shutdown(&mut self) {
        self.stop();
        if !self.shut_down {
            self.shut_down = true;
            self.bank.stop_all();
            debug!("Scheduler shut down");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.transport.state() == TransportState::Running
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    /// Column most recently reported by a fired playhead update
    pub fn current_column(&self) -> Option<usize> {
        self.playhead.current()
    }

    /// Shared handle for UI readers
    pub fn playhead(&self) -> Playhead {
        self.playhead.clone()
    }

    /// How often the host should call `tick`
    pub fn wake_period(&self) -> Duration {
        self.config.wake_period
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn bank(&self) -> &Arc<B> {
        &self.bank
    }
}

impl<C: AudioClock, B: VoiceBank + ?Sized> Drop for Scheduler<C, B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{EventLog, ManualClock};
    use crate::types::{Color, Palette};

    const TRUMPET: Color = Color::rgb(0xD2, 0x60, 0x64);
    const CYMBAL: Color = Color::rgb(0xA6, 0xB8, 0xC7);

    fn scheduler() -> (Scheduler<ManualClock, EventLog>, ManualClock, Arc<EventLog>) {
        let clock = ManualClock::new();
        let bank = Arc::new(EventLog::new(Palette::standard()));
        let scheduler =
            Scheduler::new(clock.clone(), bank.clone(), SchedulerConfig::default()).unwrap();
        (scheduler, clock, bank)
    }

    fn marked(side: usize, col: usize) -> Grid {
        Grid::blank(side).unwrap().with_cell(0, col, TRUMPET).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = SchedulerConfig::default();
        assert!(config.lookahead > config.wake_period);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let short = SchedulerConfig {
            lookahead: Duration::from_millis(50),
            ..Default::default()
        };
        assert!(matches!(short.validate(), Err(SchedulerError::InvalidConfig(_))));

        let zero = SchedulerConfig {
            wake_period: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let loud = SchedulerConfig {
            gain: 1.5,
            ..Default::default()
        };
        assert!(loud.validate().is_err());

        let bank = Arc::new(EventLog::new(Palette::standard()));
        assert!(Scheduler::new(ManualClock::new(), bank, short).is_err());
    }

    #[test]
    fn test_start_schedules_first_window() {
        let (mut scheduler, _clock, _bank) = scheduler();
        let outcome = scheduler.start(marked(4, 0), Tempo::new(120.0).unwrap()).unwrap();
        let StartOutcome::Started(report) = outcome else {
            panic!("expected playback to start");
        };
        // Window is [0, 0.15); only column 0 at 0.05 fits
        assert_eq!(report.batches.len(), 1);
        assert_eq!(report.event_count(), 1);
        let event = report.events().next().unwrap();
        assert!((event.time - 0.05).abs() < 1e-9);
        assert_eq!(event.note.to_string(), "B5");
        assert!((event.gain - 0.85).abs() < 1e-6);
        assert!(scheduler.is_playing());
    }

    #[test]
    fn test_empty_canvas_does_not_start() {
        let (mut scheduler, _clock, bank) = scheduler();
        let outcome = scheduler.start(Grid::blank(4).unwrap(), Tempo::default()).unwrap();
        assert!(matches!(outcome, StartOutcome::EmptyCanvas));
        assert!(!scheduler.is_playing());
        assert!(bank.events().is_empty());
    }

    #[test]
    fn test_empty_canvas_leaves_running_session_alone() {
        let (mut scheduler, _clock, _bank) = scheduler();
        scheduler.start(marked(4, 0), Tempo::default()).unwrap();
        let generation = scheduler.transport().wakeup_generation();
        let outcome = scheduler.start(Grid::blank(4).unwrap(), Tempo::default()).unwrap();
        assert!(!outcome.is_started());
        assert!(scheduler.is_playing());
        assert_eq!(scheduler.transport().wakeup_generation(), generation);
    }

    #[test]
    fn test_audio_unavailable() {
        let (mut scheduler, clock, bank) = scheduler();
        clock.set_available(false);
        let err = scheduler.start(marked(4, 0), Tempo::default()).unwrap_err();
        assert!(matches!(err, SchedulerError::AudioUnavailable(_)));
        assert!(!scheduler.is_playing());
        assert!(bank.events().is_empty());
    }

    #[test]
    fn test_voices_not_loaded() {
        let (mut scheduler, _clock, bank) = scheduler();
        bank.set_loaded(false);
        let err = scheduler.start(marked(4, 0), Tempo::default()).unwrap_err();
        assert_eq!(err, SchedulerError::VoicesNotLoaded);
        assert!(!scheduler.is_playing());
    }

    #[test]
    fn test_failed_restart_stops_running_session() {
        let (mut scheduler, clock, bank) = scheduler();
        scheduler.start(marked(4, 0), Tempo::default()).unwrap();
        clock.set_available(false);
        assert!(scheduler.start(marked(4, 1), Tempo::default()).is_err());
        assert_eq!(scheduler.state(), TransportState::Stopped);
        assert_eq!(scheduler.transport().armed_wakeups(), 0);

        clock.set_available(true);
        scheduler.start(marked(4, 0), Tempo::default()).unwrap();
        bank.set_loaded(false);
        assert!(matches!(
            scheduler.start(marked(4, 1), Tempo::default()),
            Err(SchedulerError::VoicesNotLoaded)
        ));
        assert_eq!(scheduler.state(), TransportState::Stopped);
        assert_eq!(scheduler.transport().armed_wakeups(), 0);
    }

    #[test]
    fn test_tick_advances_with_clock() {
        let (mut scheduler, clock, _bank) = scheduler();
        scheduler.start(marked(4, 0), Tempo::new(120.0).unwrap()).unwrap();

        // Horizon 0.65: column 1 at 0.55 becomes due
        clock.set(0.5);
        let report = scheduler.tick();
        assert_eq!(report.batches.len(), 1);
        assert_eq!(report.batches[0].column, 1);
        assert!((report.batches[0].time - 0.55).abs() < 1e-9);
        assert!(report.batches[0].events.is_empty());

        // Nothing new is due until the clock moves
        assert!(scheduler.tick().is_empty());
    }

    #[test]
    fn test_late_wakeup_catches_up_without_gaps() {
        let (mut scheduler, clock, _bank) = scheduler();
        scheduler.start(marked(4, 0), Tempo::new(120.0).unwrap()).unwrap();
        clock.set(2.0);
        let report = scheduler.tick();
        let columns: Vec<usize> = report.batches.iter().map(|b| b.column).collect();
        assert_eq!(columns, vec![1, 2, 3, 0]);
        let times: Vec<f64> = report.batches.iter().map(|b| b.time).collect();
        for pair in times.windows(2) {
            assert!((pair[1] - pair[0] - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_tick_while_stopped_is_noop() {
        let (mut scheduler, clock, bank) = scheduler();
        clock.set(10.0);
        assert!(scheduler.tick().is_empty());
        assert!(bank.events().is_empty());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut scheduler, _clock, _bank) = scheduler();
        scheduler.start(marked(4, 0), Tempo::default()).unwrap();
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_playing());
        assert_eq!(scheduler.transport().armed_wakeups(), 0);
        assert_eq!(scheduler.current_column(), None);
    }

    #[test]
    fn test_restart_resets_to_column_zero() {
        let (mut scheduler, clock, _bank) = scheduler();
        scheduler.start(marked(4, 0), Tempo::new(120.0).unwrap()).unwrap();
        clock.set(1.0);
        scheduler.tick();
        assert!(scheduler.transport().next_column_index().unwrap() > 1);

        let StartOutcome::Started(report) =
            scheduler.start(marked(4, 0), Tempo::new(120.0).unwrap()).unwrap()
        else {
            panic!("expected playback to restart");
        };
        assert_eq!(report.batches[0].column, 0);
        assert!((report.batches[0].time - 1.05).abs() < 1e-9);
        assert_eq!(scheduler.transport().armed_wakeups(), 1);
    }

    #[test]
    fn test_restart_makes_old_playhead_updates_stale() {
        let (mut scheduler, _clock, _bank) = scheduler();
        let StartOutcome::Started(first) = scheduler.start(marked(4, 0), Tempo::default()).unwrap()
        else {
            panic!("expected playback to start");
        };
        scheduler.start(marked(4, 0), Tempo::default()).unwrap();
        assert!(first.playhead_updates.iter().all(|u| u.is_stale()));
    }

    #[test]
    fn test_failed_voice_does_not_block_others() {
        let (mut scheduler, _clock, bank) = scheduler();
        bank.fail_voice(TRUMPET);
        let grid = Grid::blank(4)
            .unwrap()
            .with_cell(0, 0, TRUMPET)
            .unwrap()
            .with_cell(1, 0, CYMBAL)
            .unwrap();
        let StartOutcome::Started(report) = scheduler.start(grid, Tempo::default()).unwrap() else {
            panic!("expected playback to start");
        };
        assert_eq!(report.failures, 1);
        assert_eq!(report.event_count(), 1);
        assert_eq!(bank.events()[0].voice, CYMBAL);
        assert!(scheduler.is_playing());
    }

    #[test]
    fn test_durations_follow_articulation() {
        let (mut scheduler, _clock, bank) = scheduler();
        let grid = Grid::blank(4)
            .unwrap()
            .with_cell(0, 0, TRUMPET)
            .unwrap()
            .with_cell(1, 0, CYMBAL)
            .unwrap();
        scheduler.start(grid, Tempo::new(60.0).unwrap()).unwrap();
        let events = bank.events();
        let trumpet = events.iter().find(|e| e.voice == TRUMPET).unwrap();
        let cymbal = events.iter().find(|e| e.voice == CYMBAL).unwrap();
        assert!((trumpet.duration - 1.1).abs() < 1e-9);
        assert!((cymbal.duration - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_shutdown_stops_bank_once() {
        let (mut scheduler, _clock, bank) = scheduler();
        scheduler.start(marked(4, 0), Tempo::default()).unwrap();
        scheduler.shutdown();
        scheduler.shutdown();
        assert!(!scheduler.is_playing());
        assert_eq!(bank.stop_all_calls(), 1);
        drop(scheduler);
        assert_eq!(bank.stop_all_calls(), 1);
    }

    #[test]
    fn test_drop_shuts_down() {
        let (scheduler, _clock, bank) = scheduler();
        drop(scheduler);
        assert_eq!(bank.stop_all_calls(), 1);
    }
}
