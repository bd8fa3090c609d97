//! Threaded playback engine
//!
//! Moves a core [`Scheduler`] onto its own thread and drives it with a
//! periodic wake-up that exists only while a session is running. Playhead
//! updates go to a [`PlayheadTimer`] thread that fires each one when its
//! column starts sounding, off the dispatch path.

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, never, tick, unbounded, Receiver, RecvTimeoutError, Sender};
use pixelsong_core::playback::{
    AudioClock, Playhead, PlayheadUpdate, Scheduler, SchedulerError, StartOutcome, VoiceBank,
};
use pixelsong_core::types::{Grid, Tempo};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Commands that can be sent to the engine thread
pub enum EngineCommand {
    Start {
        grid: Grid,
        tempo: Tempo,
        reply: Sender<Result<StartOutcome, SchedulerError>>,
    },
    Stop(Sender<()>),
    Shutdown,
}

/// Handle to a scheduler running on its own thread
pub struct PlaybackEngine {
    commands: Sender<EngineCommand>,
    is_playing: Arc<AtomicBool>,
    playhead: Playhead,
    thread: Option<JoinHandle<()>>,
}

impl PlaybackEngine {
    pub fn spawn<C, B>(scheduler: Scheduler<C, B>) -> Result<Self>
    where
        C: AudioClock + 'static,
        B: VoiceBank + ?Sized + 'static,
    {
        let (tx, rx) = unbounded();
        let is_playing = Arc::new(AtomicBool::new(false));
        let playhead = scheduler.playhead();
        let timer = PlayheadTimer::spawn(playhead.clone())?;

        let flag = is_playing.clone();
        let thread = thread::Builder::new()
            .name("pixelsong-engine".into())
            .spawn(move || EngineLoop::new(scheduler, rx, timer, flag).run())?;

        Ok(Self {
            commands: tx,
            is_playing,
            playhead,
            thread: Some(thread),
        })
    }

    /// Snapshot `grid` and loop it at `tempo`, restarting if already playing
    pub fn start(&self, grid: Grid, tempo: Tempo) -> Result<StartOutcome> {
        let (reply_tx, reply_rx) = bounded(1);
        self.commands
            .send(EngineCommand::Start {
                grid,
                tempo,
                reply: reply_tx,
            })
            .map_err(|_| anyhow!("Playback engine has shut down"))?;
        let outcome = reply_rx
            .recv()
            .map_err(|_| anyhow!("Playback engine has shut down"))??;
        Ok(outcome)
    }

    pub fn stop(&self) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.commands
            .send(EngineCommand::Stop(reply_tx))
            .map_err(|_| anyhow!("Playback engine has shut down"))?;
        reply_rx
            .recv()
            .map_err(|_| anyhow!("Playback engine has shut down"))
    }

    /// Same as [`PlaybackEngine::stop`]; playback restarts from column 0
    pub fn pause(&self) -> Result<()> {
        self.stop()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Acquire)
    }

    pub fn current_column(&self) -> Option<usize> {
        self.playhead.current()
    }

    pub fn playhead(&self) -> Playhead {
        self.playhead.clone()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        let _ = self.commands.send(EngineCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct EngineLoop<C: AudioClock, B: VoiceBank + ?Sized> {
    scheduler: Scheduler<C, B>,
    commands: Receiver<EngineCommand>,
    timer: PlayheadTimer,
    is_playing: Arc<AtomicBool>,
    wakeup: Option<Receiver<Instant>>,
    armed: Option<u64>,
}

impl<C: AudioClock, B: VoiceBank + ?Sized> EngineLoop<C, B> {
    fn new(
        scheduler: Scheduler<C, B>,
        commands: Receiver<EngineCommand>,
        timer: PlayheadTimer,
        is_playing: Arc<AtomicBool>,
    ) -> Self {
        Self {
            scheduler,
            commands,
            timer,
            is_playing,
            wakeup: None,
            armed: None,
        }
    }

    fn run(mut self) {
        loop {
            let wakeup = self.wakeup.clone().unwrap_or_else(never);
            crossbeam_channel::select! {
                recv(self.commands) -> msg => match msg {
                    Ok(EngineCommand::Start { grid, tempo, reply }) => {
                        let result = self.scheduler.start(grid, tempo);
                        if let Ok(StartOutcome::Started(report)) = &result {
                            self.timer.schedule(&report.playhead_updates);
                        }
                        self.sync_wakeup();
                        let _ = reply.send(result);
                    }
                    Ok(EngineCommand::Stop(reply)) => {
                        self.scheduler.stop();
                        self.sync_wakeup();
                        let _ = reply.send(());
                    }
                    Ok(EngineCommand::Shutdown) | Err(_) => break,
                },
                recv(wakeup) -> _ => {
                    let report = self.scheduler.tick();
                    if report.failures > 0 {
                        warn!(failures = report.failures, "Some notes could not be played");
                    }
                    self.timer.schedule(&report.playhead_updates);
                },
            }
        }

        self.scheduler.shutdown();
        self.is_playing.store(false, Ordering::Release);
        info!("Playback engine stopped");
    }

    /// Keep exactly one ticker alive per armed wake-up generation
    fn sync_wakeup(&mut self) {
        self.is_playing
            .store(self.scheduler.is_playing(), Ordering::Release);
        let generation = self.scheduler.transport().wakeup_generation();
        if generation != self.armed {
            self.armed = generation;
            self.wakeup = generation.map(|_| tick(self.scheduler.wake_period()));
            debug!(?generation, "Wake-up rearmed");
        }
    }
}

/// Fires deferred playhead updates when they come due
pub struct PlayheadTimer {
    updates: Option<Sender<(Instant, PlayheadUpdate)>>,
    thread: Option<JoinHandle<()>>,
}

impl PlayheadTimer {
    pub fn spawn(playhead: Playhead) -> std::io::Result<Self> {
        let (tx, rx) = unbounded();
        let thread = thread::Builder::new()
            .name("pixelsong-playhead".into())
            .spawn(move || run_timer(playhead, rx))?;
        Ok(Self {
            updates: Some(tx),
            thread: Some(thread),
        })
    }

    /// Queue updates whose delays count from now
    pub fn schedule(&self, updates: &[PlayheadUpdate]) {
        let Some(tx) = &self.updates else {
            return;
        };
        let now = Instant::now();
        for update in updates {
            let _ = tx.send((now + update.delay, update.clone()));
        }
    }
}

impl Drop for PlayheadTimer {
    fn drop(&mut self) {
        // Closing the channel ends the timer thread
        self.updates.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run_timer(playhead: Playhead, updates: Receiver<(Instant, PlayheadUpdate)>) {
    let mut pending: Vec<(Instant, PlayheadUpdate)> = Vec::new();

    loop {
        let received = match pending.first() {
            Some((due, _)) => {
                let wait = due.saturating_duration_since(Instant::now());
                match updates.recv_timeout(wait) {
                    Ok(item) => Some(item),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match updates.recv() {
                Ok(item) => Some(item),
                Err(_) => break,
            },
        };

        if let Some(item) = received {
            pending.push(item);
            pending.sort_by_key(|(due, _)| *due);
        }

        let now = Instant::now();
        while pending.first().is_some_and(|(due, _)| *due <= now) {
            let (_, update) = pending.remove(0);
            update.fire(&playhead);
        }
        pending.retain(|(_, update)| !update.is_stale());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelsong_core::playback::{EventLog, MonotonicClock, SchedulerConfig};
    use pixelsong_core::types::{Color, Palette};
    use std::time::Duration;

    const TRUMPET: Color = Color::rgb(0xD2, 0x60, 0x64);

    fn engine() -> (PlaybackEngine, Arc<EventLog>) {
        let bank = Arc::new(EventLog::new(Palette::standard()));
        let scheduler = Scheduler::new(
            MonotonicClock::new(),
            bank.clone(),
            SchedulerConfig::default(),
        )
        .unwrap();
        (PlaybackEngine::spawn(scheduler).unwrap(), bank)
    }

    fn marked() -> Grid {
        Grid::blank(2).unwrap().with_cell(0, 0, TRUMPET).unwrap()
    }

    #[test]
    fn test_start_plays_and_loops() {
        let (engine, bank) = engine();
        // 0.1 s per column, so the mark repeats every 0.2 s
        let outcome = engine.start(marked(), Tempo::new(600.0).unwrap()).unwrap();
        assert!(outcome.is_started());
        assert!(engine.is_playing());

        thread::sleep(Duration::from_millis(450));
        assert!(bank.events().len() >= 2);
        assert!(engine.current_column().is_some());

        engine.stop().unwrap();
        assert!(!engine.is_playing());
        assert_eq!(engine.current_column(), None);
    }

    #[test]
    fn test_empty_canvas_is_reported() {
        let (engine, bank) = engine();
        let outcome = engine.start(Grid::blank(3).unwrap(), Tempo::default()).unwrap();
        assert!(matches!(outcome, StartOutcome::EmptyCanvas));
        assert!(!engine.is_playing());
        assert!(bank.events().is_empty());
    }

    #[test]
    fn test_scheduler_errors_propagate() {
        let (engine, bank) = engine();
        bank.set_loaded(false);
        let err = engine.start(marked(), Tempo::default()).unwrap_err();
        assert!(err.to_string().contains("not loaded"));
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_stop_halts_dispatch() {
        let (engine, bank) = engine();
        engine.start(marked(), Tempo::new(600.0).unwrap()).unwrap();
        thread::sleep(Duration::from_millis(120));
        engine.stop().unwrap();
        let count = bank.events().len();
        thread::sleep(Duration::from_millis(250));
        assert_eq!(bank.events().len(), count);
    }

    #[test]
    fn test_drop_shuts_down_bank_once() {
        let (engine, bank) = engine();
        engine.start(marked(), Tempo::default()).unwrap();
        drop(engine);
        assert_eq!(bank.stop_all_calls(), 1);
    }

    #[test]
    fn test_timer_fires_live_updates_only() {
        let playhead = Playhead::new();
        let timer = PlayheadTimer::spawn(playhead.clone()).unwrap();

        // Produce real updates from a scheduler so they carry session tokens
        let bank = Arc::new(EventLog::new(Palette::standard()));
        let mut scheduler = Scheduler::new(
            MonotonicClock::new(),
            bank,
            SchedulerConfig::default(),
        )
        .unwrap();
        let StartOutcome::Started(report) = scheduler.start(marked(), Tempo::default()).unwrap()
        else {
            panic!("expected playback to start");
        };
        let target = scheduler.playhead();

        let timer_for_session = PlayheadTimer::spawn(target.clone()).unwrap();
        timer_for_session.schedule(&report.playhead_updates);
        thread::sleep(Duration::from_millis(150));
        assert_eq!(target.current(), Some(0));

        // After stop, anything still queued is dropped
        scheduler.stop();
        timer.schedule(&report.playhead_updates);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(playhead.current(), None);
    }
}
