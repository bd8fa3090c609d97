#[cfg(test)]
mod tests {
    use pixelsong_core::playback::{
        AudioClock, EventLog, ManualClock, Scheduler, SchedulerConfig, StartOutcome, TickReport,
    };
    use pixelsong_core::types::{Color, Grid, Palette, Tempo, BACKGROUND};
    use std::sync::Arc;

    const TRUMPET: Color = Color::rgb(0xD2, 0x60, 0x64);
    const BASS: Color = Color::rgb(0x9B, 0xA6, 0x5D);

    /// Drive the scheduler the way the engine does: advance the clock one wake
    /// period at a time and tick, collecting everything that was scheduled
    fn run_for(
        scheduler: &mut Scheduler<ManualClock, EventLog>,
        clock: &ManualClock,
        seconds: f64,
    ) -> TickReport {
        let mut all = TickReport::default();
        let step = scheduler.wake_period().as_secs_f64();
        let end = clock.now() + seconds;
        while clock.now() < end {
            clock.advance(step);
            all.merge(scheduler.tick());
        }
        all
    }

    fn setup() -> (Scheduler<ManualClock, EventLog>, ManualClock, Arc<EventLog>) {
        let clock = ManualClock::new();
        let bank = Arc::new(EventLog::new(Palette::standard()));
        let scheduler =
            Scheduler::new(clock.clone(), bank.clone(), SchedulerConfig::default()).unwrap();
        (scheduler, clock, bank)
    }

    #[test]
    fn test_single_mark_loops_every_bar() {
        let (mut scheduler, clock, bank) = setup();
        let grid = Grid::blank(4).unwrap().with_cell(0, 0, TRUMPET).unwrap();

        let StartOutcome::Started(first) = scheduler.start(grid, Tempo::new(120.0).unwrap()).unwrap()
        else {
            panic!("expected playback to start");
        };
        let mut report = first;
        report.merge(run_for(&mut scheduler, &clock, 4.5));

        let times: Vec<f64> = bank.events().iter().map(|e| e.time).collect();
        assert!(times.len() >= 3);
        for (i, t) in times.iter().take(3).enumerate() {
            assert!((t - (0.05 + 2.0 * i as f64)).abs() < 1e-9, "event {} at {}", i, t);
        }

        let columns: Vec<usize> = report.playhead_updates.iter().map(|u| u.column).collect();
        assert_eq!(&columns[..6], &[0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn test_column_batches_wrap_modulo_width() {
        let (mut scheduler, clock, _bank) = setup();
        let grid = Grid::blank(3).unwrap().with_cell(2, 1, BASS).unwrap();
        let StartOutcome::Started(mut report) =
            scheduler.start(grid, Tempo::new(240.0).unwrap()).unwrap()
        else {
            panic!("expected playback to start");
        };
        report.merge(run_for(&mut scheduler, &clock, 3.0));

        for (n, batch) in report.batches.iter().enumerate() {
            assert_eq!(batch.column, n % 3);
        }
        let spacing = 60.0 / 240.0;
        for pair in report.batches.windows(2) {
            assert!(pair[1].time > pair[0].time);
            assert!((pair[1].time - pair[0].time - spacing).abs() < 1e-9);
        }
    }

    #[test]
    fn test_playhead_follows_fired_updates_and_clears_on_stop() {
        let (mut scheduler, clock, _bank) = setup();
        let playhead = scheduler.playhead();
        let changes = playhead.subscribe();
        let grid = Grid::blank(2).unwrap().with_cell(0, 0, TRUMPET).unwrap();

        let StartOutcome::Started(mut report) = scheduler.start(grid, Tempo::default()).unwrap()
        else {
            panic!("expected playback to start");
        };
        report.merge(run_for(&mut scheduler, &clock, 1.0));

        for update in &report.playhead_updates {
            assert!(update.fire(&playhead));
        }
        let last = report.playhead_updates.last().map(|u| u.column);
        assert_eq!(scheduler.current_column(), last);

        scheduler.stop();
        assert_eq!(scheduler.current_column(), None);

        // Anything still in flight from the stopped session is dropped
        for update in &report.playhead_updates {
            assert!(!update.fire(&playhead));
        }
        assert_eq!(playhead.current(), None);
        assert_eq!(changes.try_iter().last(), Some(None));
    }

    #[test]
    fn test_stopped_scheduler_dispatches_nothing_more() {
        let (mut scheduler, clock, bank) = setup();
        let grid = Grid::blank(2).unwrap().with_cell(1, 1, TRUMPET).unwrap();
        scheduler.start(grid, Tempo::new(300.0).unwrap()).unwrap();
        run_for(&mut scheduler, &clock, 1.0);
        scheduler.stop();
        let before = bank.events().len();

        let after = run_for(&mut scheduler, &clock, 1.0);
        assert!(after.is_empty());
        assert_eq!(bank.events().len(), before);
        assert_eq!(scheduler.transport().armed_wakeups(), 0);
    }

    #[test]
    fn test_all_background_grid_is_silent() {
        let (mut scheduler, clock, bank) = setup();
        let rows = vec![vec![BACKGROUND; 5]; 5];
        let outcome = scheduler
            .start(Grid::new(rows).unwrap(), Tempo::default())
            .unwrap();
        assert!(!outcome.is_started());
        run_for(&mut scheduler, &clock, 1.0);
        assert!(bank.events().is_empty());
    }

    #[test]
    fn test_chord_with_mixed_voices() {
        let (mut scheduler, _clock, bank) = setup();
        let grid = Grid::blank(20)
            .unwrap()
            .with_cell(0, 0, TRUMPET)
            .unwrap()
            .with_cell(19, 0, BASS)
            .unwrap()
            .with_cell(4, 0, TRUMPET)
            .unwrap();
        scheduler.start(grid, Tempo::default()).unwrap();

        let notes: Vec<(Color, String)> = bank
            .events()
            .iter()
            .map(|e| (e.voice, e.note.to_string()))
            .collect();
        assert_eq!(
            notes,
            vec![
                (TRUMPET, "B5".to_string()),
                (TRUMPET, "D5".to_string()),
                (BASS, "D2".to_string()),
            ]
        );
    }
}
