//! Offline schedule dump
//!
//! Runs the real scheduler against a [`ManualClock`] and an [`EventLog`], so
//! the printed times are exactly what a live session would hand the voice
//! bank, without opening an audio device.

use pixelsong_core::playback::{
    ColumnBatch, EventLog, ManualClock, Scheduler, SchedulerConfig, SchedulerError, StartOutcome,
};
use pixelsong_core::types::{Grid, Palette, Tempo};
use std::fmt::Write;
use std::sync::Arc;

/// The first `columns` column batches a session on `grid` would schedule
pub fn dump_schedule(
    grid: Grid,
    tempo: Tempo,
    palette: Palette,
    config: SchedulerConfig,
    columns: usize,
) -> Result<Vec<ColumnBatch>, SchedulerError> {
    let clock = ManualClock::new();
    let bank = Arc::new(EventLog::new(palette));
    let mut scheduler = Scheduler::new(clock.clone(), bank, config)?;

    let mut batches = match scheduler.start(grid, tempo)? {
        StartOutcome::Started(report) => report.batches,
        StartOutcome::EmptyCanvas => return Ok(Vec::new()),
    };
    let step = scheduler.wake_period().as_secs_f64();
    while batches.len() < columns {
        clock.advance(step);
        batches.extend(scheduler.tick().batches);
    }
    batches.truncate(columns);
    Ok(batches)
}

/// One line per column, then one indented line per note
pub fn format_schedule(batches: &[ColumnBatch], palette: &Palette) -> String {
    let mut out = String::new();
    for batch in batches {
        let _ = writeln!(out, "column {:>2} @ {:>8.3}s", batch.column, batch.time);
        for event in &batch.events {
            let name = palette
                .get(event.voice)
                .map(|v| v.name.as_str())
                .unwrap_or("?");
            let _ = writeln!(
                out,
                "    {:<4} {:<22} {:.3}s gain {:.2}",
                event.note.to_string(),
                name,
                event.duration,
                event.gain
            );
        }
    }
    out
}
