//! Transport commands (play, pause, stop, status)

use crate::commands::{CommandContext, CommandResult};
use colored::*;
use pixelsong_core::playback::StartOutcome;

/// Handle `play`: loop the current grid, restarting from column 0 if already playing
pub fn cmd_play(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match ctx.play() {
        Ok(StartOutcome::Started(report)) => CommandResult::Message(
            format!(
                "▶ Playing {} painted cells at {:.0} BPM ({} notes queued)",
                ctx.grid.painted_cells(),
                ctx.tempo.bpm(),
                report.event_count()
            )
            .bright_green()
            .to_string(),
        ),
        Ok(StartOutcome::EmptyCanvas) => CommandResult::Message(
            "Canvas is empty. Paint something first (try 'paint 0 0 #D26064')."
                .yellow()
                .to_string(),
        ),
        Err(e) => CommandResult::Error(format!("Could not start playback: {:#}", e)),
    }
}

/// Handle `pause`; resuming starts again from the first column
pub fn cmd_pause(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match ctx.engine.pause() {
        Ok(()) => CommandResult::Message("⏸ Paused".to_string()),
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Handle `stop`
pub fn cmd_stop(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match ctx.engine.stop() {
        Ok(()) => CommandResult::Message("⏹ Stopped".to_string()),
        Err(e) => CommandResult::Error(e.to_string()),
    }
}

/// Handle `status`
pub fn cmd_status(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let state = if ctx.engine.is_playing() {
        "playing".bright_green()
    } else {
        "stopped".bright_red()
    };
    let column = ctx
        .engine
        .current_column()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    let sketch = ctx
        .sketch_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(unsaved)".to_string());

    CommandResult::Message(format!(
        "Transport: {}  column: {}  tempo: {:.1} BPM\nCanvas: {}x{}, {} painted  sketch: {}",
        state,
        column,
        ctx.tempo.bpm(),
        ctx.grid.width(),
        ctx.grid.height(),
        ctx.grid.painted_cells(),
        sketch
    ))
}
