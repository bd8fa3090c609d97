//! Canvas commands: painting, sketch files and the palette

use crate::commands::{CommandContext, CommandResult};
use colored::*;
use pixelsong_core::types::{note_for_row, Color, Palette, BACKGROUND};
use std::path::PathBuf;

/// Parse `<row> <col>` from the front of `args`
fn parse_cell<'a, I>(parts: &mut I) -> Result<(usize, usize), String>
where
    I: Iterator<Item = &'a str>,
{
    let mut next = |what: &str| -> Result<usize, String> {
        parts
            .next()
            .ok_or_else(|| format!("missing {}", what))?
            .parse::<usize>()
            .map_err(|_| format!("{} must be a non-negative integer", what))
    };
    Ok((next("row")?, next("column")?))
}

/// A colour given as `#RRGGBB` or as a 1-based palette number
pub fn parse_color(arg: &str, palette: &Palette) -> Result<Color, String> {
    if let Ok(n) = arg.parse::<usize>() {
        return palette
            .iter()
            .nth(n.wrapping_sub(1))
            .map(|voice| voice.id)
            .ok_or_else(|| format!("palette has voices 1-{}, got {}", palette.len(), n));
    }
    arg.parse::<Color>().map_err(|e| e.to_string())
}

/// Parse the arguments of `paint <row> <col> <colour>`
pub fn parse_paint_args(args: &str, palette: &Palette) -> Result<(usize, usize, Color), String> {
    let mut parts = args.split_whitespace();
    let (row, col) = parse_cell(&mut parts)?;
    let color = parts
        .next()
        .ok_or_else(|| "missing colour".to_string())
        .and_then(|c| parse_color(c, palette))?;
    if parts.next().is_some() {
        return Err("too many arguments".to_string());
    }
    Ok((row, col, color))
}

/// Handle `paint <row> <col> <#RRGGBB | palette number>`
pub fn cmd_paint(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let (row, col, color) = match parse_paint_args(args, &ctx.palette) {
        Ok(parsed) => parsed,
        Err(e) => return CommandResult::Error(format!("{}. Usage: paint <row> <col> <colour>", e)),
    };
    if let Err(e) = ctx.grid.set_cell(row, col, color) {
        return CommandResult::Error(e.to_string());
    }
    ctx.commit_edit();

    let voice = ctx.palette.resolve(color);
    CommandResult::Message(format!(
        "{} ({}, {}) {} on {}",
        color.swatch(),
        row,
        col,
        note_for_row(row),
        voice.name.bright_cyan()
    ))
}

/// Handle `erase <row> <col>`
pub fn cmd_erase(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let mut parts = args.split_whitespace();
    let result = parse_cell(&mut parts).and_then(|(row, col)| {
        ctx.grid
            .set_cell(row, col, BACKGROUND)
            .map_err(|e| e.to_string())
    });
    match result {
        Ok(()) => {
            ctx.commit_edit();
            CommandResult::Success
        }
        Err(e) => CommandResult::Error(format!("{}. Usage: erase <row> <col>", e)),
    }
}

/// Handle `clear`
pub fn cmd_clear(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    ctx.grid.clear();
    ctx.commit_edit();
    CommandResult::Message("Canvas cleared".to_string())
}

/// Handle `undo`. A running loop keeps the grid it started with.
pub fn cmd_undo(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    if ctx.undo() {
        CommandResult::Message(format!("Undone ({} painted cells)", ctx.grid.painted_cells()))
    } else {
        CommandResult::Message("Nothing to undo".yellow().to_string())
    }
}

/// Handle `redo`
pub fn cmd_redo(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    if ctx.redo() {
        CommandResult::Message(format!("Redone ({} painted cells)", ctx.grid.painted_cells()))
    } else {
        CommandResult::Message("Nothing to redo".yellow().to_string())
    }
}

/// Handle `show`: draw the canvas with the playhead under it
pub fn cmd_show(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let rendered = ctx.grid.render_ansi(ctx.engine.current_column());
    CommandResult::Message(rendered.trim_end().to_string())
}

/// Handle `load [path]`; with no path, reloads the current sketch file
pub fn cmd_load(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let path = if args.is_empty() {
        match &ctx.sketch_path {
            Some(path) => path.clone(),
            None => return CommandResult::Error("Usage: load <file.json>".to_string()),
        }
    } else {
        PathBuf::from(args)
    };

    if let Err(e) = ctx.load_sketch(&path) {
        return CommandResult::Error(format!("{:#}", e));
    }
    let restarted = match ctx.restart_if_playing() {
        Ok(restarted) => restarted,
        Err(e) => return CommandResult::Error(format!("Loaded, but playback failed: {:#}", e)),
    };

    let mut msg = format!(
        "Loaded {} ({} painted cells, {:.0} BPM)",
        path.display(),
        ctx.grid.painted_cells(),
        ctx.tempo.bpm()
    );
    if restarted {
        msg.push_str(", playback restarted");
    }
    CommandResult::Message(msg.bright_green().to_string())
}

/// Handle `save [path]`
pub fn cmd_save(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let path = if args.is_empty() {
        match &ctx.sketch_path {
            Some(path) => path.clone(),
            None => return CommandResult::Error("Usage: save <file.json>".to_string()),
        }
    } else {
        PathBuf::from(args)
    };

    match ctx.save_sketch(&path) {
        Ok(()) => CommandResult::Message(format!("Saved {}", path.display())),
        Err(e) => CommandResult::Error(format!("{:#}", e)),
    }
}

/// Handle `palette`
pub fn cmd_palette(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    CommandResult::Message(describe_palette(&ctx.palette))
}

/// One line per voice: number, swatch, colour, name and articulation
pub fn describe_palette(palette: &Palette) -> String {
    palette
        .iter()
        .enumerate()
        .map(|(i, voice)| {
            format!(
                "{:>2}. {} {}  {:<22} {}",
                i + 1,
                voice.id.swatch(),
                voice.id,
                voice.name,
                voice.articulation.name().dimmed()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
