//! General REPL commands (help, quit, tempo, watch)

use crate::commands::{CommandContext, CommandResult};
use colored::*;
use pixelsong_core::types::Tempo;

/// Handle `help` command
pub fn cmd_help(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    print_help();
    CommandResult::Success
}

/// Handle `quit` or `exit` command
pub fn cmd_quit(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    CommandResult::Exit
}

/// Handle `tempo [bpm]` command
pub fn cmd_tempo(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Message(format!("Current tempo: {:.1} BPM", ctx.tempo.bpm()));
    }

    let tempo = match args.parse::<f64>().map_err(|e| e.to_string()).and_then(|bpm| {
        Tempo::new(bpm).map_err(|e| e.to_string())
    }) {
        Ok(tempo) => tempo,
        Err(e) => return CommandResult::Error(format!("Invalid tempo: {}", e)),
    };
    ctx.tempo = tempo;

    // A running loop keeps its captured tempo until it is restarted
    let note = match ctx.restart_if_playing() {
        Ok(true) => " (playback restarted)",
        Ok(false) => "",
        Err(e) => return CommandResult::Error(format!("{:#}", e)),
    };
    CommandResult::Message(
        format!("🎵 Tempo set to {:.1} BPM{}", tempo.bpm(), note)
            .bright_green()
            .to_string(),
    )
}

/// Handle `watch [file]`; with no file, watches the current sketch
pub fn cmd_watch(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if !args.is_empty() {
        return CommandResult::Watch(args.to_string());
    }
    match &ctx.sketch_path {
        Some(path) => CommandResult::Watch(path.display().to_string()),
        None => CommandResult::Error("Usage: watch <file.json>".to_string()),
    }
}

/// Print help information
fn print_help() {
    println!("{}", "🎨 Pixelsong Help".bold());
    println!("{}", "=================".bold());
    println!();
    println!("Each column is one beat, played left to right and looped.");
    println!("Each row is a pitch on a pentatonic scale, top row highest.");
    println!("Each colour is an instrument; custom colours use the nearest palette voice.");
    println!();
    println!("{}", "Transport:".green());
    println!("  {}                 - Loop the canvas from the first column", "play".cyan());
    println!("  {}                - Stop (play restarts from the beginning)", "pause".cyan());
    println!("  {}                 - Stop playback", "stop".cyan());
    println!("  {}               - Transport, tempo and canvas summary", "status".cyan());
    println!("  {}          - Show or set the tempo", "tempo [bpm]".cyan());
    println!();
    println!("{}", "Canvas:".green());
    println!(
        "  {} - Paint a cell with #RRGGBB or a palette number",
        "paint <row> <col> <colour>".cyan()
    );
    println!("  {}      - Reset one cell to the background", "erase <row> <col>".cyan());
    println!("  {}                - Erase everything", "clear".cyan());
    println!("  {}                 - Take back the last edit", "undo".cyan());
    println!("  {}                 - Put it back again", "redo".cyan());
    println!("  {}                 - Draw the canvas", "show".cyan());
    println!("  {}              - List the palette voices", "palette".cyan());
    println!();
    println!("{}", "Files:".green());
    println!("  {}         - Load a sketch (JSON)", "load [file]".cyan());
    println!("  {}         - Save the canvas and tempo", "save [file]".cyan());
    println!("  {}        - Reload the sketch whenever it changes", "watch [file]".cyan());
    println!();
    println!("{}", "Examples:".green());
    println!("  pixelsong> {}", "paint 0 0 #D26064".cyan());
    println!("  pixelsong> {}", "paint 7 2 4".cyan());
    println!("  pixelsong> {}", "tempo 100".cyan());
    println!("  pixelsong> {}", "play".cyan());
    println!();
    println!("Type '{}' or press {} to exit.", "quit".bright_red(), "Ctrl+C".bright_red());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use pixelsong_core::types::Color;

    #[test]
    fn test_tempo_validation() {
        let (mut ctx, _) = context();
        assert!(matches!(cmd_tempo("120", &mut ctx), CommandResult::Message(_)));
        assert_eq!(ctx.tempo.bpm(), 120.0);

        for bad in ["0", "-10", "fast", "5000"] {
            assert!(
                matches!(cmd_tempo(bad, &mut ctx), CommandResult::Error(_)),
                "{} should be rejected",
                bad
            );
        }
        assert_eq!(ctx.tempo.bpm(), 120.0);
    }

    #[test]
    fn test_tempo_restarts_running_loop() {
        let (mut ctx, _) = context();
        ctx.grid.set_cell(0, 0, Color::rgb(0xD2, 0x60, 0x64)).unwrap();
        ctx.play().unwrap();

        match cmd_tempo("90", &mut ctx) {
            CommandResult::Message(msg) => assert!(msg.contains("restarted")),
            other => panic!("expected a message, got {:?}", other),
        }
        assert!(ctx.engine.is_playing());
        ctx.engine.stop().unwrap();
    }

    #[test]
    fn test_watch_defaults_to_current_sketch() {
        let (mut ctx, _) = context();
        assert!(matches!(cmd_watch("", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(
            cmd_watch("song.json", &mut ctx),
            CommandResult::Watch(path) if path == "song.json"
        ));
    }

    #[test]
    fn test_quit() {
        let (mut ctx, _) = context();
        assert!(matches!(cmd_quit("", &mut ctx), CommandResult::Exit));
    }
}
