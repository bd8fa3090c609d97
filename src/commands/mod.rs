//! Command registry for REPL commands
//!
//! Handlers are plain functions keyed by a command prefix. Lookup takes the
//! longest registered prefix that matches, so `palette` and a longer
//! `palette <n>` style command can coexist.

pub mod canvas;
pub mod general;
pub mod history;
pub mod transport;

use crate::commands::history::History;
use crate::engine::PlaybackEngine;
use crate::sketch::Sketch;
use anyhow::Result;
use pixelsong_core::playback::StartOutcome;
use pixelsong_core::types::{Grid, Palette, Tempo};
use std::path::{Path, PathBuf};
use tracing::info;

/// Result of executing a command
#[derive(Debug)]
pub enum CommandResult {
    /// Command executed successfully, continue REPL
    Success,
    /// Command executed, show this message
    Message(String),
    /// Exit the REPL
    Exit,
    /// Input did not match any command
    NotACommand,
    /// Error occurred
    Error(String),
    /// Watch a sketch file for changes
    Watch(String),
}

/// Everything a command handler can read or change
pub struct CommandContext {
    pub engine: PlaybackEngine,
    pub palette: Palette,
    pub grid: Grid,
    pub tempo: Tempo,
    /// File the grid was last loaded from or saved to
    pub sketch_path: Option<PathBuf>,
    history: History,
}

impl CommandContext {
    pub fn new(engine: PlaybackEngine, palette: Palette, tempo: Tempo) -> Self {
        Self {
            engine,
            palette,
            grid: Grid::default(),
            tempo,
            sketch_path: None,
            history: History::default(),
        }
    }

    /// Record the current grid as an undoable edit
    pub fn commit_edit(&mut self) {
        self.history.record(&self.grid);
    }

    /// Step the grid back one edit; false when there is nothing to undo
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(grid) => {
                self.grid = grid.clone();
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(grid) => {
                self.grid = grid.clone();
                true
            }
            None => false,
        }
    }

    /// Snapshot the current grid and tempo into the engine
    pub fn play(&self) -> Result<StartOutcome> {
        self.engine.start(self.grid.clone(), self.tempo)
    }

    /// Re-capture the grid if a session is running; returns whether it restarted
    pub fn restart_if_playing(&self) -> Result<bool> {
        if !self.engine.is_playing() {
            return Ok(false);
        }
        Ok(self.play()?.is_started())
    }

    /// Replace the grid (and tempo, when the file has one) from a sketch file
    pub fn load_sketch(&mut self, path: &Path) -> Result<()> {
        let sketch = Sketch::load(path)?;
        info!(
            path = %path.display(),
            side = sketch.grid.width(),
            painted = sketch.grid.painted_cells(),
            "Sketch loaded"
        );
        self.grid = sketch.grid;
        self.commit_edit();
        if let Some(tempo) = sketch.tempo {
            self.tempo = tempo;
        }
        self.sketch_path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn save_sketch(&mut self, path: &Path) -> Result<()> {
        Sketch::new(self.grid.clone(), Some(self.tempo)).save(path)?;
        self.sketch_path = Some(path.to_path_buf());
        Ok(())
    }
}

/// A command handler function
pub type CommandHandler = fn(&str, &mut CommandContext) -> CommandResult;

/// Registry of available commands
pub struct CommandRegistry {
    /// Sorted by prefix length descending for longest-match-first lookup
    commands: Vec<(String, CommandHandler)>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn register(&mut self, prefix: &str, handler: CommandHandler) {
        self.commands.push((prefix.to_string(), handler));
        self.commands.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Execute a command, returning NotACommand if no match found
    pub fn execute(&self, input: &str, ctx: &mut CommandContext) -> CommandResult {
        match self.lookup(input) {
            Some((handler, args)) => handler(args, ctx),
            None => CommandResult::NotACommand,
        }
    }

    /// The handler for `input` and the argument text after its prefix
    fn lookup<'a>(&self, input: &'a str) -> Option<(CommandHandler, &'a str)> {
        self.commands.iter().find_map(|(prefix, handler)| {
            if input == prefix || input.starts_with(&format!("{} ", prefix)) {
                Some((*handler, input[prefix.len()..].trim()))
            } else {
                None
            }
        })
    }

    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.iter().map(|(p, _)| p.as_str()).collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a fully populated command registry with all built-in commands
pub fn create_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    // Transport
    registry.register("play", transport::cmd_play);
    registry.register("pause", transport::cmd_pause);
    registry.register("stop", transport::cmd_stop);
    registry.register("status", transport::cmd_status);

    // Canvas
    registry.register("paint", canvas::cmd_paint);
    registry.register("erase", canvas::cmd_erase);
    registry.register("clear", canvas::cmd_clear);
    registry.register("undo", canvas::cmd_undo);
    registry.register("redo", canvas::cmd_redo);
    registry.register("show", canvas::cmd_show);
    registry.register("load", canvas::cmd_load);
    registry.register("save", canvas::cmd_save);
    registry.register("palette", canvas::cmd_palette);

    // General
    registry.register("tempo", general::cmd_tempo);
    registry.register("watch", general::cmd_watch);
    registry.register("help", general::cmd_help);
    registry.register("quit", general::cmd_quit);
    registry.register("exit", general::cmd_quit);

    registry
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use pixelsong_core::playback::{EventLog, MonotonicClock, Scheduler, SchedulerConfig};
    use std::sync::Arc;

    /// A context whose engine records notes instead of sounding them
    pub fn context() -> (CommandContext, Arc<EventLog>) {
        let bank = Arc::new(EventLog::new(Palette::standard()));
        let scheduler = Scheduler::new(
            MonotonicClock::new(),
            bank.clone(),
            SchedulerConfig::default(),
        )
        .unwrap();
        let engine = PlaybackEngine::spawn(scheduler).unwrap();
        let ctx = CommandContext::new(engine, Palette::standard(), Tempo::default());
        (ctx, bank)
    }
}
