//! Interactive REPL for painting and playing a grid

use crate::commands::{create_registry, CommandContext, CommandRegistry, CommandResult};
use crate::repl::watcher::FileWatcher;
use anyhow::{anyhow, Result};
use colored::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::{Event, EventKind};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, warn};

pub mod watcher;

/// Types of events the REPL loop handles
enum ReplEvent {
    Input(Result<String, ReadlineError>),
}

/// What the loop should do after handling one line
enum Flow {
    Continue,
    Exit,
}

pub struct Repl {
    editor: Option<DefaultEditor>,
    ctx: CommandContext,
    registry: CommandRegistry,

    tx_input: Sender<ReplEvent>,
    rx_input: Receiver<ReplEvent>,
    tx_watcher: Sender<notify::Result<Event>>,
    rx_watcher: Receiver<notify::Result<Event>>,

    watcher: Option<FileWatcher>,
    watched: Vec<PathBuf>,
}

impl Repl {
    pub fn new(ctx: CommandContext) -> Result<Self> {
        let editor =
            DefaultEditor::new().map_err(|e| anyhow!("Failed to initialize REPL: {}", e))?;
        let (tx_input, rx_input) = unbounded();
        let (tx_watcher, rx_watcher) = unbounded();

        Ok(Repl {
            editor: Some(editor),
            ctx,
            registry: create_registry(),
            tx_input,
            rx_input,
            tx_watcher,
            rx_watcher,
            watcher: None,
            watched: Vec::new(),
        })
    }

    pub fn context(&self) -> &CommandContext {
        &self.ctx
    }

    /// Reload `path` whenever it is written
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        if self.watcher.is_none() {
            self.watcher = Some(FileWatcher::new(self.tx_watcher.clone())?);
        }
        if let Some(w) = &mut self.watcher {
            for old in self.watched.drain(..) {
                let _ = w.unwatch(&old);
            }
            w.watch(path)?;
            self.watched.push(path.to_path_buf());
        }
        Ok(())
    }

    /// Start the REPL loop
    pub fn run(&mut self) -> Result<()> {
        println!(
            "{} {}",
            "🎨".bright_yellow(),
            "Pixelsong".bright_cyan().bold()
        );
        println!(
            "Paint with {}, then {}. Columns are beats, rows are pitches.",
            "paint <row> <col> <colour>".cyan(),
            "play".cyan()
        );
        println!(
            "Type '{}' for more information, '{}' or {} to exit.\n",
            "help".bright_green(),
            "quit".bright_red(),
            "Ctrl+C".bright_red()
        );

        let mut editor = self
            .editor
            .take()
            .ok_or_else(|| anyhow!("REPL is already running"))?;
        let tx_input = self.tx_input.clone();

        thread::spawn(move || loop {
            let prompt = format!("{} ", "pixelsong>".bright_magenta().bold());
            match editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        let _ = editor.add_history_entry(&line);
                    }
                    if tx_input.send(ReplEvent::Input(Ok(line))).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx_input.send(ReplEvent::Input(Err(err)));
                    break;
                }
            }
        });

        loop {
            crossbeam_channel::select! {
                recv(self.rx_input) -> msg => match msg {
                    Ok(ReplEvent::Input(Ok(line))) => {
                        if let Flow::Exit = self.handle_line(&line) {
                            break;
                        }
                    }
                    Ok(ReplEvent::Input(Err(ReadlineError::Interrupted | ReadlineError::Eof))) => {
                        println!("{} 🎵", "Goodbye!".bright_cyan());
                        break;
                    }
                    Ok(ReplEvent::Input(Err(err))) => {
                        println!(
                            "{} {}",
                            "Error reading input:".bright_red().bold(),
                            err.to_string().red()
                        );
                        break;
                    }
                    Err(_) => break,
                },

                recv(self.rx_watcher) -> msg => match msg {
                    Ok(Ok(event)) => self.handle_file_event(event),
                    Ok(Err(e)) => println!("{} Watch error: {}", "Error:".red(), e),
                    Err(_) => break,
                }
            }
        }

        if let Err(e) = self.ctx.engine.stop() {
            warn!(error = %e, "Failed to stop playback on exit");
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }

        match self.registry.execute(line, &mut self.ctx) {
            CommandResult::Success => {}
            CommandResult::Message(msg) => println!("{}", msg),
            CommandResult::Exit => {
                println!("{} 🎵", "Goodbye!".bright_cyan());
                return Flow::Exit;
            }
            CommandResult::Error(e) => {
                println!("{} {}", "Error:".bright_red().bold(), e.red());
            }
            CommandResult::NotACommand => {
                println!(
                    "{} unknown command '{}'. Type '{}' for a list.",
                    "Error:".bright_red().bold(),
                    line,
                    "help".bright_green()
                );
            }
            CommandResult::Watch(path) => match self.watch(Path::new(&path)) {
                Ok(()) => println!(
                    "{} Watching {} for changes...",
                    "👀".bright_cyan(),
                    path.bright_green()
                ),
                Err(e) => println!("{} Failed to watch {}: {:#}", "Error:".red(), path, e),
            },
        }
        Flow::Continue
    }

    fn handle_file_event(&mut self, event: Event) {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return;
        }
        for path in event.paths {
            debug!(path = %path.display(), kind = ?event.kind, "Sketch file event");
            println!("{} File changed: {}", "⚡".bright_yellow(), path.display());
            match self.reload(&path) {
                Ok(true) => println!("{} Reloaded, playback restarted", "✓".bright_green()),
                Ok(false) => println!("{} Reloaded", "✓".bright_green()),
                Err(e) => println!("{} {:#}", "Error:".red(), e),
            }
        }
    }

    /// Load the changed sketch; a running loop picks up the new grid
    fn reload(&mut self, path: &Path) -> Result<bool> {
        self.ctx.load_sketch(path)?;
        self.ctx.restart_if_playing()
    }
}

/// Run the REPL over an already configured context
pub fn start(ctx: CommandContext, watch: Option<&Path>) -> Result<()> {
    let mut repl = Repl::new(ctx)?;
    if let Some(path) = watch {
        repl.watch(path)?;
        println!(
            "{} Watching {} for changes...",
            "👀".bright_cyan(),
            path.display().to_string().bright_green()
        );
    }
    repl.run()
}
