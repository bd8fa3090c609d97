//! pixelsong: paint a pixel grid, hear it as a looping melody

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use pixelsong::audio::{midi, MidiVoiceBank, SynthVoiceBank};
use pixelsong::commands::canvas::describe_palette;
use pixelsong::commands::CommandContext;
use pixelsong::dump::{dump_schedule, format_schedule};
use pixelsong::{repl, Backend, PlaybackEngine, PlayerConfig, Sketch};
use pixelsong_core::playback::{Scheduler, StartOutcome};
use pixelsong_core::types::{Palette, Tempo};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pixelsong")]
#[command(version)]
#[command(about = "🎨 Paint a pixel grid, hear it as a looping melody.")]
struct Cli {
    /// Tempo in beats (columns) per minute; overrides the sketch and config
    #[arg(long, global = true)]
    tempo: Option<f64>,

    /// Sound backend
    #[arg(long, value_enum, global = true)]
    backend: Option<Backend>,

    /// MIDI output port, matched as a substring of the port name
    #[arg(long, global = true)]
    midi_port: Option<String>,

    /// Configuration file (defaults to ./pixelsong.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the interactive prompt (the default)
    Play {
        /// Sketch file to load
        sketch: Option<PathBuf>,
        /// Reload the sketch whenever it changes
        #[arg(long, default_value_t = false)]
        watch: bool,
        /// Start playing as soon as the sketch is loaded
        #[arg(long, default_value_t = false)]
        autoplay: bool,
    },
    /// Print the notes a sketch would schedule, without playing them
    Dump {
        sketch: PathBuf,
        /// Number of columns to print
        #[arg(short, long, default_value_t = 16, value_parser = clap::value_parser!(u64).range(1..))]
        columns: u64,
    },
    /// List the palette voices
    Palette,
    /// List MIDI output ports
    Ports,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pixelsong=info,pixelsong_core=info")),
        )
        .init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("failed to read working directory")?;
    let mut config = PlayerConfig::resolve(cli.config.as_deref(), &cwd)?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if cli.midi_port.is_some() {
        config.midi_port = cli.midi_port.clone();
    }
    let tempo_override = cli.tempo.map(Tempo::new).transpose()?;

    match cli.command.unwrap_or(Command::Play {
        sketch: None,
        watch: false,
        autoplay: false,
    }) {
        Command::Play {
            sketch,
            watch,
            autoplay,
        } => play(&config, sketch.as_deref(), tempo_override, watch, autoplay),
        Command::Dump { sketch, columns } => dump(&config, &sketch, tempo_override, columns),
        Command::Palette => {
            println!("{}", describe_palette(&Palette::standard()));
            Ok(())
        }
        Command::Ports => {
            let ports = midi::list_ports()?;
            if ports.is_empty() {
                println!("No MIDI output ports found");
            }
            for (i, port) in ports.iter().enumerate() {
                println!("{:>2}. {}", i + 1, port);
            }
            Ok(())
        }
    }
}

/// Build the engine for the configured backend
fn open_engine(config: &PlayerConfig, palette: Palette) -> Result<PlaybackEngine> {
    let scheduler_config = config.scheduler()?;
    match config.backend {
        Backend::Synth => {
            let (bank, clock) = SynthVoiceBank::open(palette)?;
            info!(sample_rate = bank.sample_rate(), "Using built-in synth");
            PlaybackEngine::spawn(Scheduler::new(clock, bank, scheduler_config)?)
        }
        Backend::Midi => {
            let (bank, clock) = MidiVoiceBank::connect(palette, config.midi_port.as_deref())?;
            info!(port = bank.port_name(), "Using MIDI output");
            PlaybackEngine::spawn(Scheduler::new(clock, Arc::new(bank), scheduler_config)?)
        }
    }
}

fn play(
    config: &PlayerConfig,
    sketch: Option<&Path>,
    tempo_override: Option<Tempo>,
    watch: bool,
    autoplay: bool,
) -> Result<()> {
    let palette = Palette::standard();
    let engine = open_engine(config, palette.clone())?;
    let mut ctx = CommandContext::new(engine, palette, config.tempo()?);

    if let Some(path) = sketch {
        ctx.load_sketch(path)?;
    }
    if let Some(tempo) = tempo_override {
        ctx.tempo = tempo;
    }
    if autoplay {
        if let StartOutcome::EmptyCanvas = ctx.play()? {
            println!("{}", "Canvas is empty, nothing to play yet".yellow());
        }
    }

    let watched = match (watch, sketch) {
        (true, Some(path)) => Some(path),
        (true, None) => anyhow::bail!("--watch needs a sketch file"),
        (false, _) => None,
    };
    repl::start(ctx, watched)
}

fn dump(
    config: &PlayerConfig,
    path: &Path,
    tempo_override: Option<Tempo>,
    columns: u64,
) -> Result<()> {
    let sketch = Sketch::load(path)?;
    if !sketch.grid.has_content() {
        println!("{}", "Canvas is empty, nothing would play".yellow());
        return Ok(());
    }
    let tempo = match tempo_override.or(sketch.tempo) {
        Some(tempo) => tempo,
        None => config.tempo()?,
    };
    let palette = Palette::standard();
    let batches = dump_schedule(
        sketch.grid,
        tempo,
        palette.clone(),
        config.scheduler()?,
        usize::try_from(columns)?,
    )?;
    println!("{} at {:.1} BPM", path.display(), tempo.bpm());
    print!("{}", format_schedule(&batches, &palette));
    Ok(())
}
