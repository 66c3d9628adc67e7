//! chordweaver: chord-progression composer
//!
//! Subcommands:
//! - `chordweaver detect C4 E4 G4` - Name a chord
//! - `chordweaver suggest C major --chord G7` - Harmonic suggestions
//! - `chordweaver schedule "Cmaj7:4,Am7:4,rest:2"` - Show the compiled schedule
//! - `chordweaver play "Cmaj7:4,Am7:4"` - Realtime playback

mod commands;
mod config;

use anyhow::Result;
use chordweaver_core::{Archetype, InstrumentSettings, RepeatCount};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chordweaver")]
#[command(about = "Compose, analyse and audition chord progressions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of the configured session
#[derive(clap::Args, Default)]
struct PlaybackArgs {
    /// Tempo in beats per minute
    #[arg(long)]
    bpm: Option<f64>,

    /// Arpeggiate with this step (e.g. 8n, 16t, 0.25s)
    #[arg(long)]
    arp: Option<String>,

    /// Arpeggio passes over each chord; unbounded when omitted
    #[arg(long)]
    repeat: Option<u32>,

    /// Voice archetype: basic, fm, am or mono
    #[arg(long)]
    instrument: Option<String>,

    /// Play once instead of looping
    #[arg(long)]
    once: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Name the chord formed by a set of notes
    Detect {
        #[arg(required = true)]
        notes: Vec<String>,
    },

    /// Rotate a voicing to its next inversion
    Invert {
        #[arg(required = true)]
        notes: Vec<String>,

        /// Go down instead of up
        #[arg(long)]
        previous: bool,
    },

    /// Random alternative voicing of the same chord
    Permute {
        #[arg(required = true)]
        notes: Vec<String>,
    },

    /// Fold notes into the playable window around middle C
    Wrap {
        #[arg(required = true)]
        notes: Vec<String>,
    },

    /// Diatonic and borrowed chords of a key
    Key {
        tonic: Option<String>,
        mode: Option<String>,
    },

    /// Resolve a roman numeral in a key
    Roman {
        numeral: String,
        tonic: Option<String>,
        mode: Option<String>,
    },

    /// Suggestions for what comes next
    Suggest {
        tonic: Option<String>,
        mode: Option<String>,

        /// Chord to suggest from
        #[arg(short, long)]
        chord: Option<String>,
    },

    /// Print the compiled schedule of a progression
    Schedule {
        /// Progression such as "Cmaj7:4,Am7:4,rest:2"
        progression: String,

        #[command(flatten)]
        playback: PlaybackArgs,
    },

    /// Play a progression on the default output device
    Play {
        progression: String,

        /// How long to play for
        #[arg(short, long, default_value = "16")]
        seconds: f64,

        #[command(flatten)]
        playback: PlaybackArgs,
    },

    /// Show the configuration, or write the defaults
    Config {
        #[arg(long)]
        init: bool,
    },
}

fn apply_playback_args(config: &mut config::AppConfig, args: PlaybackArgs) -> Result<()> {
    let session = &mut config.session;
    if let Some(bpm) = args.bpm {
        session.tempo.bpm = bpm;
    }
    if let Some(step) = args.arp {
        session.arpeggiator.active = true;
        session.arpeggiator.step = step.parse()?;
    }
    if let Some(times) = args.repeat {
        session.arpeggiator.repeat = RepeatCount::times(times);
    }
    if let Some(name) = args.instrument {
        let archetype: Archetype = name.parse()?;
        if session.instrument.archetype() != archetype {
            session.instrument = InstrumentSettings::default_for(archetype);
        }
    }
    if args.once {
        session.loop_enabled = false;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("chordweaver=info".parse()?)
            .add_directive("cpal=warn".parse()?))
        .init();

    let cli = Cli::parse();
    let mut config = config::load_config();

    match cli.command {
        Commands::Detect { notes } => commands::detect(&notes),
        Commands::Invert { notes, previous } => commands::invert(&notes, previous),
        Commands::Permute { notes } => commands::permute(&notes),
        Commands::Wrap { notes } => commands::wrap(&notes),
        Commands::Key { tonic, mode } => {
            let key = commands::resolve_key(tonic, mode, &config)?;
            commands::key(&key)
        }
        Commands::Roman { numeral, tonic, mode } => {
            let key = commands::resolve_key(tonic, mode, &config)?;
            commands::roman(&numeral, &key, config.octave)
        }
        Commands::Suggest { tonic, mode, chord } => {
            let key = commands::resolve_key(tonic, mode, &config)?;
            commands::suggest(&key, chord.as_deref())
        }
        Commands::Schedule { progression, playback } => {
            apply_playback_args(&mut config, playback)?;
            let progression = commands::parse_progression(&progression, config.octave)?;
            commands::schedule(&progression, &config)
        }
        Commands::Play { progression, seconds, playback } => {
            apply_playback_args(&mut config, playback)?;
            let progression = commands::parse_progression(&progression, config.octave)?;
            tracing::info!(events = progression.len(), seconds, "Starting playback");
            commands::play(progression, seconds, &config)
        }
        Commands::Config { init } => {
            if init {
                let path = config::save_config(&config::AppConfig::default())?;
                println!("wrote {}", path.display());
            } else {
                println!("# {}", config::config_path().display());
                print!("{}", toml::to_string_pretty(&config)?);
            }
            Ok(())
        }
    }
}
