//! Cueline CLI: command-line interface for assembled-video profiles.
//!
//! Usage:
//!   cueline init <NAME> <MEDIA>          Create a profile for a media file
//!   cueline list                          List saved profiles and text styles
//!   cueline add <PROFILE> <CATEGORY>      Add a transition
//!   cueline set-time <PROFILE> <KEY>      Set a transition's start or stop
//!   cueline rename <PROFILE> <OLD> <NEW>  Rename a transition
//!   cueline remove <PROFILE> <KEY>        Delete a transition
//!   cueline info <PROFILE>                Show transitions and marker table
//!   cueline validate <PROFILE>            Check media and scheduling
//!   cueline simulate <PROFILE>            Run the preview in virtual time
//!   cueline broadcast <PROFILE>...        Run a queued break in real time

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "cueline",
    about = "Timeline overlays and queued broadcast playback for assembled videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Profile directory (defaults to the configured one)
    #[arg(long, global = true)]
    profiles_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty profile
    Init {
        /// Profile name
        name: String,

        /// Primary media file
        media: PathBuf,

        /// Primary volume [0.0, 1.0]
        #[arg(long, default_value = "1.0")]
        volume: f64,
    },

    /// List saved profiles and text styles
    List,

    /// Add a transition with default fields
    Add {
        /// Profile name
        profile: String,

        /// Text, Image, Audio, Video, FF or Cut
        category: String,

        /// Full delimited record to use instead of the defaults
        #[arg(long)]
        record: Option<String>,

        /// Start offset in milliseconds
        #[arg(long)]
        start: Option<u64>,

        /// Stop offset in milliseconds, or `*` for open
        #[arg(long)]
        stop: Option<String>,
    },

    /// Set a transition's start and/or stop
    SetTime {
        /// Profile name
        profile: String,

        /// Marker-key
        key: String,

        /// Start offset in milliseconds
        #[arg(long)]
        start: Option<u64>,

        /// Stop offset in milliseconds, or `*` for open
        #[arg(long)]
        stop: Option<String>,
    },

    /// Rename a transition
    Rename {
        profile: String,
        old: String,
        new: String,
    },

    /// Delete a transition
    Remove { profile: String, key: String },

    /// Show profile transitions and the marker table
    Info {
        /// Profile name
        profile: String,

        /// Print the marker table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check media files and timestamp uniqueness
    Validate {
        /// Profile name
        profile: String,
    },

    /// Play the preview in virtual time and print every overlay change
    Simulate {
        /// Profile name
        profile: String,

        /// Primary media duration in milliseconds
        #[arg(long, default_value = "60000")]
        duration: u64,

        /// Stop after this playhead (defaults to the duration)
        #[arg(long)]
        until: Option<u64>,

        /// Virtual clock step in milliseconds
        #[arg(long, default_value = "100")]
        step: u64,

        /// View size as WIDTHxHEIGHT
        #[arg(long, default_value = "1280x720")]
        view: String,

        /// Treat every referenced media file as present
        #[arg(long)]
        assume_media: bool,
    },

    /// Run a break over queued profiles with real timers
    Broadcast {
        /// Profiles to queue, in order
        #[arg(required = true)]
        profiles: Vec<String>,

        /// Primary media duration in milliseconds
        #[arg(long, default_value = "15000")]
        duration: u64,

        /// Playback speed multiplier
        #[arg(long, default_value = "1.0")]
        speed: f64,

        /// Treat every referenced media file as present
        #[arg(long)]
        assume_media: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = cueline_common::AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    cueline_common::logging::init_logging(&config.logging);
    if let Some(dir) = cli.profiles_dir {
        config.profiles_dir = dir;
    }

    match cli.command {
        Commands::Init {
            name,
            media,
            volume,
        } => commands::init::run(&config, name, media, volume),
        Commands::List => commands::list::run(&config),
        Commands::Add {
            profile,
            category,
            record,
            start,
            stop,
        } => commands::add::run(&config, profile, category, record, start, stop),
        Commands::SetTime {
            profile,
            key,
            start,
            stop,
        } => commands::set_time::run(&config, profile, key, start, stop),
        Commands::Rename { profile, old, new } => {
            commands::rename::run(&config, profile, old, new)
        }
        Commands::Remove { profile, key } => commands::remove::run(&config, profile, key),
        Commands::Info { profile, json } => commands::info::run(&config, profile, json),
        Commands::Validate { profile } => commands::validate::run(&config, profile),
        Commands::Simulate {
            profile,
            duration,
            until,
            step,
            view,
            assume_media,
        } => commands::simulate::run(
            &config,
            profile,
            duration,
            until,
            step,
            view,
            assume_media,
        ),
        Commands::Broadcast {
            profiles,
            duration,
            speed,
            assume_media,
        } => commands::broadcast::run(&config, profiles, duration, speed, assume_media).await,
    }
}
