//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where assembled-video profiles are stored.
    pub profiles_dir: PathBuf,

    /// Directory where text style profiles are stored.
    pub text_styles_dir: PathBuf,

    /// Authoring canvas dimensions.
    pub canvas: CanvasConfig,

    /// Timestamp allocation parameters.
    pub allocator: AllocatorConfig,

    /// Editing preview behaviour.
    pub preview: PreviewConfig,

    /// Broadcast (theatre) timings.
    pub theatre: TheatreConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Reference canvas that overlay coordinates are authored against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub reference_width: f64,
    pub reference_height: f64,
}

/// Parameters for collision-free timestamp allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Smallest schedulable offset (ms).
    pub floor_ms: u64,

    /// Increment applied to a colliding start candidate (ms).
    pub start_step_ms: u64,

    /// Increment applied to a colliding stop candidate (ms).
    pub stop_step_ms: u64,

    /// Upper bound on probes before giving up.
    pub max_attempts: u32,
}

/// Editing preview settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Settle time before a view resize is applied (ms).
    pub resize_debounce_ms: u64,

    /// Distance from the edited timestamp to reseek to after a rebuild (ms).
    pub reseek_offset_ms: u64,

    /// Pause the primary clock whenever a marker fires.
    pub auto_pause: bool,
}

/// Broadcast queue timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheatreConfig {
    /// Standby countdown start value (seconds).
    pub countdown_from: u8,

    /// Remaining playback at which the current profile is dequeued (ms).
    pub advance_remaining_ms: u64,

    /// Fade to black before the next queued profile (ms).
    pub advance_fade_ms: u64,

    /// Fade to black when the broadcast stops (ms).
    pub stop_fade_ms: u64,

    /// Overlay crossfade duration (ms).
    pub overlay_fade_ms: u64,

    /// Primary fade-in once a profile is ready (ms).
    pub fade_in_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "cueline=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data = data_dir();
        Self {
            profiles_dir: data.join("profiles"),
            text_styles_dir: data.join("text"),
            canvas: CanvasConfig::default(),
            allocator: AllocatorConfig::default(),
            preview: PreviewConfig::default(),
            theatre: TheatreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            reference_width: 1280.0,
            reference_height: 720.0,
        }
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            floor_ms: 20,
            start_step_ms: 1,
            stop_step_ms: 5,
            max_attempts: 10_000,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            resize_debounce_ms: 500,
            reseek_offset_ms: 50,
            auto_pause: false,
        }
    }
}

impl Default for TheatreConfig {
    fn default() -> Self {
        Self {
            countdown_from: 6,
            advance_remaining_ms: 2000,
            advance_fade_ms: 1500,
            stop_fade_ms: 5000,
            overlay_fade_ms: 1250,
            fade_in_ms: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("cueline").join("config.json")
}

/// Default data directory for profiles and text styles.
fn data_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("cueline")
}
