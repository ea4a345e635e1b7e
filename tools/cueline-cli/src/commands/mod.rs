//! Subcommand implementations.

use anyhow::Context;
use cueline_common::AppConfig;
use cueline_playback_engine::{FadeTarget, Overlay, OverlayContent};
use cueline_project_model::{Profile, ProfileStore, Stop, TimestampAllocator};

pub mod add;
pub mod broadcast;
pub mod info;
pub mod init;
pub mod list;
pub mod remove;
pub mod rename;
pub mod set_time;
pub mod simulate;
pub mod validate;

/// Profile store for the configured directory and allocator.
pub fn store(config: &AppConfig) -> ProfileStore {
    ProfileStore::new(&config.profiles_dir)
        .with_allocator(TimestampAllocator::new(config.allocator))
}

pub fn load_profile(store: &ProfileStore, name: &str) -> anyhow::Result<Profile> {
    store
        .load(name)
        .with_context(|| format!("Failed to load profile '{name}'"))
}

pub fn save_profile(store: &ProfileStore, profile: &mut Profile) -> anyhow::Result<()> {
    let path = store
        .save(profile)
        .with_context(|| format!("Failed to save profile '{}'", profile.name))?;
    println!("Saved {}", path.display());
    Ok(())
}

/// Parse a stop argument: milliseconds or `*`.
pub fn parse_stop(value: &str) -> anyhow::Result<Stop> {
    if value.trim() == cueline_project_model::OPEN_SENTINEL {
        return Ok(Stop::Open);
    }
    let ms = value
        .trim()
        .parse::<u64>()
        .with_context(|| format!("Invalid stop '{value}': expected milliseconds or '*'"))?;
    Ok(Stop::At(ms))
}

/// Parse `WIDTHxHEIGHT`.
pub fn parse_view(value: &str) -> anyhow::Result<(f64, f64)> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .with_context(|| format!("Invalid view size '{value}': expected WIDTHxHEIGHT"))?;
    let width: f64 = w.trim().parse().context("Invalid view width")?;
    let height: f64 = h.trim().parse().context("Invalid view height")?;
    if width <= 0.0 || height <= 0.0 {
        anyhow::bail!("View size must be positive");
    }
    Ok((width, height))
}

/// One-line summary of an overlay for console output.
pub fn describe_overlay(overlay: &Overlay) -> String {
    let what = match &overlay.content {
        OverlayContent::Text { message, font_size, .. } => {
            format!("{} text {:?} {:.0}pt", overlay.key, message, font_size)
        }
        OverlayContent::Image { path, .. } => {
            format!("{} image {}", overlay.key, path.display())
        }
        OverlayContent::Video { path, .. } => {
            format!("{} video {}", overlay.key, path.display())
        }
    };
    format!(
        "{} at ({:.0}, {:.0})",
        what, overlay.view.x, overlay.view.y
    )
}

pub fn describe_fade(target: &FadeTarget, from: f64, to: f64, duration_ms: u64) -> String {
    let target = match target {
        FadeTarget::Overlay(key) => key.as_str(),
        FadeTarget::Primary => "primary",
    };
    format!("fade {target} {from:.1} -> {to:.1} over {duration_ms}ms")
}
