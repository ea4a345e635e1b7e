//! Run the preview against a virtual clock and print what the surface sees.

use cueline_common::AppConfig;
use cueline_playback_engine::sim::{self, SimBackend, SurfaceCall};
use cueline_playback_engine::PreviewEngine;
use cueline_project_model::TextStyleStore;

use super::{describe_fade, describe_overlay, load_profile, parse_view, store};

pub fn run(
    config: &AppConfig,
    profile: String,
    duration: u64,
    until: Option<u64>,
    step: u64,
    view: String,
    assume_media: bool,
) -> anyhow::Result<()> {
    let store = store(config);
    let profile = load_profile(&store, &profile)?;
    let (width, height) = parse_view(&view)?;
    if step == 0 {
        anyhow::bail!("Step must be at least 1ms");
    }
    let until = until.unwrap_or(duration).min(duration);

    let backend = SimBackend::new().with_media(&profile.media_path, duration);
    if assume_media {
        for (_, transition) in profile.registry.iter() {
            if let Some(path) = transition.media_path() {
                backend.add_media(path, duration);
            }
        }
    }

    let (parts, handles) = sim::rig(backend);
    let mut preview = PreviewEngine::new(config, parts)
        .with_text_styles(TextStyleStore::new(&config.text_styles_dir));

    println!(
        "Simulating '{}' for {}ms at {}x{} ({}ms steps)",
        profile.name, until, width, height, step
    );
    preview.open(&profile)?;
    preview.on_view_resized(width, height);
    preview.pump(&profile)?;
    println!("  {} markers armed", preview.markers().len());

    let mut seen = 0;
    let mut elapsed = 0;
    while elapsed < until {
        let delta = step.min(until - elapsed);
        elapsed += delta;
        if let Some(clock) = handles.backend.primary() {
            clock.advance_by(delta);
        }
        handles.timers.advance(delta);
        preview.pump(&profile)?;

        let calls = handles.surface.calls();
        for call in &calls[seen..] {
            let line = match call {
                SurfaceCall::Present(overlay) => format!("+ {}", describe_overlay(overlay)),
                SurfaceCall::Update(overlay) => format!("~ {}", describe_overlay(overlay)),
                SurfaceCall::Dismiss(key) => format!("- {key}"),
                SurfaceCall::Fade {
                    target,
                    from,
                    to,
                    duration_ms,
                } => describe_fade(target, *from, *to, *duration_ms),
            };
            println!("  [{}] {}", preview.time_text(), line);
        }
        seen = calls.len();
    }

    let active = preview.active_overlays();
    println!(
        "Stopped at {} with {} active overlay(s){}",
        preview.time_text(),
        active.len(),
        if active.is_empty() {
            String::new()
        } else {
            format!(": {}", active.join(", "))
        }
    );
    preview.close();
    Ok(())
}
