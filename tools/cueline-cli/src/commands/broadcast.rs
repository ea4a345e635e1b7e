//! Run a queued break with real timers and a console surface.

use std::time::{Duration, Instant};

use cueline_common::AppConfig;
use cueline_playback_engine::sim::SimBackend;
use cueline_playback_engine::{
    Collaborators, Dispatcher, FadeTarget, Overlay, StandbyState, Surface, TheatreEngine,
    TokioTimerService,
};
use cueline_project_model::TextStyleStore;
use tokio::time::MissedTickBehavior;

use super::{describe_fade, describe_overlay, store};

const TICK_MS: u64 = 50;

/// Prints every surface call.
struct ConsoleSurface;

impl Surface for ConsoleSurface {
    fn present(&mut self, overlay: &Overlay) {
        println!("  + {}", describe_overlay(overlay));
    }

    fn update(&mut self, overlay: &Overlay) {
        println!("  ~ {}", describe_overlay(overlay));
    }

    fn dismiss(&mut self, key: &str) {
        println!("  - {key}");
    }

    fn fade(&mut self, target: &FadeTarget, from: f64, to: f64, duration_ms: u64) {
        println!("  {}", describe_fade(target, from, to, duration_ms));
    }
}

pub async fn run(
    config: &AppConfig,
    profiles: Vec<String>,
    duration: u64,
    speed: f64,
    assume_media: bool,
) -> anyhow::Result<()> {
    if !(speed.is_finite() && speed > 0.0) {
        anyhow::bail!("Speed must be a positive number");
    }

    // Register queued media with the simulated backend up front; profiles
    // that fail to load are skipped by the engine when their turn comes.
    let backend = SimBackend::new();
    let profile_store = store(config);
    for name in &profiles {
        match profile_store.load(name) {
            Ok(profile) => {
                backend.add_media(&profile.media_path, duration);
                if assume_media {
                    for (_, transition) in profile.registry.iter() {
                        if let Some(path) = transition.media_path() {
                            backend.add_media(path, duration);
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(profile = %name, error = %e, "Queued profile cannot be loaded"),
        }
    }

    let dispatcher = Dispatcher::new();
    let timers = TokioTimerService::new(dispatcher.sender()).with_speed(speed);
    let parts = Collaborators {
        backend: Box::new(backend.clone()),
        surface: Box::new(ConsoleSurface),
        timers: Box::new(timers),
        dispatcher,
    };
    let mut theatre = TheatreEngine::new(config, parts, Box::new(profile_store))
        .with_text_styles(TextStyleStore::new(&config.text_styles_dir));
    for name in profiles {
        theatre.enqueue(name);
    }

    println!(
        "Starting break with {} video(s) at {}x speed (Ctrl+C to stop)",
        theatre.queue_len(),
        speed
    );
    theatre.start_commercial_break()?;

    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();
    let mut carry = 0.0_f64;
    let mut shown_timer = String::new();
    let mut shown_playing: Option<String> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                carry += now.duration_since(last).as_secs_f64() * 1000.0 * speed;
                last = now;
                let delta = carry.floor();
                carry -= delta;
                if let Some(clock) = backend.primary() {
                    clock.advance_by(delta as u64);
                }
                theatre.pump()?;

                if theatre.timer_text() != shown_timer {
                    shown_timer = theatre.timer_text().to_string();
                    if !shown_timer.is_empty() {
                        println!("Starting in {shown_timer}");
                    }
                }
                let playing = theatre.now_playing().map(str::to_string);
                if playing != shown_playing {
                    if let Some(name) = &playing {
                        println!("Now playing: {name} ({} queued)", theatre.queue_len());
                    }
                    shown_playing = playing;
                }
                if theatre.standby() == StandbyState::Idle {
                    break;
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                if !theatre.is_stopping() {
                    println!("Stopping break");
                    theatre.stop_commercial_break();
                }
            }
        }
    }

    for (name, reason) in theatre.skipped() {
        println!("  [SKIP] {name}: {reason}");
    }
    println!("Break finished");
    Ok(())
}
