//! Unattended broadcast playback of a queue of assembled videos.
//!
//! The theatre plays on the unscaled 1280x720 frame. A break starts with a
//! countdown, then plays the head of the queue. Shortly before each video
//! ends the head is dequeued and, after a fade to black, the next one
//! starts. Overlays always crossfade.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use cueline_common::{format_clock, AppConfig, CuelineError, CuelineResult, TheatreConfig};
use cueline_project_model::{MarkerTable, Profile, ProfileStore, TextStyleStore};

use crate::canvas::CanvasScale;
use crate::compositor::{Compositor, Retirement};
use crate::dispatch::{ClockEvent, Dispatcher, EngineEvent, Generation};
use crate::media::MediaBackend;
use crate::scene::{Applied, Scene};
use crate::timers::{TimerKind, Timers};
use crate::Collaborators;

/// Where profiles in the queue come from.
pub trait ProfileSource {
    fn load_profile(&self, name: &str) -> CuelineResult<Profile>;
}

impl ProfileSource for ProfileStore {
    fn load_profile(&self, name: &str) -> CuelineResult<Profile> {
        Ok(self.load(name)?)
    }
}

impl ProfileSource for BTreeMap<String, Profile> {
    fn load_profile(&self, name: &str) -> CuelineResult<Profile> {
        self.get(name)
            .cloned()
            .ok_or_else(|| CuelineError::profile(format!("no profile named '{name}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandbyState {
    Idle,
    /// Seconds left before the break starts.
    Counting(u8),
    Running,
}

pub struct TheatreEngine {
    config: TheatreConfig,
    backend: Box<dyn MediaBackend>,
    source: Box<dyn ProfileSource>,
    styles: Option<TextStyleStore>,
    scene: Scene,
    timers: Timers,
    dispatcher: Dispatcher,
    queue: VecDeque<String>,
    standby: StandbyState,
    current: Option<Profile>,
    /// Set once the playing video has been dequeued.
    advanced: bool,
    stopping: bool,
    timer_text: String,
    skipped: Vec<(String, String)>,
}

impl std::fmt::Debug for TheatreEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TheatreEngine")
            .field("standby", &self.standby)
            .field("queue", &self.queue)
            .field("now_playing", &self.now_playing())
            .field("generation", &self.dispatcher.generation())
            .field("scene", &self.scene)
            .finish_non_exhaustive()
    }
}

impl TheatreEngine {
    pub fn new(config: &AppConfig, parts: Collaborators, source: Box<dyn ProfileSource>) -> Self {
        let compositor = Compositor::new(parts.surface, CanvasScale::identity())
            .with_crossfade(config.theatre.overlay_fade_ms);
        Self {
            config: config.theatre,
            backend: parts.backend,
            source,
            styles: None,
            scene: Scene::new(compositor),
            timers: Timers::new(parts.timers),
            dispatcher: parts.dispatcher,
            queue: VecDeque::new(),
            standby: StandbyState::Idle,
            current: None,
            advanced: false,
            stopping: false,
            timer_text: String::new(),
            skipped: Vec::new(),
        }
    }

    pub fn with_text_styles(mut self, store: TextStyleStore) -> Self {
        self.styles = Some(store);
        self
    }

    // -- queue -------------------------------------------------------------

    pub fn enqueue(&mut self, name: impl Into<String>) {
        let name = name.into();
        tracing::info!(profile = %name, position = self.queue.len(), "Queued");
        self.queue.push_back(name);
    }

    /// Drop the first queued entry named `name`. The playing head cannot be
    /// removed this way.
    pub fn remove(&mut self, name: &str) -> bool {
        let skip = usize::from(self.current.is_some() && !self.advanced);
        let Some(index) = self
            .queue
            .iter()
            .skip(skip)
            .position(|n| n == name)
            .map(|i| i + skip)
        else {
            return false;
        };
        self.queue.remove(index);
        true
    }

    pub fn queue(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(String::as_str)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    // -- accessors ---------------------------------------------------------

    pub fn standby(&self) -> StandbyState {
        self.standby
    }

    /// Countdown as `MM:SS`; empty outside the countdown.
    pub fn timer_text(&self) -> &str {
        &self.timer_text
    }

    pub fn now_playing(&self) -> Option<&str> {
        self.current.as_ref().map(|p| p.name.as_str())
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    pub fn generation(&self) -> Generation {
        self.dispatcher.generation()
    }

    pub fn markers(&self) -> &MarkerTable {
        self.scene.markers()
    }

    pub fn active_overlays(&self) -> Vec<String> {
        self.scene
            .compositor()
            .active_keys()
            .map(str::to_string)
            .collect()
    }

    pub fn current_time_ms(&self) -> u64 {
        self.scene.current_time_ms()
    }

    /// Queue entries that could not be played, with the reason.
    pub fn skipped(&self) -> &[(String, String)] {
        &self.skipped
    }

    // -- standby -----------------------------------------------------------

    /// Start the countdown to a break.
    pub fn start_commercial_break(&mut self) -> CuelineResult<()> {
        if self.standby != StandbyState::Idle || self.stopping {
            return Err(CuelineError::clock_conflict("a break is already in progress"));
        }
        if self.queue.is_empty() {
            return Err(CuelineError::playback("the queue is empty"));
        }
        let from = self.config.countdown_from;
        self.standby = StandbyState::Counting(from);
        self.timer_text = format_clock(u64::from(from));
        self.timers.start(TimerKind::StandbyTick, Duration::from_secs(1));
        tracing::info!(countdown = from, queued = self.queue.len(), "Break countdown started");
        Ok(())
    }

    fn on_tick(&mut self) -> CuelineResult<()> {
        let StandbyState::Counting(left) = self.standby else {
            return Ok(());
        };
        let left = left.saturating_sub(1);
        self.timer_text = format_clock(u64::from(left));
        if left > 0 {
            self.standby = StandbyState::Counting(left);
            self.timers.start(TimerKind::StandbyTick, Duration::from_secs(1));
            return Ok(());
        }
        self.standby = StandbyState::Running;
        self.timer_text.clear();
        self.scene.teardown();
        tracing::info!("Break running");
        self.next_profile()
    }

    /// Open and arm the head of the queue. Entries that fail to open are
    /// dropped and recorded in [`skipped`](Self::skipped).
    pub fn next_profile(&mut self) -> CuelineResult<()> {
        while let Some(name) = self.queue.front().cloned() {
            match self.open_profile(&name) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_operator_facing() => {
                    tracing::error!(profile = %name, error = %e, "Skipping queued profile");
                    self.scene.teardown();
                    self.queue.pop_front();
                    self.skipped.push((name, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!("Queue exhausted");
        self.stop_commercial_break();
        Ok(())
    }

    fn open_profile(&mut self, name: &str) -> CuelineResult<()> {
        let profile = self.source.load_profile(name)?;
        let events = self.dispatcher.begin_generation();
        self.scene
            .open(self.backend.as_mut(), &profile.media_path, events)?;
        self.scene.arm(self.backend.as_ref(), &profile.registry)?;
        self.advanced = false;
        tracing::info!(
            profile = %profile.name,
            generation = self.dispatcher.generation(),
            markers = self.scene.markers().len(),
            "Now playing"
        );
        self.current = Some(profile);
        Ok(())
    }

    /// Dequeue the finishing video and move on: fade to the next one, or
    /// end the break when nothing is left.
    fn advance(&mut self) -> CuelineResult<()> {
        self.advanced = true;
        if let Some(done) = self.queue.pop_front() {
            tracing::info!(profile = %done, remaining = self.queue.len(), "Dequeued");
        }
        self.scene.clear_transient();
        if self.queue.is_empty() {
            self.stop_commercial_break();
            return Ok(());
        }
        self.scene
            .compositor_mut()
            .fade_primary(1.0, 0.0, self.config.advance_fade_ms);
        self.timers.start(
            TimerKind::AdvanceFade,
            Duration::from_millis(self.config.advance_fade_ms),
        );
        Ok(())
    }

    /// Stop immediately: clear the queue and scene, then fade out.
    pub fn stop_commercial_break(&mut self) {
        match self.standby {
            StandbyState::Idle => {}
            StandbyState::Counting(_) => {
                self.timers.cancel(&TimerKind::StandbyTick);
                self.standby = StandbyState::Idle;
                self.timer_text.clear();
                tracing::info!("Break countdown cancelled");
            }
            StandbyState::Running if self.stopping => {}
            StandbyState::Running => {
                self.stopping = true;
                self.queue.clear();
                self.timers.cancel(&TimerKind::AdvanceFade);
                if let Ok(clock) = self.scene.clock_mut() {
                    if let Err(e) = clock.pause() {
                        tracing::debug!(error = %e, "Clock did not pause");
                    }
                }
                self.scene.clear_transient();
                self.dispatcher.invalidate();
                self.scene
                    .compositor_mut()
                    .fade_primary(1.0, 0.0, self.config.stop_fade_ms);
                self.timers.start(
                    TimerKind::StopFade,
                    Duration::from_millis(self.config.stop_fade_ms),
                );
                tracing::info!("Break stopping");
            }
        }
    }

    fn finish_stop(&mut self) {
        self.scene.teardown();
        self.dispatcher.invalidate();
        self.current = None;
        self.stopping = false;
        self.standby = StandbyState::Idle;
        tracing::info!("Break ended");
    }

    // -- event loop --------------------------------------------------------

    pub fn pump(&mut self) -> CuelineResult<usize> {
        let mut applied = 0;
        while let Some(event) = self.dispatcher.try_next() {
            self.handle(event)?;
            applied += 1;
        }
        Ok(applied)
    }

    pub fn pump_timeout(&mut self, timeout: Duration) -> CuelineResult<usize> {
        match self.dispatcher.next_timeout(timeout) {
            Some(event) => {
                self.handle(event)?;
                Ok(1 + self.pump()?)
            }
            None => Ok(0),
        }
    }

    fn handle(&mut self, event: EngineEvent) -> CuelineResult<()> {
        match event {
            EngineEvent::Clock { event, .. } => self.on_clock(event),
            EngineEvent::Timer { kind, token } => {
                if self.timers.accept(&kind, token) {
                    self.on_timer(kind)?;
                }
                Ok(())
            }
        }
    }

    fn on_clock(&mut self, event: ClockEvent) -> CuelineResult<()> {
        match event {
            ClockEvent::Ready { duration_ms } => {
                self.scene.set_duration(duration_ms);
                let volume = self.current.as_ref().map_or(1.0, |p| p.volume);
                self.scene
                    .compositor_mut()
                    .fade_primary(0.0, 1.0, self.config.fade_in_ms);
                let clock = self.scene.clock_mut()?;
                clock.set_volume(volume)?;
                clock.play()?;
            }
            ClockEvent::Marker(marker) => {
                if self.advanced {
                    return Ok(());
                }
                let Some(profile) = self.current.as_ref() else {
                    return Ok(());
                };
                let applied =
                    self.scene
                        .apply(self.backend.as_mut(), profile, &marker, self.styles.as_ref())?;
                if applied == Applied::Retired(Retirement::Fading) {
                    self.timers.start(
                        TimerKind::OverlayFadeOut(marker.key.clone()),
                        Duration::from_millis(self.config.overlay_fade_ms),
                    );
                }
            }
            ClockEvent::TimeChanged(ms) => {
                let Some(duration) = self.scene.duration_ms().filter(|d| *d > 0) else {
                    return Ok(());
                };
                if !self.advanced && duration.saturating_sub(ms) <= self.config.advance_remaining_ms {
                    tracing::debug!(at_ms = ms, duration_ms = duration, "Advance threshold crossed");
                    self.advance()?;
                }
            }
            ClockEvent::EndOfMedia => {
                if !self.advanced {
                    self.advance()?;
                }
            }
            ClockEvent::Playing => self.scene.compositor_mut().play_players(),
            ClockEvent::Paused => self.scene.compositor_mut().pause_players(),
            ClockEvent::Stopped | ClockEvent::VolumeChanged(_) => {}
            ClockEvent::Error(message) => {
                tracing::error!(%message, "Media clock error, advancing");
                if !self.advanced {
                    self.advance()?;
                }
            }
        }
        Ok(())
    }

    fn on_timer(&mut self, kind: TimerKind) -> CuelineResult<()> {
        match kind {
            TimerKind::StandbyTick => self.on_tick()?,
            TimerKind::OverlayFadeOut(key) => {
                self.scene.compositor_mut().finish_fade(&key);
            }
            TimerKind::AdvanceFade => {
                self.scene.teardown();
                self.dispatcher.invalidate();
                self.current = None;
                self.next_profile()?;
            }
            TimerKind::StopFade => self.finish_stop(),
            TimerKind::ResizeGrow | TimerKind::ResizeShrink => {}
        }
        Ok(())
    }
}
