//! Interactive editing preview.
//!
//! Plays one assembled video over a scaled view of the authoring canvas.
//! Every structural edit tears the whole timeline down and re-arms it from
//! the registry, then reseeks near the edit point. Only text message and
//! font size are patched onto the live overlay.
//!
//! Lifecycle: `Unloaded -> Loaded -> Armed -> Playing <-> Paused`, with
//! teardown always returning to `Unloaded` before a rebuild.

use std::time::Duration;

use cueline_common::{
    format_elapsed, AppConfig, CanvasConfig, CuelineError, CuelineResult, MediaTime, PreviewConfig,
};
use cueline_project_model::{Category, MarkerKey, MarkerTable, Profile, Stop, TextStyleStore, Transition};

use crate::canvas::{CanvasScale, ResizeDebouncer};
use crate::compositor::Compositor;
use crate::dispatch::{ClockEvent, Dispatcher, EngineEvent, Generation};
use crate::media::MediaBackend;
use crate::scene::{Applied, Scene};
use crate::timers::{TimerKind, Timers};
use crate::Collaborators;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    Unloaded,
    /// Clock opened, no markers installed.
    Loaded,
    /// Markers installed, waiting for the clock to report ready.
    Armed,
    Playing,
    Paused,
}

pub struct PreviewEngine {
    config: PreviewConfig,
    canvas: CanvasConfig,
    backend: Box<dyn MediaBackend>,
    scene: Scene,
    timers: Timers,
    dispatcher: Dispatcher,
    styles: Option<TextStyleStore>,
    state: PreviewState,
    pending_seek: Option<u64>,
    auto_pause: bool,
    pause_on_next_marker: bool,
    selected: Option<String>,
    debouncer: ResizeDebouncer,
    time_text: String,
}

impl std::fmt::Debug for PreviewEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewEngine")
            .field("state", &self.state)
            .field("generation", &self.dispatcher.generation())
            .field("scene", &self.scene)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl PreviewEngine {
    pub fn new(config: &AppConfig, parts: Collaborators) -> Self {
        let compositor = Compositor::new(parts.surface, CanvasScale::identity());
        Self {
            config: config.preview,
            canvas: config.canvas,
            backend: parts.backend,
            scene: Scene::new(compositor),
            timers: Timers::new(parts.timers),
            dispatcher: parts.dispatcher,
            styles: None,
            state: PreviewState::Unloaded,
            pending_seek: None,
            auto_pause: config.preview.auto_pause,
            pause_on_next_marker: false,
            selected: None,
            debouncer: ResizeDebouncer::default(),
            time_text: format_elapsed(MediaTime::ZERO, MediaTime::ZERO),
        }
    }

    /// Resolve text overlay styles from `store` instead of the built-in
    /// default.
    pub fn with_text_styles(mut self, store: TextStyleStore) -> Self {
        self.styles = Some(store);
        self
    }

    // -- accessors ---------------------------------------------------------

    pub fn state(&self) -> PreviewState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.dispatcher.generation()
    }

    pub fn markers(&self) -> &MarkerTable {
        self.scene.markers()
    }

    /// Keys of the overlays currently on the surface.
    pub fn active_overlays(&self) -> Vec<String> {
        self.scene
            .compositor()
            .active_keys()
            .map(str::to_string)
            .collect()
    }

    /// Keys of the secondary players currently running.
    pub fn active_players(&self) -> Vec<String> {
        self.scene
            .compositor()
            .player_keys()
            .map(str::to_string)
            .collect()
    }

    pub fn scale(&self) -> &CanvasScale {
        self.scene.compositor().scale()
    }

    pub fn current_time_ms(&self) -> u64 {
        self.scene.current_time_ms()
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.scene.duration_ms()
    }

    /// Playhead as `MM:SS/MM:SS`.
    pub fn time_text(&self) -> &str {
        &self.time_text
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn auto_pause(&self) -> bool {
        self.auto_pause
    }

    /// Pause on every marker.
    pub fn set_auto_pause(&mut self, enabled: bool) {
        self.auto_pause = enabled;
    }

    /// Pause on the next marker only.
    pub fn pause_on_next_marker(&mut self) {
        self.pause_on_next_marker = true;
    }

    // -- lifecycle ---------------------------------------------------------

    /// Open the primary clock for `profile`. Any open timeline is torn down
    /// first.
    pub fn load(&mut self, profile: &Profile) -> CuelineResult<()> {
        if self.state != PreviewState::Unloaded {
            self.teardown();
        }
        let events = self.dispatcher.begin_generation();
        self.scene
            .open(self.backend.as_mut(), &profile.media_path, events)?;
        self.state = PreviewState::Loaded;
        tracing::info!(
            profile = %profile.name,
            generation = self.dispatcher.generation(),
            "Preview loaded"
        );
        Ok(())
    }

    /// Install the marker table built from the registry.
    pub fn arm(&mut self, profile: &Profile) -> CuelineResult<usize> {
        if self.state != PreviewState::Loaded {
            return Err(CuelineError::clock_conflict(format!(
                "cannot arm a preview in state {:?}",
                self.state
            )));
        }
        let installed = self.scene.arm(self.backend.as_ref(), &profile.registry)?;
        self.state = PreviewState::Armed;
        Ok(installed)
    }

    /// Load and arm. Playback starts once the clock reports ready.
    pub fn open(&mut self, profile: &Profile) -> CuelineResult<()> {
        self.load(profile)?;
        if let Err(e) = self.arm(profile) {
            self.teardown();
            return Err(e);
        }
        Ok(())
    }

    /// Release every overlay and player, then the primary clock. Events
    /// already queued by the released clock are dropped.
    pub fn teardown(&mut self) {
        self.scene.teardown();
        self.dispatcher.invalidate();
        self.state = PreviewState::Unloaded;
        tracing::debug!(generation = self.dispatcher.generation(), "Preview torn down");
    }

    /// Tear down and re-arm from the current registry, seeking to `reseek`
    /// once the new clock is ready.
    pub fn rebuild(&mut self, profile: &Profile, reseek: Option<u64>) -> CuelineResult<()> {
        self.teardown();
        self.pending_seek = reseek;
        self.open(profile)?;
        tracing::debug!(reseek_ms = ?reseek, markers = self.scene.markers().len(), "Timeline rebuilt");
        Ok(())
    }

    pub fn close(&mut self) {
        self.teardown();
        self.timers.cancel_all();
        self.pending_seek = None;
        self.selected = None;
    }

    // -- transport ---------------------------------------------------------

    pub fn play(&mut self) -> CuelineResult<()> {
        self.scene.clock_mut()?.play()?;
        self.state = PreviewState::Playing;
        Ok(())
    }

    pub fn pause(&mut self) -> CuelineResult<()> {
        self.scene.clock_mut()?.pause()?;
        self.state = PreviewState::Paused;
        Ok(())
    }

    pub fn seek(&mut self, to_ms: u64) -> CuelineResult<()> {
        self.scene.clock_mut()?.seek(to_ms)
    }

    // -- event loop --------------------------------------------------------

    /// Apply every queued event. Returns how many were applied.
    pub fn pump(&mut self, profile: &Profile) -> CuelineResult<usize> {
        let mut applied = 0;
        while let Some(event) = self.dispatcher.try_next() {
            self.handle(profile, event)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Wait up to `timeout` for the first event, then apply everything
    /// queued.
    pub fn pump_timeout(&mut self, profile: &Profile, timeout: Duration) -> CuelineResult<usize> {
        match self.dispatcher.next_timeout(timeout) {
            Some(event) => {
                self.handle(profile, event)?;
                Ok(1 + self.pump(profile)?)
            }
            None => Ok(0),
        }
    }

    fn handle(&mut self, profile: &Profile, event: EngineEvent) -> CuelineResult<()> {
        match event {
            EngineEvent::Clock { event, .. } => self.on_clock(profile, event),
            EngineEvent::Timer { kind, token } => {
                if self.timers.accept(&kind, token) {
                    self.on_timer(kind);
                }
                Ok(())
            }
        }
    }

    fn on_clock(&mut self, profile: &Profile, event: ClockEvent) -> CuelineResult<()> {
        match event {
            ClockEvent::Ready { duration_ms } => {
                self.scene.set_duration(duration_ms);
                let clock = self.scene.clock_mut()?;
                if let Some(to_ms) = self.pending_seek.take() {
                    clock.seek(to_ms)?;
                }
                clock.set_volume(profile.volume)?;
                self.play()?;
                tracing::debug!(duration_ms, "Preview ready");
            }
            ClockEvent::Marker(marker) => self.on_marker(profile, &marker)?,
            ClockEvent::TimeChanged(ms) => {
                let duration = self.scene.duration_ms().unwrap_or(0);
                self.time_text = format_elapsed(MediaTime::from_ms(ms), MediaTime::from_ms(duration));
            }
            ClockEvent::EndOfMedia => {
                tracing::debug!("End of media, replaying");
                self.rebuild(profile, None)?;
            }
            ClockEvent::Playing => {
                self.state = PreviewState::Playing;
                self.scene.compositor_mut().play_players();
            }
            ClockEvent::Paused => {
                self.state = PreviewState::Paused;
                self.scene.compositor_mut().pause_players();
            }
            ClockEvent::Stopped => tracing::trace!("Clock stopped"),
            ClockEvent::VolumeChanged(volume) => tracing::trace!(volume, "Volume changed"),
            ClockEvent::Error(message) => {
                tracing::error!(%message, "Media clock error");
                return Err(CuelineError::playback(message));
            }
        }
        Ok(())
    }

    fn on_marker(&mut self, profile: &Profile, marker: &MarkerKey) -> CuelineResult<()> {
        if self.auto_pause || self.pause_on_next_marker {
            self.pause_on_next_marker = false;
            self.pause()?;
        }
        let applied = self
            .scene
            .apply(self.backend.as_mut(), profile, marker, self.styles.as_ref())?;
        if let Applied::Seeked(to_ms) = applied {
            let duration = self.scene.duration_ms().unwrap_or(0);
            self.time_text = format_elapsed(MediaTime::from_ms(to_ms), MediaTime::from_ms(duration));
        }
        Ok(())
    }

    fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::ResizeGrow | TimerKind::ResizeShrink => {
                if let Some((width, height)) = self.debouncer.settle() {
                    let scale = CanvasScale::for_view(width, height, &self.canvas);
                    self.scene.compositor_mut().set_scale(scale);
                    tracing::debug!(width, height, "View resize applied");
                }
            }
            other => tracing::trace!(?other, "Timer not used by the preview"),
        }
    }

    /// Report a new view size. The scale is applied once resizing has
    /// been quiet for the debounce interval.
    pub fn on_view_resized(&mut self, width: f64, height: f64) {
        if let Some((arm, cancel)) = self.debouncer.request(width, height) {
            self.timers.cancel(&cancel);
            self.timers
                .start(arm, Duration::from_millis(self.config.resize_debounce_ms));
        }
    }

    // -- editing -----------------------------------------------------------

    fn playhead(&self) -> u64 {
        self.scene.current_time_ms()
    }

    /// Rebuild target after editing `key`: just before its start, so the
    /// edited transition is crossed again. Falls back to the playhead.
    fn reseek_before(&self, profile: &Profile, key: Option<&str>) -> u64 {
        key.and_then(|k| profile.registry.get(k))
            .and_then(Transition::start_ms)
            .map(|start| start.saturating_sub(self.config.reseek_offset_ms))
            .unwrap_or_else(|| self.playhead())
    }

    /// Add a default transition. Its start stays unresolved until it is
    /// selected, so the timeline is unchanged.
    pub fn add_transition(&mut self, profile: &mut Profile, category: Category) -> CuelineResult<String> {
        profile.registry.add_default(category)
    }

    /// Select a transition for editing, resolving a `_DEFAULT` start to the
    /// playhead. Returns the start.
    pub fn select_transition(&mut self, profile: &mut Profile, key: &str) -> CuelineResult<u64> {
        let before = profile.registry.require(key)?.start_ms();
        let playhead = self.playhead();
        let start = profile.registry.resolve_start(key, playhead)?;
        self.selected = Some(key.to_string());
        if before.is_none() && self.scene.is_open() {
            let reseek = self.reseek_before(profile, Some(key));
            self.rebuild(profile, Some(reseek))?;
        }
        Ok(start)
    }

    /// Set the start of `key` to the playhead.
    pub fn capture_start(&mut self, profile: &mut Profile, key: &str) -> CuelineResult<u64> {
        let start = profile.registry.set_start(key, self.playhead())?;
        self.rebuild(profile, Some(start.saturating_sub(self.config.reseek_offset_ms)))?;
        Ok(start)
    }

    /// Set the stop of `key` to the playhead.
    pub fn capture_stop(&mut self, profile: &mut Profile, key: &str) -> CuelineResult<Stop> {
        let playhead = self.playhead();
        let stop = profile.registry.set_stop(key, Stop::At(playhead))?;
        let reseek = stop
            .ms()
            .map(|ms| ms.saturating_add(self.config.reseek_offset_ms))
            .unwrap_or(playhead);
        self.rebuild(profile, Some(reseek))?;
        Ok(stop)
    }

    /// Let `key` run to the end of the media.
    pub fn set_stop_open(&mut self, profile: &mut Profile, key: &str) -> CuelineResult<Stop> {
        let stop = profile.registry.set_stop(key, Stop::Open)?;
        let reseek = self.reseek_before(profile, Some(key));
        self.rebuild(profile, Some(reseek))?;
        Ok(stop)
    }

    /// Replace every non-timing field of `key`.
    pub fn edit_transition(
        &mut self,
        profile: &mut Profile,
        key: &str,
        transition: Transition,
    ) -> CuelineResult<()> {
        profile.registry.update(key, transition)?;
        let reseek = self.reseek_before(profile, Some(key));
        self.rebuild(profile, Some(reseek))
    }

    pub fn remove_transition(&mut self, profile: &mut Profile, key: &str) -> CuelineResult<Transition> {
        let removed = profile.registry.remove(key)?;
        if self.selected.as_deref() == Some(key) {
            self.selected = None;
        }
        let selected = self.selected.clone();
        let reseek = self.reseek_before(profile, selected.as_deref());
        self.rebuild(profile, Some(reseek))?;
        Ok(removed)
    }

    pub fn rename_transition(&mut self, profile: &mut Profile, old: &str, new: &str) -> CuelineResult<()> {
        profile.registry.rename(old, new)?;
        if self.selected.as_deref() == Some(old) {
            self.selected = Some(new.to_string());
        }
        let reseek = self.reseek_before(profile, Some(new));
        self.rebuild(profile, Some(reseek))
    }

    /// Change a text message in place, without a rebuild.
    pub fn update_text(&mut self, profile: &mut Profile, key: &str, message: &str) -> CuelineResult<()> {
        profile.registry.set_message(key, message)?;
        self.scene
            .compositor_mut()
            .update_text(key, Some(message), None);
        Ok(())
    }

    /// Change a text font size in place, without a rebuild.
    pub fn update_font_size(&mut self, profile: &mut Profile, key: &str, font_size: f64) -> CuelineResult<()> {
        profile.registry.set_font_size(key, font_size)?;
        self.scene
            .compositor_mut()
            .update_text(key, None, Some(font_size));
        Ok(())
    }

    /// Drag a live overlay to a view position and store the canvas
    /// position.
    pub fn move_overlay(
        &mut self,
        profile: &mut Profile,
        key: &str,
        view_x: f64,
        view_y: f64,
    ) -> CuelineResult<(i32, i32)> {
        let (x, y) = self.scene.compositor_mut().move_overlay(key, view_x, view_y)?;
        profile.registry.set_position(key, x, y)?;
        Ok((x, y))
    }

    /// Resize a live overlay to a view size and store the canvas size.
    pub fn resize_overlay(
        &mut self,
        profile: &mut Profile,
        key: &str,
        view_width: f64,
        view_height: f64,
    ) -> CuelineResult<(u32, u32)> {
        let (width, height) = self
            .scene
            .compositor_mut()
            .resize_overlay(key, view_width, view_height)?;
        profile.registry.set_size(key, width, height)?;
        Ok((width, height))
    }
}
