//! One opened assembled video: primary clock, installed marker table and
//! the compositor holding its live overlays.
//!
//! Both engines drive a [`Scene`]. It turns a fired marker into the effect
//! of its transition and knows how to release everything again in the
//! right order.

use std::path::Path;

use cueline_common::{CuelineError, CuelineResult};
use cueline_project_model::{
    MarkerAction, MarkerKey, MarkerTable, Profile, TextStyle, TextStyleStore, Transition,
    TransitionRegistry,
};

use crate::compositor::{Compositor, Overlay, Retirement};
use crate::dispatch::EventSender;
use crate::media::{MediaBackend, MediaClock, SecondaryPlayer};

/// What applying a marker did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Applied {
    /// An overlay went onto the surface.
    Presented,
    /// An audio player started.
    Started,
    Retired(Retirement),
    RateChanged(f64),
    Seeked(u64),
    /// Nothing to do: already active, media unset, or no matching
    /// transition.
    Ignored,
}

#[derive(Debug)]
pub struct Scene {
    compositor: Compositor,
    clock: Option<Box<dyn MediaClock>>,
    markers: MarkerTable,
    duration_ms: Option<u64>,
}

impl Scene {
    pub fn new(compositor: Compositor) -> Self {
        Self {
            compositor,
            clock: None,
            markers: MarkerTable::default(),
            duration_ms: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.clock.is_some()
    }

    pub fn clock(&self) -> Option<&dyn MediaClock> {
        self.clock.as_deref()
    }

    pub fn clock_mut(&mut self) -> CuelineResult<&mut dyn MediaClock> {
        match self.clock.as_deref_mut() {
            Some(clock) => Ok(clock),
            None => Err(CuelineError::clock_conflict("no primary clock is open")),
        }
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut Compositor {
        &mut self.compositor
    }

    pub fn markers(&self) -> &MarkerTable {
        &self.markers
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    pub fn set_duration(&mut self, duration_ms: u64) {
        self.duration_ms = Some(duration_ms);
    }

    pub fn current_time_ms(&self) -> u64 {
        self.clock.as_ref().map_or(0, |c| c.current_time_ms())
    }

    /// Open the primary clock for `path`. Its events go out through
    /// `events`.
    pub fn open(
        &mut self,
        backend: &mut dyn MediaBackend,
        path: &Path,
        events: EventSender,
    ) -> CuelineResult<()> {
        if self.clock.is_some() {
            return Err(CuelineError::clock_conflict(
                "a primary clock is already open; tear it down first",
            ));
        }
        if !backend.exists(path) {
            return Err(CuelineError::missing_media(path));
        }
        let clock = backend.open_primary(path, events)?;
        self.clock = Some(clock);
        tracing::debug!(path = %path.display(), "Primary clock opened");
        Ok(())
    }

    /// Build the marker table from `registry` and install it on the clock.
    /// Fails without installing anything if a secondary file is missing.
    pub fn arm(
        &mut self,
        backend: &dyn MediaBackend,
        registry: &TransitionRegistry,
    ) -> CuelineResult<usize> {
        for (key, transition) in registry.iter() {
            if let Some(path) = transition.media_path() {
                if !backend.exists(path) {
                    tracing::warn!(key, path = %path.display(), "Transition media missing");
                    return Err(CuelineError::missing_media(path));
                }
            }
        }
        let table = MarkerTable::build(registry);
        self.clock_mut()?.install_markers(&table)?;
        self.markers = table;
        tracing::debug!(markers = self.markers.len(), "Marker table installed");
        Ok(self.markers.len())
    }

    /// Apply one fired marker.
    pub fn apply(
        &mut self,
        backend: &mut dyn MediaBackend,
        profile: &Profile,
        marker: &MarkerKey,
        styles: Option<&TextStyleStore>,
    ) -> CuelineResult<Applied> {
        let transition = profile
            .registry
            .get(&marker.key)
            .filter(|t| t.category() == marker.category);
        let Some(transition) = transition else {
            tracing::error!(%marker, "Marker has no matching transition");
            debug_assert!(false, "marker {marker} has no matching transition");
            return Ok(Applied::Ignored);
        };
        tracing::debug!(%marker, at_ms = self.current_time_ms(), "Marker fired");
        match marker.action {
            MarkerAction::Add => self.add(backend, marker, transition, styles),
            MarkerAction::Remove => self.remove(marker, transition),
        }
    }

    fn add(
        &mut self,
        backend: &mut dyn MediaBackend,
        marker: &MarkerKey,
        transition: &Transition,
        styles: Option<&TextStyleStore>,
    ) -> CuelineResult<Applied> {
        let key = marker.key.as_str();
        match transition {
            Transition::Text(_) | Transition::Image(_) => Ok(self.present(key, transition, styles)),
            Transition::Video(video) => {
                if self.compositor.holds(key) {
                    return Ok(Applied::Ignored);
                }
                // Nothing is presented unless the player starts.
                let player = match &video.path {
                    Some(path) => Some(start_player(
                        backend,
                        path,
                        video.seek_fraction,
                        video.play_rate,
                        video.volume,
                    )?),
                    None => None,
                };
                let presented = self.present(key, transition, styles);
                if let Some(mut player) = player {
                    if presented == Applied::Presented {
                        self.compositor.attach_player(key, player);
                    } else {
                        player.stop();
                        player.dispose();
                    }
                }
                Ok(presented)
            }
            Transition::Audio(audio) => {
                if self.compositor.holds(key) {
                    return Ok(Applied::Ignored);
                }
                let Some(path) = &audio.path else {
                    tracing::warn!(key, "Audio transition has no media");
                    return Ok(Applied::Ignored);
                };
                let player =
                    start_player(backend, path, audio.seek_fraction, audio.play_rate, audio.volume)?;
                self.compositor.attach_player(key, player);
                Ok(Applied::Started)
            }
            Transition::FastForward(ff) => {
                self.clock_mut()?.set_rate(ff.start_rate)?;
                tracing::debug!(key, rate = ff.start_rate, "Play rate changed");
                Ok(Applied::RateChanged(ff.start_rate))
            }
            Transition::Cut(cut) => {
                let Some(target) = cut.stop.ms() else {
                    tracing::warn!(key, "Cut has no target; skipping");
                    return Ok(Applied::Ignored);
                };
                let clock = self.clock_mut()?;
                clock.seek(target)?;
                clock.remove_marker(marker);
                self.markers.remove(marker);
                tracing::debug!(key, target, rewind = cut.rewind, "Cut");
                Ok(Applied::Seeked(target))
            }
        }
    }

    fn remove(&mut self, marker: &MarkerKey, transition: &Transition) -> CuelineResult<Applied> {
        let key = marker.key.as_str();
        match transition {
            Transition::Text(_) | Transition::Image(_) | Transition::Video(_) | Transition::Audio(_) => {
                Ok(Applied::Retired(self.compositor.retire(key)))
            }
            Transition::FastForward(ff) => {
                self.clock_mut()?.set_rate(ff.stop_rate)?;
                tracing::debug!(key, rate = ff.stop_rate, "Play rate restored");
                Ok(Applied::RateChanged(ff.stop_rate))
            }
            Transition::Cut(_) => {
                tracing::error!(%marker, "Cut scheduled with a remove marker");
                debug_assert!(false, "cut {key} scheduled with a remove marker");
                Ok(Applied::Ignored)
            }
        }
    }

    fn present(&mut self, key: &str, transition: &Transition, styles: Option<&TextStyleStore>) -> Applied {
        let style = match (transition, styles) {
            (Transition::Text(text), Some(store)) => store.load_or_default(text.style.as_deref()),
            _ => TextStyle::default(),
        };
        let Some(overlay) = Overlay::from_transition(key, transition, self.compositor.scale(), &style)
        else {
            tracing::warn!(key, "Transition has no media to show");
            return Applied::Ignored;
        };
        if self.compositor.present(overlay) {
            Applied::Presented
        } else {
            Applied::Ignored
        }
    }

    /// Drop every overlay and player and stop scheduling further markers,
    /// keeping the clock open.
    pub fn clear_transient(&mut self) {
        self.compositor.clear();
        if let Some(clock) = self.clock.as_deref_mut() {
            clock.clear_markers();
        }
        self.markers.clear();
    }

    /// Release everything. Secondary players go first, then the primary
    /// clock regardless of its status.
    pub fn teardown(&mut self) {
        self.compositor.clear();
        if let Some(mut clock) = self.clock.take() {
            clock.clear_markers();
            if let Err(e) = clock.stop() {
                tracing::warn!(error = %e, "Primary clock did not stop cleanly");
            }
            clock.dispose();
        }
        self.markers.clear();
        self.duration_ms = None;
    }
}

fn start_player(
    backend: &mut dyn MediaBackend,
    path: &Path,
    seek_fraction: f64,
    rate: f64,
    volume: f64,
) -> CuelineResult<Box<dyn SecondaryPlayer>> {
    let mut player = backend.open_secondary(path)?;
    if let Err(e) = player.start(seek_fraction, rate, volume) {
        player.dispose();
        return Err(e);
    }
    Ok(player)
}
