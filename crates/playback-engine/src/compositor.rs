//! Overlay compositor.
//!
//! Holds the live overlay objects and secondary players of the scheduled
//! transitions, keyed by marker-key, and mirrors them onto a [`Surface`].
//!
//! An overlay is on the surface if and only if its key is active here (or
//! it is still fading out). Presenting an active key again is a no-op.

use std::collections::BTreeMap;
use std::path::PathBuf;

use cueline_common::{CuelineError, CuelineResult};
use cueline_project_model::{TextStyle, Transition};
use serde::Serialize;

use crate::canvas::CanvasScale;
use crate::media::SecondaryPlayer;

/// What an overlay draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayContent {
    Text {
        message: String,
        style: TextStyle,
        /// Authored font size.
        font_size: f64,
    },
    Image {
        path: PathBuf,
        preserve_aspect: bool,
    },
    Video {
        path: PathBuf,
        preserve_aspect: bool,
    },
}

/// Placement on the authoring canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CanvasRect {
    pub x: i32,
    pub y: i32,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Placement on the view after scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewRect {
    pub x: f64,
    pub y: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub font_size: Option<f64>,
}

/// One live overlay object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub key: String,
    pub content: OverlayContent,
    pub canvas: CanvasRect,
    pub view: ViewRect,
}

impl Overlay {
    /// Build the overlay for a visual transition. Returns `None` for
    /// transitions that draw nothing or whose media is unset.
    pub fn from_transition(
        key: &str,
        transition: &Transition,
        scale: &CanvasScale,
        style: &TextStyle,
    ) -> Option<Self> {
        let (content, canvas) = match transition {
            Transition::Text(t) => (
                OverlayContent::Text {
                    message: t.message.clone(),
                    style: style.clone(),
                    font_size: t.font_size,
                },
                CanvasRect {
                    x: t.x,
                    y: t.y,
                    width: None,
                    height: None,
                },
            ),
            Transition::Image(t) => (
                OverlayContent::Image {
                    path: t.path.clone()?,
                    preserve_aspect: t.preserve_aspect,
                },
                CanvasRect {
                    x: t.x,
                    y: t.y,
                    width: Some(t.width),
                    height: Some(t.height),
                },
            ),
            Transition::Video(t) => (
                OverlayContent::Video {
                    path: t.path.clone()?,
                    preserve_aspect: t.preserve_aspect,
                },
                CanvasRect {
                    x: t.x,
                    y: t.y,
                    width: Some(t.width),
                    height: Some(t.height),
                },
            ),
            _ => return None,
        };
        let mut overlay = Self {
            key: key.to_string(),
            content,
            canvas,
            view: ViewRect {
                x: 0.0,
                y: 0.0,
                width: None,
                height: None,
                font_size: None,
            },
        };
        overlay.layout(scale);
        Some(overlay)
    }

    /// Recompute view placement from canvas placement.
    pub fn layout(&mut self, scale: &CanvasScale) {
        let (x, y) = scale.to_view(self.canvas.x, self.canvas.y);
        let size = match (self.canvas.width, self.canvas.height) {
            (Some(w), Some(h)) => Some(scale.size_to_view(w, h)),
            _ => None,
        };
        let font_size = match &self.content {
            OverlayContent::Text { font_size, .. } => Some(scale.font_to_view(*font_size)),
            _ => None,
        };
        self.view = ViewRect {
            x,
            y,
            width: size.map(|(w, _)| w),
            height: size.map(|(_, h)| h),
            font_size,
        };
    }
}

/// Which overlay or layer a fade applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "target", content = "key", rename_all = "snake_case")]
pub enum FadeTarget {
    Overlay(String),
    /// The primary video layer.
    Primary,
}

/// Where overlays are drawn.
pub trait Surface {
    fn present(&mut self, overlay: &Overlay);
    fn update(&mut self, overlay: &Overlay);
    fn dismiss(&mut self, key: &str);
    /// Animate opacity from `from` to `to` over `duration_ms`.
    fn fade(&mut self, target: &FadeTarget, from: f64, to: f64, duration_ms: u64);
}

/// Outcome of [`Compositor::retire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retirement {
    /// Removed from the surface and players released.
    Removed,
    /// Fading out; call [`Compositor::finish_fade`] when the fade elapses.
    Fading,
    /// Nothing was active under the key.
    Absent,
}

/// Live overlays and secondary players.
pub struct Compositor {
    surface: Box<dyn Surface>,
    scale: CanvasScale,
    crossfade_ms: Option<u64>,
    active: BTreeMap<String, Overlay>,
    fading: BTreeMap<String, Overlay>,
    players: BTreeMap<String, Box<dyn SecondaryPlayer>>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("scale", &self.scale)
            .field("crossfade_ms", &self.crossfade_ms)
            .field("active", &self.active.keys().collect::<Vec<_>>())
            .field("fading", &self.fading.keys().collect::<Vec<_>>())
            .field("players", &self.players.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Compositor {
    /// Instant show/hide, as used by the editing preview.
    pub fn new(surface: Box<dyn Surface>, scale: CanvasScale) -> Self {
        Self {
            surface,
            scale,
            crossfade_ms: None,
            active: BTreeMap::new(),
            fading: BTreeMap::new(),
            players: BTreeMap::new(),
        }
    }

    /// Every show and hide animates opacity over `crossfade_ms`.
    pub fn with_crossfade(mut self, crossfade_ms: u64) -> Self {
        self.crossfade_ms = Some(crossfade_ms);
        self
    }

    pub fn scale(&self) -> &CanvasScale {
        &self.scale
    }

    pub fn crossfade_ms(&self) -> Option<u64> {
        self.crossfade_ms
    }

    /// Re-layout every overlay for a new view scale.
    pub fn set_scale(&mut self, scale: CanvasScale) {
        self.scale = scale;
        for overlay in self.active.values_mut().chain(self.fading.values_mut()) {
            overlay.layout(&scale);
            self.surface.update(overlay);
        }
        tracing::debug!(?scale, overlays = self.active.len(), "Overlays rescaled");
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active.contains_key(key)
    }

    /// Whether anything is live under `key`: overlay, fade or player.
    pub fn holds(&self, key: &str) -> bool {
        self.active.contains_key(key) || self.fading.contains_key(key) || self.players.contains_key(key)
    }

    pub fn overlay(&self, key: &str) -> Option<&Overlay> {
        self.active.get(key)
    }

    pub fn active_keys(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn player_keys(&self) -> impl Iterator<Item = &str> {
        self.players.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.fading.is_empty() && self.players.is_empty()
    }

    /// Put an overlay on the surface. Returns `false` if the key is already
    /// active.
    pub fn present(&mut self, overlay: Overlay) -> bool {
        if self.active.contains_key(&overlay.key) {
            tracing::trace!(key = %overlay.key, "Overlay already present");
            return false;
        }
        let key = overlay.key.clone();
        if let Some(_stale) = self.fading.remove(&key) {
            // Re-added mid fade-out: reuse the surface object.
            self.surface.update(&overlay);
        } else {
            self.surface.present(&overlay);
        }
        if let Some(ms) = self.crossfade_ms {
            self.surface
                .fade(&FadeTarget::Overlay(key.clone()), 0.0, 1.0, ms);
        }
        tracing::debug!(key = %key, "Overlay presented");
        self.active.insert(key, overlay);
        true
    }

    /// Track a started secondary player under `key`.
    pub fn attach_player(&mut self, key: &str, player: Box<dyn SecondaryPlayer>) {
        if let Some(mut previous) = self.players.insert(key.to_string(), player) {
            tracing::error!(key, "Secondary player attached twice");
            debug_assert!(false, "secondary player attached twice for {key}");
            previous.stop();
            previous.dispose();
        }
    }

    /// Stop and release the player under `key`.
    pub fn detach_player(&mut self, key: &str) -> bool {
        match self.players.remove(key) {
            Some(mut player) => {
                player.stop();
                player.dispose();
                true
            }
            None => false,
        }
    }

    /// Take the overlay and player under `key` off the surface, fading when
    /// a crossfade is configured.
    pub fn retire(&mut self, key: &str) -> Retirement {
        let Some(overlay) = self.active.remove(key) else {
            return if self.detach_player(key) {
                Retirement::Removed
            } else {
                Retirement::Absent
            };
        };
        match self.crossfade_ms {
            Some(ms) => {
                self.surface
                    .fade(&FadeTarget::Overlay(key.to_string()), 1.0, 0.0, ms);
                self.fading.insert(key.to_string(), overlay);
                Retirement::Fading
            }
            None => {
                self.surface.dismiss(key);
                self.detach_player(key);
                tracing::debug!(key, "Overlay dismissed");
                Retirement::Removed
            }
        }
    }

    /// Complete a fade-out started by [`retire`](Self::retire).
    pub fn finish_fade(&mut self, key: &str) -> bool {
        if self.fading.remove(key).is_none() {
            return false;
        }
        self.surface.dismiss(key);
        self.detach_player(key);
        tracing::debug!(key, "Overlay faded out");
        true
    }

    /// Move a live overlay to a view position. Returns the canvas position
    /// to store back in the registry.
    pub fn move_overlay(&mut self, key: &str, view_x: f64, view_y: f64) -> CuelineResult<(i32, i32)> {
        let overlay = self
            .active
            .get_mut(key)
            .ok_or_else(|| CuelineError::unsupported(key, "moving an overlay that is not shown"))?;
        let (x, y) = self.scale.to_canvas(view_x, view_y);
        overlay.canvas.x = x;
        overlay.canvas.y = y;
        overlay.layout(&self.scale);
        self.surface.update(overlay);
        Ok((x, y))
    }

    /// Resize a live image or video overlay to a view size. Returns the
    /// canvas size to store back in the registry.
    pub fn resize_overlay(
        &mut self,
        key: &str,
        view_width: f64,
        view_height: f64,
    ) -> CuelineResult<(u32, u32)> {
        let overlay = self
            .active
            .get_mut(key)
            .ok_or_else(|| CuelineError::unsupported(key, "resizing an overlay that is not shown"))?;
        if matches!(overlay.content, OverlayContent::Text { .. }) {
            return Err(CuelineError::unsupported(key, "resizing a text overlay"));
        }
        let (w, h) = self.scale.size_to_canvas(view_width, view_height);
        overlay.canvas.width = Some(w);
        overlay.canvas.height = Some(h);
        overlay.layout(&self.scale);
        self.surface.update(overlay);
        Ok((w, h))
    }

    /// Change the message or font size of a live text overlay. Returns
    /// `false` when the key is not showing a text overlay.
    pub fn update_text(&mut self, key: &str, message: Option<&str>, font_size: Option<f64>) -> bool {
        let Some(overlay) = self.active.get_mut(key) else {
            return false;
        };
        let OverlayContent::Text {
            message: current_message,
            font_size: current_size,
            ..
        } = &mut overlay.content
        else {
            return false;
        };
        if let Some(message) = message {
            *current_message = message.to_string();
        }
        if let Some(size) = font_size {
            *current_size = size;
        }
        overlay.layout(&self.scale);
        self.surface.update(overlay);
        true
    }

    pub fn pause_players(&mut self) {
        for (key, player) in self.players.iter_mut() {
            if let Err(e) = player.pause() {
                tracing::warn!(key = %key, error = %e, "Failed to pause secondary player");
            }
        }
    }

    pub fn play_players(&mut self) {
        for (key, player) in self.players.iter_mut() {
            if let Err(e) = player.play() {
                tracing::warn!(key = %key, error = %e, "Failed to resume secondary player");
            }
        }
    }

    /// Fade the primary video layer.
    pub fn fade_primary(&mut self, from: f64, to: f64, duration_ms: u64) {
        self.surface.fade(&FadeTarget::Primary, from, to, duration_ms);
    }

    /// Remove every overlay immediately and release every player.
    ///
    /// Players are stopped before their overlays are dismissed.
    pub fn clear(&mut self) {
        let keys: Vec<String> = self.players.keys().cloned().collect();
        for key in keys {
            self.detach_player(&key);
        }
        for key in self.active.keys().chain(self.fading.keys()) {
            self.surface.dismiss(key);
        }
        let cleared = self.active.len() + self.fading.len();
        self.active.clear();
        self.fading.clear();
        if cleared > 0 {
            tracing::debug!(overlays = cleared, "Compositor cleared");
        }
    }
}
