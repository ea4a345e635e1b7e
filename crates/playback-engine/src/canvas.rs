//! Mapping between the authoring canvas and the preview view.
//!
//! Overlays are authored on a fixed reference canvas (1280x720). The
//! preview view can be any size: horizontal space beyond 16:9 is treated
//! as letterboxing and split evenly on both sides, the rest is scaled.

use cueline_common::CanvasConfig;

use crate::timers::TimerKind;

/// Scale factors from canvas to view coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasScale {
    pub width_ratio: f64,
    pub height_ratio: f64,
    /// Horizontal view offset added after scaling (half the letterbox).
    pub x_offset: f64,
}

impl Default for CanvasScale {
    fn default() -> Self {
        Self::identity()
    }
}

impl CanvasScale {
    /// No scaling; used for the broadcast frame.
    pub fn identity() -> Self {
        Self {
            width_ratio: 1.0,
            height_ratio: 1.0,
            x_offset: 0.0,
        }
    }

    /// Scale for a view of `view_width` x `view_height`.
    pub fn for_view(view_width: f64, view_height: f64, canvas: &CanvasConfig) -> Self {
        if view_width <= 0.0 || view_height <= 0.0 {
            return Self::identity();
        }
        let fitted_width = view_height * canvas.reference_width / canvas.reference_height;
        let letterbox = (view_width - fitted_width).max(0.0).floor();
        Self {
            width_ratio: (view_width - letterbox) / canvas.reference_width,
            height_ratio: view_height / canvas.reference_height,
            x_offset: (letterbox / 2.0).floor(),
        }
    }

    pub fn to_view(&self, x: i32, y: i32) -> (f64, f64) {
        (
            x as f64 * self.width_ratio + self.x_offset,
            y as f64 * self.height_ratio,
        )
    }

    pub fn to_canvas(&self, view_x: f64, view_y: f64) -> (i32, i32) {
        (
            ((view_x - self.x_offset) / self.width_ratio).round() as i32,
            (view_y / self.height_ratio).round() as i32,
        )
    }

    pub fn size_to_view(&self, width: u32, height: u32) -> (f64, f64) {
        (
            width as f64 * self.width_ratio,
            height as f64 * self.height_ratio,
        )
    }

    pub fn size_to_canvas(&self, view_width: f64, view_height: f64) -> (u32, u32) {
        (
            (view_width / self.width_ratio).max(0.0).round() as u32,
            (view_height / self.height_ratio).max(0.0).round() as u32,
        )
    }

    pub fn font_to_view(&self, font_size: f64) -> f64 {
        font_size * self.height_ratio
    }
}

/// Coalesces bursts of view resizes into a single rescale.
///
/// Growing and shrinking use separate timers; arming one cancels the
/// other so a drag that changes direction never applies a stale size.
#[derive(Debug, Clone, Default)]
pub struct ResizeDebouncer {
    applied: Option<(f64, f64)>,
    pending: Option<(f64, f64)>,
}

impl ResizeDebouncer {
    /// Record a new view size. Returns the timer to arm and the one to
    /// cancel, or `None` when the size is unchanged.
    pub fn request(&mut self, width: f64, height: f64) -> Option<(TimerKind, TimerKind)> {
        let reference = self.pending.or(self.applied);
        if reference == Some((width, height)) {
            return None;
        }
        let grows = reference.map_or(true, |(w, h)| width * height >= w * h);
        self.pending = Some((width, height));
        Some(if grows {
            (TimerKind::ResizeGrow, TimerKind::ResizeShrink)
        } else {
            (TimerKind::ResizeShrink, TimerKind::ResizeGrow)
        })
    }

    /// The size to apply once a resize timer elapses.
    pub fn settle(&mut self) -> Option<(f64, f64)> {
        let size = self.pending.take()?;
        self.applied = Some(size);
        Some(size)
    }

    pub fn applied(&self) -> Option<(f64, f64)> {
        self.applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_view_is_identity() {
        let scale = CanvasScale::for_view(1280.0, 720.0, &CanvasConfig::default());
        assert_eq!(scale, CanvasScale::identity());
    }

    #[test]
    fn test_wide_view_is_letterboxed() {
        let scale = CanvasScale::for_view(1000.0, 360.0, &CanvasConfig::default());
        assert_eq!(scale.height_ratio, 0.5);
        assert_eq!(scale.width_ratio, 0.5);
        assert_eq!(scale.x_offset, 180.0);
        assert_eq!(scale.to_view(100, 100), (230.0, 50.0));
        assert_eq!(scale.to_canvas(230.0, 50.0), (100, 100));
    }

    #[test]
    fn test_sizes_scale_both_ways() {
        let scale = CanvasScale::for_view(640.0, 360.0, &CanvasConfig::default());
        assert_eq!(scale.size_to_view(200, 100), (100.0, 50.0));
        assert_eq!(scale.size_to_canvas(100.0, 50.0), (200, 100));
        assert_eq!(scale.font_to_view(60.0), 30.0);
    }

    #[test]
    fn test_debouncer_picks_direction() {
        let mut d = ResizeDebouncer::default();
        assert_eq!(
            d.request(800.0, 450.0),
            Some((TimerKind::ResizeGrow, TimerKind::ResizeShrink))
        );
        assert_eq!(d.settle(), Some((800.0, 450.0)));
        assert_eq!(
            d.request(640.0, 360.0),
            Some((TimerKind::ResizeShrink, TimerKind::ResizeGrow))
        );
        assert_eq!(
            d.request(1280.0, 720.0),
            Some((TimerKind::ResizeGrow, TimerKind::ResizeShrink))
        );
        assert_eq!(d.request(1280.0, 720.0), None);
        assert_eq!(d.settle(), Some((1280.0, 720.0)));
        assert_eq!(d.settle(), None);
    }
}
