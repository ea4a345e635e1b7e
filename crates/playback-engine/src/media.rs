//! Media playback collaborators.
//!
//! The engines never decode media themselves. A [`MediaBackend`] opens a
//! primary [`MediaClock`] for the assembled video and one
//! [`SecondaryPlayer`] per audio or video transition. Clocks report back
//! asynchronously through the [`EventSender`] they were opened with.

use std::path::Path;

use cueline_common::CuelineResult;
use cueline_project_model::{MarkerKey, MarkerTable};

use crate::dispatch::EventSender;

/// Lifecycle of a primary clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockStatus {
    Unknown,
    Ready,
    Playing,
    Paused,
    Stopped,
    Disposed,
}

/// The primary clock of an assembled video.
///
/// Marker callbacks are delivered in non-decreasing time order while the
/// clock plays. Seeking does not replay markers that were skipped.
pub trait MediaClock {
    fn play(&mut self) -> CuelineResult<()>;
    fn pause(&mut self) -> CuelineResult<()>;
    fn stop(&mut self) -> CuelineResult<()>;
    fn seek(&mut self, to_ms: u64) -> CuelineResult<()>;
    fn set_rate(&mut self, rate: f64) -> CuelineResult<()>;
    fn set_volume(&mut self, volume: f64) -> CuelineResult<()>;

    fn current_time_ms(&self) -> u64;
    fn duration_ms(&self) -> Option<u64>;
    fn status(&self) -> ClockStatus;

    fn install_markers(&mut self, table: &MarkerTable) -> CuelineResult<()>;
    fn remove_marker(&mut self, key: &MarkerKey);
    fn clear_markers(&mut self);

    /// Release the underlying pipeline. No call other than `status` is
    /// valid afterwards.
    fn dispose(&mut self);
}

impl std::fmt::Debug for dyn MediaClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaClock")
            .field("status", &self.status())
            .field("time_ms", &self.current_time_ms())
            .finish()
    }
}

/// An independent audio or video player started by a transition.
pub trait SecondaryPlayer {
    /// Seek to `seek_fraction` of the clip and start playing.
    fn start(&mut self, seek_fraction: f64, rate: f64, volume: f64) -> CuelineResult<()>;
    fn play(&mut self) -> CuelineResult<()>;
    fn pause(&mut self) -> CuelineResult<()>;
    fn stop(&mut self);
    fn dispose(&mut self);
}

/// Opens clocks and players for media files.
pub trait MediaBackend {
    fn open_primary(&mut self, path: &Path, events: EventSender)
        -> CuelineResult<Box<dyn MediaClock>>;

    fn open_secondary(&mut self, path: &Path) -> CuelineResult<Box<dyn SecondaryPlayer>>;

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
