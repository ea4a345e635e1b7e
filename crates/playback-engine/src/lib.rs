//! Cueline Playback Engine
//!
//! Drives assembled videos against a media clock:
//! - **Dispatch:** Clock callbacks and timers posted back onto the owning
//!   thread, with stale clock generations dropped
//! - **Scene:** Marker table installation and per-transition effects
//! - **Compositor:** Live overlays and secondary players on a surface
//! - **Preview:** Interactive editing playback with whole-timeline rebuilds
//! - **Theatre:** Queued broadcast playback with countdown and crossfades
//!
//! Media decoding and drawing live behind the [`MediaBackend`] and
//! [`Surface`] traits; [`sim`] provides deterministic stand-ins.

pub mod canvas;
pub mod compositor;
pub mod dispatch;
pub mod media;
pub mod preview;
pub mod scene;
pub mod sim;
pub mod theatre;
pub mod timers;

pub use canvas::{CanvasScale, ResizeDebouncer};
pub use compositor::{Compositor, FadeTarget, Overlay, OverlayContent, Retirement, Surface};
pub use dispatch::{ClockEvent, Dispatcher, EngineEvent, EventSender, Generation};
pub use media::{ClockStatus, MediaBackend, MediaClock, SecondaryPlayer};
pub use preview::{PreviewEngine, PreviewState};
pub use scene::{Applied, Scene};
pub use theatre::{ProfileSource, StandbyState, TheatreEngine};
pub use timers::{TimerKind, TimerService, Timers, TokioTimerService};

/// External collaborators an engine is built from.
pub struct Collaborators {
    pub backend: Box<dyn MediaBackend>,
    pub surface: Box<dyn Surface>,
    pub timers: Box<dyn TimerService>,
    /// Queue the backend's clocks and the timers post into.
    pub dispatcher: Dispatcher,
}
