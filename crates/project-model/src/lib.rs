//! Cueline Project Model
//!
//! Defines the core data contracts for assembled videos:
//! - **Transitions:** Time-anchored overlays and playback effects, with a
//!   fixed delimited wire form per category
//! - **Registry:** Per-video store of transitions keyed by marker-key
//! - **Allocator:** Collision-free scheduling timestamps
//! - **Markers:** The `Add-`/`Remove-` table installed on a media clock
//! - **Profiles:** Persisted assembled videos and named text styles
//!
//! All offsets are milliseconds from the start of the primary media.
//! Overlay coordinates are authored on a fixed 1280x720 canvas.

pub mod allocator;
pub mod marker;
pub mod profile;
pub mod registry;
pub mod text_style;
pub mod transition;

pub use allocator::*;
pub use marker::*;
pub use profile::*;
pub use registry::*;
pub use text_style::*;
pub use transition::*;
