//! Cueline Common Utilities
//!
//! Shared infrastructure for all Cueline crates:
//! - Error taxonomy and result aliases
//! - Media-time formatting for playheads and countdowns
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
