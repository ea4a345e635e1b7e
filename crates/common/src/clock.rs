//! Media-time helpers.
//!
//! Every scheduling timestamp in Cueline is an unsigned millisecond offset
//! from the start of the primary media. This module provides:
//! - A `MediaTime` newtype for offsets
//! - Human readable formatting for countdowns and playhead labels

use serde::{Deserialize, Serialize};
use std::fmt;

/// Millisecond offset into a media clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaTime(pub u64);

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime(0);

    pub fn from_ms(ms: u64) -> Self {
        Self(ms)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs.max(0.0) * 1000.0).round() as u64)
    }

    pub fn as_ms(self) -> u64 {
        self.0
    }

    /// Whole seconds, truncated.
    pub fn whole_secs(self) -> u64 {
        self.0 / 1000
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Saturating distance from `self` forward to `later`.
    pub fn until(self, later: MediaTime) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<u64> for MediaTime {
    fn from(ms: u64) -> Self {
        Self(ms)
    }
}

/// Format whole seconds as `MM:SS`, or `H:MM:SS` once an hour is reached.
pub fn format_clock(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Playhead label: `elapsed/duration`.
///
/// The hours form is chosen by the duration. When the duration is unknown
/// (zero) only the elapsed part is printed.
pub fn format_elapsed(elapsed: MediaTime, duration: MediaTime) -> String {
    if duration.as_ms() == 0 {
        return format_clock(elapsed.whole_secs());
    }
    let e = elapsed.whole_secs();
    let d = duration.whole_secs();
    if d >= 3600 {
        format!(
            "{}:{:02}:{:02}/{}:{:02}:{:02}",
            e / 3600,
            (e % 3600) / 60,
            e % 60,
            d / 3600,
            (d % 3600) / 60,
            d % 60
        )
    } else {
        format!(
            "{:02}:{:02}/{:02}:{:02}",
            e / 60,
            e % 60,
            (d % 3600) / 60,
            d % 60
        )
    }
}
