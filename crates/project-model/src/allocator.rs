//! Collision-free timestamp allocation.
//!
//! The media clock delivers marker callbacks one offset at a time, so two
//! transitions may never share a scheduling timestamp. A requested offset
//! that is already taken is bumped forward until a free slot is found:
//! start candidates move by 1 ms and stop candidates by 5 ms. Candidates
//! below the 20 ms floor are clamped to it first.

use std::collections::BTreeSet;

use cueline_common::{AllocatorConfig, CuelineError, CuelineResult};

/// Which end of a transition is being allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Start,
    Stop,
}

/// Greedy forward-scan allocator with a bounded number of probes.
#[derive(Debug, Clone, Copy)]
pub struct TimestampAllocator {
    config: AllocatorConfig,
}

impl Default for TimestampAllocator {
    fn default() -> Self {
        Self::new(AllocatorConfig::default())
    }
}

impl TimestampAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Find the first free offset at or after `requested`.
    pub fn allocate(&self, used: &BTreeSet<u64>, requested: u64, slot: Slot) -> CuelineResult<u64> {
        let step = match slot {
            Slot::Start => self.config.start_step_ms,
            Slot::Stop => self.config.stop_step_ms,
        }
        .max(1);

        let mut candidate = requested;
        for _ in 0..self.config.max_attempts {
            if candidate < self.config.floor_ms {
                candidate = self.config.floor_ms;
            }
            if !used.contains(&candidate) {
                if candidate != requested {
                    tracing::debug!(requested, allocated = candidate, ?slot, "Timestamp bumped");
                }
                return Ok(candidate);
            }
            candidate = candidate.checked_add(step).ok_or(CuelineError::TimestampExhausted {
                requested,
                attempts: self.config.max_attempts,
            })?;
        }

        Err(CuelineError::TimestampExhausted {
            requested,
            attempts: self.config.max_attempts,
        })
    }
}
