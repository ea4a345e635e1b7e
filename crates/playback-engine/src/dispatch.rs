//! Event dispatch onto the owning thread.
//!
//! Media clocks and timers run elsewhere and never touch engine state.
//! They post [`EngineEvent`] values through a cloneable [`EventSender`];
//! the owning thread drains the [`Dispatcher`] in order and applies them.
//!
//! Every primary clock is bound to a generation when it is opened. Clock
//! events stamped with an older generation belong to a torn-down clock and
//! are dropped on receipt.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};

use cueline_project_model::MarkerKey;

use crate::timers::TimerKind;

/// Identifies one opened primary clock.
pub type Generation = u64;

/// Callback from a media clock.
#[derive(Debug, Clone, PartialEq)]
pub enum ClockEvent {
    /// Media is loaded and its duration is known.
    Ready { duration_ms: u64 },
    /// The clock crossed an installed marker.
    Marker(MarkerKey),
    /// Playhead moved.
    TimeChanged(u64),
    Playing,
    Paused,
    Stopped,
    EndOfMedia,
    VolumeChanged(f64),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Clock {
        generation: Generation,
        event: ClockEvent,
    },
    Timer {
        kind: TimerKind,
        token: u64,
    },
}

/// Cloneable handle used by clocks and timers to post events.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<EngineEvent>,
    generation: Generation,
}

impl EventSender {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Post a clock callback stamped with this sender's generation.
    pub fn post(&self, event: ClockEvent) {
        let envelope = EngineEvent::Clock {
            generation: self.generation,
            event,
        };
        if self.tx.send(envelope).is_err() {
            tracing::trace!(generation = self.generation, "Dispatcher gone, event discarded");
        }
    }

    pub fn timer_elapsed(&self, kind: TimerKind, token: u64) {
        if self.tx.send(EngineEvent::Timer { kind, token }).is_err() {
            tracing::trace!("Dispatcher gone, timer discarded");
        }
    }
}

/// Single-consumer queue owned by the scheduling thread.
#[derive(Debug)]
pub struct Dispatcher {
    tx: Sender<EngineEvent>,
    rx: Receiver<EngineEvent>,
    generation: Generation,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            generation: 0,
        }
    }

    /// Generation whose clock events are currently accepted.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Sender for the current generation. Used by timers, whose events are
    /// not generation-checked.
    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
            generation: self.generation,
        }
    }

    /// Retire the current generation and return a sender for a new one.
    pub fn begin_generation(&mut self) -> EventSender {
        self.invalidate();
        self.sender()
    }

    /// Retire the current generation so its pending events are dropped.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        tracing::trace!(generation = self.generation, "Generation advanced");
    }

    fn accept(&self, event: EngineEvent) -> Option<EngineEvent> {
        match &event {
            EngineEvent::Clock { generation, event: inner } if *generation != self.generation => {
                tracing::debug!(
                    stale = *generation,
                    current = self.generation,
                    event = ?inner,
                    "Dropping stale clock event"
                );
                None
            }
            _ => Some(event),
        }
    }

    /// Next pending event, without blocking.
    pub fn try_next(&self) -> Option<EngineEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    if let Some(event) = self.accept(event) {
                        return Some(event);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// Next event, waiting up to `timeout`.
    pub fn next_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(event) => {
                    if let Some(event) = self.accept(event) {
                        return Some(event);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }
}
