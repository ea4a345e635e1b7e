//! Coalescing timers that post back onto the owning thread.
//!
//! A [`TimerService`] only knows how to run a delay and post
//! [`EngineEvent::Timer`](crate::dispatch::EngineEvent). [`Timers`] sits on
//! the owning thread and issues a fresh token each time a kind is armed, so
//! an elapsed event from a cancelled or re-armed timer is recognised and
//! ignored even if it was already queued.

use std::collections::HashMap;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::dispatch::EventSender;

/// What a timer is for. At most one timer of each kind is armed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// View grew; apply the new scale once resizing settles.
    ResizeGrow,
    /// View shrank; apply the new scale once resizing settles.
    ResizeShrink,
    /// One second of the standby countdown.
    StandbyTick,
    /// Crossfade of one overlay finished.
    OverlayFadeOut(String),
    /// Fade to black before the next queued profile finished.
    AdvanceFade,
    /// Fade to black after a manual stop finished.
    StopFade,
}

/// Runs delays on behalf of the owning thread.
pub trait TimerService {
    /// Post `Timer { kind, token }` after `after`, replacing any pending
    /// timer of the same kind.
    fn schedule(&mut self, kind: TimerKind, token: u64, after: Duration);

    /// Drop a pending timer of this kind, if any.
    fn cancel(&mut self, kind: &TimerKind);
}

/// Token bookkeeping in front of a [`TimerService`].
pub struct Timers {
    service: Box<dyn TimerService>,
    next_token: u64,
    armed: HashMap<TimerKind, u64>,
}

impl std::fmt::Debug for Timers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timers")
            .field("armed", &self.armed)
            .finish_non_exhaustive()
    }
}

impl Timers {
    pub fn new(service: Box<dyn TimerService>) -> Self {
        Self {
            service,
            next_token: 0,
            armed: HashMap::new(),
        }
    }

    /// Arm `kind`, replacing a pending timer of the same kind.
    pub fn start(&mut self, kind: TimerKind, after: Duration) {
        self.next_token += 1;
        let token = self.next_token;
        self.armed.insert(kind.clone(), token);
        tracing::trace!(?kind, token, after_ms = after.as_millis() as u64, "Timer armed");
        self.service.schedule(kind, token, after);
    }

    pub fn cancel(&mut self, kind: &TimerKind) {
        if self.armed.remove(kind).is_some() {
            self.service.cancel(kind);
        }
    }

    pub fn cancel_all(&mut self) {
        let kinds: Vec<TimerKind> = self.armed.keys().cloned().collect();
        for kind in kinds {
            self.cancel(&kind);
        }
    }

    pub fn is_armed(&self, kind: &TimerKind) -> bool {
        self.armed.contains_key(kind)
    }

    /// Consume an elapsed event. Returns `false` for a stale token.
    pub fn accept(&mut self, kind: &TimerKind, token: u64) -> bool {
        match self.armed.get(kind) {
            Some(&current) if current == token => {
                self.armed.remove(kind);
                true
            }
            _ => {
                tracing::debug!(?kind, token, "Ignoring stale timer");
                false
            }
        }
    }
}

/// Timer service backed by tokio tasks.
pub struct TokioTimerService {
    sender: EventSender,
    runtime: Handle,
    tasks: HashMap<TimerKind, JoinHandle<()>>,
    speed: f64,
}

impl TokioTimerService {
    /// Must be called from within a tokio runtime.
    pub fn new(sender: EventSender) -> Self {
        Self::with_handle(sender, Handle::current())
    }

    pub fn with_handle(sender: EventSender, runtime: Handle) -> Self {
        Self {
            sender,
            runtime,
            tasks: HashMap::new(),
            speed: 1.0,
        }
    }

    /// Run every delay `speed` times faster.
    pub fn with_speed(mut self, speed: f64) -> Self {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
        }
        self
    }
}

impl TimerService for TokioTimerService {
    fn schedule(&mut self, kind: TimerKind, token: u64, after: Duration) {
        self.cancel(&kind);
        let sender = self.sender.clone();
        let fired = kind.clone();
        let delay = after.div_f64(self.speed);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            sender.timer_elapsed(fired, token);
        });
        self.tasks.insert(kind, task);
    }

    fn cancel(&mut self, kind: &TimerKind) {
        if let Some(task) = self.tasks.remove(kind) {
            task.abort();
        }
    }
}

impl Drop for TokioTimerService {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
