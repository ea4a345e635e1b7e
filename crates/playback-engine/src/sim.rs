//! Deterministic in-process collaborators.
//!
//! [`SimBackend`] opens virtual clocks that only move when told to, so the
//! engines can be driven through exact timelines without decoding media.
//! [`RecordingSurface`] logs every compositor call and [`ManualTimers`] fires
//! timers in virtual time. Each hands out a cloneable handle sharing its
//! state, which stays usable after the collaborator itself has been boxed
//! into an engine.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use cueline_common::{CuelineError, CuelineResult};
use cueline_project_model::{MarkerKey, MarkerTable};

use crate::compositor::{FadeTarget, Overlay, Surface};
use crate::dispatch::{ClockEvent, Dispatcher, EventSender, Generation};
use crate::media::{ClockStatus, MediaBackend, MediaClock, SecondaryPlayer};
use crate::timers::{TimerKind, TimerService};
use crate::Collaborators;

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// Something that happened to a secondary player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Opened(PathBuf),
    Started {
        path: PathBuf,
        seek_fraction: f64,
        rate: f64,
        volume: f64,
    },
    Played(PathBuf),
    Paused(PathBuf),
    Stopped(PathBuf),
    Disposed(PathBuf),
}

#[derive(Debug, Default)]
struct BackendState {
    media: HashMap<PathBuf, u64>,
    clocks: Vec<Rc<RefCell<ClockState>>>,
    players: Vec<PlayerEvent>,
}

/// Media backend over registered virtual files.
#[derive(Debug, Clone, Default)]
pub struct SimBackend {
    state: Rc<RefCell<BackendState>>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a virtual media file of `duration_ms`.
    pub fn with_media(self, path: impl Into<PathBuf>, duration_ms: u64) -> Self {
        self.add_media(path, duration_ms);
        self
    }

    pub fn add_media(&self, path: impl Into<PathBuf>, duration_ms: u64) {
        self.state.borrow_mut().media.insert(path.into(), duration_ms);
    }

    /// Unregister a virtual media file, as if it were deleted.
    pub fn remove_media(&self, path: impl AsRef<Path>) {
        self.state.borrow_mut().media.remove(path.as_ref());
    }

    /// The most recently opened primary clock.
    pub fn primary(&self) -> Option<SimClockHandle> {
        self.state
            .borrow()
            .clocks
            .last()
            .map(|state| SimClockHandle {
                state: Rc::clone(state),
            })
    }

    /// Number of primary clocks opened so far.
    pub fn opened(&self) -> usize {
        self.state.borrow().clocks.len()
    }

    pub fn player_events(&self) -> Vec<PlayerEvent> {
        self.state.borrow().players.clone()
    }

    /// Secondary players started but not yet disposed.
    pub fn live_players(&self) -> usize {
        let state = self.state.borrow();
        let opened = state
            .players
            .iter()
            .filter(|e| matches!(e, PlayerEvent::Opened(_)))
            .count();
        let disposed = state
            .players
            .iter()
            .filter(|e| matches!(e, PlayerEvent::Disposed(_)))
            .count();
        opened.saturating_sub(disposed)
    }
}

impl MediaBackend for SimBackend {
    fn open_primary(
        &mut self,
        path: &Path,
        events: EventSender,
    ) -> CuelineResult<Box<dyn MediaClock>> {
        let duration_ms = self.duration_of(path)?;
        let state = Rc::new(RefCell::new(ClockState {
            path: path.to_path_buf(),
            time_ms: 0,
            duration_ms,
            status: ClockStatus::Ready,
            rate: 1.0,
            volume: 1.0,
            markers: MarkerTable::default(),
            seeks: Vec::new(),
            events,
        }));
        state
            .borrow()
            .events
            .post(ClockEvent::Ready { duration_ms });
        self.state.borrow_mut().clocks.push(Rc::clone(&state));
        tracing::debug!(path = %path.display(), duration_ms, "Simulated clock opened");
        Ok(Box::new(SimClock { state }))
    }

    fn open_secondary(&mut self, path: &Path) -> CuelineResult<Box<dyn SecondaryPlayer>> {
        self.duration_of(path)?;
        self.state
            .borrow_mut()
            .players
            .push(PlayerEvent::Opened(path.to_path_buf()));
        Ok(Box::new(SimPlayer {
            path: path.to_path_buf(),
            backend: Rc::clone(&self.state),
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        self.state.borrow().media.contains_key(path) || path.exists()
    }
}

impl SimBackend {
    fn duration_of(&self, path: &Path) -> CuelineResult<u64> {
        if let Some(&duration) = self.state.borrow().media.get(path) {
            return Ok(duration);
        }
        if path.exists() {
            Ok(0)
        } else {
            Err(CuelineError::missing_media(path))
        }
    }
}

#[derive(Debug)]
struct ClockState {
    path: PathBuf,
    time_ms: u64,
    duration_ms: u64,
    status: ClockStatus,
    rate: f64,
    volume: f64,
    markers: MarkerTable,
    seeks: Vec<u64>,
    events: EventSender,
}

impl ClockState {
    fn ensure_live(&self) -> CuelineResult<()> {
        if self.status == ClockStatus::Disposed {
            Err(CuelineError::clock_conflict(format!(
                "clock for {} already disposed",
                self.path.display()
            )))
        } else {
            Ok(())
        }
    }
}

/// Virtual primary clock.
#[derive(Debug)]
pub struct SimClock {
    state: Rc<RefCell<ClockState>>,
}

impl MediaClock for SimClock {
    fn play(&mut self) -> CuelineResult<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_live()?;
        state.status = ClockStatus::Playing;
        state.events.post(ClockEvent::Playing);
        Ok(())
    }

    fn pause(&mut self) -> CuelineResult<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_live()?;
        state.status = ClockStatus::Paused;
        state.events.post(ClockEvent::Paused);
        Ok(())
    }

    fn stop(&mut self) -> CuelineResult<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_live()?;
        state.status = ClockStatus::Stopped;
        state.time_ms = 0;
        state.events.post(ClockEvent::Stopped);
        Ok(())
    }

    fn seek(&mut self, to_ms: u64) -> CuelineResult<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_live()?;
        let to_ms = if state.duration_ms > 0 {
            to_ms.min(state.duration_ms)
        } else {
            to_ms
        };
        state.time_ms = to_ms;
        state.seeks.push(to_ms);
        state.events.post(ClockEvent::TimeChanged(to_ms));
        Ok(())
    }

    fn set_rate(&mut self, rate: f64) -> CuelineResult<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_live()?;
        state.rate = rate;
        Ok(())
    }

    fn set_volume(&mut self, volume: f64) -> CuelineResult<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_live()?;
        state.volume = volume;
        state.events.post(ClockEvent::VolumeChanged(volume));
        Ok(())
    }

    fn current_time_ms(&self) -> u64 {
        self.state.borrow().time_ms
    }

    fn duration_ms(&self) -> Option<u64> {
        Some(self.state.borrow().duration_ms)
    }

    fn status(&self) -> ClockStatus {
        self.state.borrow().status
    }

    fn install_markers(&mut self, table: &MarkerTable) -> CuelineResult<()> {
        let mut state = self.state.borrow_mut();
        state.ensure_live()?;
        state.markers = table.clone();
        Ok(())
    }

    fn remove_marker(&mut self, key: &MarkerKey) {
        self.state.borrow_mut().markers.remove(key);
    }

    fn clear_markers(&mut self) {
        self.state.borrow_mut().markers.clear();
    }

    fn dispose(&mut self) {
        let mut state = self.state.borrow_mut();
        state.status = ClockStatus::Disposed;
        state.markers.clear();
    }
}

/// Test-side control of a [`SimClock`].
#[derive(Debug, Clone)]
pub struct SimClockHandle {
    state: Rc<RefCell<ClockState>>,
}

impl SimClockHandle {
    /// Move a playing clock forward to `to_ms`, posting every marker
    /// crossed on the way, then the new time, then end-of-media if the end
    /// was reached. Does nothing unless the clock is playing.
    pub fn advance_to(&self, to_ms: u64) {
        let mut state = self.state.borrow_mut();
        if state.status != ClockStatus::Playing || to_ms <= state.time_ms {
            return;
        }
        let to_ms = if state.duration_ms > 0 {
            to_ms.min(state.duration_ms)
        } else {
            to_ms
        };
        let from_ms = state.time_ms;
        for marker in state.markers.crossed(from_ms, to_ms) {
            state.events.post(ClockEvent::Marker(marker.key.clone()));
        }
        state.time_ms = to_ms;
        state.events.post(ClockEvent::TimeChanged(to_ms));
        if state.duration_ms > 0 && to_ms >= state.duration_ms {
            state.status = ClockStatus::Stopped;
            state.events.post(ClockEvent::EndOfMedia);
        }
    }

    pub fn advance_by(&self, delta_ms: u64) {
        let now = self.time_ms();
        self.advance_to(now.saturating_add(delta_ms));
    }

    pub fn time_ms(&self) -> u64 {
        self.state.borrow().time_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.state.borrow().duration_ms
    }

    pub fn status(&self) -> ClockStatus {
        self.state.borrow().status
    }

    pub fn rate(&self) -> f64 {
        self.state.borrow().rate
    }

    pub fn volume(&self) -> f64 {
        self.state.borrow().volume
    }

    pub fn markers(&self) -> MarkerTable {
        self.state.borrow().markers.clone()
    }

    /// Every seek target, in call order.
    pub fn seeks(&self) -> Vec<u64> {
        self.state.borrow().seeks.clone()
    }

    pub fn generation(&self) -> Generation {
        self.state.borrow().events.generation()
    }

    /// Post an event as if the pipeline had produced it.
    pub fn emit(&self, event: ClockEvent) {
        self.state.borrow().events.post(event);
    }
}

/// Virtual secondary player.
#[derive(Debug)]
pub struct SimPlayer {
    path: PathBuf,
    backend: Rc<RefCell<BackendState>>,
}

impl SimPlayer {
    fn record(&self, event: PlayerEvent) {
        self.backend.borrow_mut().players.push(event);
    }
}

impl SecondaryPlayer for SimPlayer {
    fn start(&mut self, seek_fraction: f64, rate: f64, volume: f64) -> CuelineResult<()> {
        self.record(PlayerEvent::Started {
            path: self.path.clone(),
            seek_fraction,
            rate,
            volume,
        });
        Ok(())
    }

    fn play(&mut self) -> CuelineResult<()> {
        self.record(PlayerEvent::Played(self.path.clone()));
        Ok(())
    }

    fn pause(&mut self) -> CuelineResult<()> {
        self.record(PlayerEvent::Paused(self.path.clone()));
        Ok(())
    }

    fn stop(&mut self) {
        self.record(PlayerEvent::Stopped(self.path.clone()));
    }

    fn dispose(&mut self) {
        self.record(PlayerEvent::Disposed(self.path.clone()));
    }
}

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Present(Overlay),
    Update(Overlay),
    Dismiss(String),
    Fade {
        target: FadeTarget,
        from: f64,
        to: f64,
        duration_ms: u64,
    },
}

/// Shared log of surface calls.
#[derive(Debug, Clone, Default)]
pub struct SurfaceLog {
    calls: Rc<RefCell<Vec<SurfaceCall>>>,
}

impl SurfaceLog {
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.borrow().clone()
    }

    pub fn presents_of(&self, key: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, SurfaceCall::Present(o) if o.key == key))
            .count()
    }

    pub fn dismissals_of(&self, key: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, SurfaceCall::Dismiss(k) if k == key))
            .count()
    }

    /// Keys presented and not dismissed since.
    pub fn visible(&self) -> Vec<String> {
        let mut visible: Vec<String> = Vec::new();
        for call in self.calls.borrow().iter() {
            match call {
                SurfaceCall::Present(o) => {
                    if !visible.contains(&o.key) {
                        visible.push(o.key.clone());
                    }
                }
                SurfaceCall::Dismiss(k) => visible.retain(|v| v != k),
                _ => {}
            }
        }
        visible
    }

    pub fn fades(&self) -> Vec<(FadeTarget, f64, f64, u64)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::Fade {
                    target,
                    from,
                    to,
                    duration_ms,
                } => Some((target.clone(), *from, *to, *duration_ms)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

/// Surface that records instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    log: SurfaceLog,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> SurfaceLog {
        self.log.clone()
    }

    fn push(&self, call: SurfaceCall) {
        self.log.calls.borrow_mut().push(call);
    }
}

impl Surface for RecordingSurface {
    fn present(&mut self, overlay: &Overlay) {
        self.push(SurfaceCall::Present(overlay.clone()));
    }

    fn update(&mut self, overlay: &Overlay) {
        self.push(SurfaceCall::Update(overlay.clone()));
    }

    fn dismiss(&mut self, key: &str) {
        self.push(SurfaceCall::Dismiss(key.to_string()));
    }

    fn fade(&mut self, target: &FadeTarget, from: f64, to: f64, duration_ms: u64) {
        self.push(SurfaceCall::Fade {
            target: target.clone(),
            from,
            to,
            duration_ms,
        });
    }
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct PendingTimer {
    due_ms: u64,
    kind: TimerKind,
    token: u64,
}

#[derive(Debug)]
struct TimerState {
    now_ms: u64,
    pending: Vec<PendingTimer>,
    sender: EventSender,
}

/// Timer service running on virtual time.
#[derive(Debug)]
pub struct ManualTimers {
    state: Rc<RefCell<TimerState>>,
}

impl ManualTimers {
    pub fn new(sender: EventSender) -> Self {
        Self {
            state: Rc::new(RefCell::new(TimerState {
                now_ms: 0,
                pending: Vec::new(),
                sender,
            })),
        }
    }

    pub fn handle(&self) -> ManualTimerHandle {
        ManualTimerHandle {
            state: Rc::clone(&self.state),
        }
    }
}

impl TimerService for ManualTimers {
    fn schedule(&mut self, kind: TimerKind, token: u64, after: Duration) {
        let mut state = self.state.borrow_mut();
        state.pending.retain(|p| p.kind != kind);
        let due_ms = state.now_ms.saturating_add(after.as_millis() as u64);
        state.pending.push(PendingTimer {
            due_ms,
            kind,
            token,
        });
    }

    fn cancel(&mut self, kind: &TimerKind) {
        self.state.borrow_mut().pending.retain(|p| &p.kind != kind);
    }
}

/// Test-side control of [`ManualTimers`].
#[derive(Debug, Clone)]
pub struct ManualTimerHandle {
    state: Rc<RefCell<TimerState>>,
}

impl ManualTimerHandle {
    pub fn now_ms(&self) -> u64 {
        self.state.borrow().now_ms
    }

    /// Pending kinds, soonest first.
    pub fn pending(&self) -> Vec<TimerKind> {
        let state = self.state.borrow();
        let mut pending: Vec<&PendingTimer> = state.pending.iter().collect();
        pending.sort_by_key(|p| p.due_ms);
        pending.into_iter().map(|p| p.kind.clone()).collect()
    }

    pub fn is_pending(&self, kind: &TimerKind) -> bool {
        self.state.borrow().pending.iter().any(|p| &p.kind == kind)
    }

    /// Fire one pending timer now, regardless of its due time.
    pub fn fire(&self, kind: &TimerKind) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(index) = state.pending.iter().position(|p| &p.kind == kind) else {
            return false;
        };
        let timer = state.pending.remove(index);
        state.sender.timer_elapsed(timer.kind, timer.token);
        true
    }

    /// Move virtual time forward, firing every timer that falls due, in
    /// due order. Returns how many fired.
    pub fn advance(&self, delta_ms: u64) -> usize {
        let mut state = self.state.borrow_mut();
        state.now_ms = state.now_ms.saturating_add(delta_ms);
        let now = state.now_ms;
        let mut due: Vec<PendingTimer> = Vec::new();
        let mut index = 0;
        while index < state.pending.len() {
            if state.pending[index].due_ms <= now {
                due.push(state.pending.remove(index));
            } else {
                index += 1;
            }
        }
        due.sort_by_key(|p| p.due_ms);
        for timer in &due {
            state.sender.timer_elapsed(timer.kind.clone(), timer.token);
        }
        due.len()
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Handles onto a simulated rig.
#[derive(Debug, Clone)]
pub struct SimHandles {
    pub backend: SimBackend,
    pub surface: SurfaceLog,
    pub timers: ManualTimerHandle,
}

/// Build engine collaborators entirely from simulated parts.
pub fn rig(backend: SimBackend) -> (Collaborators, SimHandles) {
    let dispatcher = Dispatcher::new();
    let timers = ManualTimers::new(dispatcher.sender());
    let surface = RecordingSurface::new();
    let handles = SimHandles {
        backend: backend.clone(),
        surface: surface.log(),
        timers: timers.handle(),
    };
    let collaborators = Collaborators {
        backend: Box::new(backend),
        surface: Box::new(surface),
        timers: Box::new(timers),
        dispatcher,
    };
    (collaborators, handles)
}
