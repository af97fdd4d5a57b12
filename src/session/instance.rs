//! Per-session record shared between holders, timers and the manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{AtomicSessionState, HardTimer, IdleTimer, OwnerId, SessionId, SessionState};

/// Take-once slot for a resource that must be disposed exactly once.
#[derive(Debug)]
struct Slot<R>(Mutex<Option<R>>);

impl<R> Slot<R> {
    fn new(value: Option<R>) -> Self {
        Self(Mutex::new(value))
    }

    fn put(&self, value: R) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    fn take(&self) -> Option<R> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn with<U>(&self, f: impl FnOnce(&R) -> U) -> Option<U> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(f)
    }
}

/// Timeout and access settings fixed at creation.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub idle_timeout: Duration,
    pub hard_timeout: Duration,
    pub owner_agnostic: bool,
}

/// A managed session.
///
/// `T` is the kind-specific payload mutated by the current holder, `H` the
/// handle of the externally rendered artifact.
#[derive(Debug)]
pub struct Session<T, H> {
    id: SessionId,
    owner: OwnerId,
    settings: SessionSettings,
    created_at: Instant,
    pub(crate) state: AtomicSessionState,
    data: tokio::sync::Mutex<T>,
    handle: OnceLock<H>,
    disabled: AtomicBool,
    io_cancel: Slot<CancellationToken>,
    idle_cancel: Slot<CancellationToken>,
    idle_timer: Slot<IdleTimer>,
    hard_timer: Slot<HardTimer>,
}

impl<T, H> Session<T, H> {
    /// Create a session that is already held by its creator.
    pub(crate) fn new(id: SessionId, owner: OwnerId, data: T, settings: SessionSettings) -> Self {
        Self {
            id,
            owner,
            settings,
            created_at: Instant::now(),
            state: AtomicSessionState::new(SessionState::InSession),
            data: tokio::sync::Mutex::new(data),
            handle: OnceLock::new(),
            disabled: AtomicBool::new(false),
            io_cancel: Slot::new(Some(CancellationToken::new())),
            idle_cancel: Slot::new(Some(CancellationToken::new())),
            idle_timer: Slot::new(None),
            hard_timer: Slot::new(None),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    pub fn idle_timeout(&self) -> Duration {
        self.settings.idle_timeout
    }

    pub fn hard_timeout(&self) -> Duration {
        self.settings.hard_timeout
    }

    pub fn is_owner_agnostic(&self) -> bool {
        self.settings.owner_agnostic
    }

    /// Time since the session was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Handle of the rendered artifact, once init has stored it.
    pub fn external_handle(&self) -> Option<&H> {
        self.handle.get()
    }

    pub(crate) fn data(&self) -> &tokio::sync::Mutex<T> {
        &self.data
    }

    pub(crate) fn set_handle(&self, handle: H) -> bool {
        self.handle.set(handle).is_ok()
    }

    /// Claim the right to disable the external artifact. True exactly once.
    pub(crate) fn claim_disable(&self) -> bool {
        !self.disabled.swap(true, Ordering::AcqRel)
    }

    /// Token cancelled when the session is torn down, for in-flight calls.
    pub(crate) fn io_token(&self) -> Option<CancellationToken> {
        self.io_cancel.with(CancellationToken::clone)
    }

    pub(crate) fn idle_token(&self) -> Option<CancellationToken> {
        self.idle_cancel.with(CancellationToken::clone)
    }

    pub(crate) fn install_timers(&self, idle: IdleTimer, hard: HardTimer) {
        self.idle_timer.put(idle);
        self.hard_timer.put(hard);
        // A teardown that ran before the slots were filled would miss them.
        if self.state().is_terminal() {
            self.dispose_timers();
        }
    }

    /// Re-arm the idle timer. False once the timer is gone.
    pub(crate) fn reset_idle(&self) -> bool {
        self.idle_timer.with(IdleTimer::reset).unwrap_or(false)
    }

    /// Cancel both cancellation sources and dispose both timers.
    ///
    /// Every step takes its resource out of its slot first, so repeated or
    /// concurrent calls are harmless.
    pub(crate) fn teardown(&self) {
        if let Some(token) = self.io_cancel.take() {
            token.cancel();
        }
        if let Some(token) = self.idle_cancel.take() {
            token.cancel();
        }
        self.dispose_timers();
    }

    fn dispose_timers(&self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.dispose();
        }
        if let Some(timer) = self.hard_timer.take() {
            timer.dispose();
        }
    }
}
