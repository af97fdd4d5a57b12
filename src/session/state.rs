//! Session state machine.
//!
//! The state lives in a single atomic byte. Every transition is one
//! compare-and-swap (or, for the hard timeout, one exchange); a failed CAS
//! means another actor already moved the state and is never retried.

use std::sync::atomic::{AtomicU8, Ordering};

/// Represents the lifecycle state of a managed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SessionState {
    /// Nobody holds the session; it may be acquired.
    #[default]
    Available = 0,
    /// A single holder has exclusive mutation rights.
    InSession = 1,
    /// Teardown has started. Terminal.
    CleanupInProgress = 2,
}

impl SessionState {
    /// Check if a CAS transition to target state is permitted.
    ///
    /// Valid transitions:
    /// - Available -> InSession (acquire)
    /// - InSession -> Available (release)
    /// - InSession -> CleanupInProgress (complete, fault)
    /// - Available -> CleanupInProgress (idle timeout)
    ///
    /// The hard timeout bypasses this table with an unconditional exchange.
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, target),
            (Available, InSession)
                | (InSession, Available)
                | (InSession, CleanupInProgress)
                | (Available, CleanupInProgress)
        )
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::CleanupInProgress)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Available,
            1 => SessionState::InSession,
            _ => SessionState::CleanupInProgress,
        }
    }
}

/// Lock-free holder for a [`SessionState`].
#[derive(Debug)]
pub struct AtomicSessionState(AtomicU8);

impl AtomicSessionState {
    pub fn new(initial: SessionState) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    /// Current state. Only useful for introspection; decisions go through
    /// [`transition`](Self::transition).
    pub fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Atomically move `from -> to`.
    ///
    /// Returns `false` without side effects if the current state is not
    /// `from` or the pair is not a valid transition.
    pub fn transition(&self, from: SessionState, to: SessionState) -> bool {
        if !from.can_transition_to(to) {
            return false;
        }
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Unconditionally enter `CleanupInProgress`, returning the previous state.
    ///
    /// A previous value of `CleanupInProgress` means somebody else already
    /// owns the teardown.
    pub fn force_cleanup(&self) -> SessionState {
        SessionState::from_u8(
            self.0
                .swap(SessionState::CleanupInProgress as u8, Ordering::AcqRel),
        )
    }
}

impl Default for AtomicSessionState {
    fn default() -> Self {
        Self::new(SessionState::Available)
    }
}
