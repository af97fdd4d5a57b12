//! Error types for instance-manager.

use thiserror::Error;

use crate::session::{OwnerId, SessionId};

/// Boxed error produced by render callbacks and session work.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for instance-manager operations.
///
/// Lost state races are never reported through this type; only faults the
/// caller has to react to end up here.
#[derive(Error, Debug)]
pub enum InstanceError {
    /// A session with the given ID is already registered.
    #[error("session already exists: {0}")]
    SessionExists(SessionId),

    /// The render callback failed while initializing a session.
    #[error("failed to render session {id}: {source}")]
    RenderFailed {
        id: SessionId,
        #[source]
        source: BoxError,
    },

    /// A timer cleaned the session up before initialization finished.
    #[error("session {0} expired during initialization")]
    ExpiredDuringInit(SessionId),

    /// Identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// External sink error.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Reasons a session could not be acquired.
///
/// Each variant maps to its own user-facing message so the presentation
/// layer can tell them apart.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    /// No live session is registered under the ID.
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// The requester does not own the session.
    #[error("session {id} is owned by {owner}, not {requester}")]
    NotOwner {
        id: SessionId,
        owner: OwnerId,
        requester: OwnerId,
    },

    /// Someone else currently holds the session, or it is being torn down.
    #[error("session unavailable: {0}")]
    Unavailable(SessionId),
}

impl AcquireError {
    /// Message suitable for showing to the user who triggered the interaction.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "This interaction has expired. Run the command again.",
            Self::NotOwner { .. } => "Only the user who started this interaction can use it.",
            Self::Unavailable(_) => "This interaction is busy right now. Try again in a moment.",
        }
    }
}

/// Errors reported by the external message sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The target artifact no longer exists. Expected during cleanup.
    #[error("target is gone")]
    Gone,

    /// The call was abandoned because the session's I/O was cancelled.
    #[error("call cancelled")]
    Cancelled,

    /// Any other failure.
    #[error("{0}")]
    Failed(String),
}

impl SinkError {
    /// Whether this error is an expected absence rather than a fault.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Gone | Self::Cancelled)
    }
}

/// Convenience Result type for instance-manager operations.
pub type Result<T> = std::result::Result<T, InstanceError>;
