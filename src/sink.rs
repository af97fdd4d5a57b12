//! External rendering capability.
//!
//! The manager never talks to a transport directly. It is handed a
//! [`MessageSink`] that knows how to neutralize the artifact a session
//! rendered. Session kinds extend it with whatever else they need to render
//! and update their own artifacts.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SinkError;

/// Capability used during cleanup to disable a session's artifact.
#[async_trait]
pub trait MessageSink: Send + Sync + 'static {
    /// Opaque reference to the rendered artifact.
    type Handle: Clone + fmt::Debug + Send + Sync + 'static;

    /// Disable further interaction with the artifact.
    ///
    /// Implementations report a missing target as [`SinkError::Gone`];
    /// the manager treats that as success.
    async fn disable(&self, handle: &Self::Handle) -> Result<(), SinkError>;
}

/// Reference to a message issued by [`RecordingSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(u64);

impl MessageRef {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// Something the recording sink was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Sent { handle: MessageRef, content: String },
    Edited { handle: MessageRef, content: String },
    Disabled(MessageRef),
}

/// In-memory sink that records every call.
///
/// Used by the demo binary and the tests. Failures and vanished targets can
/// be injected to exercise the error paths.
#[derive(Debug, Default)]
pub struct RecordingSink {
    next: AtomicU64,
    events: Mutex<Vec<SinkEvent>>,
    gone: Mutex<HashSet<MessageRef>>,
    fail_sends: AtomicBool,
    fail_edits: AtomicBool,
    latency: Duration,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every send and edit by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make subsequent sends fail.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent edits fail.
    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    /// Pretend the message was deleted externally.
    pub fn mark_gone(&self, handle: MessageRef) {
        self.gone
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle);
    }

    /// Post a new message.
    pub async fn send(&self, content: impl Into<String>) -> Result<MessageRef, SinkError> {
        self.simulate_latency().await;
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(SinkError::Failed("send rejected".into()));
        }
        let handle = MessageRef(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        self.record(SinkEvent::Sent {
            handle,
            content: content.into(),
        });
        Ok(handle)
    }

    /// Replace the content of an existing message.
    pub async fn edit(&self, handle: MessageRef, content: impl Into<String>) -> Result<(), SinkError> {
        self.simulate_latency().await;
        if self.is_gone(handle) {
            return Err(SinkError::Gone);
        }
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(SinkError::Failed("edit rejected".into()));
        }
        self.record(SinkEvent::Edited {
            handle,
            content: content.into(),
        });
        Ok(())
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of disable calls made for `handle`.
    pub fn disable_count(&self, handle: MessageRef) -> usize {
        self.events()
            .iter()
            .filter(|event| **event == SinkEvent::Disabled(handle))
            .count()
    }

    /// Number of disable calls made overall.
    pub fn total_disables(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, SinkEvent::Disabled(_)))
            .count()
    }

    fn record(&self, event: SinkEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn is_gone(&self, handle: MessageRef) -> bool {
        self.gone
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&handle)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    type Handle = MessageRef;

    async fn disable(&self, handle: &MessageRef) -> Result<(), SinkError> {
        self.record(SinkEvent::Disabled(*handle));
        if self.is_gone(*handle) {
            return Err(SinkError::Gone);
        }
        Ok(())
    }
}
