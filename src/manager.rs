//! Session lifecycle coordinator.
//!
//! An [`InstanceManager`] owns the registry for one session kind. It creates
//! sessions, hands out exclusive [`SessionHandle`]s and guarantees that
//! exactly one of the terminal triggers (explicit completion, idle timeout,
//! hard timeout, fault) performs the teardown.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::MutexGuard;
use tracing::{debug, error, info, trace, warn};

use crate::error::{AcquireError, BoxError, InstanceError, SinkError};
use crate::session::{
    HardTimer, IdleTimer, OwnerId, Registry, Session, SessionId, SessionSettings, SessionState,
};
use crate::sink::MessageSink;
use crate::Result;

/// Default idle timeout.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(180);

/// Default hard timeout.
pub const DEFAULT_HARD_TIMEOUT: Duration = Duration::from_secs(600);

/// Per-kind defaults applied to sessions that don't override them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    pub idle_timeout: Duration,
    pub hard_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            hard_timeout: DEFAULT_HARD_TIMEOUT,
        }
    }
}

/// Per-session overrides for [`InstanceManager::init`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    idle_timeout: Option<Duration>,
    hard_timeout: Option<Duration>,
    owner_agnostic: bool,
}

impl InitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn with_hard_timeout(mut self, timeout: Duration) -> Self {
        self.hard_timeout = Some(timeout);
        self
    }

    /// Let any requester acquire the session, not just its owner.
    pub fn owner_agnostic(mut self) -> Self {
        self.owner_agnostic = true;
        self
    }
}

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    Completed,
    IdleTimeout,
    HardTimeout,
    Fault,
    InitFailed,
    Shutdown,
}

impl fmt::Display for CleanupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Completed => "completed",
            Self::IdleTimeout => "idle timeout",
            Self::HardTimeout => "hard timeout",
            Self::Fault => "fault",
            Self::InitFailed => "init failed",
            Self::Shutdown => "shutdown",
        };
        f.write_str(reason)
    }
}

type SessionOf<T, S> = Session<T, <S as MessageSink>::Handle>;

struct Inner<T, S: MessageSink> {
    kind: &'static str,
    registry: Registry<SessionOf<T, S>>,
    sink: Arc<S>,
    config: ManagerConfig,
}

/// Registry and coordinator for one kind of session.
///
/// Cloning is cheap and yields another handle to the same registry.
pub struct InstanceManager<T, S: MessageSink> {
    inner: Arc<Inner<T, S>>,
}

impl<T, S: MessageSink> Clone for InstanceManager<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, S> InstanceManager<T, S>
where
    T: Send + 'static,
    S: MessageSink,
{
    /// Create a manager for the session kind named `kind`.
    pub fn new(kind: &'static str, sink: Arc<S>, config: ManagerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                kind,
                registry: Registry::new(),
                sink,
                config,
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.inner.kind
    }

    pub fn sink(&self) -> &Arc<S> {
        &self.inner.sink
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Create, register and render a new session.
    ///
    /// The session is held by this call until `render` has produced the
    /// external handle, so nobody else can acquire it before the handle is
    /// stored. If `render` fails the session is torn down and the render
    /// error returned. If a timer tears the session down while rendering,
    /// the freshly rendered artifact is disabled here and
    /// [`InstanceError::ExpiredDuringInit`] is returned.
    pub async fn init<F, Fut>(
        &self,
        owner: OwnerId,
        data: T,
        options: InitOptions,
        render: F,
    ) -> Result<SessionId>
    where
        F: FnOnce(RenderContext<T, S::Handle>) -> Fut,
        Fut: Future<Output = std::result::Result<S::Handle, BoxError>>,
    {
        let id = SessionId::new();
        let settings = SessionSettings {
            idle_timeout: options.idle_timeout.unwrap_or(self.inner.config.idle_timeout),
            hard_timeout: options.hard_timeout.unwrap_or(self.inner.config.hard_timeout),
            owner_agnostic: options.owner_agnostic,
        };
        let session = Arc::new(Session::new(id, owner, data, settings));

        self.inner.registry.register(id, Arc::clone(&session))?;
        self.inner.arm_timers(&session);
        info!(
            kind = self.inner.kind,
            session = %id,
            owner = %owner,
            idle_timeout = ?settings.idle_timeout,
            hard_timeout = ?settings.hard_timeout,
            "session started"
        );

        let rendered = render(RenderContext {
            session: Arc::clone(&session),
        })
        .await;

        let handle = match rendered {
            Ok(handle) => handle,
            Err(source) => {
                if session
                    .state
                    .transition(SessionState::InSession, SessionState::CleanupInProgress)
                {
                    self.inner.cleanup(&session, CleanupReason::InitFailed).await;
                }
                return Err(InstanceError::RenderFailed { id, source });
            }
        };

        session.set_handle(handle);
        if session
            .state
            .transition(SessionState::InSession, SessionState::Available)
        {
            // The idle countdown restarts once the session becomes acquirable.
            session.reset_idle();
            Ok(id)
        } else {
            self.inner.disable(&session).await;
            Err(InstanceError::ExpiredDuringInit(id))
        }
    }

    /// Try to take exclusive hold of a session.
    ///
    /// A session that is already being torn down reports `NotFound`, the same
    /// as one that is gone.
    pub fn try_acquire(
        &self,
        id: &SessionId,
        requester: OwnerId,
    ) -> std::result::Result<SessionHandle<T, S>, AcquireError> {
        let session = self
            .inner
            .registry
            .lookup(id)
            .ok_or(AcquireError::NotFound(*id))?;

        if !session.is_owner_agnostic() && session.owner() != requester {
            return Err(AcquireError::NotOwner {
                id: *id,
                owner: session.owner(),
                requester,
            });
        }

        if !session
            .state
            .transition(SessionState::Available, SessionState::InSession)
        {
            trace!(session = %id, state = ?session.state(), "acquire lost race");
            return Err(if session.state().is_terminal() {
                AcquireError::NotFound(*id)
            } else {
                AcquireError::Unavailable(*id)
            });
        }

        Ok(SessionHandle {
            session,
            inner: Arc::clone(&self.inner),
            finished: false,
        })
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registry.is_empty()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.inner.registry.contains(id)
    }

    /// Current state of a live session.
    pub fn state_of(&self, id: &SessionId) -> Option<SessionState> {
        self.inner.registry.lookup(id).map(|session| session.state())
    }

    /// IDs of all live sessions.
    pub fn ids(&self) -> Vec<SessionId> {
        self.inner.registry.ids()
    }

    /// Tear down every live session. Returns how many this call cleaned up.
    pub async fn shutdown(&self) -> usize {
        let mut cleaned = 0;
        for id in self.inner.registry.ids() {
            let Some(session) = self.inner.registry.lookup(&id) else {
                continue;
            };
            if session.state.force_cleanup() != SessionState::CleanupInProgress {
                self.inner.cleanup(&session, CleanupReason::Shutdown).await;
                cleaned += 1;
            }
        }
        info!(kind = self.inner.kind, cleaned, "manager shut down");
        cleaned
    }
}

impl<T, S> Inner<T, S>
where
    T: Send + 'static,
    S: MessageSink,
{
    fn arm_timers(self: &Arc<Self>, session: &Arc<SessionOf<T, S>>) {
        let Some(idle_token) = session.idle_token() else {
            return;
        };

        let idle = {
            let inner = Arc::downgrade(self);
            let weak = Arc::downgrade(session);
            IdleTimer::spawn(session.idle_timeout(), idle_token, move || {
                let inner = Weak::clone(&inner);
                let weak = Weak::clone(&weak);
                async move {
                    if let (Some(inner), Some(session)) = (inner.upgrade(), weak.upgrade()) {
                        inner.expire_idle(&session).await;
                    }
                }
            })
        };

        let hard = {
            let inner = Arc::downgrade(self);
            let weak = Arc::downgrade(session);
            HardTimer::spawn(session.hard_timeout(), move || async move {
                if let (Some(inner), Some(session)) = (inner.upgrade(), weak.upgrade()) {
                    inner.expire_hard(&session).await;
                }
            })
        };

        session.install_timers(idle, hard);
    }

    async fn expire_idle(&self, session: &SessionOf<T, S>) {
        if session
            .state
            .transition(SessionState::Available, SessionState::CleanupInProgress)
        {
            info!(
                kind = self.kind,
                session = %session.id(),
                idle_timeout = ?session.idle_timeout(),
                "idle timeout fired"
            );
            self.cleanup(session, CleanupReason::IdleTimeout).await;
        } else {
            trace!(
                session = %session.id(),
                state = ?session.state(),
                "idle timeout fired on held session, ignoring"
            );
        }
    }

    async fn expire_hard(&self, session: &SessionOf<T, S>) {
        let previous = session.state.force_cleanup();
        if previous == SessionState::CleanupInProgress {
            trace!(session = %session.id(), "hard timeout fired after cleanup, ignoring");
            return;
        }
        info!(
            kind = self.kind,
            session = %session.id(),
            hard_timeout = ?session.hard_timeout(),
            previous = ?previous,
            "hard timeout fired"
        );
        self.cleanup(session, CleanupReason::HardTimeout).await;
    }

    /// Teardown. Only the winner of the transition into
    /// `CleanupInProgress` calls this.
    async fn cleanup(&self, session: &SessionOf<T, S>, reason: CleanupReason) {
        session.teardown();
        self.registry.remove(&session.id());
        self.disable(session).await;
        info!(
            kind = self.kind,
            session = %session.id(),
            reason = %reason,
            age = ?session.age(),
            "session completed"
        );
    }

    /// Disable the external artifact, at most once per session.
    async fn disable(&self, session: &SessionOf<T, S>) {
        let Some(handle) = session.external_handle() else {
            debug!(session = %session.id(), "no external handle to disable");
            return;
        };
        if !session.claim_disable() {
            return;
        }
        match self.sink.disable(handle).await {
            Ok(()) => debug!(session = %session.id(), handle = ?handle, "external artifact disabled"),
            Err(err) if err.is_expected() => {
                debug!(session = %session.id(), error = %err, "external artifact already gone")
            }
            Err(err) => warn!(session = %session.id(), error = %err, "failed to disable external artifact"),
        }
    }
}

/// View of a session handed to the render callback during init.
///
/// The init path holds the session while rendering, so access to the data
/// is uncontended.
pub struct RenderContext<T, H> {
    session: Arc<Session<T, H>>,
}

impl<T, H> RenderContext<T, H> {
    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    pub fn owner(&self) -> OwnerId {
        self.session.owner()
    }

    pub async fn data(&self) -> MutexGuard<'_, T> {
        self.session.data().lock().await
    }
}

/// Exclusive hold on a session.
///
/// Obtained from [`InstanceManager::try_acquire`]. The holder should finish
/// with [`release`](Self::release), [`complete`](Self::complete) or
/// [`fault`](Self::fault); a handle dropped without either releases the
/// session back to `Available`.
pub struct SessionHandle<T, S: MessageSink> {
    session: Arc<SessionOf<T, S>>,
    inner: Arc<Inner<T, S>>,
    finished: bool,
}

impl<T, S> SessionHandle<T, S>
where
    T: Send + 'static,
    S: MessageSink,
{
    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    pub fn owner(&self) -> OwnerId {
        self.session.owner()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Handle of the rendered artifact.
    pub fn external_handle(&self) -> Option<&S::Handle> {
        self.session.external_handle()
    }

    /// Exclusive access to the session payload.
    pub async fn data(&self) -> MutexGuard<'_, T> {
        self.session.data().lock().await
    }

    /// Push the idle deadline out by one idle timeout.
    ///
    /// False if the session is no longer held or its timer is already gone.
    pub fn extend(&self) -> bool {
        if self.session.state() != SessionState::InSession {
            return false;
        }
        let extended = self.session.reset_idle();
        if extended {
            debug!(
                session = %self.id(),
                idle_timeout = ?self.session.idle_timeout(),
                "session extended"
            );
        }
        extended
    }

    /// Run an external call that is abandoned when the session is torn down.
    pub async fn guard_io<F, R>(&self, call: F) -> std::result::Result<R, SinkError>
    where
        F: Future<Output = std::result::Result<R, SinkError>>,
    {
        let Some(token) = self.session.io_token() else {
            return Err(SinkError::Cancelled);
        };
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(SinkError::Cancelled),
            result = call => result,
        }
    }

    /// Give the session back for later acquisitions.
    pub fn release(mut self) -> bool {
        self.finished = true;
        self.session
            .state
            .transition(SessionState::InSession, SessionState::Available)
    }

    /// Tear the session down. False if something else already did.
    pub async fn complete(mut self) -> bool {
        self.finished = true;
        self.finish(CleanupReason::Completed).await
    }

    /// Report an unexpected failure during session work.
    ///
    /// Logs the error, tears the session down if still possible, makes sure
    /// the external artifact is disabled and hands the original error back
    /// so the caller can propagate it.
    pub async fn fault<E: fmt::Display>(mut self, err: E) -> E {
        self.finished = true;
        error!(
            kind = self.inner.kind,
            session = %self.id(),
            error = %err,
            "unhandled fault in session"
        );
        if !self.finish(CleanupReason::Fault).await {
            self.inner.disable(&self.session).await;
        }
        err
    }

    async fn finish(&self, reason: CleanupReason) -> bool {
        if self
            .session
            .state
            .transition(SessionState::InSession, SessionState::CleanupInProgress)
        {
            self.inner.cleanup(&self.session, reason).await;
            true
        } else {
            trace!(session = %self.id(), state = ?self.state(), "completion lost race");
            false
        }
    }
}

impl<T, S: MessageSink> Drop for SessionHandle<T, S> {
    fn drop(&mut self) {
        if !self.finished
            && self
                .session
                .state
                .transition(SessionState::InSession, SessionState::Available)
        {
            debug!(session = %self.session.id(), "session released on drop");
        }
    }
}

impl<T, S: MessageSink> fmt::Debug for SessionHandle<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.session.id())
            .field("state", &self.session.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MessageRef, RecordingSink};

    type Manager = InstanceManager<u32, RecordingSink>;

    fn manager() -> (Manager, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        (
            InstanceManager::new("test", Arc::clone(&sink), ManagerConfig::default()),
            sink,
        )
    }

    async fn start(manager: &Manager, owner: u64, options: InitOptions) -> SessionId {
        let sink = Arc::clone(manager.sink());
        manager
            .init(OwnerId::new(owner), 0, options, |ctx| async move {
                let content = format!("session {}", ctx.id());
                sink.send(content).await.map_err(BoxError::from)
            })
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_registers_available_session() {
        let (manager, sink) = manager();
        let id = start(&manager, 1, InitOptions::new()).await;

        assert!(manager.contains(&id));
        assert_eq!(manager.state_of(&id), Some(SessionState::Available));
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_release_cycle() {
        let (manager, _sink) = manager();
        let id = start(&manager, 1, InitOptions::new()).await;

        let handle = manager.try_acquire(&id, OwnerId::new(1)).unwrap();
        assert_eq!(handle.state(), SessionState::InSession);
        *handle.data().await += 1;
        assert!(handle.release());

        let handle = manager.try_acquire(&id, OwnerId::new(1)).unwrap();
        assert_eq!(*handle.data().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_acquire_unavailable() {
        let (manager, _sink) = manager();
        let id = start(&manager, 1, InitOptions::new()).await;

        let _held = manager.try_acquire(&id, OwnerId::new(1)).unwrap();
        let second = manager.try_acquire(&id, OwnerId::new(1));
        assert_eq!(second.unwrap_err(), AcquireError::Unavailable(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_owner_leaves_state() {
        let (manager, _sink) = manager();
        let id = start(&manager, 1, InitOptions::new()).await;

        let result = manager.try_acquire(&id, OwnerId::new(2));
        assert!(matches!(result, Err(AcquireError::NotOwner { .. })));
        assert_eq!(manager.state_of(&id), Some(SessionState::Available));
    }

    #[tokio::test(start_paused = true)]
    async fn test_owner_agnostic_allows_anyone() {
        let (manager, _sink) = manager();
        let id = start(&manager, 1, InitOptions::new().owner_agnostic()).await;

        let handle = manager.try_acquire(&id, OwnerId::new(99)).unwrap();
        assert_eq!(handle.owner(), OwnerId::new(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_is_terminal() {
        let (manager, sink) = manager();
        let id = start(&manager, 1, InitOptions::new()).await;

        let handle = manager.try_acquire(&id, OwnerId::new(1)).unwrap();
        assert!(handle.complete().await);

        assert!(!manager.contains(&id));
        assert_eq!(sink.disable_count(first_handle(&sink)), 1);
        assert_eq!(
            manager.try_acquire(&id, OwnerId::new(1)).unwrap_err(),
            AcquireError::NotFound(id)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases() {
        let (manager, _sink) = manager();
        let id = start(&manager, 1, InitOptions::new()).await;

        {
            let _handle = manager.try_acquire(&id, OwnerId::new(1)).unwrap();
            assert_eq!(manager.state_of(&id), Some(SessionState::InSession));
        }
        assert_eq!(manager.state_of(&id), Some(SessionState::Available));
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_failure_rolls_back() {
        let (manager, sink) = manager();
        let result = manager
            .init(OwnerId::new(1), 0, InitOptions::new(), |_ctx| async {
                Err::<MessageRef, BoxError>("no permission".into())
            })
            .await;

        assert!(matches!(result, Err(InstanceError::RenderFailed { .. })));
        assert!(manager.is_empty());
        assert_eq!(sink.total_disables(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_returns_original_error() {
        let (manager, sink) = manager();
        let id = start(&manager, 1, InitOptions::new()).await;

        let handle = manager.try_acquire(&id, OwnerId::new(1)).unwrap();
        let err = handle.fault(std::io::Error::other("boom")).await;

        assert_eq!(err.to_string(), "boom");
        assert!(!manager.contains(&id));
        assert_eq!(sink.total_disables(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cleans_everything() {
        let (manager, sink) = manager();
        start(&manager, 1, InitOptions::new()).await;
        start(&manager, 2, InitOptions::new()).await;

        assert_eq!(manager.shutdown().await, 2);
        assert!(manager.is_empty());
        assert_eq!(sink.total_disables(), 2);
    }

    #[test]
    fn test_cleanup_reason_display() {
        assert_eq!(CleanupReason::IdleTimeout.to_string(), "idle timeout");
        assert_eq!(CleanupReason::HardTimeout.to_string(), "hard timeout");
    }

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.idle_timeout, Duration::from_secs(180));
        assert_eq!(config.hard_timeout, Duration::from_secs(600));
    }

    fn first_handle(sink: &RecordingSink) -> MessageRef {
        match sink.events().first() {
            Some(crate::sink::SinkEvent::Sent { handle, .. }) => *handle,
            other => panic!("unexpected first event: {:?}", other),
        }
    }
}
