//! Paginated messages as managed sessions.
//!
//! A pagination session renders one page with navigation controls. Each
//! control interaction acquires the session, moves the page, extends the
//! idle timeout and edits the message, then releases the session again.
//! The stop control, a vanished message or either timeout ends it.

mod component;
mod paginator;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::error::{AcquireError, BoxError, InstanceError, SinkError};
use crate::manager::{InitOptions, InstanceManager, ManagerConfig};
use crate::session::{OwnerId, SessionId};
use crate::sink::{MessageRef, MessageSink, RecordingSink};

pub use component::{ComponentId, PageAction};
pub use paginator::{Navigation, PageView, PaginationKind, Paginator, MAX_SELECT_OPTIONS};

/// Errors surfaced to the user interacting with a paginated message.
#[derive(Error, Debug)]
pub enum PaginationError {
    #[error("cannot paginate an empty page list")]
    Empty,

    #[error("page {index} out of range for {total} pages")]
    OutOfRange { index: usize, total: usize },

    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error("failed to update page: {0}")]
    Sink(#[from] SinkError),
}

impl PaginationError {
    /// Message suitable for showing to the user who pressed the control.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Acquire(err) => err.user_message(),
            Self::OutOfRange { .. } => "That page does not exist.",
            Self::Instance(InstanceError::InvalidId(_)) => "This control is not recognised.",
            _ => "Something went wrong while updating this message.",
        }
    }
}

/// Sink capable of posting and editing pages.
#[async_trait]
pub trait PageSink: MessageSink {
    async fn send_page(&self, owner: OwnerId, view: &PageView) -> Result<Self::Handle, SinkError>;

    async fn edit_page(&self, handle: &Self::Handle, view: &PageView) -> Result<(), SinkError>;
}

#[async_trait]
impl PageSink for RecordingSink {
    async fn send_page(&self, _owner: OwnerId, view: &PageView) -> Result<MessageRef, SinkError> {
        self.send(view.render()).await
    }

    async fn edit_page(&self, handle: &MessageRef, view: &PageView) -> Result<(), SinkError> {
        self.edit(*handle, view.render()).await
    }
}

/// Outcome of a control interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// The message now shows this page.
    Moved(PageView),
    /// The session ended.
    Stopped,
    /// The session was torn down while the edit was in flight.
    Expired,
}

/// Pagination sessions of one [`PaginationKind`].
pub struct Pagination<S: PageSink> {
    kind: PaginationKind,
    manager: InstanceManager<Paginator, S>,
}

impl<S: PageSink> Pagination<S> {
    pub fn new(kind: PaginationKind, sink: Arc<S>, config: ManagerConfig) -> Self {
        Self {
            kind,
            manager: InstanceManager::new(kind.name(), sink, config),
        }
    }

    pub fn kind(&self) -> PaginationKind {
        self.kind
    }

    pub fn manager(&self) -> &InstanceManager<Paginator, S> {
        &self.manager
    }

    /// Post the first page and start the session.
    pub async fn start(
        &self,
        owner: OwnerId,
        pages: Vec<String>,
        options: InitOptions,
    ) -> Result<SessionId, PaginationError> {
        let paginator = Paginator::new(pages, self.kind)?;
        let sink = Arc::clone(self.manager.sink());

        let id = self
            .manager
            .init(owner, paginator, options, |ctx| async move {
                let view = ctx.data().await.view(ctx.id());
                sink.send_page(ctx.owner(), &view)
                    .await
                    .map_err(BoxError::from)
            })
            .await?;
        Ok(id)
    }

    /// Handle a press on the control identified by `component`.
    pub async fn interact(
        &self,
        component: &str,
        requester: OwnerId,
    ) -> Result<Interaction, PaginationError> {
        let component: ComponentId = component.parse()?;
        let handle = self.manager.try_acquire(&component.session, requester)?;

        let navigation = handle.data().await.navigate(component.action);
        let view = match navigation {
            Ok(Navigation::Moved(_)) => handle.data().await.view(handle.id()),
            Ok(Navigation::Stopped) => {
                handle.complete().await;
                return Ok(Interaction::Stopped);
            }
            Err(err) => {
                handle.release();
                return Err(err);
            }
        };

        handle.extend();
        let Some(target) = handle.external_handle().cloned() else {
            handle.release();
            return Ok(Interaction::Expired);
        };

        let sink = Arc::clone(self.manager.sink());
        match handle.guard_io(sink.edit_page(&target, &view)).await {
            Ok(()) => {
                handle.release();
                Ok(Interaction::Moved(view))
            }
            Err(SinkError::Cancelled) => {
                debug!(session = %component.session, "page edit abandoned, session torn down");
                Ok(Interaction::Expired)
            }
            Err(SinkError::Gone) => {
                debug!(session = %component.session, "paginated message is gone");
                handle.complete().await;
                Ok(Interaction::Stopped)
            }
            Err(err) => Err(handle.fault(PaginationError::Sink(err)).await),
        }
    }

    /// End a session on behalf of `requester`.
    pub async fn close(&self, id: &SessionId, requester: OwnerId) -> Result<bool, PaginationError> {
        let handle = self.manager.try_acquire(id, requester)?;
        Ok(handle.complete().await)
    }
}
