//! # instance-manager
//!
//! Lifecycle management for ephemeral, per-interaction sessions.
//!
//! A session is a small piece of state behind an externally rendered
//! artifact (a paginated message, a menu) that users interact with for a
//! while and that must be neutralized afterwards. This crate tracks such
//! sessions in memory and guarantees:
//!
//! - **Exclusive access**: at most one holder mutates a session at a time,
//!   decided by a single atomic compare-and-swap
//! - **Dual expiry**: a resettable idle timeout and a fixed hard timeout
//! - **Exactly-once cleanup**: whichever of completion, idle timeout, hard
//!   timeout or fault wins the race tears the session down; everyone else
//!   observes a lost race and backs off
//! - **Injected rendering**: the transport is a [`MessageSink`] supplied by
//!   the caller
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use instance_manager::pagination::{Pagination, PaginationKind};
//! use instance_manager::{InitOptions, ManagerConfig, OwnerId, RecordingSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     instance_manager::logging::try_init().ok();
//!
//!     let sink = Arc::new(RecordingSink::new());
//!     let pagination = Pagination::new(PaginationKind::Buttons, sink, ManagerConfig::default());
//!
//!     let owner = OwnerId::new(1);
//!     let pages = vec!["first".to_string(), "second".to_string()];
//!     let id = pagination.start(owner, pages, InitOptions::new()).await?;
//!
//!     pagination.interact(&format!("{}:next", id), owner).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod pagination;
pub mod session;
pub mod sink;

// Re-export commonly used types
pub use error::{AcquireError, BoxError, InstanceError, Result, SinkError};
pub use manager::{
    CleanupReason, InitOptions, InstanceManager, ManagerConfig, RenderContext, SessionHandle,
};
pub use session::{OwnerId, SessionId, SessionState};
pub use sink::{MessageRef, MessageSink, RecordingSink, SinkEvent};
