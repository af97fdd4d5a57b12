//! Session building blocks.
//!
//! Identifiers, the atomic state machine, the concurrent registry, the
//! idle/hard timers and the per-session record the manager coordinates.

mod id;
mod instance;
mod registry;
mod state;
mod timer;

pub use id::{OwnerId, SessionId};
pub use instance::{Session, SessionSettings};
pub use registry::Registry;
pub use state::{AtomicSessionState, SessionState};
pub use timer::{HardTimer, IdleTimer};
