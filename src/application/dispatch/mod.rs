//! Broadcast dispatch engine: a fixed pool of workers that deliver one payload
//! to many recipients, backing off on rate limits and stopping cooperatively
//! when the session is cancelled.

pub mod chunker;
pub mod coordinator;
pub mod registry;
pub mod sender;
pub mod session;
pub mod sizing;
pub mod template;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;
use uuid::Uuid;

pub use coordinator::{DispatchCoordinator, DispatchOptions, dispatch};
pub use registry::{SessionRegistry, SessionResult, SessionStatus};
pub use session::{DispatchSession, ProgressSink, StopPredicate};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid channel credential: {0}")]
    InvalidCredential(String),
    #[error("dispatch session {0} was already started")]
    SessionReused(Uuid),
}
