use std::sync::Arc;

use uuid::Uuid;

use crate::{application::dispatch::SessionRegistry, domain::errors::DomainError};

pub struct CancelBroadcastUseCase {
    registry: Arc<SessionRegistry>,
}

impl CancelBroadcastUseCase {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Requests cancellation. Cancelling a finished or already cancelled session is a no-op.
    pub async fn execute(&self, session_id: Uuid) -> Result<(), DomainError> {
        let session = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| DomainError::NotFound(format!("broadcast {session_id}")))?;
        session.cancel();
        Ok(())
    }
}
