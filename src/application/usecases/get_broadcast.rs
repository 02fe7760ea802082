use std::sync::Arc;

use uuid::Uuid;

use crate::{
    application::dispatch::{SessionRegistry, SessionStatus},
    domain::errors::DomainError,
};

pub struct GetBroadcastUseCase {
    registry: Arc<SessionRegistry>,
}

impl GetBroadcastUseCase {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub async fn execute(&self, session_id: Uuid) -> Result<SessionStatus, DomainError> {
        self.registry
            .status(session_id)
            .await
            .ok_or_else(|| DomainError::NotFound(format!("broadcast {session_id}")))
    }
}
