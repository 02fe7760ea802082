use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    application::{
        dispatch::{
            DispatchCoordinator, DispatchOptions, DispatchSession, SessionRegistry, SessionResult,
            coordinator::DEFAULT_BASE_DELAY, worker::panic_message,
        },
        services::messenger::BotConnector,
    },
    domain::{
        errors::DomainError,
        models::{ChatId, Payload},
        repositories::{ChannelRepository, RecipientStore},
    },
};

#[derive(Debug, Clone)]
pub struct BroadcastDefaults {
    pub base_delay: Duration,
    pub staging_chat: Option<ChatId>,
    /// Check the token with `getMe` before the first send.
    pub verify_credential: bool,
}

impl Default for BroadcastDefaults {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            staging_chat: None,
            verify_credential: true,
        }
    }
}

pub struct StartBroadcastUseCase {
    channels: Arc<dyn ChannelRepository>,
    recipients: Arc<dyn RecipientStore>,
    connector: Arc<dyn BotConnector>,
    registry: Arc<SessionRegistry>,
    defaults: BroadcastDefaults,
}

pub struct StartBroadcastRequest {
    pub channel_id: String,
    pub payload: Payload,
    pub worker_count: Option<usize>,
    pub staging_chat: Option<ChatId>,
}

pub struct StartBroadcastResponse {
    pub session_id: Uuid,
    pub recipients: usize,
    /// Resolves once the report (or failure) is stored in the registry.
    pub completion: JoinHandle<()>,
}

impl StartBroadcastUseCase {
    pub fn new(
        channels: Arc<dyn ChannelRepository>,
        recipients: Arc<dyn RecipientStore>,
        connector: Arc<dyn BotConnector>,
        registry: Arc<SessionRegistry>,
        defaults: BroadcastDefaults,
    ) -> Self {
        Self {
            channels,
            recipients,
            connector,
            registry,
            defaults,
        }
    }

    pub async fn execute(
        &self,
        request: StartBroadcastRequest,
    ) -> Result<StartBroadcastResponse, DomainError> {
        let credential = self
            .channels
            .find_credential(&request.channel_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("channel {}", request.channel_id)))?;
        credential.validate()?;

        let recipients = self
            .recipients
            .list_active_recipients(&request.channel_id)
            .await?;

        let options = DispatchOptions {
            worker_count: request.worker_count,
            staging_chat: request.staging_chat.or(self.defaults.staging_chat),
            base_delay: self.defaults.base_delay,
            verify_credential: self.defaults.verify_credential,
            ..DispatchOptions::default()
        };
        let coordinator = DispatchCoordinator::new(credential, self.connector.clone(), options);
        let session = coordinator.open_session();
        self.registry
            .register(session.clone(), request.channel_id.clone())
            .await;

        info!(
            session = %session.id(),
            channel = %request.channel_id,
            recipients = recipients.len(),
            payload = request.payload.kind(),
            "broadcast scheduled"
        );

        let session_id = session.id();
        let total = recipients.len();
        let completion = tokio::spawn(run_broadcast(
            coordinator,
            session,
            recipients,
            request.payload,
            request.channel_id,
            self.recipients.clone(),
            self.registry.clone(),
        ));

        Ok(StartBroadcastResponse {
            session_id,
            recipients: total,
            completion,
        })
    }
}

async fn run_broadcast(
    mut coordinator: DispatchCoordinator,
    session: Arc<DispatchSession>,
    recipients: Vec<ChatId>,
    payload: Payload,
    channel_id: String,
    store: Arc<dyn RecipientStore>,
    registry: Arc<SessionRegistry>,
) {
    let run = AssertUnwindSafe(coordinator.run(&session, &recipients, payload)).catch_unwind();
    let result = match run.await {
        Ok(Ok(report)) => {
            for recipient in report.blocked_recipients() {
                if let Err(err) = store.mark_unreachable(recipient, &channel_id).await {
                    warn!(recipient, channel = %channel_id, error = %err, "failed to mark recipient unreachable");
                }
            }
            SessionResult::Report(Arc::new(report))
        }
        Ok(Err(err)) => {
            error!(session = %session.id(), channel = %channel_id, error = %err, "broadcast failed to start");
            SessionResult::Failed(err.to_string())
        }
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            error!(session = %session.id(), channel = %channel_id, panic = %detail, "broadcast task panicked");
            SessionResult::Failed(format!("broadcast task panicked: {detail}"))
        }
    };
    registry.complete(session.id(), result).await;
}
