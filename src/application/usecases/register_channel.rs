use std::sync::Arc;

use tracing::info;

use crate::domain::{
    errors::DomainError,
    models::{ChannelCredential, ChatId},
    repositories::{ChannelRepository, RecipientStore},
};

pub struct RegisterChannelUseCase {
    channels: Arc<dyn ChannelRepository>,
    recipients: Arc<dyn RecipientStore>,
}

pub struct RegisterChannelRequest {
    pub channel_id: String,
    pub token: String,
    pub display_name: Option<String>,
}

impl RegisterChannelUseCase {
    pub fn new(channels: Arc<dyn ChannelRepository>, recipients: Arc<dyn RecipientStore>) -> Self {
        Self {
            channels,
            recipients,
        }
    }

    pub async fn execute(
        &self,
        request: RegisterChannelRequest,
    ) -> Result<ChannelCredential, DomainError> {
        let mut credential = ChannelCredential::new(request.channel_id, request.token);
        credential.display_name = request.display_name;
        credential.validate()?;

        let saved = self.channels.upsert(credential).await?;
        info!(channel = %saved.channel_id, "channel registered");
        Ok(saved)
    }

    /// Adds recipients to a registered channel and returns how many were submitted.
    pub async fn add_recipients(
        &self,
        channel_id: &str,
        recipients: &[ChatId],
    ) -> Result<usize, DomainError> {
        if self.channels.find_credential(channel_id).await?.is_none() {
            return Err(DomainError::NotFound(format!("channel {channel_id}")));
        }
        for recipient in recipients {
            self.recipients.add_recipient(*recipient, channel_id).await?;
        }
        Ok(recipients.len())
    }
}
