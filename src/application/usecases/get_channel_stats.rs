use std::sync::Arc;

use crate::domain::{
    errors::DomainError,
    models::RecipientStats,
    repositories::{ChannelRepository, RecipientStore},
};

pub struct GetChannelStatsUseCase {
    channels: Arc<dyn ChannelRepository>,
    recipients: Arc<dyn RecipientStore>,
}

impl GetChannelStatsUseCase {
    pub fn new(channels: Arc<dyn ChannelRepository>, recipients: Arc<dyn RecipientStore>) -> Self {
        Self {
            channels,
            recipients,
        }
    }

    pub async fn execute(&self, channel_id: &str) -> Result<RecipientStats, DomainError> {
        if self.channels.find_credential(channel_id).await?.is_none() {
            return Err(DomainError::NotFound(format!("channel {channel_id}")));
        }
        Ok(self.recipients.stats(channel_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::GetChannelStatsUseCase;
    use crate::{
        domain::{
            errors::DomainError,
            models::{ChannelCredential, RecipientStats},
            repositories::{ChannelRepository, RecipientStore},
        },
        infrastructure::repositories::in_memory::{
            InMemoryChannelRepository, InMemoryRecipientStore,
        },
    };

    #[tokio::test]
    async fn stats_cover_registered_channel_only() {
        let channels = Arc::new(InMemoryChannelRepository::new());
        let recipients = Arc::new(InMemoryRecipientStore::new());
        let usecase = GetChannelStatsUseCase::new(channels.clone(), recipients.clone());

        let missing = usecase.execute("main").await;
        assert!(matches!(missing, Err(DomainError::NotFound(_))));

        channels
            .upsert(ChannelCredential::new("main", "123:abc"))
            .await
            .unwrap();
        assert_eq!(
            usecase.execute("main").await.unwrap(),
            RecipientStats::default()
        );

        for recipient in [1, 2, 3] {
            recipients.add_recipient(recipient, "main").await.unwrap();
        }
        recipients.mark_unreachable(3, "main").await.unwrap();
        assert_eq!(
            usecase.execute("main").await.unwrap(),
            RecipientStats {
                total: 3,
                active: 2,
                blocked: 1,
            }
        );
    }
}
