use async_trait::async_trait;

use crate::domain::models::{ChannelCredential, ChatId, RecipientStats};

#[async_trait]
pub trait RecipientStore: Send + Sync {
    async fn add_recipient(&self, recipient: ChatId, channel_id: &str) -> anyhow::Result<()>;
    async fn list_active_recipients(&self, channel_id: &str) -> anyhow::Result<Vec<ChatId>>;
    async fn mark_unreachable(&self, recipient: ChatId, channel_id: &str) -> anyhow::Result<()>;
    async fn stats(&self, channel_id: &str) -> anyhow::Result<RecipientStats>;
}

#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn upsert(&self, credential: ChannelCredential) -> anyhow::Result<ChannelCredential>;
    async fn find_credential(&self, channel_id: &str) -> anyhow::Result<Option<ChannelCredential>>;
}
