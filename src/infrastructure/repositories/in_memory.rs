use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    models::{ChannelCredential, ChatId, RecipientStats},
    repositories::{ChannelRepository, RecipientStore},
};

#[derive(Debug, Clone, Copy)]
struct RecipientEntry {
    recipient: ChatId,
    is_blocked: bool,
}

/// One channel's recipients in subscription order, indexed by chat id.
#[derive(Debug, Default)]
struct ChannelRecipients {
    entries: Vec<RecipientEntry>,
    index: HashMap<ChatId, usize>,
}

impl ChannelRecipients {
    fn get_mut(&mut self, recipient: ChatId) -> Option<&mut RecipientEntry> {
        let position = *self.index.get(&recipient)?;
        self.entries.get_mut(position)
    }
}

#[derive(Default)]
pub struct InMemoryRecipientStore {
    recipients: Arc<RwLock<HashMap<String, ChannelRecipients>>>,
}

impl InMemoryRecipientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecipientStore for InMemoryRecipientStore {
    async fn add_recipient(&self, recipient: ChatId, channel_id: &str) -> anyhow::Result<()> {
        let mut recipients = self.recipients.write().await;
        let channel = recipients.entry(channel_id.to_string()).or_default();

        // re-subscribing clears a previous block
        if let Some(existing) = channel.get_mut(recipient) {
            existing.is_blocked = false;
            return Ok(());
        }
        channel.index.insert(recipient, channel.entries.len());
        channel.entries.push(RecipientEntry {
            recipient,
            is_blocked: false,
        });
        Ok(())
    }

    async fn list_active_recipients(&self, channel_id: &str) -> anyhow::Result<Vec<ChatId>> {
        let recipients = self.recipients.read().await;
        Ok(recipients
            .get(channel_id)
            .map(|channel| {
                channel
                    .entries
                    .iter()
                    .filter(|e| !e.is_blocked)
                    .map(|e| e.recipient)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn mark_unreachable(&self, recipient: ChatId, channel_id: &str) -> anyhow::Result<()> {
        let mut recipients = self.recipients.write().await;
        if let Some(entry) = recipients
            .get_mut(channel_id)
            .and_then(|channel| channel.get_mut(recipient))
        {
            entry.is_blocked = true;
        }
        Ok(())
    }

    async fn stats(&self, channel_id: &str) -> anyhow::Result<RecipientStats> {
        let recipients = self.recipients.read().await;
        let Some(channel) = recipients.get(channel_id) else {
            return Ok(RecipientStats::default());
        };
        let total = channel.entries.len() as u64;
        let blocked = channel.entries.iter().filter(|e| e.is_blocked).count() as u64;
        Ok(RecipientStats {
            total,
            active: total - blocked,
            blocked,
        })
    }
}

#[derive(Default)]
pub struct InMemoryChannelRepository {
    channels: Arc<RwLock<HashMap<String, ChannelCredential>>>,
}

impl InMemoryChannelRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChannelRepository for InMemoryChannelRepository {
    async fn upsert(&self, credential: ChannelCredential) -> anyhow::Result<ChannelCredential> {
        let mut channels = self.channels.write().await;
        channels.insert(credential.channel_id.clone(), credential.clone());
        Ok(credential)
    }

    async fn find_credential(&self, channel_id: &str) -> anyhow::Result<Option<ChannelCredential>> {
        let channels = self.channels.read().await;
        Ok(channels.get(channel_id).cloned())
    }
}
