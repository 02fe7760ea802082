use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    errors::BotApiError,
    models::{ChannelCredential, ChatId, ImageMessage, TextMessage},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: i64,
    pub chat_id: ChatId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: i64,
    pub username: Option<String>,
}

/// One live connection to the remote bot API, bound to a single credential.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn send_text(
        &self,
        chat_id: ChatId,
        message: &TextMessage,
    ) -> Result<SentMessage, BotApiError>;

    async fn send_image(
        &self,
        chat_id: ChatId,
        image: &ImageMessage,
    ) -> Result<SentMessage, BotApiError>;

    async fn copy_message(
        &self,
        chat_id: ChatId,
        from_chat_id: ChatId,
        message_id: i64,
    ) -> Result<SentMessage, BotApiError>;

    async fn get_me(&self) -> Result<BotIdentity, BotApiError>;
}

/// Opens [`BotApi`] connections for a credential.
pub trait BotConnector: Send + Sync {
    fn connect(&self, credential: &ChannelCredential) -> anyhow::Result<Arc<dyn BotApi>>;
}
