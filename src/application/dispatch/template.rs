use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    application::services::messenger::BotApi,
    domain::models::{ChatId, Payload, StagedMessage},
};

pub const IMAGE_STAGING_TIMEOUT: Duration = Duration::from_secs(5);
pub const TEXT_STAGING_TIMEOUT: Duration = Duration::from_secs(3);

/// Publishes the payload once to a staging chat so recipients get a cheap
/// `copyMessage` instead of a fresh upload.
#[derive(Debug, Clone, Copy)]
pub struct TemplateOptimizer {
    pub image_timeout: Duration,
    pub text_timeout: Duration,
}

impl Default for TemplateOptimizer {
    fn default() -> Self {
        Self {
            image_timeout: IMAGE_STAGING_TIMEOUT,
            text_timeout: TEXT_STAGING_TIMEOUT,
        }
    }
}

impl TemplateOptimizer {
    /// Returns `None` whenever staging fails; callers then send the literal payload.
    pub async fn stage(
        &self,
        api: &dyn BotApi,
        payload: &Payload,
        staging_chat: ChatId,
    ) -> Option<StagedMessage> {
        let (published, limit) = match payload {
            Payload::Staged(_) => {
                debug!("payload already staged, nothing to publish");
                return None;
            }
            Payload::Image(image) => (
                timeout(self.image_timeout, api.send_image(staging_chat, image)).await,
                self.image_timeout,
            ),
            Payload::Text(text) => (
                timeout(self.text_timeout, api.send_text(staging_chat, text)).await,
                self.text_timeout,
            ),
        };

        match published {
            Ok(Ok(sent)) => {
                info!(
                    message_id = sent.message_id,
                    staging_chat, "created template message for fast copying"
                );
                Some(StagedMessage {
                    message_id: sent.message_id,
                    from_chat_id: staging_chat,
                })
            }
            Ok(Err(err)) => {
                warn!(error = %err, staging_chat, "could not create template message, sending directly");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = limit.as_millis() as u64,
                    staging_chat, "timed out creating template message, sending directly"
                );
                None
            }
        }
    }
}
