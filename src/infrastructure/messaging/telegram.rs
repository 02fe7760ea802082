use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{
    Body, Client, RequestBuilder,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    application::services::messenger::{BotApi, BotConnector, BotIdentity, SentMessage},
    domain::{
        errors::BotApiError,
        models::{ChannelCredential, ChatId, ImageMessage, TextMessage},
    },
};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens Bot API connections. Every connection gets its own HTTP client.
#[derive(Debug, Clone)]
pub struct TelegramConnector {
    base_url: String,
    request_timeout: Duration,
}

impl Default for TelegramConnector {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE, DEFAULT_REQUEST_TIMEOUT)
    }
}

impl TelegramConnector {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
        }
    }
}

impl BotConnector for TelegramConnector {
    fn connect(&self, credential: &ChannelCredential) -> anyhow::Result<Arc<dyn BotApi>> {
        let http = Client::builder()
            .user_agent("broadcaster/telegram")
            .timeout(self.request_timeout)
            .build()
            .context("failed to build telegram client")?;

        Ok(Arc::new(TelegramBot {
            http,
            base_url: self.base_url.clone(),
            token: credential.token.clone(),
        }))
    }
}

pub struct TelegramBot {
    http: Client,
    base_url: String,
    token: String,
}

impl TelegramBot {
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BotApiError> {
        let response = request
            .send()
            .await
            .map_err(|err| BotApiError::Transport(err.without_url().to_string()))?;
        let status = response.status();
        let envelope: TelegramResponse<T> = response.json().await.map_err(|err| {
            BotApiError::Transport(format!(
                "unreadable response (status {status}): {}",
                err.without_url()
            ))
        })?;

        if envelope.ok {
            return envelope
                .result
                .ok_or_else(|| BotApiError::Transport("response without result".to_string()));
        }

        let code = envelope
            .error_code
            .unwrap_or_else(|| i32::from(status.as_u16()));
        let description = envelope
            .description
            .unwrap_or_else(|| "unknown error".to_string());
        let retry_after = envelope.parameters.and_then(|p| p.retry_after);
        Err(map_error(code, description, retry_after))
    }
}

fn map_error(code: i32, description: String, retry_after: Option<u64>) -> BotApiError {
    match code {
        429 => BotApiError::RateLimited {
            retry_after,
            description,
        },
        401 => BotApiError::Unauthorized(description),
        403 => BotApiError::Forbidden(description),
        _ => BotApiError::Api { code, description },
    }
}

#[async_trait]
impl BotApi for TelegramBot {
    async fn send_text(
        &self,
        chat_id: ChatId,
        message: &TextMessage,
    ) -> Result<SentMessage, BotApiError> {
        let body = SendMessageBody {
            chat_id,
            text: &message.text,
            parse_mode: message.parse_mode.as_api_str(),
            link_preview_options: LinkPreviewOptions {
                is_disabled: message.disable_link_preview,
            },
        };
        let sent: TelegramMessage = self
            .call(self.http.post(self.method_url("sendMessage")).json(&body))
            .await?;
        Ok(sent.into())
    }

    async fn send_image(
        &self,
        chat_id: ChatId,
        image: &ImageMessage,
    ) -> Result<SentMessage, BotApiError> {
        let length = image.bytes.len() as u64;
        let photo = Part::stream_with_length(Body::from(image.bytes.clone()), length)
            .file_name("photo.jpg")
            .mime_str("image/jpeg")
            .map_err(|err| BotApiError::Transport(err.to_string()))?;
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", photo);
        if let Some(caption) = &image.caption {
            form = form.text("caption", caption.clone());
            if let Some(mode) = image.parse_mode.as_api_str() {
                form = form.text("parse_mode", mode);
            }
        }

        let sent: TelegramMessage = self
            .call(self.http.post(self.method_url("sendPhoto")).multipart(form))
            .await?;
        Ok(sent.into())
    }

    async fn copy_message(
        &self,
        chat_id: ChatId,
        from_chat_id: ChatId,
        message_id: i64,
    ) -> Result<SentMessage, BotApiError> {
        let body = CopyMessageBody {
            chat_id,
            from_chat_id,
            message_id,
        };
        let copied: TelegramMessageId = self
            .call(self.http.post(self.method_url("copyMessage")).json(&body))
            .await?;
        Ok(SentMessage {
            message_id: copied.message_id,
            chat_id,
        })
    }

    async fn get_me(&self) -> Result<BotIdentity, BotApiError> {
        let user: TelegramUser = self.call(self.http.get(self.method_url("getMe"))).await?;
        Ok(BotIdentity {
            id: user.id,
            username: user.username,
        })
    }
}

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    link_preview_options: LinkPreviewOptions,
}

#[derive(Debug, Serialize)]
struct LinkPreviewOptions {
    is_disabled: bool,
}

#[derive(Debug, Serialize)]
struct CopyMessageBody {
    chat_id: ChatId,
    from_chat_id: ChatId,
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i32>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    chat: TelegramChat,
}

impl From<TelegramMessage> for SentMessage {
    fn from(message: TelegramMessage) -> Self {
        SentMessage {
            message_id: message.message_id,
            chat_id: message.chat.id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramMessageId {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    username: Option<String>,
}
