use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::channel::ChatId;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParseMode {
    #[default]
    #[serde(rename = "HTML")]
    Html,
    MarkdownV2,
    Plain,
}

impl ParseMode {
    /// Value of the `parse_mode` field, `None` for plain text.
    pub fn as_api_str(&self) -> Option<&'static str> {
        match self {
            ParseMode::Html => Some("HTML"),
            ParseMode::MarkdownV2 => Some("MarkdownV2"),
            ParseMode::Plain => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub text: String,
    pub parse_mode: ParseMode,
    pub disable_link_preview: bool,
}

impl TextMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: ParseMode::Html,
            disable_link_preview: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMessage {
    /// Reference-counted, so every upload shares one buffer.
    pub bytes: Bytes,
    pub caption: Option<String>,
    pub parse_mode: ParseMode,
}

impl ImageMessage {
    pub fn new(bytes: impl Into<Bytes>, caption: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            caption,
            parse_mode: ParseMode::Html,
        }
    }
}

/// A message already published somewhere the bot can copy it from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedMessage {
    pub message_id: i64,
    pub from_chat_id: ChatId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(TextMessage),
    Image(ImageMessage),
    Staged(StagedMessage),
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text(TextMessage::new(text))
    }

    pub fn image(bytes: impl Into<Bytes>, caption: Option<String>) -> Self {
        Payload::Image(ImageMessage::new(bytes, caption))
    }

    pub fn is_literal(&self) -> bool {
        !matches!(self, Payload::Staged(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Text(_) => "text",
            Payload::Image(_) => "image",
            Payload::Staged(_) => "staged",
        }
    }
}

/// One delivery unit. Immutable once built.
#[derive(Debug, Clone)]
pub struct DispatchTask {
    pub recipient: ChatId,
    pub payload: Arc<Payload>,
}

impl DispatchTask {
    pub fn new(recipient: ChatId, payload: Arc<Payload>) -> Self {
        Self { recipient, payload }
    }
}
