use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Telegram chat identifier. Users, channels and groups share the same space.
pub type ChatId = i64;

/// Recipient counts for one channel. `total == active + blocked`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipientStats {
    pub total: u64,
    pub active: u64,
    pub blocked: u64,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelCredential {
    pub channel_id: String,
    pub token: String,
    pub display_name: Option<String>,
}

impl ChannelCredential {
    pub fn new(channel_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            token: token.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.channel_id)
    }

    /// Local format check of a bot token (`<bot id>:<secret>`).
    pub fn validate(&self) -> Result<(), DomainError> {
        let token = self.token.trim();
        let Some((bot_id, secret)) = token.split_once(':') else {
            return Err(DomainError::Validation(
                "bot token must look like <id>:<secret>".to_string(),
            ));
        };
        if bot_id.is_empty() || !bot_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::Validation(
                "bot token id part must be numeric".to_string(),
            ));
        }
        if secret.is_empty()
            || !secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(DomainError::Validation(
                "bot token secret part is malformed".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ChannelCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCredential")
            .field("channel_id", &self.channel_id)
            .field("token", &"<redacted>")
            .field("display_name", &self.display_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::ChannelCredential;

    #[test]
    fn well_formed_token_passes_validation() {
        let credential = ChannelCredential::new("main", "123456:AA-bb_CC");
        assert!(credential.validate().is_ok());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        for token in ["", "   ", "no-colon", "abc:secret", "123:", "123:bad secret"] {
            let credential = ChannelCredential::new("main", token);
            assert!(credential.validate().is_err(), "token {token:?} should fail");
        }
    }

    #[test]
    fn debug_output_hides_the_token() {
        let credential = ChannelCredential::new("main", "123456:very-secret");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
