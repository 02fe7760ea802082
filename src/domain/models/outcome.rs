use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::channel::ChatId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Recipient blocked the bot or is otherwise unreachable.
    Blocked,
    /// Still rate limited after the last attempt.
    RetriesExhausted,
    /// Any other rejection by the remote API.
    Rejected,
    /// Unexpected error inside the worker itself.
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl DeliveryFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_rate_related(&self) -> bool {
        self.kind == FailureKind::RetriesExhausted || self.detail.to_lowercase().contains("rate")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub recipient: ChatId,
    pub failure: Option<DeliveryFailure>,
    pub elapsed: Duration,
}

impl DispatchOutcome {
    pub fn delivered(recipient: ChatId, elapsed: Duration) -> Self {
        Self {
            recipient,
            failure: None,
            elapsed,
        }
    }

    pub fn failed(recipient: ChatId, failure: DeliveryFailure, elapsed: Duration) -> Self {
        Self {
            recipient,
            failure: Some(failure),
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn is_blocked(&self) -> bool {
        matches!(&self.failure, Some(f) if f.kind == FailureKind::Blocked)
    }

    pub fn error(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.detail.as_str())
    }
}
