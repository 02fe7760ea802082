use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use super::worker::WorkerState;
use crate::{
    application::services::messenger::{BotApi, BotConnector, SentMessage},
    domain::{
        errors::BotApiError,
        models::{ChannelCredential, DeliveryFailure, DispatchOutcome, DispatchTask, FailureKind, Payload},
    },
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

static RETRY_AFTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"retry after (\d+)").expect("retry-after pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorClass {
    RateLimited { wait_secs: Option<u64> },
    Blocked,
    Other,
}

pub(crate) fn classify(error: &BotApiError) -> ErrorClass {
    match error {
        BotApiError::RateLimited {
            retry_after,
            description,
        } => ErrorClass::RateLimited {
            wait_secs: retry_after.or_else(|| parse_retry_after(description)),
        },
        BotApiError::Forbidden(_) => ErrorClass::Blocked,
        other => classify_message(&other.to_string()),
    }
}

fn classify_message(message: &str) -> ErrorClass {
    let lowered = message.to_lowercase();
    if lowered.contains("too many requests")
        || lowered.contains("retry after")
        || lowered.contains("429")
    {
        ErrorClass::RateLimited {
            wait_secs: parse_retry_after(&lowered),
        }
    } else if lowered.contains("forbidden")
        || lowered.contains("bot was blocked")
        || lowered.contains("user is deactivated")
    {
        ErrorClass::Blocked
    } else {
        ErrorClass::Other
    }
}

/// Extracts `N` from a "retry after N" hint in an error message.
pub fn parse_retry_after(message: &str) -> Option<u64> {
    RETRY_AFTER
        .captures(&message.to_lowercase())?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Delivers tasks for one worker over a single lazily opened connection.
pub struct Sender {
    worker_id: usize,
    credential: ChannelCredential,
    connector: Arc<dyn BotConnector>,
    connection: Option<Arc<dyn BotApi>>,
    max_attempts: u32,
    default_retry_after: Duration,
}

impl Sender {
    pub fn new(
        worker_id: usize,
        credential: ChannelCredential,
        connector: Arc<dyn BotConnector>,
    ) -> Self {
        Self {
            worker_id,
            credential,
            connector,
            connection: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            default_retry_after: DEFAULT_RETRY_AFTER,
        }
    }

    pub fn with_retry_policy(mut self, max_attempts: u32, default_retry_after: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.default_retry_after = default_retry_after;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Returns the connection, opening it on first use.
    pub fn connection(&mut self) -> anyhow::Result<Arc<dyn BotApi>> {
        if let Some(connection) = &self.connection {
            return Ok(connection.clone());
        }
        let connection = self.connector.connect(&self.credential)?;
        debug!(worker = self.worker_id, "bot connection opened");
        self.connection = Some(connection.clone());
        Ok(connection)
    }

    pub fn release(&mut self) {
        if self.connection.take().is_some() {
            debug!(worker = self.worker_id, "bot connection released");
        }
    }

    pub async fn send(&mut self, task: &DispatchTask, state: &mut WorkerState) -> DispatchOutcome {
        let started = Instant::now();

        let api = match self.connection() {
            Ok(api) => api,
            Err(err) => {
                state.errors += 1;
                return DispatchOutcome::failed(
                    task.recipient,
                    DeliveryFailure::new(
                        FailureKind::Internal,
                        format!("bot connection unavailable: {err}"),
                    ),
                    started.elapsed(),
                );
            }
        };

        let mut attempt = 0;
        while attempt < self.max_attempts {
            let error = match deliver(api.as_ref(), task).await {
                Ok(_) => {
                    state.sent += 1;
                    return DispatchOutcome::delivered(task.recipient, started.elapsed());
                }
                Err(error) => error,
            };

            match classify(&error) {
                ErrorClass::RateLimited { wait_secs } => {
                    state.rate_limit_hits += 1;
                    let wait = wait_secs
                        .map(Duration::from_secs)
                        .unwrap_or(self.default_retry_after);
                    warn!(
                        worker = self.worker_id,
                        recipient = task.recipient,
                        attempt = attempt + 1,
                        wait_secs = wait.as_secs(),
                        "hit rate limit, waiting before retry"
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
                ErrorClass::Blocked => {
                    state.errors += 1;
                    return DispatchOutcome::failed(
                        task.recipient,
                        DeliveryFailure::new(FailureKind::Blocked, error.to_string()),
                        started.elapsed(),
                    );
                }
                ErrorClass::Other => {
                    state.errors += 1;
                    debug!(
                        worker = self.worker_id,
                        recipient = task.recipient,
                        error = %error,
                        "delivery rejected"
                    );
                    return DispatchOutcome::failed(
                        task.recipient,
                        DeliveryFailure::new(FailureKind::Rejected, error.to_string()),
                        started.elapsed(),
                    );
                }
            }
        }

        state.errors += 1;
        DispatchOutcome::failed(
            task.recipient,
            DeliveryFailure::new(
                FailureKind::RetriesExhausted,
                "max retries exceeded due to rate limit",
            ),
            started.elapsed(),
        )
    }
}

async fn deliver(api: &dyn BotApi, task: &DispatchTask) -> Result<SentMessage, BotApiError> {
    match task.payload.as_ref() {
        Payload::Staged(staged) => {
            api.copy_message(task.recipient, staged.from_chat_id, staged.message_id)
                .await
        }
        Payload::Image(image) => api.send_image(task.recipient, image).await,
        Payload::Text(text) => api.send_text(task.recipient, text).await,
    }
}
