use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{Instant, sleep};
use tracing::{error, info};

use super::{sender::Sender, session::DispatchSession};
use crate::domain::models::{DeliveryFailure, DispatchOutcome, DispatchTask, FailureKind};

pub const MIN_DELAY: Duration = Duration::from_millis(10);
pub const RATE_LIMIT_DELAY_CAP: Duration = Duration::from_millis(100);
pub const ERROR_DELAY_CAP: Duration = Duration::from_millis(50);

/// Per-worker counters and adaptive pacing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerState {
    pub sent: u64,
    pub errors: u64,
    pub rate_limit_hits: u64,
    pub current_delay: Duration,
    pub consecutive_successes: u32,
}

impl WorkerState {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            current_delay: delay,
            ..Self::default()
        }
    }

    /// Speeds up after a streak of successes and backs off after failures.
    pub fn adapt(&mut self, outcome: &DispatchOutcome) {
        match &outcome.failure {
            None => {
                self.consecutive_successes += 1;
                if self.consecutive_successes > 20 {
                    self.current_delay = self.current_delay.min(MIN_DELAY);
                } else if self.consecutive_successes > 10 && self.current_delay > MIN_DELAY {
                    self.current_delay = self.current_delay.mul_f64(0.9).max(MIN_DELAY);
                }
            }
            Some(failure) => {
                self.consecutive_successes = 0;
                self.current_delay = if failure.is_rate_related() {
                    (self.current_delay * 2).min(RATE_LIMIT_DELAY_CAP)
                } else {
                    self.current_delay.mul_f64(1.5).min(ERROR_DELAY_CAP)
                };
            }
        }
    }
}

pub struct Worker {
    id: usize,
    sender: Sender,
    state: WorkerState,
}

impl Worker {
    pub fn new(id: usize, sender: Sender) -> Self {
        Self {
            id,
            sender,
            state: WorkerState::default(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    pub fn sender_mut(&mut self) -> &mut Sender {
        &mut self.sender
    }

    pub(crate) fn reset(&mut self, base_delay: Duration) {
        self.state = WorkerState::with_delay(base_delay);
    }

    /// Works through `chunk` in order and hands the worker back when done.
    pub async fn process(mut self, chunk: Vec<DispatchTask>, session: Arc<DispatchSession>) -> Self {
        let last = chunk.len().saturating_sub(1);

        for (index, task) in chunk.iter().enumerate() {
            if session.is_cancelled() {
                info!(worker = self.id, "worker stopped due to cancellation");
                break;
            }

            let started = Instant::now();
            let outcome = match AssertUnwindSafe(self.sender.send(task, &mut self.state))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(panic) => {
                    self.state.errors += 1;
                    let detail = panic_message(panic.as_ref());
                    error!(
                        worker = self.id,
                        recipient = task.recipient,
                        error = %detail,
                        "unexpected error while sending"
                    );
                    DispatchOutcome::failed(
                        task.recipient,
                        DeliveryFailure::new(FailureKind::Internal, detail),
                        started.elapsed(),
                    )
                }
            };

            self.state.adapt(&outcome);
            let (processed, snapshot) = session.record(outcome).await;

            if session.is_cancelled() {
                info!(
                    worker = self.id,
                    after = index + 1,
                    "worker stopping after cancellation"
                );
                break;
            }

            session.notify_progress(processed, &snapshot).await;

            if index < last && !session.is_cancelled() && !self.state.current_delay.is_zero() {
                sleep(self.state.current_delay).await;
            }
        }

        self.sender.release();
        info!(
            worker = self.id,
            sent = self.state.sent,
            errors = self.state.errors,
            rate_limits = self.state.rate_limit_hits,
            "worker completed"
        );
        self
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
