use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{channel::ChatId, outcome::DispatchOutcome};

/// Live counters of a running session. `failed` excludes blocked recipients.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProgressSnapshot {
    pub sent: usize,
    pub failed: usize,
    pub blocked: usize,
    /// Messages per second, estimated from the gap between the last two updates.
    pub current_speed: f64,
}

impl ProgressSnapshot {
    pub fn processed(&self) -> usize {
        self.sent + self.failed + self.blocked
    }

    pub(crate) fn record(&mut self, outcome: &DispatchOutcome) {
        if outcome.is_success() {
            self.sent += 1;
        } else if outcome.is_blocked() {
            self.blocked += 1;
        } else {
            self.failed += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Created,
    Sizing,
    TemplateOptimizing,
    Dispatching,
    Cancelling,
    Completed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Created => "created",
            SessionPhase::Sizing => "sizing",
            SessionPhase::TemplateOptimizing => "template_optimizing",
            SessionPhase::Dispatching => "dispatching",
            SessionPhase::Cancelling => "cancelling",
            SessionPhase::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReport {
    pub session_id: Uuid,
    pub channel_name: String,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub blocked: usize,
    pub wall_clock_seconds: f64,
    pub avg_latency_seconds: f64,
    pub throughput_per_second: f64,
    pub worker_count: usize,
    pub rate_limit_hits: u64,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub final_progress: ProgressSnapshot,
    pub outcomes: Vec<DispatchOutcome>,
}

impl DispatchReport {
    pub fn delivery_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success as f64 / self.total as f64
        }
    }

    pub fn blocked_recipients(&self) -> impl Iterator<Item = ChatId> + '_ {
        self.outcomes
            .iter()
            .filter(|o| o.is_blocked())
            .map(|o| o.recipient)
    }
}
