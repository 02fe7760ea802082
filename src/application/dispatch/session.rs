use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use super::DispatchError;
use crate::domain::models::{DispatchOutcome, ProgressSnapshot, SessionPhase};

/// Receives `(processed, total, snapshot)` after every recorded outcome.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn on_progress(&self, processed: usize, total: usize, snapshot: &ProgressSnapshot);
}

#[async_trait]
impl<F> ProgressSink for F
where
    F: Fn(usize, usize, &ProgressSnapshot) + Send + Sync,
{
    async fn on_progress(&self, processed: usize, total: usize, snapshot: &ProgressSnapshot) {
        self(processed, total, snapshot)
    }
}

/// Polled once per progress update; `true` cancels the session.
pub type StopPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

struct SessionState {
    outcomes: Vec<DispatchOutcome>,
    snapshot: ProgressSnapshot,
    last_update: Instant,
}

/// Run-scoped state shared between the coordinator and its workers.
pub struct DispatchSession {
    id: Uuid,
    cancelled: AtomicBool,
    started: AtomicBool,
    phase: AtomicU8,
    total: AtomicUsize,
    state: Mutex<SessionState>,
    progress_sink: Option<Arc<dyn ProgressSink>>,
    stop_predicate: Option<StopPredicate>,
}

impl DispatchSession {
    pub fn new(
        progress_sink: Option<Arc<dyn ProgressSink>>,
        stop_predicate: Option<StopPredicate>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            cancelled: AtomicBool::new(false),
            started: AtomicBool::new(false),
            phase: AtomicU8::new(phase_to_u8(SessionPhase::Created)),
            total: AtomicUsize::new(0),
            state: Mutex::new(SessionState {
                outcomes: Vec::new(),
                snapshot: ProgressSnapshot::default(),
                last_update: Instant::now(),
            }),
            progress_sink,
            stop_predicate,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Requests cooperative cancellation. Workers stop at their next check point.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            info!(session = %self.id, "broadcast cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> SessionPhase {
        let phase = phase_from_u8(self.phase.load(Ordering::SeqCst));
        if phase == SessionPhase::Dispatching && self.is_cancelled() {
            SessionPhase::Cancelling
        } else {
            phase
        }
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> ProgressSnapshot {
        self.state.lock().await.snapshot.clone()
    }

    pub async fn processed(&self) -> usize {
        self.state.lock().await.outcomes.len()
    }

    pub(crate) fn set_phase(&self, phase: SessionPhase) {
        self.phase.store(phase_to_u8(phase), Ordering::SeqCst);
    }

    pub(crate) fn begin(&self, total: usize) -> Result<(), DispatchError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(DispatchError::SessionReused(self.id));
        }
        self.total.store(total, Ordering::SeqCst);
        Ok(())
    }

    /// Appends an outcome and refreshes the counters in one critical section.
    pub(crate) async fn record(&self, outcome: DispatchOutcome) -> (usize, ProgressSnapshot) {
        let mut state = self.state.lock().await;
        state.snapshot.record(&outcome);

        let now = Instant::now();
        let gap = now.duration_since(state.last_update).as_secs_f64();
        if gap > 0.0 {
            state.snapshot.current_speed = 1.0 / gap;
        }
        state.last_update = now;

        state.outcomes.push(outcome);
        (state.outcomes.len(), state.snapshot.clone())
    }

    pub(crate) async fn notify_progress(&self, processed: usize, snapshot: &ProgressSnapshot) {
        if let Some(stop) = &self.stop_predicate {
            if stop() {
                info!(
                    session = %self.id,
                    processed,
                    total = self.total(),
                    "broadcast stop requested, cancelling"
                );
                self.cancel();
                return;
            }
        }
        if let Some(sink) = &self.progress_sink {
            sink.on_progress(processed, self.total(), snapshot).await;
        }
    }

    pub(crate) async fn take_outcomes(&self) -> (Vec<DispatchOutcome>, ProgressSnapshot) {
        let mut state = self.state.lock().await;
        (std::mem::take(&mut state.outcomes), state.snapshot.clone())
    }
}

fn phase_to_u8(phase: SessionPhase) -> u8 {
    match phase {
        SessionPhase::Created => 0,
        SessionPhase::Sizing => 1,
        SessionPhase::TemplateOptimizing => 2,
        SessionPhase::Dispatching => 3,
        SessionPhase::Cancelling => 4,
        SessionPhase::Completed => 5,
    }
}

fn phase_from_u8(value: u8) -> SessionPhase {
    match value {
        0 => SessionPhase::Created,
        1 => SessionPhase::Sizing,
        2 => SessionPhase::TemplateOptimizing,
        3 => SessionPhase::Dispatching,
        4 => SessionPhase::Cancelling,
        _ => SessionPhase::Completed,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::DispatchSession;
    use crate::{
        application::dispatch::DispatchError,
        domain::models::{
            DeliveryFailure, DispatchOutcome, FailureKind, ProgressSnapshot, SessionPhase,
        },
    };

    #[test]
    fn cancel_is_idempotent() {
        let session = DispatchSession::new(None, None);
        session.set_phase(SessionPhase::Dispatching);
        session.cancel();
        let once = (session.is_cancelled(), session.phase());
        session.cancel();
        assert_eq!((session.is_cancelled(), session.phase()), once);
        assert_eq!(once, (true, SessionPhase::Cancelling));
    }

    #[test]
    fn cancelled_session_reports_completed_once_finished() {
        let session = DispatchSession::new(None, None);
        session.cancel();
        session.set_phase(SessionPhase::Completed);
        assert_eq!(session.phase(), SessionPhase::Completed);
    }

    #[test]
    fn a_session_runs_only_once() {
        let session = DispatchSession::new(None, None);
        assert!(session.begin(3).is_ok());
        assert!(matches!(session.begin(3), Err(DispatchError::SessionReused(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_are_not_lost() {
        let session = DispatchSession::new(None, None);
        let mut handles = Vec::new();
        for worker in 0..8i64 {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..50i64 {
                    let recipient = worker * 1000 + n;
                    let outcome = match n % 3 {
                        0 => DispatchOutcome::delivered(recipient, Duration::ZERO),
                        1 => DispatchOutcome::failed(
                            recipient,
                            DeliveryFailure::new(FailureKind::Blocked, "blocked"),
                            Duration::ZERO,
                        ),
                        _ => DispatchOutcome::failed(
                            recipient,
                            DeliveryFailure::new(FailureKind::Rejected, "bad request"),
                            Duration::ZERO,
                        ),
                    };
                    session.record(outcome).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let (outcomes, snapshot) = session.take_outcomes().await;
        assert_eq!(outcomes.len(), 400);
        assert_eq!(snapshot.processed(), 400);
        assert_eq!(snapshot.sent + snapshot.failed + snapshot.blocked, outcomes.len());
    }

    #[tokio::test]
    async fn stop_predicate_cancels_and_skips_the_sink() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let sink = move |_: usize, _: usize, _: &ProgressSnapshot| {
            seen.fetch_add(1, Ordering::SeqCst);
        };
        let session = DispatchSession::new(Some(Arc::new(sink)), Some(Arc::new(|| true)));

        session
            .notify_progress(1, &ProgressSnapshot::default())
            .await;

        assert!(session.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
