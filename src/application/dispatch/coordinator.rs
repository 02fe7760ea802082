use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::{
    DispatchError, chunker,
    sender::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_AFTER, Sender},
    session::{DispatchSession, ProgressSink, StopPredicate},
    sizing,
    template::TemplateOptimizer,
    worker::Worker,
};
use crate::{
    application::services::messenger::BotConnector,
    domain::{
        errors::BotApiError,
        models::{ChannelCredential, ChatId, DispatchReport, DispatchTask, Payload, SessionPhase},
    },
};

pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(20);

#[derive(Clone)]
pub struct DispatchOptions {
    /// Size the pool from the recipient count. Ignored when `worker_count` is set.
    pub auto_size: bool,
    pub worker_count: Option<usize>,
    /// Chat the payload is pre-published to for copy-based delivery.
    pub staging_chat: Option<ChatId>,
    /// Initial pause between two sends of the same worker.
    pub base_delay: Duration,
    pub max_attempts: u32,
    /// Wait applied when a rate limit carries no hint.
    pub default_retry_after: Duration,
    /// Call `getMe` before dispatching and fail upfront on a rejected token.
    pub verify_credential: bool,
    pub template: TemplateOptimizer,
    pub progress_sink: Option<Arc<dyn ProgressSink>>,
    pub stop_predicate: Option<StopPredicate>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            auto_size: true,
            worker_count: None,
            staging_chat: None,
            base_delay: DEFAULT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            default_retry_after: DEFAULT_RETRY_AFTER,
            verify_credential: false,
            template: TemplateOptimizer::default(),
            progress_sink: None,
            stop_predicate: None,
        }
    }
}

impl fmt::Debug for DispatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchOptions")
            .field("auto_size", &self.auto_size)
            .field("worker_count", &self.worker_count)
            .field("staging_chat", &self.staging_chat)
            .field("base_delay", &self.base_delay)
            .field("max_attempts", &self.max_attempts)
            .field("default_retry_after", &self.default_retry_after)
            .field("verify_credential", &self.verify_credential)
            .field("progress_sink", &self.progress_sink.is_some())
            .field("stop_predicate", &self.stop_predicate.is_some())
            .finish()
    }
}

impl DispatchOptions {
    pub fn resolve_worker_count(&self, recipients: usize) -> usize {
        match self.worker_count.filter(|n| *n > 0) {
            Some(explicit) => explicit,
            None if self.auto_size => sizing::worker_count(recipients),
            None => DEFAULT_WORKERS,
        }
    }
}

/// Owns the worker pool and drives sessions through it.
pub struct DispatchCoordinator {
    credential: ChannelCredential,
    connector: Arc<dyn BotConnector>,
    options: DispatchOptions,
    workers: Vec<Worker>,
}

impl DispatchCoordinator {
    pub fn new(
        credential: ChannelCredential,
        connector: Arc<dyn BotConnector>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            credential,
            connector,
            options,
            workers: Vec::new(),
        }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    pub fn pool_size(&self) -> usize {
        self.workers.len()
    }

    pub fn open_session(&self) -> Arc<DispatchSession> {
        DispatchSession::new(
            self.options.progress_sink.clone(),
            self.options.stop_predicate.clone(),
        )
    }

    fn ensure_pool(&mut self, size: usize) {
        if self.workers.len() == size {
            return;
        }
        self.workers = (0..size)
            .map(|id| {
                let sender = Sender::new(id, self.credential.clone(), self.connector.clone())
                    .with_retry_policy(self.options.max_attempts, self.options.default_retry_after);
                Worker::new(id, sender)
            })
            .collect();
        info!(
            workers = size,
            channel = self.credential.name(),
            "initialized broadcast workers"
        );
    }

    /// Fails only when the API rejects the token itself. Any other `getMe`
    /// error is logged and the dispatch goes ahead.
    async fn verify_credential(&mut self) -> Result<(), DispatchError> {
        let Some(worker) = self.workers.first_mut() else {
            return Ok(());
        };
        let api = match worker.sender_mut().connection() {
            Ok(api) => api,
            Err(err) => {
                warn!(error = %err, "no connection to verify credential, continuing");
                return Ok(());
            }
        };
        match api.get_me().await {
            Ok(_) => Ok(()),
            Err(BotApiError::Unauthorized(reason)) => Err(DispatchError::InvalidCredential(reason)),
            Err(BotApiError::Api { code: 404, description }) => {
                Err(DispatchError::InvalidCredential(description))
            }
            Err(err) => {
                warn!(
                    channel = self.credential.name(),
                    error = %err,
                    "could not verify credential, continuing with dispatch"
                );
                Ok(())
            }
        }
    }

    async fn stage_template(&mut self, payload: &Payload, staging_chat: ChatId) -> Option<Payload> {
        let worker = self.workers.first_mut()?;
        let api = match worker.sender_mut().connection() {
            Ok(api) => api,
            Err(err) => {
                warn!(error = %err, "no connection for template message, sending directly");
                return None;
            }
        };
        self.options
            .template
            .stage(api.as_ref(), payload, staging_chat)
            .await
            .map(Payload::Staged)
    }

    pub async fn run(
        &mut self,
        session: &Arc<DispatchSession>,
        recipients: &[ChatId],
        payload: Payload,
    ) -> Result<DispatchReport, DispatchError> {
        self.credential
            .validate()
            .map_err(|err| DispatchError::InvalidCredential(err.to_string()))?;
        session.begin(recipients.len())?;

        let started_at = Utc::now();
        let clock = Instant::now();

        session.set_phase(SessionPhase::Sizing);
        let size = self.options.resolve_worker_count(recipients.len());
        self.ensure_pool(size);
        info!(
            session = %session.id(),
            recipients = recipients.len(),
            workers = size,
            channel = self.credential.name(),
            "starting broadcast"
        );

        if self.options.verify_credential {
            if let Err(err) = self.verify_credential().await {
                session.set_phase(SessionPhase::Completed);
                return Err(err);
            }
        }

        let mut payload = payload;
        if let Some(staging_chat) = self.options.staging_chat.filter(|_| payload.is_literal()) {
            session.set_phase(SessionPhase::TemplateOptimizing);
            if let Some(staged) = self.stage_template(&payload, staging_chat).await {
                payload = staged;
            }
        }

        let payload = Arc::new(payload);
        let tasks: Vec<DispatchTask> = recipients
            .iter()
            .map(|recipient| DispatchTask::new(*recipient, payload.clone()))
            .collect();
        let chunks = chunker::split(&tasks, size);

        session.set_phase(SessionPhase::Dispatching);
        let mut pool = Vec::with_capacity(size);
        let mut handles = Vec::with_capacity(size);
        for (mut worker, chunk) in self.workers.drain(..).zip(chunks) {
            worker.reset(self.options.base_delay);
            if chunk.is_empty() {
                pool.push(worker);
                continue;
            }
            handles.push(tokio::spawn(worker.process(chunk, session.clone())));
        }

        for joined in join_all(handles).await {
            match joined {
                Ok(worker) => pool.push(worker),
                Err(err) => error!(session = %session.id(), error = %err, "broadcast worker aborted"),
            }
        }
        pool.sort_by_key(Worker::id);
        self.workers = pool;

        let rate_limit_hits = self
            .workers
            .iter()
            .map(|worker| worker.state().rate_limit_hits)
            .sum();
        let (outcomes, final_progress) = session.take_outcomes().await;
        session.set_phase(SessionPhase::Completed);

        let wall_clock = clock.elapsed().as_secs_f64();
        let success = outcomes.iter().filter(|o| o.is_success()).count();
        let blocked = outcomes.iter().filter(|o| o.is_blocked()).count();
        let failed = outcomes.len() - success - blocked;
        let avg_latency_seconds = if outcomes.is_empty() {
            0.0
        } else {
            outcomes
                .iter()
                .map(|o| o.elapsed.as_secs_f64())
                .sum::<f64>()
                / outcomes.len() as f64
        };
        let throughput_per_second = if wall_clock > 0.0 {
            recipients.len() as f64 / wall_clock
        } else {
            0.0
        };

        let report = DispatchReport {
            session_id: session.id(),
            channel_name: self.credential.name().to_string(),
            total: recipients.len(),
            success,
            failed,
            blocked,
            wall_clock_seconds: wall_clock,
            avg_latency_seconds,
            throughput_per_second,
            worker_count: size,
            rate_limit_hits,
            cancelled: session.is_cancelled(),
            started_at,
            finished_at: Utc::now(),
            final_progress,
            outcomes,
        };

        if report.cancelled {
            info!(
                channel = %report.channel_name,
                elapsed_secs = report.wall_clock_seconds,
                sent = report.success,
                "broadcast was cancelled"
            );
        } else {
            info!(
                channel = %report.channel_name,
                elapsed_secs = report.wall_clock_seconds,
                success = report.success,
                failed = report.failed,
                blocked = report.blocked,
                per_second = report.throughput_per_second,
                workers = report.worker_count,
                rate_limit_hits = report.rate_limit_hits,
                "broadcast completed"
            );
        }

        Ok(report)
    }
}

/// One-shot dispatch: builds a coordinator, runs a single session and returns its report.
pub async fn dispatch(
    recipients: &[ChatId],
    payload: Payload,
    credential: ChannelCredential,
    connector: Arc<dyn BotConnector>,
    options: DispatchOptions,
) -> Result<DispatchReport, DispatchError> {
    let mut coordinator = DispatchCoordinator::new(credential, connector, options);
    let session = coordinator.open_session();
    coordinator.run(&session, recipients, payload).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::{DispatchCoordinator, DispatchOptions, dispatch};
    use crate::{
        application::dispatch::{
            DispatchError,
            testing::{Call, Reply, ScriptedBot, ScriptedConnector},
        },
        domain::{
            errors::BotApiError,
            models::{ChannelCredential, Payload, ProgressSnapshot, SessionPhase},
        },
    };

    fn credential() -> ChannelCredential {
        ChannelCredential::new("main", "123:token").with_display_name("Main bot")
    }

    fn fixed_workers(n: usize) -> DispatchOptions {
        DispatchOptions {
            auto_size: false,
            worker_count: Some(n),
            base_delay: Duration::ZERO,
            ..DispatchOptions::default()
        }
    }

    #[test]
    fn worker_count_resolution_prefers_explicit_count() {
        let explicit = fixed_workers(5);
        assert_eq!(explicit.resolve_worker_count(1_000), 5);

        let auto = DispatchOptions::default();
        assert_eq!(auto.resolve_worker_count(1_000), 10);

        let manual = DispatchOptions {
            auto_size: false,
            ..DispatchOptions::default()
        };
        assert_eq!(manual.resolve_worker_count(1_000), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn all_successful_sends_are_reported() {
        let bot = ScriptedBot::new();
        let recipients: Vec<i64> = (1..=10).collect();

        let report = dispatch(
            &recipients,
            Payload::text("hello"),
            credential(),
            ScriptedConnector::new(bot.clone()),
            fixed_workers(2),
        )
        .await
        .expect("dispatch should succeed");

        assert_eq!(report.total, 10);
        assert_eq!(report.success, 10);
        assert_eq!(report.failed, 0);
        assert_eq!(report.blocked, 0);
        assert_eq!(report.worker_count, 2);
        assert!(!report.cancelled);
        assert_eq!(report.outcomes.len(), 10);
        assert_eq!(report.channel_name, "Main bot");
        for recipient in recipients {
            assert_eq!(bot.calls_to(recipient), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_send_of_each_worker_rate_limited_then_all_succeed() {
        let bot = ScriptedBot::new();
        // Two workers split [1, 2, 3] and [4, 5].
        bot.script(1, vec![Reply::rate_limited(Some(1)), Reply::Ok]);
        bot.script(4, vec![Reply::rate_limited(Some(1)), Reply::Ok]);

        let report = dispatch(
            &[1, 2, 3, 4, 5],
            Payload::text("hello"),
            credential(),
            ScriptedConnector::new(bot.clone()),
            fixed_workers(2),
        )
        .await
        .unwrap();

        assert_eq!(report.success, 5);
        assert!(report.rate_limit_hits >= 2);
        assert!((report.wall_clock_seconds - 1.0).abs() < 1e-6);
        // Recipients 1 and 4 waited one second each, the rest went through at once.
        assert!((report.avg_latency_seconds - 0.4).abs() < 1e-6);
        assert!((report.throughput_per_second - 5.0).abs() < 1e-6);
        // Only the first recorded outcome is a full second after the session opened.
        assert!((report.final_progress.current_speed - 1.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_and_rejected_are_counted_separately() {
        let bot = ScriptedBot::new();
        bot.script(
            2,
            vec![Reply::Err(BotApiError::Forbidden(
                "bot was blocked by the user".to_string(),
            ))],
        );
        bot.script(
            3,
            vec![Reply::Err(BotApiError::Api {
                code: 400,
                description: "chat not found".to_string(),
            })],
        );

        let report = dispatch(
            &[1, 2, 3, 4],
            Payload::text("hello"),
            credential(),
            ScriptedConnector::new(bot),
            fixed_workers(2),
        )
        .await
        .unwrap();

        assert_eq!(report.success, 2);
        assert_eq!(report.blocked, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.blocked_recipients().collect::<Vec<_>>(), vec![2]);
        assert_eq!(
            report.success + report.failed + report.blocked,
            report.outcomes.len()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_mid_flight_keeps_counts_consistent() {
        let bot = ScriptedBot::new();
        bot.fallback(Reply::delayed(Duration::from_millis(50), Reply::Ok));
        let recipients: Vec<i64> = (1..=40).collect();

        let mut coordinator = DispatchCoordinator::new(
            credential(),
            ScriptedConnector::new(bot.clone()),
            fixed_workers(4),
        );
        let session = coordinator.open_session();
        let running = {
            let session = session.clone();
            tokio::spawn(async move {
                coordinator
                    .run(&session, &recipients, Payload::text("hello"))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(120)).await;
        session.cancel();
        session.cancel();
        let report = running.await.unwrap().unwrap();

        assert!(report.cancelled);
        assert!(!report.outcomes.is_empty());
        assert!(report.outcomes.len() < 40);
        assert_eq!(
            report.success + report.failed + report.blocked,
            report.outcomes.len()
        );
        assert_eq!(report.final_progress.processed(), report.outcomes.len());
        assert_eq!(bot.calls().len(), report.outcomes.len());
        assert_eq!(session.phase(), SessionPhase::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn literal_payload_is_staged_and_copied() {
        let bot = ScriptedBot::new();
        let options = DispatchOptions {
            staging_chat: Some(-100),
            ..fixed_workers(2)
        };

        let report = dispatch(
            &[7, 8, 9],
            Payload::image(vec![0u8; 16], Some("caption".to_string())),
            credential(),
            ScriptedConnector::new(bot.clone()),
            options,
        )
        .await
        .unwrap();

        assert_eq!(report.success, 3);
        let calls = bot.calls();
        assert_eq!(
            calls[0],
            Call::Image {
                chat_id: -100,
                bytes: 16
            }
        );
        let copies = calls
            .iter()
            .filter(|call| matches!(call, Call::Copy { from_chat_id: -100, .. }))
            .count();
        assert_eq!(copies, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_staging_falls_back_to_literal_sends() {
        let bot = ScriptedBot::new();
        bot.script(
            -100,
            vec![Reply::Err(BotApiError::Api {
                code: 400,
                description: "chat not found".to_string(),
            })],
        );
        let options = DispatchOptions {
            staging_chat: Some(-100),
            ..fixed_workers(1)
        };

        let report = dispatch(
            &[1, 2],
            Payload::text("hello"),
            credential(),
            ScriptedConnector::new(bot.clone()),
            options,
        )
        .await
        .unwrap();

        assert_eq!(report.success, 2);
        assert!(
            bot.calls()
                .iter()
                .all(|call| matches!(call, Call::Text { .. }))
        );
    }

    #[tokio::test]
    async fn rejected_token_fails_upfront_without_sending() {
        let bot = ScriptedBot::new();
        bot.reject_credential(BotApiError::Unauthorized("Unauthorized".to_string()));
        let options = DispatchOptions {
            verify_credential: true,
            ..fixed_workers(2)
        };

        let result = dispatch(
            &[1, 2, 3],
            Payload::text("hello"),
            credential(),
            ScriptedConnector::new(bot.clone()),
            options,
        )
        .await;

        assert!(matches!(result, Err(DispatchError::InvalidCredential(_))));
        assert_eq!(bot.calls(), vec![Call::GetMe]);
    }

    #[tokio::test]
    async fn unknown_token_fails_upfront() {
        let bot = ScriptedBot::new();
        bot.reject_credential(BotApiError::Api {
            code: 404,
            description: "Not Found".to_string(),
        });
        let options = DispatchOptions {
            verify_credential: true,
            ..fixed_workers(1)
        };

        let result = dispatch(
            &[1],
            Payload::text("hello"),
            credential(),
            ScriptedConnector::new(bot.clone()),
            options,
        )
        .await;

        assert!(matches!(result, Err(DispatchError::InvalidCredential(_))));
        assert_eq!(bot.calls(), vec![Call::GetMe]);
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_verification_still_dispatches() {
        let bot = ScriptedBot::new();
        bot.reject_credential(BotApiError::RateLimited {
            retry_after: Some(1),
            description: "retry after 1".to_string(),
        });
        let options = DispatchOptions {
            verify_credential: true,
            ..fixed_workers(2)
        };

        let report = dispatch(
            &[1, 2, 3],
            Payload::text("hello"),
            credential(),
            ScriptedConnector::new(bot.clone()),
            options,
        )
        .await
        .expect("a throttled getMe must not abort the broadcast");

        assert_eq!(report.total, 3);
        assert_eq!(report.success, 3);
        assert_eq!(bot.calls()[0], Call::GetMe);
        for recipient in [1, 2, 3] {
            assert_eq!(bot.calls_to(recipient), 1);
        }
    }

    #[tokio::test]
    async fn malformed_token_is_rejected_before_anything_runs() {
        let bot = ScriptedBot::new();
        let result = dispatch(
            &[1],
            Payload::text("hello"),
            ChannelCredential::new("main", "not-a-token"),
            ScriptedConnector::new(bot.clone()),
            fixed_workers(1),
        )
        .await;

        assert!(matches!(result, Err(DispatchError::InvalidCredential(_))));
        assert!(bot.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pool_is_reused_but_sessions_are_not() {
        let bot = ScriptedBot::new();
        let mut coordinator = DispatchCoordinator::new(
            credential(),
            ScriptedConnector::new(bot),
            fixed_workers(3),
        );

        let first = coordinator.open_session();
        let report = coordinator
            .run(&first, &[1, 2, 3, 4], Payload::text("one"))
            .await
            .unwrap();
        assert_eq!(report.success, 4);
        assert_eq!(coordinator.pool_size(), 3);

        let reused = coordinator
            .run(&first, &[1, 2], Payload::text("again"))
            .await;
        assert!(matches!(reused, Err(DispatchError::SessionReused(_))));

        let second = coordinator.open_session();
        let report = coordinator
            .run(&second, &[5, 6], Payload::text("two"))
            .await
            .unwrap();
        assert_eq!(report.success, 2);
        assert_eq!(report.worker_count, 3);
        assert_eq!(coordinator.pool_size(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_sink_sees_every_outcome_against_the_full_total() {
        let bot = ScriptedBot::new();
        let updates = Arc::new(AtomicUsize::new(0));
        let counter = updates.clone();
        let sink = move |_processed: usize, total: usize, _snapshot: &ProgressSnapshot| {
            assert_eq!(total, 7);
            counter.fetch_add(1, Ordering::SeqCst);
        };
        let options = DispatchOptions {
            progress_sink: Some(Arc::new(sink)),
            ..fixed_workers(3)
        };

        let report = dispatch(
            &[1, 2, 3, 4, 5, 6, 7],
            Payload::text("hello"),
            credential(),
            ScriptedConnector::new(bot),
            options,
        )
        .await
        .unwrap();

        assert_eq!(report.success, 7);
        assert_eq!(updates.load(Ordering::SeqCst), 7);
    }
}
