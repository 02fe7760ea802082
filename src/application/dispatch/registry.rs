use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::session::DispatchSession;
use crate::domain::models::{DispatchReport, ProgressSnapshot, SessionPhase};

pub const DEFAULT_MAX_SESSIONS: usize = 100;
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub enum SessionResult {
    Report(Arc<DispatchReport>),
    Failed(String),
}

/// Point-in-time view of a registered session.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub id: Uuid,
    pub channel_id: String,
    pub phase: SessionPhase,
    pub total: usize,
    pub snapshot: ProgressSnapshot,
    pub cancelled: bool,
    pub report: Option<Arc<DispatchReport>>,
    pub error: Option<String>,
}

struct RegisteredSession {
    session: Arc<DispatchSession>,
    channel_id: String,
    finished_at: Option<Instant>,
    result: Option<SessionResult>,
}

/// Keeps sessions addressable by id so they can be observed and cancelled
/// from outside the task that runs them. Running sessions are never evicted.
pub struct SessionRegistry {
    max_sessions: usize,
    max_age: Duration,
    entries: RwLock<HashMap<Uuid, RegisteredSession>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS, DEFAULT_MAX_AGE)
    }
}

impl SessionRegistry {
    pub fn new(max_sessions: usize, max_age: Duration) -> Self {
        Self {
            max_sessions,
            max_age,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, session: Arc<DispatchSession>, channel_id: impl Into<String>) {
        let mut entries = self.entries.write().await;
        entries.insert(
            session.id(),
            RegisteredSession {
                session,
                channel_id: channel_id.into(),
                finished_at: None,
                result: None,
            },
        );
        self.evict(&mut entries);
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<DispatchSession>> {
        let entries = self.entries.read().await;
        entries.get(&id).map(|entry| entry.session.clone())
    }

    /// Stores the terminal result. Returns `false` if the session is unknown.
    pub async fn complete(&self, id: Uuid, result: SessionResult) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&id) {
            Some(entry) => {
                entry.result = Some(result);
                entry.finished_at.get_or_insert_with(Instant::now);
                true
            }
            None => false,
        }
    }

    pub async fn status(&self, id: Uuid) -> Option<SessionStatus> {
        let (session, channel_id, result) = {
            let entries = self.entries.read().await;
            let entry = entries.get(&id)?;
            (
                entry.session.clone(),
                entry.channel_id.clone(),
                entry.result.clone(),
            )
        };

        let (report, error) = match result {
            Some(SessionResult::Report(report)) => (Some(report), None),
            Some(SessionResult::Failed(error)) => (None, Some(error)),
            None => (None, None),
        };
        let snapshot = match &report {
            Some(report) => report.final_progress.clone(),
            None => session.snapshot().await,
        };

        Some(SessionStatus {
            id,
            channel_id,
            phase: session.phase(),
            total: session.total(),
            snapshot,
            cancelled: session.is_cancelled(),
            report,
            error,
        })
    }

    /// Drops sessions that finished longer ago than the retention window.
    pub async fn prune(&self) -> usize {
        let mut entries = self.entries.write().await;
        self.evict(&mut entries)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn evict(&self, entries: &mut HashMap<Uuid, RegisteredSession>) -> usize {
        let before = entries.len();
        let max_age = self.max_age;
        entries.retain(|_, entry| {
            entry
                .finished_at
                .is_none_or(|finished_at| finished_at.elapsed() < max_age)
        });

        if entries.len() > self.max_sessions {
            let mut finished: Vec<(Instant, Uuid)> = entries
                .iter()
                .filter_map(|(id, entry)| entry.finished_at.map(|at| (at, *id)))
                .collect();
            finished.sort();
            let excess = entries.len() - self.max_sessions;
            for (_, id) in finished.into_iter().take(excess) {
                entries.remove(&id);
            }
        }

        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = entries.len(), "evicted broadcast sessions");
        }
        evicted
    }
}
