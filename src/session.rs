use crate::prediction::HbPredictor;
use crate::workflow::WorkflowController;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("Too many active sessions ({0}), try again later")]
    LimitReached(usize),
}

struct Entry {
    controller: Arc<WorkflowController>,
    last_access: Mutex<Instant>,
}

impl Entry {
    fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_access.lock())
    }
}

/// In-memory map of browser sessions, each with its own controller.
///
/// Sessions are bounded by `max_sessions` and dropped once idle for longer
/// than the sweeper's TTL. Any lookup counts as activity.
pub struct SessionStore {
    predictor: Arc<dyn HbPredictor>,
    max_sessions: usize,
    sessions: RwLock<HashMap<Uuid, Entry>>,
}

impl SessionStore {
    pub fn new(predictor: Arc<dyn HbPredictor>, max_sessions: usize) -> Self {
        Self {
            predictor,
            max_sessions,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn create(&self) -> Result<(Uuid, Arc<WorkflowController>), SessionError> {
        let mut sessions = self.sessions.write();
        if sessions.len() >= self.max_sessions {
            tracing::warn!(max_sessions = self.max_sessions, "Session limit reached");
            return Err(SessionError::LimitReached(self.max_sessions));
        }

        let id = Uuid::new_v4();
        let controller = Arc::new(WorkflowController::new(self.predictor.clone()));
        sessions.insert(
            id,
            Entry {
                controller: controller.clone(),
                last_access: Mutex::new(Instant::now()),
            },
        );
        tracing::debug!(session = %id, "Session created");
        Ok((id, controller))
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<WorkflowController>> {
        let sessions = self.sessions.read();
        let entry = sessions.get(id)?;
        entry.touch();
        Some(entry.controller.clone())
    }

    /// Removes the session. A cycle still in flight finishes against the
    /// detached controller and its answer is dropped with it.
    pub fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().remove(id);
        if let Some(entry) = &removed {
            entry.controller.reset();
        }
        removed.is_some()
    }

    /// Drops every session idle for longer than `max_idle`. Returns how many
    /// were dropped.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();

        sessions.retain(|id, entry| {
            if entry.idle_for(now) > max_idle {
                tracing::debug!(session = %id, "Evicting idle session");
                entry.controller.reset();
                false
            } else {
                true
            }
        });

        before - sessions.len()
    }

    /// Periodically evicts idle sessions until shutdown is signalled.
    pub async fn run_sweeper(
        self: Arc<Self>,
        idle_ttl: Duration,
        sweep_interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.evict_idle(idle_ttl);
                    if evicted > 0 {
                        tracing::info!(evicted, remaining = self.len(), "Evicted idle sessions");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Session sweeper received shutdown signal");
                    break;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
