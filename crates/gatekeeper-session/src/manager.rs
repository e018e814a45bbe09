//! Session registry
//!
//! Process-wide map from session id to [`ConversationSession`], backed by
//! `DashMap` so lookups from concurrent requests never contend on one lock.

use crate::{
    config::SessionConfig,
    error::{Result, SessionError},
    secret::SecretCode,
    session::ConversationSession,
};
use dashmap::{DashMap, mapref::entry::Entry};
use gatekeeper_core::engine::DialogueEngine;
use gatekeeper_observability::{Metrics, ReadinessChecker, health::ComponentStatus};
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct SessionManager {
    sessions: DashMap<String, Arc<ConversationSession>>,
    engine: Arc<dyn DialogueEngine>,
    task: String,
    secret: SecretCode,
    config: Arc<SessionConfig>,
    metrics: Option<Arc<Metrics>>,
    /// Serializes the capacity check with the insert that follows it
    admission: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        engine: Arc<dyn DialogueEngine>,
        task: impl Into<String>,
        secret: SecretCode,
        config: SessionConfig,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            engine,
            task: task.into(),
            secret,
            config: Arc::new(config),
            metrics: None,
            admission: Mutex::new(()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Register and start a new session under a fresh id
    pub async fn create_session(&self) -> Result<Arc<ConversationSession>> {
        let session = self.admit()?;
        if let Some(metrics) = &self.metrics {
            metrics.record_session_created();
        }
        info!(session_id = %session.id(), "Session created");

        session.start().await;
        Ok(session)
    }

    /// Check capacity and register a new session as one step
    fn admit(&self) -> Result<Arc<ConversationSession>> {
        let _admission = self
            .admission
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.sessions.len() >= self.config.max_sessions {
            warn!(
                max_sessions = self.config.max_sessions,
                "Refusing new session at capacity"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_session_rejected();
            }
            return Err(SessionError::CapacityExceeded(self.config.max_sessions));
        }

        let session = loop {
            let id = Uuid::new_v4().simple().to_string();
            if let Entry::Vacant(slot) = self.sessions.entry(id.clone()) {
                let session = Arc::new(ConversationSession::new(
                    id,
                    self.engine.clone(),
                    self.task.clone(),
                    self.secret.clone(),
                    self.config.clone(),
                    self.metrics.clone(),
                ));
                slot.insert(session.clone());
                break session;
            }
        };
        Ok(session)
    }

    pub fn get_session(&self, id: &str) -> Result<Arc<ConversationSession>> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Unregister a session and stop its dialogue
    pub fn remove(&self, id: &str) -> Option<Arc<ConversationSession>> {
        let (_, session) = self.sessions.remove(id)?;
        session.dispose();
        if let Some(metrics) = &self.metrics {
            metrics.record_session_removed(false);
        }
        debug!(session_id = %id, "Session removed");
        Some(session)
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Remove sessions idle for longer than `max_idle`. Returns how many went.
    pub fn cleanup_idle(&self, max_idle: Duration) -> usize {
        let idle: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_for() > max_idle)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for id in idle {
            // Re-check under the shard lock; a request may have touched it since
            if let Some((_, session)) = self
                .sessions
                .remove_if(&id, |_, session| session.idle_for() > max_idle)
            {
                session.dispose();
                if let Some(metrics) = &self.metrics {
                    metrics.record_session_removed(true);
                }
                info!(session_id = %id, "Evicted idle session");
                removed += 1;
            }
        }
        removed
    }

    /// Periodically evict idle sessions until `shutdown` fires
    pub fn spawn_reaper(self: &Arc<Self>, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        if self.config.idle_ttl_secs == 0 || self.config.reap_interval_secs == 0 {
            debug!("Idle session reaper disabled");
            return None;
        }

        let manager = Arc::clone(self);
        let ttl = Duration::from_secs(self.config.idle_ttl_secs);
        let period = Duration::from_secs(self.config.reap_interval_secs);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = manager.cleanup_idle(ttl);
                        if removed > 0 {
                            debug!(removed, remaining = manager.count(), "Reaper pass");
                        }
                    }
                }
            }
        }))
    }

    /// Stop every session's dialogue. Used on shutdown.
    pub fn dispose_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().dispose();
        }
    }
}

impl ReadinessChecker for SessionManager {
    fn is_ready(&self) -> bool {
        self.count() < self.config.max_sessions
    }

    fn component_statuses(&self) -> Vec<ComponentStatus> {
        vec![ComponentStatus {
            name: "sessions".to_string(),
            status: if self.is_ready() { "ok" } else { "full" }.to_string(),
            detail: Some(format!("{}/{}", self.count(), self.config.max_sessions)),
        }]
    }
}
