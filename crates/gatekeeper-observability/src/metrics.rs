//! Metrics collection with Prometheus
//!
//! Session lifecycle, message flow and engine outcome counters for the
//! gatekeeper service.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector for the gatekeeper
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    /// Sessions created since startup
    pub sessions_created_total: IntCounter,
    /// Sessions currently held by the manager
    pub sessions_active: IntGauge,
    /// Sessions evicted by the idle reaper
    pub sessions_evicted_total: IntCounter,
    /// Session creations refused at capacity
    pub sessions_rejected_total: IntCounter,

    /// User messages accepted into input queues
    pub messages_accepted_total: IntCounter,
    /// Events handed to clients, by event type
    pub events_delivered_total: IntCounterVec,
    /// Secrets revealed
    pub secrets_revealed_total: IntCounter,
    /// Dialogue runs by final status (completed, ended, error)
    pub dialogues_finished_total: IntCounterVec,

    /// Time a poll spent waiting for its first event
    pub poll_wait_seconds: Histogram,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let sessions_created_total = IntCounter::new(
            "gatekeeper_sessions_created_total",
            "Total number of sessions created",
        )?;
        let sessions_active =
            IntGauge::new("gatekeeper_sessions_active", "Number of live sessions")?;
        let sessions_evicted_total = IntCounter::new(
            "gatekeeper_sessions_evicted_total",
            "Total number of sessions evicted after idling",
        )?;
        let sessions_rejected_total = IntCounter::new(
            "gatekeeper_sessions_rejected_total",
            "Total number of session creations refused at capacity",
        )?;

        let messages_accepted_total = IntCounter::new(
            "gatekeeper_messages_accepted_total",
            "Total number of user messages accepted",
        )?;
        let events_delivered_total = IntCounterVec::new(
            Opts::new(
                "gatekeeper_events_delivered_total",
                "Total number of events delivered to clients",
            ),
            &["type"],
        )?;
        let secrets_revealed_total = IntCounter::new(
            "gatekeeper_secrets_revealed_total",
            "Total number of secrets revealed",
        )?;
        let dialogues_finished_total = IntCounterVec::new(
            Opts::new(
                "gatekeeper_dialogues_finished_total",
                "Total number of dialogue runs by final status",
            ),
            &["status"],
        )?;

        let poll_wait_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "gatekeeper_poll_wait_seconds",
                "Time an event poll waited for its first event",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        registry.register(Box::new(sessions_created_total.clone()))?;
        registry.register(Box::new(sessions_active.clone()))?;
        registry.register(Box::new(sessions_evicted_total.clone()))?;
        registry.register(Box::new(sessions_rejected_total.clone()))?;
        registry.register(Box::new(messages_accepted_total.clone()))?;
        registry.register(Box::new(events_delivered_total.clone()))?;
        registry.register(Box::new(secrets_revealed_total.clone()))?;
        registry.register(Box::new(dialogues_finished_total.clone()))?;
        registry.register(Box::new(poll_wait_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            sessions_created_total,
            sessions_active,
            sessions_evicted_total,
            sessions_rejected_total,
            messages_accepted_total,
            events_delivered_total,
            secrets_revealed_total,
            dialogues_finished_total,
            poll_wait_seconds,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_session_created(&self) {
        self.sessions_created_total.inc();
        self.sessions_active.inc();
    }

    /// Record a session leaving the manager, by eviction or explicit removal
    pub fn record_session_removed(&self, evicted: bool) {
        self.sessions_active.dec();
        if evicted {
            self.sessions_evicted_total.inc();
        }
    }

    pub fn record_session_rejected(&self) {
        self.sessions_rejected_total.inc();
    }

    pub fn record_message_accepted(&self) {
        self.messages_accepted_total.inc();
    }

    pub fn record_event_delivered(&self, event_type: &str) {
        self.events_delivered_total
            .with_label_values(&[event_type])
            .inc();
    }

    pub fn record_secret_revealed(&self) {
        self.secrets_revealed_total.inc();
    }

    pub fn record_dialogue_finished(&self, status: &str) {
        self.dialogues_finished_total
            .with_label_values(&[status])
            .inc();
    }

    pub fn record_poll_wait(&self, duration_secs: f64) {
        self.poll_wait_seconds.observe(duration_secs);
    }
}
