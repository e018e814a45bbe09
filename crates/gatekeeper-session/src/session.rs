//! Conversation sessions
//!
//! A session owns one dialogue run. The engine pushes items into the session
//! from a background task, the session turns them into client events, and
//! clients pull those events back out with polls. User lines travel the other
//! way through an [`InputChannel`].

use crate::{
    config::SessionConfig,
    error::{Result, SessionError},
    input::InputChannel,
    secret::SecretCode,
};
use futures::{FutureExt, StreamExt};
use gatekeeper_core::{
    engine::{DialogueEngine, EngineItem, EngineStream},
    events::{SessionEvent, SessionStatus},
    message::{ChatMessage, TASK_SOURCE},
    termination::{mentions_marker, stop_reason_mentions_marker},
};
use gatekeeper_observability::Metrics;
use std::{
    any::Any,
    collections::HashSet,
    fmt,
    panic::AssertUnwindSafe,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the session handle and its background task
struct SessionState {
    id: String,
    secret: SecretCode,
    output_tx: mpsc::UnboundedSender<SessionEvent>,
    transcript: Mutex<Vec<SessionEvent>>,
    /// Sources that relay human input. Their messages never count as termination.
    human_sources: Mutex<HashSet<String>>,
    completed: AtomicBool,
    termination_detected: AtomicBool,
    secret_revealed: AtomicBool,
    stop_reason: Mutex<Option<String>>,
    metrics: Option<Arc<Metrics>>,
}

impl SessionState {
    fn push(&self, event: SessionEvent) {
        if event.is_transcript_entry() {
            lock(&self.transcript).push(event.clone());
        }
        // The receiver lives in the session handle; a send only fails once
        // the handle is gone, at which point nobody can read the event.
        let _ = self.output_tx.send(event);
    }

    async fn pump(&self, mut stream: EngineStream) {
        while let Some(item) = stream.next().await {
            match item {
                Ok(item) => self.handle_item(item),
                Err(e) => {
                    self.fail(e.to_string());
                    return;
                }
            }
        }
    }

    fn handle_item(&self, item: EngineItem) {
        match item {
            EngineItem::Result(result) => {
                self.completed.store(true, Ordering::SeqCst);
                *lock(&self.stop_reason) = result.stop_reason.clone();
                self.maybe_reveal_secret();
                info!(
                    session_id = %self.id,
                    stop_reason = ?result.stop_reason,
                    "Dialogue completed"
                );
                self.record_finished("completed");
                self.push(SessionEvent::status(
                    SessionStatus::Completed,
                    result.stop_reason,
                ));
            }
            EngineItem::Message(message) => self.handle_chat_message(message),
            EngineItem::InputRequested { source } => {
                lock(&self.human_sources).insert(source);
                self.push(SessionEvent::InputRequired);
            }
            EngineItem::StreamingChunk { .. } => {}
            EngineItem::Agent(event) => {
                let content = event.to_text();
                self.push(SessionEvent::event(event.source, content));
            }
        }
    }

    fn handle_chat_message(&self, message: ChatMessage) {
        let content = message.to_text();
        let from_human = message.source == TASK_SOURCE
            || lock(&self.human_sources).contains(&message.source);

        if !from_human && mentions_marker(&content) {
            debug!(session_id = %self.id, source = %message.source, "Termination marker seen");
            self.termination_detected.store(true, Ordering::SeqCst);
        }

        self.push(SessionEvent::message(message.source, content));
    }

    fn fail(&self, details: String) {
        self.completed.store(true, Ordering::SeqCst);
        warn!(session_id = %self.id, error = %details, "Dialogue failed");
        self.record_finished("error");
        self.push(SessionEvent::status(SessionStatus::Error, Some(details)));
    }

    /// Runs once the engine stream is over, however it ended
    fn finish(&self) {
        self.maybe_reveal_secret();
        if !self.completed.swap(true, Ordering::SeqCst) {
            info!(session_id = %self.id, "Dialogue ended without a result");
            self.record_finished("ended");
            self.push(SessionEvent::status(SessionStatus::Ended, None));
        }
    }

    fn maybe_reveal_secret(&self) {
        let earned = self.termination_detected.load(Ordering::SeqCst)
            || stop_reason_mentions_marker(lock(&self.stop_reason).as_deref());
        if !earned {
            return;
        }
        if self
            .secret_revealed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        info!(session_id = %self.id, "Releasing secret");
        if let Some(metrics) = &self.metrics {
            metrics.record_secret_revealed();
        }
        self.push(SessionEvent::secret(format!(
            "Secret Code: {}",
            self.secret.expose()
        )));
    }

    fn record_finished(&self, status: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_dialogue_finished(status);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("Dialogue engine panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("Dialogue engine panicked: {}", message)
    } else {
        "Dialogue engine panicked".to_string()
    }
}

async fn drive(state: Arc<SessionState>, stream: EngineStream) {
    let pumped = AssertUnwindSafe(state.pump(stream)).catch_unwind().await;
    if let Err(payload) = pumped {
        state.fail(panic_message(payload.as_ref()));
    }
    state.finish();
}

/// One running dialogue and its queues
pub struct ConversationSession {
    id: String,
    state: Arc<SessionState>,
    input: Arc<InputChannel>,
    output_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<SessionEvent>>,
    engine: Arc<dyn DialogueEngine>,
    task: String,
    config: Arc<SessionConfig>,
    handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    created_at: Instant,
    /// Milliseconds after `created_at` of the last client interaction
    last_activity_ms: AtomicU64,
}

impl ConversationSession {
    /// Create a session. Nothing runs until [`start`](Self::start).
    pub fn new(
        id: impl Into<String>,
        engine: Arc<dyn DialogueEngine>,
        task: impl Into<String>,
        secret: SecretCode,
        config: Arc<SessionConfig>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let id = id.into();
        let (output_tx, output_rx) = mpsc::unbounded_channel();

        let state = Arc::new(SessionState {
            id: id.clone(),
            secret,
            output_tx,
            transcript: Mutex::new(Vec::new()),
            human_sources: Mutex::new(HashSet::new()),
            completed: AtomicBool::new(false),
            termination_detected: AtomicBool::new(false),
            secret_revealed: AtomicBool::new(false),
            stop_reason: Mutex::new(None),
            metrics,
        });

        Self {
            id,
            state,
            input: Arc::new(InputChannel::new()),
            output_rx: tokio::sync::Mutex::new(output_rx),
            engine,
            task: task.into(),
            config,
            handle: Mutex::new(None),
            cancel: CancellationToken::new(),
            created_at: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Emit the greeting and launch the dialogue. Calling it again is a no-op.
    ///
    /// The greeting is queued before this returns, so the first poll always
    /// sees at least one event.
    pub async fn start(&self) {
        {
            let mut handle = lock(&self.handle);
            if handle.is_some() {
                return;
            }

            self.state.push(SessionEvent::message(
                &self.config.greeting_role,
                &self.config.greeting_message,
            ));
            let stream = self.engine.run_stream(
                self.task.clone(),
                self.input.clone(),
                self.cancel.child_token(),
            );
            *handle = Some(tokio::spawn(drive(self.state.clone(), stream)));
            debug!(session_id = %self.id, "Dialogue task spawned");
        }

        tokio::task::yield_now().await;
    }

    /// Queue a user line for the dialogue. Never blocks.
    pub fn enqueue_user_message(&self, content: impl Into<String>) -> Result<()> {
        self.touch();
        self.input
            .send(content.into())
            .map_err(|_| SessionError::InputClosed(self.id.clone()))?;
        if let Some(metrics) = &self.state.metrics {
            metrics.record_message_accepted();
        }
        Ok(())
    }

    /// Remove and return every event queued right now, in emission order.
    ///
    /// Returns nothing while another caller is waiting on the queue; that
    /// caller will pick the events up instead.
    pub fn drain_output_nowait(&self) -> Vec<SessionEvent> {
        self.touch();
        let mut events = Vec::new();
        if let Ok(mut rx) = self.output_rx.try_lock() {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        self.record_delivered(&events);
        events
    }

    /// Wait up to `timeout` for a single event
    pub async fn wait_for_event(&self, timeout: Duration) -> Option<SessionEvent> {
        let started = Instant::now();
        let event = tokio::time::timeout(timeout, async {
            self.output_rx.lock().await.recv().await
        })
        .await
        .ok()
        .flatten();

        if let Some(metrics) = &self.state.metrics {
            metrics.record_poll_wait(started.elapsed().as_secs_f64());
        }
        if let Some(event) = &event {
            self.record_delivered(std::slice::from_ref(event));
        }
        self.touch();
        event
    }

    /// Drain, and if nothing was queued wait up to `timeout` for the next
    /// event, then drain whatever followed it.
    pub async fn poll_events(&self, timeout: Duration) -> Vec<SessionEvent> {
        let mut events = self.drain_output_nowait();
        if events.is_empty() && !timeout.is_zero() {
            events.extend(self.wait_for_event(timeout).await);
        }
        events.extend(self.drain_output_nowait());
        events
    }

    pub fn is_completed(&self) -> bool {
        self.state.completed.load(Ordering::SeqCst)
    }

    pub fn secret_revealed(&self) -> bool {
        self.state.secret_revealed.load(Ordering::SeqCst)
    }

    pub fn termination_detected(&self) -> bool {
        self.state.termination_detected.load(Ordering::SeqCst)
    }

    pub fn stop_reason(&self) -> Option<String> {
        lock(&self.state.stop_reason).clone()
    }

    /// Messages and secrets emitted so far
    pub fn transcript(&self) -> Vec<SessionEvent> {
        lock(&self.state.transcript).clone()
    }

    pub fn touch(&self) {
        let elapsed = self.created_at.elapsed().as_millis() as u64;
        self.last_activity_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    /// Time since the last client interaction
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed));
        self.created_at.elapsed().saturating_sub(last)
    }

    /// Cancel the dialogue and abort its background task
    pub fn dispose(&self) {
        self.cancel.cancel();
        if let Some(handle) = lock(&self.handle).as_ref() {
            handle.abort();
        }
    }

    fn record_delivered(&self, events: &[SessionEvent]) {
        if let Some(metrics) = &self.state.metrics {
            for event in events {
                metrics.record_event_delivered(event.kind());
            }
        }
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationSession")
            .field("id", &self.id)
            .field("completed", &self.is_completed())
            .field("secret_revealed", &self.secret_revealed())
            .finish_non_exhaustive()
    }
}
