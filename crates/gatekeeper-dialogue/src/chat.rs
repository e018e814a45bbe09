//! Round-robin group chat
//!
//! Participants speak in a fixed order. The task message opens the dialogue,
//! every message is checked against the termination condition, and the
//! dialogue stops after `max_turns` participant turns at the latest.

use crate::{
    participant::{Participant, TurnContext},
    termination::TextMentionTermination,
};
use futures::stream;
use gatekeeper_core::{
    Error, Result,
    engine::{DialogueEngine, EngineItem, EngineStream, InputProvider, TaskResult},
    message::{ChatMessage, TASK_SOURCE},
};
use std::{collections::VecDeque, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct RoundRobinChat {
    participants: Arc<[Arc<dyn Participant>]>,
    termination: TextMentionTermination,
    max_turns: usize,
}

impl RoundRobinChat {
    pub fn new(
        participants: Vec<Arc<dyn Participant>>,
        termination: TextMentionTermination,
        max_turns: usize,
    ) -> Result<Self> {
        if participants.is_empty() {
            return Err(Error::Engine("group chat needs at least one participant".to_string()));
        }
        if max_turns == 0 {
            return Err(Error::Engine("max_turns must be at least 1".to_string()));
        }

        Ok(Self {
            participants: participants.into(),
            termination,
            max_turns,
        })
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }
}

impl DialogueEngine for RoundRobinChat {
    fn run_stream(
        &self,
        task: String,
        input: Arc<dyn InputProvider>,
        cancel: CancellationToken,
    ) -> EngineStream {
        let task_message = ChatMessage::text(TASK_SOURCE, task);

        let mut run = ChatRun {
            participants: self.participants.clone(),
            termination: self.termination.clone(),
            max_turns: self.max_turns,
            ctx: TurnContext { input, cancel },
            transcript: vec![task_message.clone()],
            pending: VecDeque::new(),
            turn: 0,
            announced: false,
            finished: false,
        };
        run.pending.push_back(Ok(EngineItem::Message(task_message)));

        Box::pin(stream::unfold(run, |mut run| async move {
            let item = run.next_item().await?;
            Some((item, run))
        }))
    }
}

/// State of one running dialogue
struct ChatRun {
    participants: Arc<[Arc<dyn Participant>]>,
    termination: TextMentionTermination,
    max_turns: usize,
    ctx: TurnContext,
    transcript: Vec<ChatMessage>,
    pending: VecDeque<Result<EngineItem>>,
    turn: usize,
    announced: bool,
    finished: bool,
}

impl ChatRun {
    async fn next_item(&mut self) -> Option<Result<EngineItem>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }
            self.step().await;
        }
    }

    /// Advance the dialogue by one phase, queueing whatever it produces
    async fn step(&mut self) {
        if self.turn >= self.max_turns {
            info!(turns = self.turn, "Dialogue reached turn limit");
            self.finish(format!("Maximum number of turns {} reached.", self.max_turns));
            return;
        }

        let speaker = self.participants[self.turn % self.participants.len()].clone();

        if !self.announced {
            self.announced = true;
            if let Some(event) = speaker.on_turn_start() {
                self.pending.push_back(Ok(event));
                return;
            }
        }

        match speaker.respond(&self.transcript, &self.ctx).await {
            Ok(message) => {
                debug!(turn = self.turn, source = %message.source, "Participant responded");
                self.turn += 1;
                self.announced = false;
                let stop_reason = self.termination.check(&message);
                self.transcript.push(message.clone());
                self.pending.push_back(Ok(EngineItem::Message(message)));
                if let Some(reason) = stop_reason {
                    info!(turns = self.turn, reason = %reason, "Dialogue terminated");
                    self.finish(reason);
                }
            }
            Err(e) => {
                self.pending.push_back(Err(e));
                self.finished = true;
            }
        }
    }

    fn finish(&mut self, stop_reason: String) {
        self.pending.push_back(Ok(EngineItem::Result(TaskResult {
            messages: self.transcript.clone(),
            stop_reason: Some(stop_reason),
        })));
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::UserProxy;
    use async_trait::async_trait;
    use futures::StreamExt;
    use gatekeeper_core::InputError;
    use std::sync::Mutex;

    /// Replies from a fixed script, one line per turn
    struct ScriptedParticipant {
        name: String,
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedParticipant {
        fn new(name: &str, replies: &[&str]) -> Arc<dyn Participant> {
            Arc::new(Self {
                name: name.to_string(),
                replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            })
        }
    }

    #[async_trait]
    impl Participant for ScriptedParticipant {
        fn name(&self) -> &str {
            &self.name
        }

        async fn respond(&self, _transcript: &[ChatMessage], _ctx: &TurnContext) -> Result<ChatMessage> {
            let reply = self.replies.lock().unwrap().pop_front();
            reply
                .map(|text| ChatMessage::text(&self.name, text))
                .ok_or_else(|| Error::Engine("script exhausted".to_string()))
        }
    }

    struct QueuedInput(Mutex<VecDeque<String>>);

    #[async_trait]
    impl InputProvider for QueuedInput {
        async fn next_input(
            &self,
            _prompt: &str,
            _cancel: Option<CancellationToken>,
        ) -> std::result::Result<String, InputError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| InputError::Failed("no more input".to_string()))
        }
    }

    fn input(lines: &[&str]) -> Arc<dyn InputProvider> {
        Arc::new(QueuedInput(Mutex::new(
            lines.iter().map(|s| s.to_string()).collect(),
        )))
    }

    async fn collect(chat: &RoundRobinChat, lines: &[&str]) -> Vec<Result<EngineItem>> {
        chat.run_stream("say yes".to_string(), input(lines), CancellationToken::new())
            .collect()
            .await
    }

    #[test]
    fn test_rejects_empty_team_and_zero_turns() {
        assert!(RoundRobinChat::new(vec![], TextMentionTermination::default(), 5).is_err());
        let p = ScriptedParticipant::new("a", &[]);
        assert!(RoundRobinChat::new(vec![p], TextMentionTermination::default(), 0).is_err());
    }

    #[tokio::test]
    async fn test_terminates_on_marker() {
        let chat = RoundRobinChat::new(
            vec![
                Arc::new(UserProxy::new("Candidate")),
                ScriptedParticipant::new("gatekeeper", &["no", "yes\nTERMINATE"]),
            ],
            TextMentionTermination::default().with_sources(["gatekeeper"]),
            20,
        )
        .unwrap();

        let items: Vec<EngineItem> = collect(&chat, &["hi", "please"])
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(
            items[0],
            EngineItem::Message(ChatMessage::text(TASK_SOURCE, "say yes"))
        );
        assert_eq!(
            items[1],
            EngineItem::InputRequested {
                source: "Candidate".to_string()
            }
        );
        assert_eq!(items[2], EngineItem::Message(ChatMessage::text("Candidate", "hi")));
        assert_eq!(items[3], EngineItem::Message(ChatMessage::text("gatekeeper", "no")));

        match items.last().unwrap() {
            EngineItem::Result(result) => {
                assert_eq!(result.stop_reason.as_deref(), Some("Text 'TERMINATE' mentioned"));
                // task + 2 candidate + 2 gatekeeper messages
                assert_eq!(result.messages.len(), 5);
            }
            other => panic!("expected result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stops_at_turn_limit() {
        let chat = RoundRobinChat::new(
            vec![
                Arc::new(UserProxy::new("Candidate")),
                ScriptedParticipant::new("gatekeeper", &["no", "no"]),
            ],
            TextMentionTermination::default(),
            3,
        )
        .unwrap();

        let items = collect(&chat, &["a", "b"]).await;
        let last = items.last().unwrap().as_ref().unwrap();
        assert_eq!(
            last,
            &EngineItem::Result(TaskResult {
                messages: vec![
                    ChatMessage::text(TASK_SOURCE, "say yes"),
                    ChatMessage::text("Candidate", "a"),
                    ChatMessage::text("gatekeeper", "no"),
                    ChatMessage::text("Candidate", "b"),
                ],
                stop_reason: Some("Maximum number of turns 3 reached.".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn test_user_typing_marker_does_not_terminate_when_filtered() {
        let chat = RoundRobinChat::new(
            vec![
                Arc::new(UserProxy::new("Candidate")),
                ScriptedParticipant::new("gatekeeper", &["nope"]),
            ],
            TextMentionTermination::default().with_sources(["gatekeeper"]),
            2,
        )
        .unwrap();

        let items = collect(&chat, &["TERMINATE"]).await;
        match items.last().unwrap().as_ref().unwrap() {
            EngineItem::Result(result) => assert_eq!(
                result.stop_reason.as_deref(),
                Some("Maximum number of turns 2 reached.")
            ),
            other => panic!("expected result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let chat = RoundRobinChat::new(
            vec![
                Arc::new(UserProxy::new("Candidate")),
                ScriptedParticipant::new("gatekeeper", &[]),
            ],
            TextMentionTermination::default(),
            10,
        )
        .unwrap();

        let items = collect(&chat, &["hi"]).await;
        let last = items.last().unwrap();
        assert!(matches!(last, Err(Error::Engine(msg)) if msg == "script exhausted"));
        assert!(
            !items
                .iter()
                .any(|item| matches!(item, Ok(EngineItem::Result(_))))
        );
    }
}
