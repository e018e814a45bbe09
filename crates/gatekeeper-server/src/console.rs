//! Console front end
//!
//! Drives one session from a line-oriented reader and renders its events to
//! a writer, the same way the browser client would over HTTP.

use gatekeeper_core::events::{SessionEvent, SessionStatus};
use gatekeeper_session::ConversationSession;
use std::{sync::Arc, time::Duration};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleOutcome {
    pub completed: bool,
    pub secret_unlocked: bool,
}

/// Run `session` until the dialogue completes or `input` is exhausted and
/// nothing more is happening
pub async fn run_console<R, W>(
    session: Arc<ConversationSession>,
    input: R,
    output: &mut W,
) -> anyhow::Result<ConsoleOutcome>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let feeder = {
        let session = session.clone();
        tokio::spawn(async move {
            let mut lines = input.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if session.enqueue_user_message(line).is_err() {
                    break;
                }
            }
            debug!("Console input closed");
        })
    };

    loop {
        let events = session.poll_events(POLL_INTERVAL).await;
        for event in &events {
            output.write_all(render(event).as_bytes()).await?;
        }
        output.flush().await?;

        if events.is_empty() && (session.is_completed() || feeder.is_finished()) {
            break;
        }
    }

    feeder.abort();
    Ok(ConsoleOutcome {
        completed: session.is_completed(),
        secret_unlocked: session.secret_revealed(),
    })
}

fn render(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Message { role, content } => format!("{}: {}\n", role, content),
        SessionEvent::Secret { content, .. } => format!("*** {} ***\n", content),
        SessionEvent::Status { status, details } => {
            let label = match status {
                SessionStatus::Completed => "completed",
                SessionStatus::Ended => "ended",
                SessionStatus::Error => "error",
            };
            match details {
                Some(details) => format!("[{}] {}\n", label, details),
                None => format!("[{}]\n", label),
            }
        }
        SessionEvent::InputRequired => "> ".to_string(),
        SessionEvent::Event { role, content } => format!("({}) {}\n", role, content),
    }
}
