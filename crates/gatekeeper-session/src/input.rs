//! User input channel
//!
//! Lines posted by the client are queued here until the engine asks for the
//! next one. Waits are cancellable and never lose or duplicate a line.

use async_trait::async_trait;
use gatekeeper_core::{InputError, engine::InputProvider};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

pub struct InputChannel {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl InputChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Queue a line. Never blocks.
    pub fn send(&self, line: String) -> Result<(), InputError> {
        self.tx
            .send(line)
            .map_err(|_| InputError::Failed("input channel closed".to_string()))
    }

    /// Wait for the next line, giving up if `cancel` fires first
    pub async fn recv(&self, cancel: Option<CancellationToken>) -> Result<String, InputError> {
        let cancel = cancel.unwrap_or_default();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InputError::Cancelled),
            line = async { self.rx.lock().await.recv().await } => {
                line.ok_or_else(|| InputError::Failed("input channel closed".to_string()))
            }
        }
    }
}

impl Default for InputChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputProvider for InputChannel {
    async fn next_input(
        &self,
        _prompt: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<String, InputError> {
        self.recv(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    #[tokio::test]
    async fn test_lines_arrive_in_order() {
        let channel = InputChannel::new();
        channel.send("first".to_string()).unwrap();
        channel.send("second".to_string()).unwrap();

        assert_eq!(channel.recv(None).await.unwrap(), "first");
        assert_eq!(channel.recv(None).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_cancelled_wait_does_not_consume() {
        let channel = Arc::new(InputChannel::new());
        let cancel = CancellationToken::new();

        let waiter = {
            let channel = channel.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { channel.recv(Some(cancel)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        assert_eq!(waiter.await.unwrap(), Err(InputError::Cancelled));

        channel.send("kept".to_string()).unwrap();
        assert_eq!(channel.recv(None).await.unwrap(), "kept");
    }

    #[tokio::test]
    async fn test_already_cancelled_returns_immediately() {
        let channel = InputChannel::new();
        channel.send("queued".to_string()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(channel.recv(Some(cancel)).await, Err(InputError::Cancelled));
        assert_eq!(channel.recv(None).await.unwrap(), "queued");
    }

    #[tokio::test]
    async fn test_waiting_receiver_wakes_on_send() {
        let channel = Arc::new(InputChannel::new());
        let waiter = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.next_input("> ", None).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        channel.send("hello".to_string()).unwrap();

        assert_eq!(waiter.await.unwrap().unwrap(), "hello");
    }
}
