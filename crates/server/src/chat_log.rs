//! Fire-and-forget transcript writer.
//!
//! Handlers hand finished exchanges to [`ChatLogSink::record`] and move on.
//! A background task appends them to the chat-log repository; write failures
//! are logged and counted here and never reach the request that produced them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use dealerbot_core::domain::chat::ChatMessage;
use dealerbot_db::ChatLogRepository;

#[derive(Clone)]
pub struct ChatLogSink {
    sender: mpsc::UnboundedSender<Vec<ChatMessage>>,
    failures: Arc<AtomicU64>,
}

impl ChatLogSink {
    /// Starts the writer task. It exits once every sink clone has been dropped
    /// and the queue is drained.
    pub fn spawn(repository: Arc<dyn ChatLogRepository>) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Vec<ChatMessage>>();
        let failures = Arc::new(AtomicU64::new(0));
        let task_failures = failures.clone();

        let worker = tokio::spawn(async move {
            while let Some(batch) = receiver.recv().await {
                if let Err(error) = repository.append(&batch).await {
                    let total = task_failures.fetch_add(1, Ordering::Relaxed) + 1;
                    error!(
                        event_name = "chat_log.append.failed",
                        messages = batch.len(),
                        failures = total,
                        error = %error,
                        "chat log write failed"
                    );
                }
            }
        });

        (Self { sender, failures }, worker)
    }

    pub fn record(&self, messages: Vec<ChatMessage>) {
        if self.sender.send(messages).is_err() {
            let total = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                event_name = "chat_log.enqueue.failed",
                failures = total,
                "chat log writer has stopped"
            );
        }
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn failure_counter(&self) -> Arc<AtomicU64> {
        self.failures.clone()
    }
}
