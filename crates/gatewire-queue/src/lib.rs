//! Per-session debounced message queue: coalesces concurrent inbound
//! messages for one session, drops or summarizes on overflow, and enforces
//! at-most-one in-flight turn per session.

pub mod handler;
pub mod overflow;
pub mod queue;
pub mod types;

pub use handler::QueueHandler;
pub use queue::QueueManager;
pub use types::{Batch, QueuedMessage};

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use gatewire_core::config::DropPolicy;
    use tokio::sync::Mutex as AsyncMutex;

    use super::*;

    struct RecordingHandler {
        batches: AsyncMutex<Vec<Batch>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueueHandler for RecordingHandler {
        async fn on_batch(&self, batch: Batch) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batches.lock().await.push(batch);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_enqueues_preserve_order_and_are_all_delivered() {
        let handler = Arc::new(RecordingHandler {
            batches: AsyncMutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        });
        let manager = QueueManager::new(20, 100, DropPolicy::Summarize, handler.clone());

        for i in 0..10 {
            manager.enqueue(
                "agent:a1:main",
                QueuedMessage {
                    body: format!("msg-{i}"),
                    received_at_ms: gatewire_core::now_ms(),
                },
            );
        }

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let batches = handler.batches.lock().await;
        let all: Vec<&str> = batches
            .iter()
            .flat_map(|b| b.messages.iter().map(|m| m.body.as_str()))
            .collect();
        assert_eq!(all.len(), 10);
        for (i, body) in all.iter().enumerate() {
            assert_eq!(*body, format!("msg-{i}"));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn abort_drains_without_invoking() {
        let handler = Arc::new(RecordingHandler {
            batches: AsyncMutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        });
        let manager = QueueManager::new(500, 100, DropPolicy::Summarize, handler.clone());

        manager.enqueue(
            "agent:a1:main",
            QueuedMessage {
                body: "hello".to_string(),
                received_at_ms: gatewire_core::now_ms(),
            },
        );
        manager.abort("agent:a1:main");

        tokio::time::sleep(std::time::Duration::from_millis(700)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }
}
