use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use gatewire_core::config::DropPolicy;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::handler::QueueHandler;
use crate::overflow::apply_overflow;
use crate::types::{Batch, QueuedMessage};

struct Inner {
    items: Mutex<VecDeque<QueuedMessage>>,
    last_enqueued_at: AtomicI64,
    notify: Notify,
    cancel: CancellationToken,
}

/// One debounced, overflow-guarded queue per session key. Workers are
/// spawned lazily on first enqueue and live for the process lifetime.
pub struct QueueManager {
    queues: DashMap<String, Arc<Inner>>,
    debounce_ms: u64,
    max: usize,
    policy: DropPolicy,
    handler: Arc<dyn QueueHandler>,
}

impl QueueManager {
    pub fn new(
        debounce_ms: u64,
        max: usize,
        policy: DropPolicy,
        handler: Arc<dyn QueueHandler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            queues: DashMap::new(),
            debounce_ms,
            max,
            policy,
            handler,
        })
    }

    /// Non-blocking; updates `lastEnqueuedAt` for the session's debounce
    /// window and spawns its worker task the first time it's seen.
    pub fn enqueue(self: &Arc<Self>, session_key: &str, msg: QueuedMessage) {
        let inner = self
            .queues
            .entry(session_key.to_string())
            .or_insert_with(|| {
                let inner = Arc::new(Inner {
                    items: Mutex::new(VecDeque::new()),
                    last_enqueued_at: AtomicI64::new(0),
                    notify: Notify::new(),
                    cancel: CancellationToken::new(),
                });
                let manager = Arc::clone(self);
                let worker_inner = Arc::clone(&inner);
                let key = session_key.to_string();
                tokio::spawn(async move { manager.run_worker(key, worker_inner).await });
                inner
            })
            .clone();

        inner
            .last_enqueued_at
            .store(msg.received_at_ms, Ordering::SeqCst);
        inner.items.lock().unwrap().push_back(msg);
        inner.notify.notify_one();
    }

    /// Drains the session's queue without invoking a turn and cancels any
    /// in-flight debounce wait. A new enqueue after this starts a fresh
    /// worker lifetime — the cancellation token is per-queue-instance, not
    /// re-armed.
    pub fn abort(&self, session_key: &str) {
        if let Some(inner) = self.queues.get(session_key) {
            inner.items.lock().unwrap().clear();
            inner.cancel.cancel();
        }
        self.queues.remove(session_key);
    }

    pub fn queue_len(&self, session_key: &str) -> usize {
        self.queues
            .get(session_key)
            .map(|inner| inner.items.lock().unwrap().len())
            .unwrap_or(0)
    }

    async fn run_worker(self: Arc<Self>, session_key: String, inner: Arc<Inner>) {
        loop {
            tokio::select! {
                _ = inner.cancel.cancelled() => return,
                _ = inner.notify.notified() => {}
            }

            loop {
                let last = inner.last_enqueued_at.load(Ordering::SeqCst);
                let remaining = self.debounce_ms as i64 - (gatewire_core::now_ms() - last);
                if remaining <= 0 {
                    break;
                }
                tokio::select! {
                    _ = inner.cancel.cancelled() => return,
                    _ = tokio::time::sleep(Duration::from_millis(remaining as u64)) => {}
                }
            }

            if inner.cancel.is_cancelled() {
                return;
            }

            let drained: Vec<QueuedMessage> = {
                let mut items = inner.items.lock().unwrap();
                items.drain(..).collect()
            };
            if drained.is_empty() {
                continue;
            }

            let (messages, overflow_note) = apply_overflow(drained, self.max, &self.policy);
            debug!(session_key, batch_size = messages.len(), "draining queue batch");
            self.handler
                .on_batch(Batch {
                    session_key: session_key.clone(),
                    messages,
                    overflow_note,
                })
                .await;
        }
    }
}
