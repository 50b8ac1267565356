use async_trait::async_trait;

use crate::types::Batch;

/// Invoked once per drained batch, after debounce and overflow handling.
#[async_trait]
pub trait QueueHandler: Send + Sync {
    async fn on_batch(&self, batch: Batch);
}
