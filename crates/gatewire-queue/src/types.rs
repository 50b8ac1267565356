/// One inbound message waiting to be merged into a batch.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub body: String,
    pub received_at_ms: i64,
}

/// What the worker handed to the caller for a drained session queue.
#[derive(Debug, Clone)]
pub struct Batch {
    pub session_key: String,
    pub messages: Vec<QueuedMessage>,
    /// Set when overflow triggered `summarize`: the synthetic block that was
    /// appended ahead of the surviving messages.
    pub overflow_note: Option<String>,
}
