use gatewire_core::config::DropPolicy;

use crate::types::QueuedMessage;

/// Apply the overflow policy to a fully-drained batch. Returns the surviving
/// messages plus, for `summarize`, the synthetic overflow note to prepend.
pub fn apply_overflow(
    mut queue: Vec<QueuedMessage>,
    max: usize,
    policy: &DropPolicy,
) -> (Vec<QueuedMessage>, Option<String>) {
    if queue.len() <= max {
        return (queue, None);
    }
    let drop_count = queue.len() - max;

    match policy {
        DropPolicy::Old => {
            let kept = queue.split_off(drop_count);
            (kept, None)
        }
        DropPolicy::New => {
            queue.truncate(max);
            (queue, None)
        }
        DropPolicy::Summarize => {
            let dropped: Vec<QueuedMessage> = queue.drain(..drop_count).collect();
            let mut note = format!("[Queue overflow] Dropped {drop_count} messages due to cap.");
            for item in &dropped {
                note.push('\n');
                note.push_str("- ");
                note.push_str(&elide(&item.body, 160));
            }
            (queue, Some(note))
        }
    }
}

fn elide(body: &str, max_chars: usize) -> String {
    let flattened = body.replace('\n', " ");
    if flattened.chars().count() <= max_chars {
        flattened
    } else {
        flattened.chars().take(max_chars).collect()
    }
}
