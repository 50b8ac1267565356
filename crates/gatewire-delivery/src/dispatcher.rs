use gatewire_channels::channel::ChannelPlugin;
use gatewire_channels::error::ChannelError;
use gatewire_channels::types::{CanonicalTarget, ReplyPayload, SendOpts, SendResult};
use gatewire_core::config::RetryConfig;

use crate::retry::retry_with_backoff;

/// Channels that render an attached media item with its own caption, so a
/// text+media payload can go out as one send instead of two.
fn supports_attached_caption(channel_id: &str) -> bool {
    matches!(channel_id, "telegram" | "discord" | "msteams")
}

fn is_retryable(err: &ChannelError) -> bool {
    matches!(
        err,
        ChannelError::ConnectionFailed(_) | ChannelError::SendFailed(_) | ChannelError::Timeout { .. }
    )
}

async fn send_with_retry(
    plugin: &dyn ChannelPlugin,
    target: &CanonicalTarget,
    payload: &ReplyPayload,
    opts: &SendOpts,
    retry: &RetryConfig,
) -> Result<SendResult, ChannelError> {
    retry_with_backoff(retry, is_retryable, |_attempt| plugin.send(target, payload, opts)).await
}

/// Deliver one reply payload to a channel, splitting text into chunks that
/// fit the plugin's limit, combining a single media item with a single text
/// chunk into one captioned send where the channel supports it, and retrying
/// transient per-send failures. Returns one `SendResult` per actual send.
pub async fn deliver(
    plugin: &dyn ChannelPlugin,
    target: &CanonicalTarget,
    payload: &ReplyPayload,
    retry: &RetryConfig,
) -> Result<Vec<SendResult>, ChannelError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    let thread_id = match &payload.reply_to_id {
        Some(id) if plugin.supports_threading() => Some(id.clone()),
        _ => None,
    };
    let opts = SendOpts { thread_id };

    let mut media = Vec::new();
    if let Some(url) = &payload.media_url {
        media.push(url.clone());
    }
    media.extend(payload.media_urls.iter().cloned());

    let text_chunks: Vec<String> = match &payload.text {
        Some(t) if !t.is_empty() => {
            if plugin.supports_markdown() {
                gatewire_chunk::chunk_markdown_text(
                    t,
                    plugin.max_text_chars(),
                    gatewire_chunk::max_lines_for(plugin.id()),
                )
            } else {
                gatewire_chunk::chunk_text(t, plugin.max_text_chars())
            }
        }
        _ => Vec::new(),
    };

    let mut results = Vec::new();

    if text_chunks.len() == 1 && media.len() == 1 && supports_attached_caption(plugin.id()) {
        let combined = ReplyPayload {
            text: Some(text_chunks[0].clone()),
            media_url: Some(media[0].clone()),
            reply_to_id: payload.reply_to_id.clone(),
            reply_to_tag: payload.reply_to_tag.clone(),
            silent: payload.silent,
            blocks: payload.blocks.clone(),
            ..Default::default()
        };
        results.push(send_with_retry(plugin, target, &combined, &opts, retry).await?);
        return Ok(results);
    }

    for (i, chunk) in text_chunks.iter().enumerate() {
        let p = ReplyPayload {
            text: Some(chunk.clone()),
            reply_to_id: if i == 0 { payload.reply_to_id.clone() } else { None },
            reply_to_tag: if i == 0 { payload.reply_to_tag.clone() } else { None },
            silent: payload.silent,
            ..Default::default()
        };
        results.push(send_with_retry(plugin, target, &p, &opts, retry).await?);
    }

    for (i, url) in media.iter().enumerate() {
        let p = ReplyPayload {
            media_url: Some(url.clone()),
            reply_to_id: if i == 0 && text_chunks.is_empty() { payload.reply_to_id.clone() } else { None },
            silent: payload.silent,
            ..Default::default()
        };
        results.push(send_with_retry(plugin, target, &p, &opts, retry).await?);
    }

    Ok(results)
}
