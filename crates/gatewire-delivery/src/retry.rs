use std::future::Future;
use std::time::Duration;

use gatewire_core::config::RetryConfig;
use tracing::warn;

/// Jitter fraction applied to each delay (±10%), same idiom used for channel
/// reconnects: a deterministic pseudo-random offset derived from the current
/// monotonic timestamp, avoiding a rand dependency.
const JITTER_FRACTION: f64 = 0.10;

fn jitter_ms(base_ms: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter = ((base_ms as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    (nanos as u64) % max_jitter
}

/// Run `attempt` up to `config.max_attempts` times with exponential backoff
/// and jitter between tries. `is_retryable` decides whether a given error is
/// worth another attempt; a non-retryable error or the final attempt
/// surfaces immediately.
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: &RetryConfig,
    is_retryable: impl Fn(&E) -> bool,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay_ms = config.base_delay_ms;

    for attempt_no in 1..=config.max_attempts {
        match attempt(attempt_no).await {
            Ok(v) => return Ok(v),
            Err(e) if attempt_no == config.max_attempts || !is_retryable(&e) => return Err(e),
            Err(e) => {
                let total = delay_ms + jitter_ms(delay_ms);
                warn!(
                    attempt = attempt_no,
                    max = config.max_attempts,
                    error = %e,
                    retry_after_ms = total,
                    "delivery attempt failed, retrying with backoff"
                );
                tokio::time::sleep(Duration::from_millis(total)).await;
                delay_ms = (delay_ms * 2).min(config.max_delay_ms);
            }
        }
    }

    unreachable!("retry loop exited without returning")
}
