// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded retry with exponential backoff for outbound Bot API calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

pub const MAX_ATTEMPTS: u32 = 3;

/// Delay after the `attempt`-th failure (1-based): 400 ms, 800 ms, ...
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(200 * 2u64.saturating_pow(attempt))
}

/// Runs `op` up to [`MAX_ATTEMPTS`] times, sleeping between attempts while
/// `is_transient` says the failure is worth retrying.
pub async fn with_retry<T, E, F, Fut>(
    label: &'static str,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= MAX_ATTEMPTS || !is_transient(&e) {
                    return Err(e);
                }
                let delay = backoff(attempt);
                warn!(call = label, attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying Bot API call");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
