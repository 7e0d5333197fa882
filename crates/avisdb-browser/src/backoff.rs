//! Retry scheduling for page navigation.
//!
//! Navigation failures are usually transient (slow proxy, flaky load), so
//! they are retried on an exponential schedule clamped to a narrow window.
//! Anything the site said on purpose (anti-bot, login wall) is not retried
//! here; the caller rotates identity instead.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use avisdb_scraper::FetchError;

const BASE_SECS: f64 = 2.0;
const MIN_DELAY_SECS: f64 = 4.0;
const MAX_DELAY_SECS: f64 = 10.0;
const JITTER_MAX_MS: u64 = 500;

/// Delay before retry number `attempt` (1-based): `2 * 2^attempt` seconds,
/// clamped to `[4, 10]`. The first three retries wait 4, 8 and 10 seconds.
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    let raw = BASE_SECS * f64::exp2(f64::from(attempt.min(16)));
    Duration::from_secs_f64(raw.clamp(MIN_DELAY_SECS, MAX_DELAY_SECS))
}

/// Adds up to half a second of random jitter so parallel crawls do not
/// retry in lockstep.
#[must_use]
pub fn jittered(delay: Duration) -> Duration {
    let extra = rand::rng().random_range(0..=JITTER_MAX_MS);
    delay + Duration::from_millis(extra)
}

/// Only navigation-level failures are worth retrying with the same
/// identity. Everything else either needs rotation or is permanent.
fn is_retriable(err: &FetchError) -> bool {
    matches!(err, FetchError::Navigation(_))
}

/// Runs `operation`, retrying transient failures up to `max_retries` extra
/// times, sleeping `delay_for(retry_number)` between attempts.
///
/// # Errors
///
/// The first non-retriable error, or the last error once retries are spent.
pub async fn retry_navigation<T, F, Fut, D>(
    max_retries: u32,
    delay_for: D,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
    D: Fn(u32) -> Duration,
{
    let mut retry = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || retry >= max_retries {
                    return Err(err);
                }
                retry += 1;
                let delay = delay_for(retry);
                tracing::warn!(
                    retry,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "navigation failed, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
