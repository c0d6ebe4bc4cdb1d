//! Retry and backoff helpers shared by the analysis gateway and review storage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

/// Upper bound for any single wait, including server-provided hints.
pub const MAX_DELAY: Duration = Duration::from_secs(60);

/// Exponential backoff policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Add up to 25% random jitter to each computed delay.
    pub jitter: bool,
    /// Hint given to callers once retries are exhausted.
    pub retry_after_hint: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            jitter: true,
            retry_after_hint: MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_retry_after_hint(mut self, hint: Duration) -> Self {
        self.retry_after_hint = hint;
        self
    }

    /// Delay before the retry that follows failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = backoff_delay(attempt, self.base_delay);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let max_jitter_ms = (delay.as_millis() as u64) / 4;
        let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
        (delay + Duration::from_millis(jitter_ms)).min(MAX_DELAY)
    }

    /// Delay honoring a server hint when it is longer than the computed backoff.
    pub fn delay_with_hint(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let computed = self.delay_for(attempt);
        match hint {
            Some(hint) => computed.max(hint.min(MAX_DELAY)),
            None => computed,
        }
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_hint.as_secs()
    }
}

/// `base * 2^(attempt-1)`, capped at [`MAX_DELAY`].
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(2u32.pow(exponent)).min(MAX_DELAY)
}

/// Parse a Retry-After header value given in seconds.
/// HTTP-date values are not supported and yield `None`.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
    let value = header_value?.trim();
    value
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_DELAY))
}

/// Request-local bookkeeping for one retried operation.
#[derive(Debug, Clone)]
pub struct RetryState<E> {
    pub attempt: u32,
    pub max_attempts: u32,
    pub last_error: Option<E>,
}

impl<E> RetryState<E> {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 0,
            max_attempts: policy.max_attempts.max(1),
            last_error: None,
        }
    }

    /// Move to the next attempt. Returns false once the budget is spent.
    pub fn begin_attempt(&mut self) -> bool {
        if self.attempt >= self.max_attempts {
            return false;
        }
        self.attempt += 1;
        true
    }

    pub fn record_failure(&mut self, error: E) {
        self.last_error = Some(error);
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempt < self.max_attempts
    }
}

/// Shared cancellation flag for one request.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Guard that cancels when dropped unless disarmed.
    pub fn guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            cancellation: self.clone(),
            armed: true,
        }
    }
}

/// Cancels the associated request when dropped, e.g. when a client disconnects
/// and the handler future is dropped.
#[derive(Debug)]
pub struct CancelOnDrop {
    cancellation: Cancellation,
    armed: bool,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.cancellation.cancel();
        }
    }
}
