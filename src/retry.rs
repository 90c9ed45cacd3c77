use std::time::Duration;

use crate::error::TransportErrorKind;

pub(crate) const RETRYABLE_STATUS_CODES: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

const MAX_BACKOFF_EXPONENT: usize = 31;
const DEFAULT_MAX_RETRIES: usize = 2;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(300);
const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_retries: usize,
    base_delay: Duration,
    backoff_factor: f64,
}

impl RetryPolicy {
    pub fn standard() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }

    pub fn disabled() -> Self {
        Self::standard().max_retries(0)
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay.max(Duration::from_millis(1));
        self
    }

    pub fn backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = if backoff_factor.is_finite() {
            backoff_factor.max(1.0)
        } else {
            DEFAULT_BACKOFF_FACTOR
        };
        self
    }

    pub fn max_retries_value(&self) -> usize {
        self.max_retries
    }

    pub(crate) fn max_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    pub(crate) fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let exponent = attempt_index.min(MAX_BACKOFF_EXPONENT) as i32;
        let base_ms = self.base_delay.as_millis().max(1) as f64;
        let delay_ms = base_ms * self.backoff_factor.powi(exponent);
        if !delay_ms.is_finite() {
            return Duration::from_millis(u64::MAX);
        }
        Duration::from_millis(delay_ms.min(u64::MAX as f64) as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

pub(crate) fn is_retryable_status_code(status: u16) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status)
}

pub(crate) fn is_retryable_transport(kind: TransportErrorKind) -> bool {
    matches!(
        kind,
        TransportErrorKind::Dns | TransportErrorKind::Connect | TransportErrorKind::Read
    )
}
