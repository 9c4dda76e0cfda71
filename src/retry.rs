use std::time::Duration;

// Bounded retry for one outbound call. `attempt` is zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub retry_statuses: Vec<u16>,
    pub retry_on_timeout: bool,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
            retry_statuses: Vec::new(),
            retry_on_timeout: false,
        }
    }

    // Browser -> proxy: one more try after a 429 or a timeout
    pub fn proxy() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_millis(1200),
            retry_statuses: vec![429],
            retry_on_timeout: true,
        }
    }

    // Direct backend calls in dev mode only retry timeouts
    pub fn direct_backend() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_millis(1000),
            retry_statuses: Vec::new(),
            retry_on_timeout: true,
        }
    }

    fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    pub fn should_retry_status(&self, status: u16, attempt: u32) -> bool {
        self.has_attempts_left(attempt) && self.retry_statuses.contains(&status)
    }

    pub fn should_retry_timeout(&self, attempt: u32) -> bool {
        self.retry_on_timeout && self.has_attempts_left(attempt)
    }
}

#[cfg(test)]
impl RetryPolicy {
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}
