use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::store::{HistoryStore, RateHistory};
use crate::metrics::RATE_LIMITED;
use crate::rate_limit::RateLimitConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClientRejection {
    #[error("Please wait for the current AI response before sending another request.")]
    Busy,
    #[error("You're sending requests too quickly. Please wait {wait_secs}s and try again.")]
    TooSoon { wait_secs: i64 },
    #[error("Rate limit reached: too many AI requests in one minute. Please try again shortly.")]
    MinuteExceeded,
    #[error("Daily AI request limit reached for this browser. Please try again tomorrow.")]
    DayExceeded,
}

impl ClientRejection {
    fn tier(&self) -> &'static str {
        match self {
            Self::Busy => "in_flight",
            Self::TooSoon { .. } => "interval",
            Self::MinuteExceeded => "minute",
            Self::DayExceeded => "day",
        }
    }
}

/// Clears the in-flight flag when dropped.
#[must_use = "dropping the guard ends the in-flight call"]
pub struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Limiter for outbound calls from this installation.
///
/// One call at a time, a minimum spacing between admissions, and minute/day
/// windows persisted through a [`HistoryStore`]. Storage trouble never blocks
/// a request: unreadable history counts as empty and failed writes are logged.
pub struct ClientRateLimiter<S> {
    store: S,
    config: RateLimitConfig,
    in_flight: AtomicBool,
    last_at: Mutex<Option<i64>>,
}

impl<S: HistoryStore> ClientRateLimiter<S> {
    pub fn new(store: S, config: RateLimitConfig) -> Self {
        Self {
            store,
            config,
            in_flight: AtomicBool::new(false),
            last_at: Mutex::new(None),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn admit(&self) -> Result<InFlightGuard<'_>, ClientRejection> {
        self.admit_at(chrono::Utc::now().timestamp_millis())
    }

    pub fn admit_at(&self, now: i64) -> Result<InFlightGuard<'_>, ClientRejection> {
        let verdict = self.try_admit(now);
        if let Err(rejection) = &verdict {
            RATE_LIMITED.with_label_values(&["client", rejection.tier()]).inc();
        }
        verdict
    }

    fn try_admit(&self, now: i64) -> Result<InFlightGuard<'_>, ClientRejection> {
        if self.is_in_flight() {
            return Err(ClientRejection::Busy);
        }

        let mut last_at = self.last_at.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = *last_at {
            let elapsed = now - last;
            if elapsed < self.config.min_interval_ms {
                let deficit = self.config.min_interval_ms - elapsed;
                return Err(ClientRejection::TooSoon {
                    wait_secs: (deficit + 999) / 1000,
                });
            }
        }

        let history = self.store.load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "rate history unreadable, starting empty");
            RateHistory::default()
        });
        let mut entry = history.into_entry();
        entry.prune(now);

        if entry.minute_hits.len() >= self.config.max_per_minute {
            return Err(ClientRejection::MinuteExceeded);
        }
        if entry.day_hits.len() >= self.config.max_per_day {
            return Err(ClientRejection::DayExceeded);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ClientRejection::Busy);
        }

        entry.record(now);
        if let Err(err) = self.store.save(&RateHistory::from_entry(&entry)) {
            tracing::warn!(error = %err, "could not persist rate history");
        }
        *last_at = Some(now);

        Ok(InFlightGuard {
            flag: &self.in_flight,
        })
    }
}

#[cfg(test)]
#[path = "limiter_test.rs"]
mod tests;
