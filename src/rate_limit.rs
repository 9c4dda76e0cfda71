use axum::http::{HeaderMap, StatusCode};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::metrics::{RATE_LIMITED, TRACKED_IDENTITIES};

pub const MINUTE_MS: i64 = 60 * 1000;
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

// Shared bucket for clients we cannot identify
pub const UNKNOWN_IDENTITY: &str = "unknown";

// Limits for one side of the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub min_interval_ms: i64,
    pub max_per_minute: usize,
    pub max_per_day: usize,
}

impl RateLimitConfig {
    // Proxy endpoint, looser since browsers enforce their own limits first
    pub const SERVER: Self = Self {
        min_interval_ms: 2000,
        max_per_minute: 20,
        max_per_day: 300,
    };

    pub const CLIENT: Self = Self {
        min_interval_ms: 2500,
        max_per_minute: 8,
        max_per_day: 120,
    };
}

// Sliding-window state for one identity. Timestamps are ms since epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateWindowEntry {
    pub minute_hits: VecDeque<i64>,
    pub day_hits: VecDeque<i64>,
    pub last_at: Option<i64>,
}

impl RateWindowEntry {
    // Drop hits that fell out of the trailing minute / day
    pub fn prune(&mut self, now: i64) {
        let minute_cutoff = now - MINUTE_MS;
        let day_cutoff = now - DAY_MS;
        self.minute_hits.retain(|&t| t > minute_cutoff);
        self.day_hits.retain(|&t| t > day_cutoff);
    }

    pub fn record(&mut self, now: i64) {
        self.minute_hits.push_back(now);
        self.day_hits.push_back(now);
        self.last_at = Some(now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LimitRejection {
    #[error("Too many requests. Please wait a moment.")]
    TooSoon,
    #[error("Rate limit exceeded for this minute.")]
    MinuteExceeded,
    #[error("Daily request limit exceeded.")]
    DayExceeded,
}

impl LimitRejection {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::TOO_MANY_REQUESTS
    }

    pub fn tier(&self) -> &'static str {
        match self {
            Self::TooSoon => "interval",
            Self::MinuteExceeded => "minute",
            Self::DayExceeded => "day",
        }
    }
}

// Where per-identity windows live between requests
pub trait RateLimitStore: Send + Sync {
    fn get(&self, identity: &str) -> Option<RateWindowEntry>;
    fn put(&self, identity: &str, entry: RateWindowEntry);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    // Keep only the entries for which `keep` returns true
    fn retain(&self, keep: &mut dyn FnMut(&str, &mut RateWindowEntry) -> bool);
}

// Process-wide in-memory store
#[derive(Default)]
pub struct MemoryRateLimitStore {
    entries: DashMap<String, RateWindowEntry>,
}

impl RateLimitStore for MemoryRateLimitStore {
    fn get(&self, identity: &str) -> Option<RateWindowEntry> {
        self.entries.get(identity).map(|entry| entry.clone())
    }

    fn put(&self, identity: &str, entry: RateWindowEntry) {
        self.entries.insert(identity.to_string(), entry);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn retain(&self, keep: &mut dyn FnMut(&str, &mut RateWindowEntry) -> bool) {
        self.entries.retain(|identity, entry| keep(identity.as_str(), entry));
    }
}

// Per-identity limiter guarding the proxy endpoint
pub struct RateLimiter<S = MemoryRateLimitStore> {
    store: S,
    config: RateLimitConfig,
}

impl RateLimiter<MemoryRateLimitStore> {
    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(MemoryRateLimitStore::default(), config)
    }
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn new(store: S, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn check(&self, identity: &str) -> Result<(), LimitRejection> {
        self.check_at(identity, chrono::Utc::now().timestamp_millis())
    }

    // Gates run spacing -> minute -> day. A rejection leaves the stored entry as it was.
    pub fn check_at(&self, identity: &str, now: i64) -> Result<(), LimitRejection> {
        let mut entry = self.store.get(identity).unwrap_or_default();
        entry.prune(now);

        let verdict = evaluate(&entry, &self.config, now);
        if let Err(rejection) = verdict {
            RATE_LIMITED.with_label_values(&["server", rejection.tier()]).inc();
            tracing::debug!(identity, tier = rejection.tier(), "request rejected by rate limiter");
            return Err(rejection);
        }

        entry.record(now);
        self.store.put(identity, entry);
        TRACKED_IDENTITIES.set(self.store.len() as i64);
        Ok(())
    }

    // Remove identities with nothing left in their day window. Their last hit is
    // over a day old, so dropping them cannot change any later decision.
    pub fn sweep_at(&self, now: i64) -> usize {
        if self.store.is_empty() {
            return 0;
        }
        let before = self.store.len();
        self.store.retain(&mut |_: &str, entry: &mut RateWindowEntry| {
            entry.prune(now);
            !entry.day_hits.is_empty()
        });
        let after = self.store.len();
        TRACKED_IDENTITIES.set(after as i64);
        before.saturating_sub(after)
    }

    pub fn tracked(&self) -> usize {
        self.store.len()
    }
}

fn evaluate(entry: &RateWindowEntry, config: &RateLimitConfig, now: i64) -> Result<(), LimitRejection> {
    if let Some(last_at) = entry.last_at {
        if now - last_at < config.min_interval_ms {
            return Err(LimitRejection::TooSoon);
        }
    }
    if entry.minute_hits.len() >= config.max_per_minute {
        return Err(LimitRejection::MinuteExceeded);
    }
    if entry.day_hits.len() >= config.max_per_day {
        return Err(LimitRejection::DayExceeded);
    }
    Ok(())
}

// First X-Forwarded-For hop, else the peer address, else the shared bucket
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());

    if let Some(forwarded) = forwarded {
        let first = forwarded.split(',').next().unwrap_or_default().trim();
        return first.to_string();
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => UNKNOWN_IDENTITY.to_string(),
    }
}

// Periodic cleanup of idle identities
pub async fn idle_sweeper<S: RateLimitStore>(limiter: Arc<RateLimiter<S>>, every: Duration) {
    let mut interval = interval(every);
    tracing::info!(interval = ?every, "rate limit sweeper started");

    loop {
        interval.tick().await;
        let removed = limiter.sweep_at(chrono::Utc::now().timestamp_millis());
        if removed > 0 {
            tracing::info!(removed, remaining = limiter.tracked(), "swept idle rate limit entries");
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
