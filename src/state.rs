use std::sync::Arc;

use crate::backend::BackendCaller;
use crate::rate_limit::RateLimiter;

// app's shared state
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    // None when no credential is configured
    pub backend: Option<Arc<dyn BackendCaller>>,
    pub models: Vec<String>, // tried in order
}

impl AppState {
    pub fn new(limiter: Arc<RateLimiter>, backend: Option<Arc<dyn BackendCaller>>, models: Vec<String>) -> Self {
        Self {
            limiter,
            backend,
            models,
        }
    }
}
