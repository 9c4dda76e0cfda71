use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Histogram, IntGauge, register_counter, register_counter_vec,
    register_histogram, register_int_gauge,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("folio_ai_requests_total", "Total number of proxy requests")
            .expect("register folio_ai_requests_total");
    pub static ref RESPONSES: CounterVec = register_counter_vec!(
        "folio_ai_responses_total",
        "Proxy responses by status code",
        &["status"]
    )
    .expect("register folio_ai_responses_total");
    pub static ref RATE_LIMITED: CounterVec = register_counter_vec!(
        "folio_ai_rate_limited_total",
        "Requests rejected by a rate limiter",
        &["side", "tier"]
    )
    .expect("register folio_ai_rate_limited_total");
    pub static ref MODEL_ATTEMPTS: CounterVec = register_counter_vec!(
        "folio_ai_model_attempts_total",
        "Backend model attempts by outcome",
        &["model", "outcome"]
    )
    .expect("register folio_ai_model_attempts_total");
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "folio_ai_request_latency_seconds",
        "Proxy request latency in seconds"
    )
    .expect("register folio_ai_request_latency_seconds");
    pub static ref TRACKED_IDENTITIES: IntGauge = register_int_gauge!(
        "folio_ai_tracked_identities",
        "Identities currently held by the server rate limiter"
    )
    .expect("register folio_ai_tracked_identities");
}
