//! Generative-language backend: the `BackendCaller` seam, the ordered model
//! attempt list and the fallback loop shared by the proxy and the client's
//! direct-call path.

pub mod gemini;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::metrics::MODEL_ATTEMPTS;
use crate::retry::RetryPolicy;

pub use gemini::GeminiClient;

// Tried after the configured model, in this order
pub const FALLBACK_MODELS: [&str; 2] = ["gemini-2.5-flash", "gemini-1.5-flash"];

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend does not know this model identifier (HTTP 404).
    #[error("model {model} not found")]
    ModelNotFound { model: String },

    /// Any other non-success status. `message` is the backend's `error.message`.
    #[error("backend returned status {status}")]
    Api { status: u16, message: Option<String> },

    #[error("backend request timed out")]
    Timeout,

    #[error("backend request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("no model produced an answer")]
    Exhausted,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[async_trait]
pub trait BackendCaller: Send + Sync {
    /// Ask one model. `Ok(None)` means the call succeeded but carried no text.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<Option<String>, BackendError>;
}

// Preferred model first, then the fixed fallbacks; no blanks, no repeats
pub fn model_attempt_list(preferred: Option<&str>) -> Vec<String> {
    let mut models: Vec<String> = Vec::new();
    let candidates = preferred.into_iter().chain(FALLBACK_MODELS);

    for model in candidates.map(str::trim).filter(|m| !m.is_empty()) {
        if !models.iter().any(|seen| seen == model) {
            models.push(model.to_string());
        }
    }
    models
}

/// Walk `models` in order until one answers.
///
/// Unknown models and empty completions move on to the next model. Any other
/// failure stops the walk and is returned. Timeouts are retried per model as
/// `retry` allows.
pub async fn generate_with_fallback(
    backend: &dyn BackendCaller,
    models: &[String],
    prompt: &str,
    system_instruction: &str,
    retry: &RetryPolicy,
) -> Result<String, FallbackError> {
    for model in models {
        let mut attempt = 0;
        let outcome = loop {
            match backend.generate(model, prompt, system_instruction).await {
                Err(BackendError::Timeout) if retry.should_retry_timeout(attempt) => {
                    tracing::debug!(model = %model, attempt, "backend timed out, retrying");
                    sleep(retry.backoff).await;
                    attempt += 1;
                }
                other => break other,
            }
        };

        match outcome {
            Ok(Some(text)) => {
                MODEL_ATTEMPTS.with_label_values(&[model.as_str(), "answered"]).inc();
                return Ok(text);
            }
            Ok(None) => {
                MODEL_ATTEMPTS.with_label_values(&[model.as_str(), "empty"]).inc();
                tracing::debug!(model = %model, "model returned no text, trying next");
            }
            Err(BackendError::ModelNotFound { .. }) => {
                MODEL_ATTEMPTS.with_label_values(&[model.as_str(), "not_found"]).inc();
                tracing::debug!(model = %model, "model not found, trying next");
            }
            Err(err) => {
                MODEL_ATTEMPTS.with_label_values(&[model.as_str(), "failed"]).inc();
                return Err(err.into());
            }
        }
    }

    Err(FallbackError::Exhausted)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

#[cfg(test)]
#[path = "test_helpers.rs"]
pub mod test_helpers;
