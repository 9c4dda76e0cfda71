use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::limiter::ClientRateLimiter;
use super::store::HistoryStore;
use crate::backend::{BackendCaller, BackendError, FallbackError, generate_with_fallback};
use crate::models::{AskPayload, ErrorBody, ProxyAnswer};
use crate::retry::RetryPolicy;

pub const MAX_PROMPT_CHARS: usize = 2000;

const EMPTY_PROMPT: &str = "Please enter a prompt before sending.";
const RATE_LIMITED: &str = "AI rate limit reached. Please retry in a moment.";
const KEY_BLOCKED: &str = "AI is blocked by API key restrictions on the server.";
const OFFLINE: &str = "System offline due to API/network issue. Please try again later.";
const UNAVAILABLE: &str = "AI model unavailable right now. Please try again shortly.";
const FALLBACK_MISSING_KEY: &str = "Missing VITE_GEMINI_KEY in local .env.";
const FALLBACK_TIMEOUT: &str = "Gemini request timed out. Please retry in a few seconds.";
const FALLBACK_EXHAUSTED: &str = "No available Gemini model responded in local fallback.";

#[derive(Debug, Clone)]
pub struct CallerConfig {
    pub proxy_url: String,
    pub request_timeout: Duration,
    pub max_prompt_chars: usize,
    pub retry: RetryPolicy,
    // Local development only: call the backend directly when the proxy route is missing
    pub allow_direct_backend_fallback: bool,
    pub fallback_models: Vec<String>,
    pub fallback_retry: RetryPolicy,
}

impl CallerConfig {
    pub fn new(proxy_url: impl Into<String>) -> Self {
        Self {
            proxy_url: proxy_url.into(),
            request_timeout: Duration::from_secs(15),
            max_prompt_chars: MAX_PROMPT_CHARS,
            retry: RetryPolicy::proxy(),
            allow_direct_backend_fallback: false,
            fallback_models: Vec::new(),
            fallback_retry: RetryPolicy::direct_backend(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CallerError {
    #[error("proxy request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API Error {status}: {message}")]
    Api { status: u16, message: String },
}

/// Asks the proxy on behalf of the chat UI.
///
/// Every outcome is a displayable string: limiter rejections, proxy errors
/// and network failures are all turned into chat text.
pub struct AiCaller<S> {
    http: reqwest::Client,
    limiter: ClientRateLimiter<S>,
    config: CallerConfig,
    direct_backend: Option<Arc<dyn BackendCaller>>,
    default_system: String,
}

impl<S: HistoryStore> AiCaller<S> {
    pub fn new(
        http: reqwest::Client,
        limiter: ClientRateLimiter<S>,
        config: CallerConfig,
        default_system: impl Into<String>,
    ) -> Self {
        Self {
            http,
            limiter,
            config,
            direct_backend: None,
            default_system: default_system.into(),
        }
    }

    // Backend used when `allow_direct_backend_fallback` kicks in
    pub fn with_direct_backend(mut self, backend: Arc<dyn BackendCaller>) -> Self {
        self.direct_backend = Some(backend);
        self
    }

    pub fn limiter(&self) -> &ClientRateLimiter<S> {
        &self.limiter
    }

    pub async fn ask(&self, prompt: &str, system_instruction: Option<&str>) -> String {
        if prompt.trim().is_empty() {
            return EMPTY_PROMPT.to_string();
        }
        if prompt.encode_utf16().count() > self.config.max_prompt_chars {
            return format!(
                "Prompt too long. Keep it under {} characters.",
                self.config.max_prompt_chars
            );
        }

        // held until this call returns, whatever the path
        let _in_flight = match self.limiter.admit() {
            Ok(guard) => guard,
            Err(rejection) => {
                tracing::debug!(%rejection, "local rate limiter rejected prompt");
                return rejection.to_string();
            }
        };

        let system = system_instruction.unwrap_or(self.default_system.as_str());
        match self.call_proxy(prompt, system).await {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(error = %err, "AI request failed");
                OFFLINE.to_string()
            }
        }
    }

    async fn call_proxy(&self, prompt: &str, system: &str) -> Result<String, CallerError> {
        let response = self.send_with_retry(prompt, system).await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| "Unknown API error".to_string());

            if status == StatusCode::NOT_FOUND && self.config.allow_direct_backend_fallback {
                tracing::info!("proxy route missing, calling backend directly");
                return Ok(self.direct_fallback(prompt, system).await);
            }
            return match status {
                StatusCode::TOO_MANY_REQUESTS => Ok(RATE_LIMITED.to_string()),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(KEY_BLOCKED.to_string()),
                _ => Err(CallerError::Api {
                    status: status.as_u16(),
                    message,
                }),
            };
        }

        let answer: ProxyAnswer = response.json().await?;
        Ok(answer
            .text
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| UNAVAILABLE.to_string()))
    }

    async fn send_with_retry(&self, prompt: &str, system: &str) -> Result<reqwest::Response, reqwest::Error> {
        let payload = AskPayload {
            user_prompt: prompt,
            system_instruction: system,
        };
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            let result = self
                .http
                .post(&self.config.proxy_url)
                .timeout(self.config.request_timeout)
                .json(&payload)
                .send()
                .await;

            let retry_now = match &result {
                Ok(response) => retry.should_retry_status(response.status().as_u16(), attempt),
                Err(err) => err.is_timeout() && retry.should_retry_timeout(attempt),
            };
            if !retry_now {
                return result;
            }

            tracing::debug!(attempt, backoff = ?retry.backoff, "retrying proxy request");
            sleep(retry.backoff).await;
            attempt += 1;
        }
    }

    async fn direct_fallback(&self, prompt: &str, system: &str) -> String {
        let outcome = match &self.direct_backend {
            None => Err(FALLBACK_MISSING_KEY.to_string()),
            Some(backend) => generate_with_fallback(
                backend.as_ref(),
                &self.config.fallback_models,
                prompt,
                system,
                &self.config.fallback_retry,
            )
            .await
            .map_err(|err| fallback_message(&err)),
        };

        match outcome {
            Ok(text) => text,
            Err(message) => format!("Local API route is unavailable and Gemini fallback failed: {message}"),
        }
    }
}

fn fallback_message(err: &FallbackError) -> String {
    match err {
        FallbackError::Exhausted => FALLBACK_EXHAUSTED.to_string(),
        FallbackError::Backend(BackendError::Timeout) => FALLBACK_TIMEOUT.to_string(),
        FallbackError::Backend(BackendError::Api { status, message }) => message
            .clone()
            .unwrap_or_else(|| format!("Gemini error {status}")),
        FallbackError::Backend(other) => other.to_string(),
    }
}

#[cfg(test)]
#[path = "caller_test.rs"]
mod tests;
