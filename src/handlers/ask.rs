use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::backend::{BackendError, FallbackError, generate_with_fallback};
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL, RESPONSES};
use crate::models::{AnswerBody, AskRequest, ErrorBody};
use crate::rate_limit::{LimitRejection, client_identity};
use crate::retry::RetryPolicy;
use crate::state::AppState;

pub const MAX_PROMPT_CHARS: usize = 2000;
pub const MAX_SYSTEM_INSTRUCTION_CHARS: usize = 25_000;

// Bodies past this are read as empty and fail validation
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Server missing GEMINI_API_KEY.")]
    MissingCredential,
    #[error("Prompt is required.")]
    PromptRequired,
    #[error("System instruction is required.")]
    SystemInstructionRequired,
    #[error("Prompt too long (max 2000 characters).")]
    PromptTooLong,
    #[error("System instruction too long.")]
    SystemInstructionTooLong,
    #[error(transparent)]
    RateLimited(#[from] LimitRejection),
    #[error("{}", .message.as_deref().unwrap_or("Gemini API request failed."))]
    Upstream { status: u16, message: Option<String> },
    #[error("No available Gemini model responded.")]
    NoModelResponded,
    #[error("Server-side AI request failed.")]
    Internal,
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredential | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PromptRequired
            | Self::SystemInstructionRequired
            | Self::PromptTooLong
            | Self::SystemInstructionTooLong => StatusCode::BAD_REQUEST,
            Self::RateLimited(rejection) => rejection.status_code(),
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::NoModelResponded => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<FallbackError> for ProxyError {
    fn from(err: FallbackError) -> Self {
        match err {
            FallbackError::Exhausted => Self::NoModelResponded,
            FallbackError::Backend(BackendError::Api { status, message }) => Self::Upstream { status, message },
            FallbackError::Backend(other) => {
                tracing::error!(error = %other, "gemini proxy error");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

// POST /api/gemini
pub async fn ask_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();

    let response = match answer(&state, request).await {
        Ok(text) => (StatusCode::OK, Json(AnswerBody { text })).into_response(),
        Err(err) => {
            tracing::debug!(status = err.status_code().as_u16(), error = %err, "ask rejected");
            err.into_response()
        }
    };

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    RESPONSES.with_label_values(&[response.status().as_str()]).inc();
    response
}

pub async fn method_not_allowed() -> Response {
    let body = ErrorBody {
        error: "Method not allowed".to_string(),
    };
    (StatusCode::METHOD_NOT_ALLOWED, Json(body)).into_response()
}

async fn answer(state: &AppState, request: Request) -> Result<String, ProxyError> {
    let backend = state.backend.as_ref().ok_or(ProxyError::MissingCredential)?;

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .unwrap_or_default();
    let ask = AskRequest::from_body(&bytes);

    let prompt = ask
        .prompt()
        .filter(|p| !p.trim().is_empty())
        .ok_or(ProxyError::PromptRequired)?;
    let system = ask
        .system()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ProxyError::SystemInstructionRequired)?;
    // lengths are in UTF-16 code units, as browsers count them
    if prompt.encode_utf16().count() > MAX_PROMPT_CHARS {
        return Err(ProxyError::PromptTooLong);
    }
    if system.encode_utf16().count() > MAX_SYSTEM_INSTRUCTION_CHARS {
        return Err(ProxyError::SystemInstructionTooLong);
    }

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = client_identity(&parts.headers, peer);
    state.limiter.check(&identity)?;

    let text = generate_with_fallback(backend.as_ref(), &state.models, prompt, system, &RetryPolicy::none()).await?;
    Ok(text)
}

#[cfg(test)]
#[path = "ask_test.rs"]
mod tests;
