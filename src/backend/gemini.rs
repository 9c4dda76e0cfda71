use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

use super::{BackendCaller, BackendError};
use crate::models::{GenerateContentRequest, GenerateContentResponse};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini `generateContent` over HTTP. The model and key travel in the URL.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        }
    }

    fn url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }
}

#[async_trait]
impl BackendCaller for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<Option<String>, BackendError> {
        let payload = GenerateContentRequest::new(prompt, system_instruction);

        let response = self
            .http
            .post(self.url(model))
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        // error bodies are not always JSON
        let data: Option<GenerateContentResponse> = serde_json::from_str(&body).ok();

        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::ModelNotFound {
                model: model.to_string(),
            });
        }

        if !status.is_success() {
            let message = data.and_then(GenerateContentResponse::error_message);
            tracing::warn!(model, status = status.as_u16(), ?message, "gemini request failed");
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(data
            .and_then(GenerateContentResponse::into_text)
            .filter(|text| !text.is_empty()))
    }
}
