use async_trait::async_trait;
use http::StatusCode;
use reqwest::Client;
use std::time::Duration;

use super::{CompletionClient, CompletionError, CompletionRequest, CompletionResponse};

pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 300;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Talks to the configured text-completion endpoint. A single POST per
/// recommendation, no streaming, no retries; the gateway's fallback covers
/// every failure mode here.
pub struct HttpCompletionClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl HttpCompletionClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            timeout,
        }
    }

    pub fn from_settings(settings: &crate::config::PricingSettings) -> Self {
        Self::new(
            settings.api_url.clone(),
            settings.api_key.clone(),
            settings.model.clone(),
            settings.max_tokens,
            settings.timeout,
        )
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let payload = CompletionRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            prompt: prompt.to_string(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    CompletionError::Timeout(self.timeout.as_secs())
                } else {
                    CompletionError::Http(err)
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    "completion API request failed".to_string()
                } else {
                    trimmed.to_string()
                }
            };
            let status =
                StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return Err(CompletionError::Api { status, message });
        }

        let parsed = serde_json::from_str::<CompletionResponse>(&body)
            .map_err(|err| CompletionError::InvalidResponse(err.to_string()))?;
        Ok(parsed.completion)
    }
}
