//! Messages-API client for the summarisation model.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::retry::RetryPolicy;
use super::{ModelRequest, Role, SummarizerClient};
use crate::config::Config;
use crate::error::{ConfigError, SummarizerError};
use crate::secrets::resolve_secret_optional;

/// Connect timeout for the model endpoint.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request timeout for a single attempt. Generation can be slow.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Cap on error bodies carried into errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
    top_p: f64,
}

#[derive(Serialize)]
struct Message<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// [`SummarizerClient`] over HTTP with internal retries.
pub struct HttpSummarizer {
    client: Client,
    endpoint: String,
    api_version: String,
    api_key: Option<SecretString>,
    retry: RetryPolicy,
}

impl HttpSummarizer {
    pub fn new(
        endpoint: impl Into<String>,
        api_version: impl Into<String>,
        api_key: Option<SecretString>,
        retry: RetryPolicy,
    ) -> Result<Self, SummarizerError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SummarizerError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_version: api_version.into(),
            api_key,
            retry,
        })
    }

    /// Builds the client from config, resolving the API key.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let api_key = resolve_secret_optional(
            config.api_key.as_deref(),
            config.api_key_file.as_deref(),
            config.api_key_env.as_deref(),
        )?;

        Self::new(
            &config.endpoint,
            &config.anthropic_version,
            api_key,
            RetryPolicy::from_config(&config.retry),
        )
        .map_err(|e| ConfigError::Validation {
            message: e.to_string(),
        })
    }

    async fn send_once(&self, request: &ModelRequest) -> Result<String, SummarizerError> {
        let body = build_body(request);

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("anthropic-version", &self.api_version)
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key.expose_secret());
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizerError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let bytes = response.bytes().await?;
        parse_response(&bytes)
    }
}

#[async_trait]
impl SummarizerClient for HttpSummarizer {
    async fn summarise(&self, request: &ModelRequest) -> Result<String, SummarizerError> {
        debug!(
            "Invoking model '{}' ({} turns, max_tokens={})",
            request.params.model_id,
            request.turns.len(),
            request.params.max_tokens
        );
        self.retry.run(|| self.send_once(request)).await
    }
}

fn build_body(request: &ModelRequest) -> MessagesRequest<'_> {
    MessagesRequest {
        model: &request.params.model_id,
        max_tokens: request.params.max_tokens,
        system: &request.system_prompt,
        messages: request
            .turns
            .iter()
            .map(|t| Message {
                role: t.role,
                content: &t.text,
            })
            .collect(),
        temperature: request.params.temperature,
        top_p: request.params.top_p,
    }
}

/// Extracts the first text block of a Messages-API response.
fn parse_response(bytes: &[u8]) -> Result<String, SummarizerError> {
    let parsed: MessagesResponse = serde_json::from_slice(bytes)
        .map_err(|e| SummarizerError::MalformedResponse(e.to_string()))?;

    parsed
        .content
        .into_iter()
        .find(|block| block.kind == "text" || block.kind.is_empty())
        .map(|block| block.text)
        .filter(|text| !text.is_empty())
        .ok_or(SummarizerError::EmptyResponse)
}

fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}
