//! Boundary to the external generative model.
//!
//! The pipeline only ever sees [`SummarizerClient::summarise`]: a request goes
//! in, one text payload or one [`SummarizerError`] comes out. Retries live
//! behind the trait; the pipeline never retries.

pub mod http;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SummarizerError;

pub use http::HttpSummarizer;
pub use retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

/// Inference settings passed through to the model untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
}

/// Everything that crosses the model boundary for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub turns: Vec<Turn>,
    pub params: GenerationParams,
}

impl ModelRequest {
    /// Single user turn of `"{prompt}\n\n{context}"`.
    pub fn single_turn(
        system_prompt: &str,
        prompt: &str,
        context: &str,
        params: &GenerationParams,
    ) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            turns: vec![Turn::user(format!("{}\n\n{}", prompt, context))],
            params: params.clone(),
        }
    }

    /// Text of the first user turn, if any.
    pub fn user_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .find(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
    }
}

#[async_trait]
pub trait SummarizerClient: Send + Sync {
    async fn summarise(&self, request: &ModelRequest) -> Result<String, SummarizerError>;
}
