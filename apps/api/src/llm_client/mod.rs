/// LLM Client: the single point of entry for all Claude API calls made by the match engine.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Match enrichment reaches it through the `InsightProvider` seam in `matching::enhancement`.
///
/// Every call runs inside one time budget (`AI_ENHANCEMENT_TIMEOUT_MS`). Each attempt's
/// HTTP deadline is whatever is left of it, and a retry is only started when the backoff
/// plus a usable attempt still fit.
use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls.
pub const MODEL: &str = "claude-sonnet-4-5";
/// Match assessments are short JSON objects.
const MAX_TOKENS: u32 = 1024;
const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(250);
/// An attempt with less time than this left is not worth sending.
const MIN_ATTEMPT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API key is not configured")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("gave up after {attempts} attempt(s) within {budget:?}: {last}")]
    BudgetExhausted {
        attempts: u32,
        budget: Duration,
        last: String,
    },

    #[error("LLM returned no text content")]
    EmptyContent,

    #[error("LLM output is not the expected JSON: {0}")]
    Parse(String),
}

impl LlmError {
    /// Transport failures, rate limits and overload are worth another attempt.
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(e) => e.is_timeout() || e.is_connect(),
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'static str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<Block>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Time left for one logical call, across all of its attempts.
#[derive(Debug, Clone, Copy)]
struct Budget {
    started: Instant,
    total: Duration,
}

impl Budget {
    fn start(total: Duration) -> Self {
        Self {
            started: Instant::now(),
            total,
        }
    }

    fn remaining(&self) -> Duration {
        self.total.saturating_sub(self.started.elapsed())
    }

    /// Backoff before the attempt after `attempt` (1-based), or `None` when it would not fit.
    fn retry_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= MAX_ATTEMPTS {
            return None;
        }
        let delay = BASE_BACKOFF * 2u32.pow(attempt - 1);
        (self.remaining() >= delay + MIN_ATTEMPT).then_some(delay)
    }
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    endpoint: String,
    budget: Duration,
}

impl LlmClient {
    pub fn new(api_key: String, budget: Duration) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        Ok(Self {
            client: Client::builder().build()?,
            api_key,
            endpoint: MESSAGES_URL.to_string(),
            budget,
        })
    }

    #[cfg(test)]
    fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Sends one system + user prompt and decodes the JSON object in the reply.
    /// The prompt must instruct the model to return JSON.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<T, LlmError> {
        let text = self.complete(system, prompt).await?;
        let json = json_object(&text)
            .ok_or_else(|| LlmError::Parse("no JSON object in reply".to_string()))?;
        serde_json::from_str(json).map_err(|e| LlmError::Parse(e.to_string()))
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let request = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };
        let budget = Budget::start(self.budget);
        let mut attempt = 1;

        loop {
            let err = match self.send(&request, budget.remaining()).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            let Some(delay) = budget.retry_delay(attempt) else {
                return Err(LlmError::BudgetExhausted {
                    attempts: attempt,
                    budget: self.budget,
                    last: err.to_string(),
                });
            };
            warn!(
                "LLM attempt {attempt} failed ({err}), retrying in {}ms",
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn send(
        &self,
        request: &MessagesRequest<'_>,
        deadline: Duration,
    ) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(deadline)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let reply: MessagesResponse = response.json().await?;
        debug!("LLM reply with {} content block(s)", reply.content.len());
        reply
            .content
            .into_iter()
            .find_map(|block| match block {
                Block::Text { text } if !text.trim().is_empty() => Some(text),
                _ => None,
            })
            .ok_or(LlmError::EmptyContent)
    }
}

/// The outermost `{...}` span of a reply, which also drops code fences and stray prose.
fn json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
