//! Completion API interaction with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`CompletionProvider`]: core trait, one prompt in, raw completion text out
//! - [`OpenAiCompletions`]: OpenAI-compatible `/v1/completions` client
//! - [`Retry`]: decorator that adds retry logic to any `CompletionProvider`
//!
//! # Retry Strategy
//!
//! - Configurable number of retries (0 disables retrying)
//! - Exponential backoff starting at the base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use std::fmt;
use std::time::{Duration, Instant};

use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{error, instrument, warn};
use url::Url;

use crate::error::ScoreError;
use crate::utils::truncate_for_log;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "text-davinci-003";
pub const DEFAULT_MAX_TOKENS: u32 = 50;

/// A text-completion backend.
pub trait CompletionProvider {
    /// Send `prompt` and return the text of the first completion choice.
    async fn complete(&self, prompt: &str) -> Result<String, ScoreError>;
}

/// Wrapper that adds exponential backoff retry logic to any [`CompletionProvider`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct Retry<P> {
    inner: P,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<P> Retry<P>
where
    P: CompletionProvider,
{
    /// Wrap an existing [`CompletionProvider`] with retries.
    ///
    /// # Arguments
    ///
    /// * `inner` - The provider that makes the actual call
    /// * `max_retries` - Extra attempts after the first failure (0 disables retrying)
    /// * `base_delay` - Delay before the first retry; doubles on each attempt, capped at 30s
    ///
    /// # Example
    ///
    /// ```ignore
    /// let provider = Retry::new(completions, 2, Duration::from_secs(1));
    /// ```
    pub fn new(inner: P, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let shift = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<P> fmt::Debug for Retry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<P> CompletionProvider for Retry<P>
where
    P: CompletionProvider,
{
    #[instrument(level = "debug", skip_all)]
    async fn complete(&self, prompt: &str) -> Result<String, ScoreError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis(),
                            error = %e,
                            "complete() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis(),
                        ?delay,
                        error = %e,
                        "complete() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Client for an OpenAI-compatible legacy completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompletions {
    http: Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiCompletions {
    /// Build a client for `{endpoint}/v1/completions`.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - API base, e.g. `https://api.openai.com`
    /// * `api_key` - Sent as a bearer token
    /// * `model` - Completion model name
    /// * `max_tokens` - Upper bound on the answer length
    /// * `timeout` - Whole-request timeout; an expired call is a [`ScoreError::Transport`]
    ///
    /// # Errors
    ///
    /// Fails only if the HTTP client cannot be built.
    pub fn new(
        endpoint: &Url,
        api_key: &str,
        model: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, ScoreError> {
        let http = Client::builder()
            .user_agent(concat!("press_summary_report/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        let url = format!("{}/v1/completions", endpoint.as_str().trim_end_matches('/'));
        Ok(Self {
            http,
            url,
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
        })
    }
}

impl CompletionProvider for OpenAiCompletions {
    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String, ScoreError> {
        let payload = CompletionRequest {
            model: &self.model,
            prompt,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .body(serde_json::to_vec(&payload)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ScoreError::Status {
                status,
                body: truncate_for_log(&body, 300),
            });
        }

        let completion: CompletionResponse = serde_json::from_str(&body)?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text.trim().to_string())
            .ok_or(ScoreError::NoChoices)
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::cell::Cell;

    /// Fails `failures` times, then answers `"7"`.
    struct Flaky {
        failures: usize,
        calls: Cell<usize>,
    }

    impl CompletionProvider for Flaky {
        async fn complete(&self, _prompt: &str) -> Result<String, ScoreError> {
            let n = self.calls.get();
            self.calls.set(n + 1);
            if n < self.failures {
                Err(ScoreError::NoChoices)
            } else {
                Ok("7".to_string())
            }
        }
    }

    fn client(server: &MockServer) -> OpenAiCompletions {
        let base = Url::parse(&server.base_url()).unwrap();
        OpenAiCompletions::new(&base, "test-key", "text-davinci-003", 50, Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_retry_recovers_after_failures() {
        let flaky = Flaky {
            failures: 2,
            calls: Cell::new(0),
        };
        let retry = Retry::new(flaky, 3, Duration::from_millis(1));
        assert_eq!(retry.complete("p").await.unwrap(), "7");
        assert_eq!(retry.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let flaky = Flaky {
            failures: 5,
            calls: Cell::new(0),
        };
        let retry = Retry::new(flaky, 1, Duration::from_millis(1));
        assert!(matches!(retry.complete("p").await, Err(ScoreError::NoChoices)));
        assert_eq!(retry.inner.calls.get(), 2);
    }

    #[test]
    fn test_backoff_is_capped() {
        let flaky = Flaky {
            failures: 0,
            calls: Cell::new(0),
        };
        let retry = Retry::new(flaky, 100, Duration::from_secs(1));
        let first = retry.backoff(1);
        assert!(first >= Duration::from_secs(1) && first <= Duration::from_millis(1250));
        let late = retry.backoff(60);
        assert!(late <= Duration::from_millis(30_250));
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/completions")
                    .header("authorization", "Bearer test-key")
                    .json_body_partial(r#"{"model":"text-davinci-003","max_tokens":50}"#);
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"choices":[{"text":"\n\n8"},{"text":"3"}]}"#);
            })
            .await;

        let text = client(&server).complete("rate this").await.unwrap();
        mock.assert_async().await;
        assert_eq!(text, "8");
    }

    #[tokio::test]
    async fn test_complete_surfaces_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/completions");
                then.status(429).body("quota exceeded");
            })
            .await;

        let err = client(&server).complete("rate this").await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_complete_without_choices() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/completions");
                then.status(200).body(r#"{"choices":[]}"#);
            })
            .await;

        let err = client(&server).complete("rate this").await.unwrap_err();
        assert!(matches!(err, ScoreError::NoChoices));
    }
}
