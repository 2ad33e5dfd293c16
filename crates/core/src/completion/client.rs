//! Completion client with bounded retry, exponential backoff and jitter.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use super::config::RetryConfig;
use super::retry::{JitterSource, Sleeper, ThreadRngJitter, TokioSleeper};
use crate::llm::{classify, CompletionRequest, FailureClass, LlmClient, LlmError, LlmUsage};
use crate::prompt::Prompt;

/// Outcome of a single call to the backing model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    FatalFailure,
}

/// One call to the backing model, reported to the attempt observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Total backoff time spent before this attempt.
    pub elapsed_wait: Duration,
    pub outcome: AttemptOutcome,
}

/// Callback invoked after every attempt.
pub type AttemptObserver = Arc<dyn Fn(&CompletionAttempt) + Send + Sync>;

/// A successful completion.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Model output, never empty.
    pub text: String,
    /// Model that produced the text, as reported by the provider.
    pub model: String,
    /// Number of calls made, including the successful one.
    pub attempts: u32,
    pub usage: LlmUsage,
}

/// Terminal failure of [`ResilientCompletionClient::complete`].
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Failure that retrying cannot fix.
    #[error("Non-retryable completion failure on attempt {attempt}: {source}")]
    NonRetryable {
        attempt: u32,
        #[source]
        source: LlmError,
    },

    /// Still rate limited when attempts ran out.
    #[error("Exceeded model rate limits after {attempts} attempts: {last}")]
    RateLimitedExhausted {
        attempts: u32,
        #[source]
        last: LlmError,
    },

    /// Still failing transiently when attempts ran out.
    #[error("Completion still failing after {attempts} attempts: {last}")]
    TransientExhausted {
        attempts: u32,
        #[source]
        last: LlmError,
    },
}

/// Coarse classification of a [`CompletionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionErrorKind {
    NonRetryable,
    RateLimitedExhausted,
    TransientExhausted,
}

impl CompletionError {
    pub fn kind(&self) -> CompletionErrorKind {
        match self {
            Self::NonRetryable { .. } => CompletionErrorKind::NonRetryable,
            Self::RateLimitedExhausted { .. } => CompletionErrorKind::RateLimitedExhausted,
            Self::TransientExhausted { .. } => CompletionErrorKind::TransientExhausted,
        }
    }

    /// Number of calls made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::NonRetryable { attempt, .. } => *attempt,
            Self::RateLimitedExhausted { attempts, .. }
            | Self::TransientExhausted { attempts, .. } => *attempts,
        }
    }
}

/// Wraps an [`LlmClient`] with the retry policy.
///
/// Makes at most `max_attempts` calls per [`complete`](Self::complete) and
/// returns either one non-empty completion or one terminal error.
pub struct ResilientCompletionClient {
    llm: Arc<dyn LlmClient>,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
    jitter: Arc<dyn JitterSource>,
    observer: Option<AttemptObserver>,
    system: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl ResilientCompletionClient {
    /// Create a client that sleeps on the tokio timer and draws jitter from
    /// the thread RNG.
    pub fn new(llm: Arc<dyn LlmClient>, retry: RetryConfig) -> Self {
        let defaults = CompletionRequest::new("");
        Self {
            llm,
            retry,
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(ThreadRngJitter),
            observer: None,
            system: None,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_observer(mut self, observer: AttemptObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Generation limits passed with every request.
    pub fn with_generation(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Submit the prompt, retrying retryable failures per the backoff schedule.
    pub async fn complete(&self, prompt: &Prompt) -> Result<Completion, CompletionError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        let mut elapsed_wait = Duration::ZERO;

        loop {
            info!(
                "Requesting analysis from {} model {} (attempt {}/{})",
                self.llm.provider(),
                self.llm.model(),
                attempt,
                max_attempts
            );

            let result = self
                .llm
                .complete(self.request(prompt))
                .await
                .and_then(|response| {
                    if response.text.trim().is_empty() {
                        Err(LlmError::EmptyCompletion)
                    } else {
                        Ok(response)
                    }
                });

            let error = match result {
                Ok(response) => {
                    self.observe(attempt, elapsed_wait, AttemptOutcome::Success);
                    info!(
                        "Received summary from {} ({} output tokens, attempt {})",
                        response.model, response.usage.output_tokens, attempt
                    );
                    return Ok(Completion {
                        text: response.text,
                        model: response.model,
                        attempts: attempt,
                        usage: response.usage,
                    });
                }
                Err(error) => error,
            };

            let class = classify(&error);
            if !class.is_retryable() {
                self.observe(attempt, elapsed_wait, AttemptOutcome::FatalFailure);
                error!("Non-retryable error from model on attempt {}: {}", attempt, error);
                return Err(CompletionError::NonRetryable {
                    attempt,
                    source: error,
                });
            }

            self.observe(attempt, elapsed_wait, AttemptOutcome::RetryableFailure);

            if attempt >= max_attempts {
                error!("Max retries reached ({} attempts): {}", attempt, error);
                return Err(match class {
                    FailureClass::RateLimited => CompletionError::RateLimitedExhausted {
                        attempts: attempt,
                        last: error,
                    },
                    _ => CompletionError::TransientExhausted {
                        attempts: attempt,
                        last: error,
                    },
                });
            }

            let delay = self
                .retry
                .jittered(self.retry.nominal_delay(attempt), self.jitter.sample());
            warn!(
                "{} on attempt {}/{}: {}. Retrying in {:.2} seconds",
                match class {
                    FailureClass::RateLimited => "Rate limit hit",
                    _ => "Transient failure",
                },
                attempt,
                max_attempts,
                error,
                delay.as_secs_f64()
            );

            self.sleeper.sleep(delay).await;
            elapsed_wait = elapsed_wait.saturating_add(delay);
            attempt += 1;
        }
    }

    fn request(&self, prompt: &Prompt) -> CompletionRequest {
        let request = CompletionRequest::new(prompt.as_str())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);
        match &self.system {
            Some(system) => request.with_system(system.clone()),
            None => request,
        }
    }

    fn observe(&self, attempt: u32, elapsed_wait: Duration, outcome: AttemptOutcome) {
        if let Some(observer) = &self.observer {
            observer(&CompletionAttempt {
                attempt,
                elapsed_wait,
                outcome,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::IncidentBatch;
    use crate::prompt::PromptBuilder;
    use crate::testing::{fixtures, FixedJitter, MockLlmClient, RecordingSleeper};
    use std::sync::Mutex;

    fn prompt() -> Prompt {
        PromptBuilder::new().build(&IncidentBatch::new(vec![fixtures::incident(
            "INC001",
            "Mail relay rejecting messages",
        )]))
    }

    fn retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
            jitter_fraction: 0.25,
        }
    }

    fn rate_limited() -> LlmError {
        LlmError::Api {
            status: 429,
            message: "RESOURCE_EXHAUSTED: quota exceeded".to_string(),
        }
    }

    fn unavailable() -> LlmError {
        LlmError::Api {
            status: 503,
            message: "UNAVAILABLE: overloaded".to_string(),
        }
    }

    struct Harness {
        llm: Arc<MockLlmClient>,
        sleeper: Arc<RecordingSleeper>,
        client: ResilientCompletionClient,
    }

    fn harness(max_attempts: u32, jitter: f64) -> Harness {
        let llm = Arc::new(MockLlmClient::new());
        let sleeper = Arc::new(RecordingSleeper::new());
        let client = ResilientCompletionClient::new(
            Arc::clone(&llm) as Arc<dyn LlmClient>,
            retry(max_attempts),
        )
        .with_sleeper(Arc::clone(&sleeper) as Arc<dyn Sleeper>)
        .with_jitter(Arc::new(FixedJitter::new(jitter)));
        Harness {
            llm,
            sleeper,
            client,
        }
    }

    #[tokio::test]
    async fn test_success_first_try_no_delay() {
        let h = harness(4, 0.0);
        h.llm.push_text("## CRITICAL ISSUES\nNone").await;

        let completion = h.client.complete(&prompt()).await.unwrap();
        assert_eq!(completion.text, "## CRITICAL ISSUES\nNone");
        assert_eq!(completion.attempts, 1);
        assert_eq!(h.llm.call_count().await, 1);
        assert!(h.sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_k_transient_failures_then_success() {
        for k in 1..4u32 {
            let h = harness(4, 0.0);
            for _ in 0..k {
                h.llm.push_error(unavailable()).await;
            }
            h.llm.push_text("summary").await;

            let completion = h.client.complete(&prompt()).await.unwrap();
            assert_eq!(completion.text, "summary");
            assert_eq!(completion.attempts, k + 1);
            assert_eq!(h.llm.call_count().await, (k + 1) as usize);
            assert_eq!(h.sleeper.recorded().len(), k as usize);
        }
    }

    #[tokio::test]
    async fn test_always_rate_limited_exhausts_attempts() {
        let h = harness(4, 0.0);
        h.llm.set_default_error(rate_limited()).await;

        let err = h.client.complete(&prompt()).await.unwrap_err();
        assert_eq!(err.kind(), CompletionErrorKind::RateLimitedExhausted);
        assert_eq!(err.attempts(), 4);
        assert_eq!(h.llm.call_count().await, 4);
        // No sleep after the final attempt.
        assert_eq!(
            h.sleeper.recorded(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[tokio::test]
    async fn test_always_transient_exhausts_attempts() {
        let h = harness(3, 0.0);
        h.llm
            .set_default_error(LlmError::Http("connection refused".to_string()))
            .await;

        let err = h.client.complete(&prompt()).await.unwrap_err();
        assert_eq!(err.kind(), CompletionErrorKind::TransientExhausted);
        assert_eq!(h.llm.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_exhaustion_kind_follows_last_failure() {
        let h = harness(2, 0.0);
        h.llm.push_error(rate_limited()).await;
        h.llm.push_error(unavailable()).await;

        let err = h.client.complete(&prompt()).await.unwrap_err();
        assert_eq!(err.kind(), CompletionErrorKind::TransientExhausted);
    }

    #[tokio::test]
    async fn test_non_retryable_first_call() {
        let h = harness(4, 0.0);
        h.llm
            .push_error(LlmError::Api {
                status: 401,
                message: "UNAUTHENTICATED".to_string(),
            })
            .await;
        h.llm.push_text("never reached").await;

        let err = h.client.complete(&prompt()).await.unwrap_err();
        assert_eq!(err.kind(), CompletionErrorKind::NonRetryable);
        assert_eq!(err.attempts(), 1);
        assert_eq!(h.llm.call_count().await, 1);
        assert!(h.sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_non_retryable_after_retry_reports_attempt() {
        let h = harness(4, 0.0);
        h.llm.push_error(unavailable()).await;
        h.llm
            .push_error(LlmError::Blocked("SAFETY".to_string()))
            .await;

        let err = h.client.complete(&prompt()).await.unwrap_err();
        match err {
            CompletionError::NonRetryable { attempt, source } => {
                assert_eq!(attempt, 2);
                assert!(matches!(source, LlmError::Blocked(_)));
            }
            other => panic!("Expected NonRetryable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_success_is_fatal() {
        let h = harness(4, 0.0);
        h.llm.push_text("   ").await;

        let err = h.client.complete(&prompt()).await.unwrap_err();
        assert!(matches!(
            err,
            CompletionError::NonRetryable {
                source: LlmError::EmptyCompletion,
                ..
            }
        ));
        assert_eq!(h.llm.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_jitter_applied_to_delay() {
        let h = harness(3, 1.0);
        h.llm.set_default_error(unavailable()).await;

        let _ = h.client.complete(&prompt()).await;
        assert_eq!(
            h.sleeper.recorded(),
            vec![Duration::from_millis(1250), Duration::from_millis(2500)]
        );
    }

    #[tokio::test]
    async fn test_single_attempt_policy() {
        let h = harness(1, 0.0);
        h.llm.set_default_error(rate_limited()).await;

        let err = h.client.complete(&prompt()).await.unwrap_err();
        assert_eq!(err.kind(), CompletionErrorKind::RateLimitedExhausted);
        assert_eq!(h.llm.call_count().await, 1);
        assert!(h.sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_observer_sees_every_attempt() {
        let seen: Arc<Mutex<Vec<CompletionAttempt>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let h = harness(4, 0.0);
        let client = h.client.with_observer(Arc::new(move |attempt: &CompletionAttempt| {
            sink.lock().unwrap().push(attempt.clone());
        }));
        h.llm.push_error(rate_limited()).await;
        h.llm.push_text("ok").await;

        client.complete(&prompt()).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                CompletionAttempt {
                    attempt: 1,
                    elapsed_wait: Duration::ZERO,
                    outcome: AttemptOutcome::RetryableFailure,
                },
                CompletionAttempt {
                    attempt: 2,
                    elapsed_wait: Duration::from_secs(1),
                    outcome: AttemptOutcome::Success,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_request_carries_full_prompt_and_settings() {
        let h = harness(1, 0.0);
        let client = h
            .client
            .with_system("You are an IT operations analyst")
            .with_generation(512, 0.0);
        h.llm.push_text("ok").await;

        let prompt = prompt();
        client.complete(&prompt).await.unwrap();

        let requests = h.llm.recorded_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, prompt.as_str());
        assert_eq!(requests[0].max_tokens, 512);
        assert_eq!(requests[0].temperature, 0.0);
        assert_eq!(
            requests[0].system.as_deref(),
            Some("You are an IT operations analyst")
        );
    }
}
