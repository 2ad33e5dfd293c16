//! Retry classification of LLM failures.
//!
//! Which failures are worth retrying is provider behaviour, so it lives here
//! as two plain functions over status codes and [`LlmError`] variants.

use super::LlmError;

/// How the retry loop should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Quota or rate limit hit (HTTP 429, `RESOURCE_EXHAUSTED`).
    RateLimited,
    /// Server overload, gateway errors, timeouts, connection failures.
    Transient,
    /// Authentication, malformed request, content policy, bad response.
    Fatal,
}

impl FailureClass {
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Fatal)
    }
}

/// Classify a non-success HTTP status from the completion API.
pub fn classify_status(status: u16) -> FailureClass {
    match status {
        429 => FailureClass::RateLimited,
        408 | 500 | 502 | 503 | 504 => FailureClass::Transient,
        401 | 403 => FailureClass::Fatal,
        400..=499 => FailureClass::Fatal,
        500..=599 => FailureClass::Transient,
        _ => FailureClass::Fatal,
    }
}

/// Classify an [`LlmError`].
pub fn classify(error: &LlmError) -> FailureClass {
    match error {
        LlmError::Api { status, message } => {
            // Gemini reports exhausted quota as RESOURCE_EXHAUSTED, sometimes without a 429.
            if message.contains("RESOURCE_EXHAUSTED") {
                FailureClass::RateLimited
            } else {
                classify_status(*status)
            }
        }
        LlmError::Http(_) | LlmError::Timeout(_) => FailureClass::Transient,
        LlmError::Json(_)
        | LlmError::Blocked(_)
        | LlmError::EmptyCompletion
        | LlmError::NotConfigured(_) => FailureClass::Fatal,
    }
}
