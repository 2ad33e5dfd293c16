//! Resilient completion: retry policy around an [`LlmClient`](crate::llm::LlmClient).

mod client;
mod config;
mod retry;

pub use client::{
    AttemptObserver, AttemptOutcome, Completion, CompletionAttempt, CompletionError,
    CompletionErrorKind, ResilientCompletionClient,
};
pub use config::RetryConfig;
pub use retry::{JitterSource, Sleeper, ThreadRngJitter, TokioSleeper};
