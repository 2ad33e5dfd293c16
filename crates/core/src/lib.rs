pub mod completion;
pub mod config;
pub mod incident;
pub mod llm;
pub mod prompt;
pub mod report;
pub mod testing;
pub mod triage;

pub use completion::{
    AttemptObserver, AttemptOutcome, Completion, CompletionAttempt, CompletionError,
    CompletionErrorKind, JitterSource, ResilientCompletionClient, RetryConfig, Sleeper,
    ThreadRngJitter, TokioSleeper,
};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, LoggingConfig, ReportConfig, SanitizedConfig, ServiceNowConfig,
};
pub use incident::{
    categorize, CategoryBreakdown, FetchError, FetchErrorKind, IncidentBatch, IncidentCategory,
    IncidentRecord, IncidentSource, ServiceNowSource, MAX_BATCH_SIZE,
};
pub use llm::{
    classify, classify_status, create_llm_client, CompletionRequest, CompletionResponse,
    FailureClass, GeminiClient, LlmClient, LlmConfig, LlmError, LlmProvider, LlmUsage,
};
pub use prompt::{Prompt, PromptBuilder};
pub use report::{FsReportSink, PersistError, PersistErrorKind, ReportSink, TriageReport};
pub use triage::{
    Clock, FailedStage, RunContext, RunStage, StageCallback, SystemClock, TriageError,
    TriageOrchestrator, TriageOutcome,
};
