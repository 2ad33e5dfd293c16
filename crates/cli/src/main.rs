mod console;
mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use snowtriage_core::{
    create_llm_client, load_config, load_config_from_env, validate_config, AttemptOutcome,
    CompletionAttempt, Config, ConfigError, FsReportSink, IncidentSource, LlmClient,
    ReportSink, ResilientCompletionClient, RunContext, SanitizedConfig, ServiceNowSource,
    TriageOrchestrator, TriageOutcome,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file used when `SNOWTRIAGE_CONFIG` is not set.
const DEFAULT_CONFIG_FILE: &str = "snowtriage.toml";

/// Exit status for configuration and startup failures.
const EXIT_CONFIG: i32 = 1;

const SYSTEM_INSTRUCTION: &str = "You are an IT operations analyst triaging ServiceNow incidents. \
                                  Be concise and cite incident numbers.";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("Error: {:#}", e);
            EXIT_CONFIG
        }
    };
    std::process::exit(code);
}

/// Where the configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfigSource {
    File(PathBuf),
    EnvOnly,
}

fn config_source(explicit: Option<String>, default_exists: bool) -> ConfigSource {
    match explicit.filter(|path| !path.trim().is_empty()) {
        Some(path) => ConfigSource::File(PathBuf::from(path)),
        None if default_exists => ConfigSource::File(PathBuf::from(DEFAULT_CONFIG_FILE)),
        None => ConfigSource::EnvOnly,
    }
}

fn load(source: &ConfigSource) -> Result<Config, ConfigError> {
    let config = match source {
        ConfigSource::File(path) => load_config(path)?,
        ConfigSource::EnvOnly => load_config_from_env()?,
    };
    validate_config(&config)?;
    Ok(config)
}

async fn run() -> Result<i32> {
    // Missing .env is fine; real environment variables still apply.
    let _ = dotenv::dotenv();

    let source = config_source(
        std::env::var("SNOWTRIAGE_CONFIG").ok(),
        Path::new(DEFAULT_CONFIG_FILE).exists(),
    );

    let config = match load(&source) {
        Ok(config) => config,
        Err(e) => {
            logging::init_fallback();
            error!("Configuration error: {}", e);
            eprintln!("Configuration error: {}", e);
            if matches!(e, ConfigError::MissingValues(_)) {
                eprintln!(
                    "Set the missing values in {} or the environment (a .env file is read at startup).",
                    DEFAULT_CONFIG_FILE
                );
            }
            return Ok(EXIT_CONFIG);
        }
    };

    let _log_guard = logging::init(&config.logging)?;

    info!("snowtriage v{} starting", VERSION);
    match &source {
        ConfigSource::File(path) => info!("Configuration loaded from {:?}", path),
        ConfigSource::EnvOnly => info!("Configuration loaded from environment"),
    }
    info!(
        "Effective configuration: {}",
        serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default()
    );

    let orchestrator = build_orchestrator(&config)?;

    match orchestrator.run().await {
        Ok(outcome) => {
            match &outcome {
                TriageOutcome::Reported { report, location } => {
                    print!(
                        "{}",
                        console::report_summary(report, location, config.report.print_summary)
                    );
                }
                TriageOutcome::NoIncidents => println!("{}", console::no_incidents()),
            }
            Ok(outcome.exit_code())
        }
        Err(e) => {
            eprintln!("Triage failed during {} stage: {}", e.stage(), e);
            Ok(e.exit_code())
        }
    }
}

fn build_orchestrator(config: &Config) -> Result<TriageOrchestrator> {
    let source: Arc<dyn IncidentSource> = Arc::new(
        ServiceNowSource::new(&config.servicenow).context("Failed to create ServiceNow client")?,
    );
    info!("Using incident endpoint {}", config.servicenow.endpoint());

    let llm: Arc<dyn LlmClient> =
        Arc::from(create_llm_client(&config.llm).context("Failed to create LLM client")?);
    info!("Using {} model {}", llm.provider(), llm.model());

    let completion = ResilientCompletionClient::new(llm, config.retry.clone())
        .with_system(SYSTEM_INSTRUCTION)
        .with_generation(config.llm.max_tokens, config.llm.temperature)
        .with_observer(Arc::new(log_attempt));

    let sink: Arc<dyn ReportSink> = Arc::new(FsReportSink::new(&config.report.dir));

    let context = RunContext::new();
    info!("Run id: {}", context.run_id());

    Ok(TriageOrchestrator::new(context, source, completion, sink))
}

fn log_attempt(attempt: &CompletionAttempt) {
    let waited = attempt.elapsed_wait.as_secs_f64();
    match attempt.outcome {
        AttemptOutcome::Success if attempt.elapsed_wait > Duration::ZERO => info!(
            "Completion succeeded on attempt {} after {:.2}s of backoff",
            attempt.attempt, waited
        ),
        AttemptOutcome::Success => {}
        AttemptOutcome::RetryableFailure => warn!(
            "Completion attempt {} failed (retryable, {:.2}s waited so far)",
            attempt.attempt, waited
        ),
        AttemptOutcome::FatalFailure => {
            error!("Completion attempt {} failed (not retryable)", attempt.attempt)
        }
    }
}
