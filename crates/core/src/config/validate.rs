use super::{types::Config, ConfigError};
use crate::incident::MAX_BATCH_SIZE;

/// Validate configuration
/// Currently validates:
/// - ServiceNow instance, credentials and the LLM API key are present
/// - ServiceNow instance is an http(s) URL
/// - max_incidents is within 1..=200
/// - Timeouts are not 0
/// - Retry settings are in range
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let missing = missing_required(config);
    if !missing.is_empty() {
        return Err(ConfigError::MissingValues(missing));
    }

    let instance = config.servicenow.instance.trim();
    if !instance.starts_with("http://") && !instance.starts_with("https://") {
        return Err(ConfigError::ValidationError(format!(
            "servicenow.instance must be an http(s) URL, got '{}'",
            instance
        )));
    }

    if config.servicenow.max_incidents == 0 || config.servicenow.max_incidents > MAX_BATCH_SIZE {
        return Err(ConfigError::ValidationError(format!(
            "servicenow.max_incidents must be between 1 and {}",
            MAX_BATCH_SIZE
        )));
    }

    if config.servicenow.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "servicenow.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.llm.model.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "llm.model cannot be empty".to_string(),
        ));
    }

    if config.llm.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "llm.timeout_secs cannot be 0".to_string(),
        ));
    }

    config
        .retry
        .validate()
        .map_err(|reason| ConfigError::ValidationError(format!("retry: {}", reason)))?;

    if config.report.dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "report.dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Required values that are unset, named by config key and legacy variable.
fn missing_required(config: &Config) -> Vec<String> {
    let checks = [
        (
            config.servicenow.instance.trim().is_empty(),
            "servicenow.instance (SNOW_INSTANCE)",
        ),
        (
            config.servicenow.username.trim().is_empty(),
            "servicenow.username (SNOW_USERNAME)",
        ),
        (
            config.servicenow.password.is_empty(),
            "servicenow.password (SNOW_PASSWORD)",
        ),
        (
            config
                .llm
                .api_key
                .as_deref()
                .map_or(true, |key| key.trim().is_empty()),
            "llm.api_key (GEMINI_API_KEY)",
        ),
    ];

    checks
        .into_iter()
        .filter(|(missing, _)| *missing)
        .map(|(_, name)| name.to_string())
        .collect()
}
