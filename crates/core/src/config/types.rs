use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::completion::RetryConfig;
use crate::incident::MAX_BATCH_SIZE;
use crate::llm::{LlmConfig, LlmProvider};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub servicenow: ServiceNowConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// ServiceNow incident endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceNowConfig {
    /// Instance base URL (e.g., "https://dev12345.service-now.com")
    #[serde(default)]
    pub instance: String,
    /// Scripted REST path returning the high-priority incident list
    #[serde(default = "default_api_path")]
    pub api_path: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_servicenow_timeout")]
    pub timeout_secs: u32,
    /// Upper bound on incidents handed to the model (1-200)
    #[serde(default = "default_max_incidents")]
    pub max_incidents: usize,
}

impl ServiceNowConfig {
    /// Full endpoint URL.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.instance.trim_end_matches('/'), self.api_path)
    }
}

impl Default for ServiceNowConfig {
    fn default() -> Self {
        Self {
            instance: String::new(),
            api_path: default_api_path(),
            username: String::new(),
            password: String::new(),
            timeout_secs: default_servicenow_timeout(),
            max_incidents: default_max_incidents(),
        }
    }
}

fn default_api_path() -> String {
    "/api/1775050/gemini_integration/incidents/high_priority".to_string()
}

fn default_servicenow_timeout() -> u32 {
    30
}

fn default_max_incidents() -> usize {
    MAX_BATCH_SIZE
}

/// Report output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_dir")]
    pub dir: PathBuf,
    /// Print the summary to stdout after a successful run
    #[serde(default = "default_true")]
    pub print_summary: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: default_report_dir(),
            print_summary: true,
        }
    }
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Mirror log output to `file`
    #[serde(default = "default_true")]
    pub to_file: bool,
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: true,
            file: default_log_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logs/incident_triage.log")
}

fn default_true() -> bool {
    true
}

/// Sanitized config for log output (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub servicenow: SanitizedServiceNowConfig,
    pub llm: SanitizedLlmConfig,
    pub retry: RetryConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedServiceNowConfig {
    pub endpoint: String,
    pub username: String,
    pub password_configured: bool,
    pub timeout_secs: u32,
    pub max_incidents: usize,
}

/// Sanitized LLM config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            servicenow: SanitizedServiceNowConfig {
                endpoint: config.servicenow.endpoint(),
                username: config.servicenow.username.clone(),
                password_configured: !config.servicenow.password.is_empty(),
                timeout_secs: config.servicenow.timeout_secs,
                max_incidents: config.servicenow.max_incidents,
            },
            llm: SanitizedLlmConfig {
                provider: match config.llm.provider {
                    LlmProvider::Gemini => "gemini".to_string(),
                },
                model: config.llm.model.clone(),
                api_base: config.llm.api_base.clone(),
                api_key_configured: config
                    .llm
                    .api_key
                    .as_ref()
                    .is_some_and(|key| !key.is_empty()),
                timeout_secs: config.llm.timeout_secs,
            },
            retry: config.retry.clone(),
            report: config.report.clone(),
            logging: config.logging.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[servicenow]
instance = "https://dev1.service-now.com"
username = "svc_triage"
password = "hunter2"
max_incidents = 10

[llm]
provider = "gemini"
model = "gemini-2.0-flash"
api_key = "abc"

[retry]
max_attempts = 3
base_delay_ms = 500

[report]
dir = "/var/reports"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.servicenow.username, "svc_triage");
        assert_eq!(config.servicenow.max_incidents, 10);
        assert_eq!(config.servicenow.timeout_secs, 30);
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_multiplier, 2.0);
        assert_eq!(config.report.dir, PathBuf::from("/var/reports"));
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.servicenow.instance.is_empty());
        assert_eq!(config.servicenow.max_incidents, 200);
        assert_eq!(config.llm.model, "gemini-1.5-flash");
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.report.dir, PathBuf::from("reports"));
        assert!(config.report.print_summary);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, PathBuf::from("logs/incident_triage.log"));
    }

    #[test]
    fn test_endpoint_joins_instance_and_path() {
        let config = ServiceNowConfig {
            instance: "https://dev1.service-now.com/".to_string(),
            api_path: "/api/x/incidents".to_string(),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "https://dev1.service-now.com/api/x/incidents");
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let mut config = Config::default();
        config.servicenow.instance = "https://dev1.service-now.com".to_string();
        config.servicenow.password = "hunter2".to_string();
        config.llm.api_key = Some("secret-key".to_string());

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.servicenow.password_configured);
        assert!(sanitized.llm.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("secret-key"));
        assert!(json.contains("\"provider\":\"gemini\""));
    }
}
