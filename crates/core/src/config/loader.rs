use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for structured overrides, e.g. `SNOWTRIAGE_RETRY__MAX_ATTEMPTS=6`.
const ENV_PREFIX: &str = "SNOWTRIAGE_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    extract(with_env(Figment::new().merge(Toml::file(path))))
}

/// Load configuration from the environment only (no config file)
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    extract(with_env(Figment::new()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    figment
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Legacy variable names win over the file, prefixed variables win over both.
fn with_env(figment: Figment) -> Figment {
    figment
        .merge(legacy_env())
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// The bare variable names used by existing `.env` files.
fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        let mapped = match key.as_str().to_ascii_uppercase().as_str() {
            "SNOW_INSTANCE" => "servicenow.instance",
            "SNOW_USERNAME" => "servicenow.username",
            "SNOW_PASSWORD" => "servicenow.password",
            "GEMINI_API_KEY" => "llm.api_key",
            _ => return None,
        };
        Some(mapped.into())
    })
}
