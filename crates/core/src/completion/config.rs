//! Retry configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff schedule for completion calls.
///
/// The nominal delay after failed attempt `n` is
/// `base_delay * backoff_multiplier^(n-1)`; jitter stretches it by up to
/// `jitter_fraction` of itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total calls allowed, including the first (>= 1).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt (milliseconds).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Growth factor between consecutive delays (>= 1.0).
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Maximum extra delay as a fraction of the nominal delay (0.0-1.0).
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_fraction() -> f64 {
    0.25
}

/// Attempts beyond this make the schedule meaningless (hours of waiting).
const MAX_ATTEMPTS_LIMIT: u32 = 20;

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based),
    /// without jitter.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay().as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Apply jitter to a nominal delay. `sample` is clamped to `[0, 1]`.
    pub fn jittered(&self, nominal: Duration, sample: f64) -> Duration {
        let sample = if sample.is_finite() {
            sample.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let factor = 1.0 + self.jitter_fraction * sample;
        Duration::try_from_secs_f64(nominal.as_secs_f64() * factor).unwrap_or(nominal)
    }

    /// Check the settings, returning a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(format!(
                "max_attempts must be at most {}",
                MAX_ATTEMPTS_LIMIT
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err("backoff_multiplier must be a finite number >= 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err("jitter_fraction must be between 0.0 and 1.0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.base_delay(), Duration::from_secs(2));
        assert_eq!(config.backoff_multiplier, 2.0);
        assert_eq!(config.jitter_fraction, 0.25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: RetryConfig = toml::from_str("max_attempts = 2").unwrap();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.base_delay_ms, 2000);
    }

    #[test]
    fn test_nominal_delay_schedule() {
        let config = RetryConfig {
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
            ..Default::default()
        };
        assert_eq!(config.nominal_delay(1), Duration::from_secs(1));
        assert_eq!(config.nominal_delay(2), Duration::from_secs(2));
        assert_eq!(config.nominal_delay(3), Duration::from_secs(4));
        assert_eq!(config.nominal_delay(4), Duration::from_secs(8));
    }

    #[test]
    fn test_nominal_delay_is_non_decreasing() {
        let config = RetryConfig {
            backoff_multiplier: 1.0,
            ..Default::default()
        };
        let delays: Vec<_> = (1..=MAX_ATTEMPTS_LIMIT)
            .map(|n| config.nominal_delay(n))
            .collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_jitter_bounds() {
        let config = RetryConfig {
            jitter_fraction: 0.25,
            ..Default::default()
        };
        let nominal = Duration::from_secs(4);
        assert_eq!(config.jittered(nominal, 0.0), nominal);
        assert_eq!(config.jittered(nominal, 1.0), Duration::from_secs(5));
        assert_eq!(config.jittered(nominal, 7.0), Duration::from_secs(5));
        assert_eq!(config.jittered(nominal, f64::NAN), nominal);
        let mid = config.jittered(nominal, 0.5);
        assert!(mid > nominal && mid < Duration::from_secs(5));
    }

    #[test]
    fn test_validate_ranges() {
        let invalid = [
            RetryConfig {
                max_attempts: 0,
                ..Default::default()
            },
            RetryConfig {
                max_attempts: MAX_ATTEMPTS_LIMIT + 1,
                ..Default::default()
            },
            RetryConfig {
                backoff_multiplier: 0.5,
                ..Default::default()
            },
            RetryConfig {
                backoff_multiplier: f64::INFINITY,
                ..Default::default()
            },
            RetryConfig {
                jitter_fraction: 1.5,
                ..Default::default()
            },
            RetryConfig {
                jitter_fraction: -0.1,
                ..Default::default()
            },
        ];
        for config in invalid {
            assert!(config.validate().is_err(), "{:?}", config);
        }
    }
}
