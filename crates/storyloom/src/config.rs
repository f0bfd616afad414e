use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::task::poller::PollPolicy;

/// Top-level orchestrator configuration, loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    pub version: String,

    #[serde(default)]
    pub poll: PollSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    /// Slack added on top of the summed per-stage polling budgets when
    /// computing a job's overall wall-clock deadline.
    #[serde(default = "default_compute_slack_secs")]
    pub compute_slack_secs: u64,
}

/// Polling cadence per provider-backed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSettings {
    #[serde(default = "PollPolicyConfig::script_default")]
    pub script: PollPolicyConfig,
    #[serde(default = "PollPolicyConfig::clip_default")]
    pub clip: PollPolicyConfig,
    #[serde(default = "PollPolicyConfig::audio_default")]
    pub audio: PollPolicyConfig,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            script: PollPolicyConfig::script_default(),
            clip: PollPolicyConfig::clip_default(),
            audio: PollPolicyConfig::audio_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollPolicyConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl PollPolicyConfig {
    fn script_default() -> Self {
        Self {
            interval_ms: 2_000,
            max_attempts: 30,
        }
    }

    fn clip_default() -> Self {
        Self {
            interval_ms: 5_000,
            max_attempts: 60,
        }
    }

    fn audio_default() -> Self {
        Self {
            interval_ms: 3_000,
            max_attempts: 40,
        }
    }

    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.interval_ms),
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSettings {
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_compute_slack_secs() -> u64 {
    60
}

fn default_cache_capacity() -> u64 {
    1_024
}

fn default_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            poll: PollSettings::default(),
            cache: CacheSettings::default(),
            compute_slack_secs: default_compute_slack_secs(),
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<OrchestratorConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<OrchestratorConfig, ConfigError> {
    let config: OrchestratorConfig = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &OrchestratorConfig) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    for (stage, poll) in [
        ("script", &config.poll.script),
        ("clip", &config.poll.clip),
        ("audio", &config.poll.audio),
    ] {
        if poll.interval_ms == 0 {
            return Err(ConfigError::Validation {
                message: format!("poll.{}.intervalMs must be positive", stage),
            });
        }
        if poll.max_attempts == 0 {
            return Err(ConfigError::Validation {
                message: format!("poll.{}.maxAttempts must be positive", stage),
            });
        }
    }

    if config.cache.max_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "cache.maxCapacity must be positive".to_string(),
        });
    }
    if config.cache.ttl_secs == 0 {
        return Err(ConfigError::Validation {
            message: "cache.ttlSecs must be positive".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_valid_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "poll": {
                "script": { "intervalMs": 1000, "maxAttempts": 10 },
                "clip": { "intervalMs": 4000, "maxAttempts": 45 },
                "audio": { "intervalMs": 2000, "maxAttempts": 20 }
            },
            "cache": { "maxCapacity": 256, "ttlSecs": 3600 },
            "computeSlackSecs": 30
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.poll.clip.interval_ms, 4000);
        assert_eq!(config.poll.clip.max_attempts, 45);
        assert_eq!(config.cache.max_capacity, 256);
        assert_eq!(config.compute_slack_secs, 30);
    }

    #[test]
    fn test_sparse_config_uses_defaults() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.poll.script.interval_ms, 2000);
        assert_eq!(config.cache.ttl_secs, 24 * 60 * 60);
        assert_eq!(config.compute_slack_secs, 60);
    }

    #[test]
    fn test_invalid_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config_json = r#"
        {
            "version": "1.0",
            "poll": {
                "clip": { "intervalMs": 0, "maxAttempts": 5 }
            }
        }
        "#;

        let result = load_config_from_str(config_json);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_zero_cache_capacity_rejected() {
        let config_json = r#"
        {
            "version": "1.0",
            "cache": { "maxCapacity": 0 }
        }
        "#;

        let result = load_config_from_str(config_json);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let result = load_config_from_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseJson(_))));
    }

    #[test]
    fn test_policy_conversion() {
        let poll = PollPolicyConfig {
            interval_ms: 1500,
            max_attempts: 4,
        };
        let policy = poll.policy();
        assert_eq!(policy.interval, Duration::from_millis(1500));
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.budget(), Duration::from_millis(6000));
    }
}
