//! Configuration management.
//!
//! Values come from an optional `tally.toml` next to the binary, overridden
//! by `TALLY__SECTION__KEY` environment variables.

use std::time::Duration;

use serde::Deserialize;

use crate::utils::RetryConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub event_log: EventLogConfig,

    #[serde(default)]
    pub apportionment: ApportionmentConfig,

    /// Reload-and-retry of end-result updates
    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLogBackend {
    Memory,
    Scylla,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventLogConfig {
    #[serde(default = "default_backend")]
    pub backend: EventLogBackend,

    #[serde(default = "default_known_node")]
    pub known_node: String,

    #[serde(default = "default_keyspace")]
    pub keyspace: String,

    #[serde(default = "default_replication_factor")]
    pub replication_factor: u32,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            known_node: default_known_node(),
            keyspace: default_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApportionmentConfig {
    /// Upper bound on alternating-scaling iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for ApportionmentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        RetryConfig {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            multiplier: settings.multiplier,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_backend() -> EventLogBackend {
    EventLogBackend::Memory
}

fn default_known_node() -> String {
    "127.0.0.1:9042".to_string()
}

fn default_keyspace() -> String {
    "tally_ks".to_string()
}

fn default_replication_factor() -> u32 {
    1
}

fn default_max_iterations() -> u32 {
    100
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    10
}

fn default_max_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_log_level() -> String {
    "info,voting_tally=debug".to_string()
}

impl TallyConfig {
    /// Load configuration from `tally.toml` (if present) and environment
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("tally").required(false))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        let cfg: TallyConfig = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load configuration from a specific file, environment still wins
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        let cfg: TallyConfig = config.try_deserialize()?;
        Ok(cfg)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from(&self.retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    fn parse(toml: &str) -> TallyConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_apply_to_empty_source() {
        let cfg = parse("");
        assert_eq!(cfg.event_log.backend, EventLogBackend::Memory);
        assert_eq!(cfg.event_log.keyspace, "tally_ks");
        assert_eq!(cfg.apportionment.max_iterations, 100);
        assert_eq!(cfg.retry_config(), RetryConfig::default());
        assert!(!cfg.logging.json);
    }

    #[test]
    fn test_sections_override_defaults() {
        let cfg = parse(
            r#"
            [event_log]
            backend = "scylla"
            known_node = "scylla:9042"

            [apportionment]
            max_iterations = 12

            [retry]
            max_attempts = 0
            initial_delay_ms = 50
            "#,
        );

        assert_eq!(cfg.event_log.backend, EventLogBackend::Scylla);
        assert_eq!(cfg.event_log.known_node, "scylla:9042");
        assert_eq!(cfg.event_log.replication_factor, 1);
        assert_eq!(cfg.apportionment.max_iterations, 12);

        let retry = cfg.retry_config();
        assert_eq!(retry.max_attempts, 1);
        assert_eq!(retry.initial_delay, Duration::from_millis(50));
        assert_eq!(retry.max_delay, Duration::from_secs(1));
    }
}
