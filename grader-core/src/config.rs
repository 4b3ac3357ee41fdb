use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GraderConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub activities: ActivitiesConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Echo the caller's `Origin` back on submission responses.
    pub cors: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ActivitiesConfig {
    /// Path to a `.jsonl` file with one activity per line.
    pub path: String,
}

impl Default for ActivitiesConfig {
    fn default() -> Self {
        Self {
            path: "activity-data.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RecorderConfig {
    pub queue_capacity: usize,
    /// How long a deferred enqueue waits for room before dropping its record.
    pub enqueue_timeout_ms: u64,
    /// `-` for stdout, otherwise a file opened in append mode.
    pub output: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            enqueue_timeout_ms: 5000,
            output: "-".to_string(),
        }
    }
}

impl GraderConfig {
    /// Load from an optional TOML file, then `GRADER__SECTION__KEY` env vars.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("GRADER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        s.try_deserialize()
    }
}
