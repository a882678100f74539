//! Configuration for Darkroom

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DarkroomConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub queue: QueueSection,

    #[serde(default)]
    pub metadata: MetadataConfig,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DarkroomConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("DARKROOM_BIND_ADDRESS") {
            config.server.bind_address = addr;
        }
        if let Ok(port) = std::env::var("DARKROOM_PORT") {
            if let Ok(p) = port.parse() {
                config.server.port = p;
            }
        }
        if let Ok(engine) = std::env::var("DARKROOM_METADATA_ENGINE") {
            config.metadata.engine = engine;
        }
        if let Ok(url) = std::env::var("DARKROOM_DATABASE_URL") {
            config.metadata.database_url = url;
        }
        if let Ok(endpoint) = std::env::var("DARKROOM_MAIL_ENDPOINT") {
            config.mail.transport = "http".to_string();
            config.mail.endpoint = endpoint;
        }
        if let Ok(from) = std::env::var("DARKROOM_MAIL_FROM") {
            config.mail.from = from;
        }
        if let Ok(to) = std::env::var("DARKROOM_MAIL_TO") {
            config.mail.to = to;
        }
        if let Ok(level) = std::env::var("DARKROOM_LOG_LEVEL") {
            config.logging.level = level;
        }

        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 9040,
        }
    }
}

/// Pipeline-level policy knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Object key suffixes accepted by the format policy (case-sensitive)
    pub accepted_extensions: Vec<String>,
    /// Attempts made when an attribute update targets a not-yet-present record
    pub update_retry_attempts: u32,
    /// Delay between attribute-update attempts in milliseconds
    pub update_retry_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            accepted_extensions: crate::DEFAULT_ACCEPTED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            update_retry_attempts: 5,
            update_retry_delay_ms: 200,
        }
    }
}

impl PipelineConfig {
    pub fn update_retry_delay(&self) -> Duration {
        Duration::from_millis(self.update_retry_delay_ms)
    }
}

/// Delivery-guarantee knobs for the ingest queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSection {
    /// Receives before a message is escalated to the dead-letter queue
    pub max_receive_count: u32,
    /// Delay before a failed message becomes visible again, in milliseconds
    pub visibility_delay_ms: u64,
    /// Maximum messages handed to a consumer per batch
    pub batch_size: usize,
    /// Longest a partial batch is held before delivery, in milliseconds
    pub max_batch_window_ms: u64,
    /// Per-message processing budget; exceeding it counts as a failure
    pub processing_timeout_ms: u64,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            max_receive_count: crate::DEFAULT_MAX_RECEIVE_COUNT,
            visibility_delay_ms: 500,
            batch_size: crate::DEFAULT_BATCH_SIZE,
            max_batch_window_ms: 5000,
            processing_timeout_ms: 15_000,
        }
    }
}

impl QueueSection {
    pub fn visibility_delay(&self) -> Duration {
        Duration::from_millis(self.visibility_delay_ms)
    }

    pub fn max_batch_window(&self) -> Duration {
        Duration::from_millis(self.max_batch_window_ms)
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_millis(self.processing_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Backend type: `memory` or `postgres`
    pub engine: String,
    /// PostgreSQL connection string (postgres engine only)
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            engine: "memory".to_string(),
            database_url: "postgres://localhost/darkroom".to_string(),
            max_connections: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Transport type: `log` or `http`
    pub transport: String,
    /// Mail API endpoint (http transport only)
    pub endpoint: String,
    pub from: String,
    pub to: String,
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: "log".to_string(),
            endpoint: String::new(),
            from: "darkroom@localhost".to_string(),
            to: "uploads@localhost".to_string(),
            timeout_secs: 30,
        }
    }
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DarkroomConfig::default();
        assert_eq!(config.queue.max_receive_count, 3);
        assert_eq!(config.pipeline.accepted_extensions, vec![".jpeg", ".png"]);
        assert_eq!(config.metadata.engine, "memory");
        assert_eq!(config.mail.transport, "log");
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: DarkroomConfig = toml::from_str(
            r#"
            [queue]
            max_receive_count = 5
            visibility_delay_ms = 250
            batch_size = 10
            max_batch_window_ms = 1000
            processing_timeout_ms = 2000

            [mail]
            transport = "http"
            endpoint = "http://mail.internal/send"
            from = "pipeline@example.com"
            to = "ops@example.com"
            timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.queue.max_receive_count, 5);
        assert_eq!(config.queue.visibility_delay(), Duration::from_millis(250));
        assert_eq!(config.mail.endpoint, "http://mail.internal/send");
        // untouched sections fall back to defaults
        assert_eq!(config.server.port, 9040);
    }
}
