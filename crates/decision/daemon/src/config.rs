//! Configuration for decisiond

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use decision_degradation::DegradationConfig;
use decision_engine::EngineConfig;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub degradation: DegradationSection,

    #[serde(default)]
    pub witness: WitnessConfig,

    #[serde(default)]
    pub authority: AuthorityConfig,

    #[serde(default)]
    pub declaration: DeclarationConfig,

    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Token for the administrative path (`x-operator-token`). Admin routes
    /// are disabled when unset.
    #[serde(default)]
    pub operator_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            enable_cors: true,
            request_timeout_secs: default_request_timeout(),
            max_body_size: default_max_body_size(),
            operator_token: None,
        }
    }
}

/// Ledger storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory ledger (development/testing; nothing survives restart)
    #[default]
    Memory,

    /// Durable JSON-lines ledger
    File { path: PathBuf },
}

/// Shape check applied to payloads before commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    #[default]
    Any,
    NonEmpty,
    JsonObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,

    /// Extra wait for a caller whose write already started
    #[serde(default = "default_claimed_grace_ms")]
    pub claimed_grace_ms: u64,

    /// Durable writes slower than this count toward degradation
    #[serde(default = "default_write_latency_threshold_ms")]
    pub write_latency_threshold_ms: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    #[serde(default)]
    pub payload_format: PayloadFormat,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            submit_timeout_ms: default_submit_timeout_ms(),
            claimed_grace_ms: default_claimed_grace_ms(),
            write_latency_threshold_ms: default_write_latency_threshold_ms(),
            queue_capacity: default_queue_capacity(),
            max_payload_bytes: default_max_payload_bytes(),
            payload_format: PayloadFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationSection {
    /// Consecutive degraded-origin or failed outcomes before degrading (K)
    #[serde(default = "default_degrade_after")]
    pub degrade_after: u32,

    /// Consecutive normal outcomes before recovering (M)
    #[serde(default = "default_recover_after")]
    pub recover_after: u32,

    /// JSON-lines incident log; kept in memory when unset
    #[serde(default)]
    pub incident_log: Option<PathBuf>,
}

impl Default for DegradationSection {
    fn default() -> Self {
        Self {
            degrade_after: default_degrade_after(),
            recover_after: default_recover_after(),
            incident_log: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessConfig {
    /// Trailing entries whose constraint keys are reported
    #[serde(default = "default_acknowledgment_window")]
    pub acknowledgment_window: usize,
}

impl Default for WitnessConfig {
    fn default() -> Self {
        Self {
            acknowledgment_window: default_acknowledgment_window(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// Accepted authority tokens
    #[serde(default)]
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeclarationConfig {
    /// Constraint-declaration channel manifest. When set but unreadable at
    /// startup, the system starts Degraded.
    #[serde(default)]
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Entries per signed checkpoint; zero disables
    #[serde(default = "default_cadence")]
    pub cadence: u64,

    /// File holding the hex Ed25519 seed; an ephemeral key is used when unset
    #[serde(default)]
    pub signing_key: Option<PathBuf>,

    #[serde(default = "default_key_id")]
    pub key_id: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            cadence: default_cadence(),
            signing_key: None,
            key_id: default_key_id(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
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

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

fn default_submit_timeout_ms() -> u64 {
    2_000
}

fn default_claimed_grace_ms() -> u64 {
    1_000
}

fn default_write_latency_threshold_ms() -> u64 {
    250
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_payload_bytes() -> usize {
    64 * 1024
}

fn default_degrade_after() -> u32 {
    1
}

fn default_recover_after() -> u32 {
    3
}

fn default_acknowledgment_window() -> usize {
    8
}

fn default_cadence() -> u64 {
    10
}

fn default_key_id() -> String {
    "decisiond".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `DECISIOND_*` environment variables (`__` separates sections).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DECISIOND")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("authority.tokens")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            submit_timeout: Duration::from_millis(self.engine.submit_timeout_ms),
            claimed_grace: Duration::from_millis(self.engine.claimed_grace_ms),
            queue_capacity: self.engine.queue_capacity,
            max_payload_bytes: self.engine.max_payload_bytes,
            acknowledgment_window: self.witness.acknowledgment_window,
            checkpoint_cadence: self.checkpoint.cadence,
        }
    }

    pub fn degradation_config(&self) -> DegradationConfig {
        DegradationConfig {
            degrade_after: self.degradation.degrade_after,
            recover_after: self.degradation.recover_after,
            slow_write_threshold_ms: Some(self.engine.write_latency_threshold_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert_eq!(config.degradation.degrade_after, 1);
        assert_eq!(config.degradation.recover_after, 3);
        assert_eq!(config.checkpoint.cadence, 10);
        assert!(config.server.operator_token.is_none());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisiond.toml");
        std::fs::write(
            &path,
            r#"
[server]
listen_addr = "0.0.0.0:9000"
operator_token = "root-op"

[storage]
type = "file"
path = "/var/lib/decisiond/ledger.jsonl"

[engine]
submit_timeout_ms = 500
payload_format = "json_object"

[degradation]
degrade_after = 2
recover_after = 5

[authority]
tokens = ["ops:alpha", "audit:beta"]
"#,
        )
        .unwrap();

        let config = DaemonConfig::load(path.to_str()).unwrap();
        assert_eq!(config.server.listen_addr.port(), 9000);
        assert_eq!(config.server.operator_token.as_deref(), Some("root-op"));
        assert!(matches!(config.storage, StorageConfig::File { .. }));
        assert_eq!(config.engine.payload_format, PayloadFormat::JsonObject);
        assert_eq!(config.authority.tokens.len(), 2);

        let engine = config.engine_config();
        assert_eq!(engine.submit_timeout, Duration::from_millis(500));
        assert_eq!(engine.claimed_grace, Duration::from_secs(1));
        let degradation = config.degradation_config();
        assert_eq!(degradation.degrade_after, 2);
        assert_eq!(degradation.recover_after, 5);
        assert_eq!(degradation.slow_write_threshold_ms, Some(250));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(DaemonConfig::load(Some("/nonexistent/decisiond.toml")).is_err());
    }
}
