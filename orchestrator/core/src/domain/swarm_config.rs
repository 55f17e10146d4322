// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Swarm Configuration Manifest
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing one
// swarm: topology, event bus sizing, execution limits, health thresholds,
// consensus defaults and observability settings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::consensus::ConsensusConfig;
use crate::domain::metrics::HealthThresholds;
use crate::domain::topology::SwarmTopology;

pub const API_VERSION: &str = "conclave.dev/v1";
pub const KIND: &str = "SwarmConfig";

/// Top-level swarm configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfigManifest {
    /// API version (must be "conclave.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "SwarmConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: SwarmConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable swarm name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwarmConfigSpec {
    #[serde(default)]
    pub topology: SwarmTopology,

    #[serde(default)]
    pub event_bus: EventBusConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub health: HealthThresholds,

    #[serde(default)]
    pub consensus: ConsensusConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// Events buffered per subscriber before the slowest one lags
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Upper bound on simultaneous executions within one batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// Cancel an agent's in-flight executions when it is terminated
    #[serde(default)]
    pub cancel_in_flight_on_terminate: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Expose a Prometheus scrape endpoint
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_bus_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for SwarmConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "conclave-swarm".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: SwarmConfigSpec::default(),
        }
    }
}

impl SwarmConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CONCLAVE_CONFIG_PATH environment variable
    /// 2. ./conclave-config.yaml (working directory)
    /// 3. ~/.conclave/config.yaml (user home)
    /// 4. /etc/conclave/config.yaml (system, Unix) or C:\ProgramData\Conclave\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CONCLAVE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./conclave-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".conclave").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/conclave/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Conclave\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Invalid values are logged and ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("CONCLAVE_TOPOLOGY") {
            match val.parse::<SwarmTopology>() {
                Ok(topology) => {
                    tracing::info!("Environment override: CONCLAVE_TOPOLOGY={}", topology);
                    self.spec.topology = topology;
                }
                Err(e) => tracing::warn!("Invalid value for CONCLAVE_TOPOLOGY: {}. Ignoring.", e),
            }
        }

        if let Some(val) = lookup("CONCLAVE_QUORUM_SIZE") {
            match val.parse::<usize>() {
                Ok(n) => {
                    tracing::info!("Environment override: CONCLAVE_QUORUM_SIZE={}", n);
                    self.spec.consensus.quorum_size = n;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for CONCLAVE_QUORUM_SIZE: '{}'. Expected a positive integer. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("CONCLAVE_VOTE_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) => {
                    tracing::info!("Environment override: CONCLAVE_VOTE_TIMEOUT_MS={}", ms);
                    self.spec.consensus.vote_timeout_ms = ms;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for CONCLAVE_VOTE_TIMEOUT_MS: '{}'. Expected milliseconds. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("CONCLAVE_EVENT_BUS_CAPACITY") {
            match val.parse::<usize>() {
                Ok(capacity) => {
                    tracing::info!("Environment override: CONCLAVE_EVENT_BUS_CAPACITY={}", capacity);
                    self.spec.event_bus.capacity = capacity;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for CONCLAVE_EVENT_BUS_CAPACITY: '{}'. Ignoring.",
                    val
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.event_bus.capacity == 0 {
            anyhow::bail!("spec.event_bus.capacity must be greater than 0");
        }

        if self.spec.execution.max_concurrency == Some(0) {
            anyhow::bail!("spec.execution.max_concurrency must be greater than 0 when set");
        }

        let health = &self.spec.health;
        if health.unhealthy_success_rate > health.degraded_success_rate {
            anyhow::bail!(
                "spec.health.unhealthy_success_rate ({}) must not exceed degraded_success_rate ({})",
                health.unhealthy_success_rate,
                health.degraded_success_rate
            );
        }
        if health.unhealthy_consecutive_failures < health.degraded_consecutive_failures {
            anyhow::bail!(
                "spec.health.unhealthy_consecutive_failures must be at least degraded_consecutive_failures"
            );
        }

        self.spec
            .consensus
            .validate()
            .map_err(|e| anyhow::anyhow!("spec.consensus: {}", e))?;

        Ok(())
    }
}
