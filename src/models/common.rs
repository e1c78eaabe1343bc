use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "0.0.0.0".to_string(),
            port: 9100,
        }
    }
}

/// Transport-level retry settings. The pagination driver itself never retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network_name: String,
    pub hypersync_url: Url,
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    pub start_block: u64,
    #[serde(default)]
    pub end_block: Option<u64>,
    pub watched_addresses: Vec<String>,
    pub token_addresses: Vec<String>,
    pub event_signatures: Vec<String>,
    pub abi_path: String,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

/// Block range of one run. `end_block` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub start_block: u64,
    pub end_block: Option<u64>,
}
