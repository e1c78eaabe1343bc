pub mod retry;

use alloy_primitives::B256;
use anyhow::{Context, Result};
use num_bigint::BigUint;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::common::{BlockRange, Config};
use crate::models::errors::{ConfigError, QuantityError};

const CONFIG_PATH_ENV: &str = "INDEXER_CONFIG";
const CONFIG_ENV_PREFIX: &str = "INDEXER";

/// Resolve the config file: `INDEXER_CONFIG` if set, else `file_name` under the crate root.
pub fn config_path<P: AsRef<Path>>(file_name: P) -> PathBuf {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => Path::new(env!("CARGO_MANIFEST_DIR")).join(file_name),
    }
}

pub fn load_config<P: AsRef<Path>>(file_name: P) -> Result<Config> {
    let config_path = config_path(file_name);
    info!("Config path: {}", config_path.to_string_lossy());

    // File first, then INDEXER__* environment overrides (e.g. INDEXER__START_BLOCK)
    let settings = config::Config::builder()
        .add_source(config::File::from(config_path.as_path()))
        .add_source(config::Environment::with_prefix(CONFIG_ENV_PREFIX).separator("__"))
        .build()
        .context("failed to read config file")?;

    let mut config: Config = settings
        .try_deserialize()
        .context("failed to parse config YAML")?;

    config.network_name = config.network_name.replace('-', "_");

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.watched_addresses.is_empty() {
        return Err(ConfigError::EmptyWatchedAddresses);
    }
    block_range(config)?;
    parse_event_signatures(&config.event_signatures)?;
    Ok(())
}

pub fn block_range(config: &Config) -> Result<BlockRange, ConfigError> {
    if let Some(end_block) = config.end_block {
        if end_block <= config.start_block {
            return Err(ConfigError::InvalidBlockRange {
                start_block: config.start_block,
                end_block,
            });
        }
    }
    Ok(BlockRange {
        start_block: config.start_block,
        end_block: config.end_block,
    })
}

pub fn parse_event_signatures<S: AsRef<str>>(values: &[S]) -> Result<Vec<B256>, ConfigError> {
    values
        .iter()
        .map(|value| {
            let value = value.as_ref();
            value
                .trim()
                .parse::<B256>()
                .map_err(|_| ConfigError::InvalidEventSignature {
                    value: value.to_string(),
                })
        })
        .collect()
}

/// Parse a quantity that arrives as text: `0x`-prefixed hex or plain decimal.
/// Never coerces; anything else is an error.
pub fn parse_quantity(value: &str) -> Result<BigUint, QuantityError> {
    let invalid = || QuantityError::InvalidQuantity {
        value: value.to_string(),
    };

    let trimmed = value.trim();
    if let Some(digits) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        if digits.is_empty() {
            // "0x" is how some nodes encode zero
            return Ok(BigUint::default());
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        return BigUint::parse_bytes(digits.as_bytes(), 16).ok_or_else(invalid);
    }

    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    BigUint::parse_bytes(trimmed.as_bytes(), 10).ok_or_else(invalid)
}

pub fn hex_to_u64(hex: &str) -> Option<u64> {
    u64::from_str_radix(hex.trim_start_matches("0x"), 16).ok()
}

fn strip_html(error: &str) -> String {
    // If the error contains HTML tags, extract just the text content
    if error.contains("<!doctype html>") || error.contains("<html>") {
        error
            .lines()
            .map(|line| line.trim())
            .find(|line| {
                !line.starts_with('<')
                    && !line.ends_with('>')
                    && !line.is_empty()
                    && *line != "html"
                    && *line != "body"
            })
            .unwrap_or(error)
            .to_string()
    } else {
        error.to_string()
    }
}
