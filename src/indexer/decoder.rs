use alloy_dyn_abi::EventExt;
use alloy_json_abi::{Event, JsonAbi};
use alloy_primitives::{Address, B256};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::models::datasets::logs::{DecodedLog, RawLog};
use crate::models::errors::{ConfigError, DecodeFailure};

/// A contract interface with its events indexed by selector.
#[derive(Debug, Clone)]
pub struct AbiDefinition {
    abi: JsonAbi,
    events: HashMap<B256, Event>,
}

impl AbiDefinition {
    pub fn new(abi: JsonAbi) -> Self {
        // Anonymous events have no selector in topic0 and cannot be looked up
        let events = abi
            .events()
            .filter(|event| !event.anonymous)
            .map(|event| (event.selector(), event.clone()))
            .collect();
        Self { abi, events }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let abi: JsonAbi = serde_json::from_str(json).context("failed to parse JSON ABI")?;
        Ok(Self::new(abi))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        std::fs::read_to_string(path)
            .context("failed to read ABI file")
            .and_then(|json| Self::from_json_str(&json))
            .map_err(|source| ConfigError::AbiLoad {
                path: path.to_string_lossy().into_owned(),
                source,
            })
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    pub fn event(&self, selector: &B256) -> Option<&Event> {
        self.events.get(selector)
    }
}

/// Decodes raw logs against the ABI registered for their emitting address.
/// Failures are reported per log and never stop the rest of the batch.
#[derive(Debug, Clone, Default)]
pub struct LogDecoder {
    abis: HashMap<Address, Arc<AbiDefinition>>,
}

impl LogDecoder {
    pub fn new<I>(abis: I) -> Self
    where
        I: IntoIterator<Item = (Address, Arc<AbiDefinition>)>,
    {
        Self {
            abis: abis.into_iter().collect(),
        }
    }

    pub fn registered_addresses(&self) -> usize {
        self.abis.len()
    }

    /// Output is index-aligned with `logs`.
    pub fn decode_logs(&self, logs: &[RawLog]) -> Vec<Result<DecodedLog, DecodeFailure>> {
        logs.iter().map(|log| self.decode_log(log)).collect()
    }

    pub fn decode_log(&self, log: &RawLog) -> Result<DecodedLog, DecodeFailure> {
        let mismatch = |reason: String| DecodeFailure::DecodeTypeMismatch {
            address: log.address,
            reason,
        };

        let abi = self
            .abis
            .get(&log.address)
            .ok_or(DecodeFailure::NoAbiForAddress {
                address: log.address,
            })?;

        let selector = *log
            .topics
            .first()
            .ok_or_else(|| mismatch("log has no topic0".to_string()))?;

        let event = abi
            .event(&selector)
            .ok_or_else(|| mismatch(format!("no event with selector {selector} in ABI")))?;

        let decoded = event
            .decode_log_parts(log.topics.iter().copied(), &log.data)
            .map_err(|e| mismatch(format!("{} decode failed: {e}", event.name)))?;

        Ok(DecodedLog {
            block_number: log.block_number,
            log_index: log.log_index,
            transaction_hash: log.transaction_hash,
            address: log.address,
            selector,
            event_name: event.name.clone(),
            indexed: decoded.indexed,
            body: decoded.body,
        })
    }
}
