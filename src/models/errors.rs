use alloy_primitives::Address;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address format: {input:?} ({reason})")]
    InvalidAddressFormat { input: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid event signature {value:?}: expected 32-byte hex hash")]
    InvalidEventSignature { value: String },
    #[error("Failed to load ABI from {path}: {source}")]
    AbiLoad {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("No watched addresses configured")]
    EmptyWatchedAddresses,
    #[error("Invalid block range: end block {end_block} must be greater than start block {start_block}")]
    InvalidBlockRange { start_block: u64, end_block: u64 },
}

/// Fatal to the run. Every variant carries the cursor in effect when it happened so a
/// caller can resume from there.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Retrieval failed at block {cursor}: {source}")]
    Request {
        cursor: u64,
        #[source]
        source: anyhow::Error,
    },
    #[error("Cursor moved backwards: requested from block {from_block}, service reported next block {next_block}")]
    CursorRegression { from_block: u64, next_block: u64 },
    #[error("Cursor stalled at block {cursor} below archive height {archive_height}")]
    CursorStalled { cursor: u64, archive_height: u64 },
    #[error("Decoding task for page at block {cursor} failed: {source}")]
    DecodeTask {
        cursor: u64,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl RetrievalError {
    pub fn cursor(&self) -> u64 {
        match self {
            Self::Request { cursor, .. } => *cursor,
            Self::CursorRegression { from_block, .. } => *from_block,
            Self::CursorStalled { cursor, .. } => *cursor,
            Self::DecodeTask { cursor, .. } => *cursor,
        }
    }
}

/// Per-log failure. Recovered locally: the log is left out of aggregation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    #[error("No ABI registered for address {address}")]
    NoAbiForAddress { address: Address },
    #[error("Log from {address} does not match its ABI: {reason}")]
    DecodeTypeMismatch { address: Address, reason: String },
}

impl DecodeFailure {
    /// Short label used for metrics and log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoAbiForAddress { .. } => "no_abi_for_address",
            Self::DecodeTypeMismatch { .. } => "decode_type_mismatch",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    #[error("Invalid quantity {value:?}: expected 0x-prefixed hex or decimal digits")]
    InvalidQuantity { value: String },
}

#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("Missing required field in {record}: {field}")]
    MissingField { record: String, field: String },
}
