use alloy_primitives::{Address, B256};
use serde::Serialize;

use crate::models::datasets::logs::RawLog;
use crate::models::datasets::transactions::RawTransaction;

////////////////////////////////////// Request ////////////////////////////////////////
/// One retrieval request. Serializes to the service's JSON query body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuerySpec {
    /// Inclusive.
    pub from_block: u64,
    /// Exclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_block: Option<u64>,
    pub logs: Vec<LogFilter>,
    pub transactions: Vec<TransactionFilter>,
    pub field_selection: FieldSelection,
}

/// A log matches when its address is in `address` and every topic slot matches the
/// corresponding entry of `topics`. An empty slot matches anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogFilter {
    pub address: Vec<Address>,
    pub topics: Vec<Vec<B256>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionFilter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub from: Vec<Address>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogField {
    BlockNumber,
    LogIndex,
    TransactionIndex,
    TransactionHash,
    Data,
    Address,
    Topic0,
    Topic1,
    Topic2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionField {
    BlockNumber,
    TransactionIndex,
    Hash,
    From,
    To,
    Value,
    Input,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSelection {
    pub log: Vec<LogField>,
    pub transaction: Vec<TransactionField>,
}

impl Default for FieldSelection {
    // These columns are what the page parser reads back; keep both in sync.
    fn default() -> Self {
        Self {
            log: vec![
                LogField::BlockNumber,
                LogField::LogIndex,
                LogField::TransactionIndex,
                LogField::TransactionHash,
                LogField::Data,
                LogField::Address,
                LogField::Topic0,
                LogField::Topic1,
                LogField::Topic2,
            ],
            transaction: vec![
                TransactionField::BlockNumber,
                TransactionField::TransactionIndex,
                TransactionField::Hash,
                TransactionField::From,
                TransactionField::To,
                TransactionField::Value,
                TransactionField::Input,
            ],
        }
    }
}

////////////////////////////////////// Response ///////////////////////////////////////
/// One page of results. Consumed by the merge step and then dropped.
#[derive(Debug, Clone, Default)]
pub struct QueryResponsePage {
    pub logs: Vec<RawLog>,
    pub transactions: Vec<RawTransaction>,
    pub next_block: u64,
    pub archive_height: u64,
    pub total_execution_time: Option<u64>,
}
