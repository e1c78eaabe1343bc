use alloy_primitives::{Address, Bytes, B256};
use anyhow::{anyhow, Result};
use num_bigint::BigUint;
use serde::Deserialize;

use crate::models::datasets::logs::RawLog;
use crate::models::datasets::query::QueryResponsePage;
use crate::models::datasets::transactions::RawTransaction;
use crate::models::errors::ResponseError;
use crate::utils::{hex_to_u64, parse_quantity};

////////////////////////////////////// Wire Data ////////////////////////////////////////
// Numbers arrive either as JSON numbers or as hex/decimal strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Number(u64),
    Text(String),
}

impl Quantity {
    fn to_u64(&self) -> Result<u64> {
        match self {
            Quantity::Number(n) => Ok(*n),
            Quantity::Text(s) if s.starts_with("0x") => {
                hex_to_u64(s).ok_or_else(|| anyhow!("invalid hex quantity {:?}", s))
            }
            Quantity::Text(s) => s
                .parse::<u64>()
                .map_err(|_| anyhow!("invalid quantity {:?}", s)),
        }
    }

    fn to_biguint(&self) -> Result<BigUint> {
        match self {
            Quantity::Number(n) => Ok(BigUint::from(*n)),
            Quantity::Text(s) => Ok(parse_quantity(s)?),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireLog {
    pub block_number: Option<Quantity>,
    pub log_index: Option<Quantity>,
    pub transaction_index: Option<Quantity>,
    pub transaction_hash: Option<B256>,
    pub address: Option<Address>,
    pub data: Option<Bytes>,
    #[serde(default)]
    pub topics: Option<Vec<Option<B256>>>,
    pub topic0: Option<B256>,
    pub topic1: Option<B256>,
    pub topic2: Option<B256>,
    pub topic3: Option<B256>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireTransaction {
    pub block_number: Option<Quantity>,
    pub transaction_index: Option<Quantity>,
    pub hash: Option<B256>,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub value: Option<Quantity>,
    pub input: Option<Bytes>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireBatch {
    #[serde(default)]
    pub logs: Vec<WireLog>,
    #[serde(default)]
    pub transactions: Vec<WireTransaction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireData {
    Batches(Vec<WireBatch>),
    Single(WireBatch),
}

impl Default for WireData {
    fn default() -> Self {
        WireData::Batches(Vec::new())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub data: WireData,
    pub archive_height: Option<Quantity>,
    pub next_block: Option<Quantity>,
    pub total_execution_time: Option<u64>,
}

////////////////////////////////////// Parsing ////////////////////////////////////////
pub trait PageParser {
    fn parse_page(self) -> Result<QueryResponsePage>;
}

impl PageParser for QueryResponse {
    fn parse_page(self) -> Result<QueryResponsePage> {
        let next_block = self
            .next_block
            .ok_or_else(|| missing("response", "next_block"))?
            .to_u64()?;
        let archive_height = self
            .archive_height
            .ok_or_else(|| missing("response", "archive_height"))?
            .to_u64()?;

        let batches = match self.data {
            WireData::Batches(batches) => batches,
            WireData::Single(batch) => vec![batch],
        };

        let mut logs = Vec::new();
        let mut transactions = Vec::new();
        for batch in batches {
            for log in batch.logs {
                logs.push(parse_log(log)?);
            }
            for tx in batch.transactions {
                transactions.push(parse_transaction(tx)?);
            }
        }

        Ok(QueryResponsePage {
            logs,
            transactions,
            next_block,
            archive_height,
            total_execution_time: self.total_execution_time,
        })
    }
}

fn missing(record: &str, field: &str) -> anyhow::Error {
    ResponseError::MissingField {
        record: record.to_string(),
        field: field.to_string(),
    }
    .into()
}

fn optional_u64(value: Option<Quantity>) -> Result<Option<u64>> {
    value.map(|q| q.to_u64()).transpose()
}

fn parse_log(log: WireLog) -> Result<RawLog> {
    // Topics are positional; stop at the first gap
    let topics: Vec<B256> = match log.topics {
        Some(topics) => topics.into_iter().map_while(|t| t).collect(),
        None => [log.topic0, log.topic1, log.topic2, log.topic3]
            .into_iter()
            .map_while(|t| t)
            .collect(),
    };

    Ok(RawLog {
        block_number: optional_u64(log.block_number)?,
        log_index: optional_u64(log.log_index)?,
        transaction_index: optional_u64(log.transaction_index)?,
        transaction_hash: log.transaction_hash,
        address: log.address.ok_or_else(|| missing("log", "address"))?,
        topics,
        data: log.data.unwrap_or_default(),
    })
}

fn parse_transaction(tx: WireTransaction) -> Result<RawTransaction> {
    let value = match tx.value {
        Some(value) => value.to_biguint()?,
        None => return Err(missing("transaction", "value")),
    };

    Ok(RawTransaction {
        block_number: optional_u64(tx.block_number)?,
        transaction_index: optional_u64(tx.transaction_index)?,
        hash: tx.hash,
        from: tx.from.ok_or_else(|| missing("transaction", "from"))?,
        to: tx.to,
        value,
        input: tx.input.unwrap_or_default(),
    })
}
