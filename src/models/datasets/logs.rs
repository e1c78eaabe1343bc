use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, B256};

////////////////////////////////////// RPC Data ////////////////////////////////////////
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawLog {
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
    pub transaction_index: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub address: Address,
    // topic0 first; trailing unselected or absent topics are not included
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/////////////////////////////////// Decoded Data ///////////////////////////////////
/// A log resolved against its contract's ABI. `indexed` and `body` keep the
/// declaration order of the event's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLog {
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub address: Address,
    pub selector: B256,
    pub event_name: String,
    pub indexed: Vec<DynSolValue>,
    pub body: Vec<DynSolValue>,
}
