use alloy_primitives::{Address, Bytes, B256};
use num_bigint::BigUint;

////////////////////////////////////// RPC Data ////////////////////////////////////////
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawTransaction {
    pub block_number: Option<u64>,
    pub transaction_index: Option<u64>,
    pub hash: Option<B256>,
    pub from: Address,
    pub to: Option<Address>, // None for contract creation
    pub value: BigUint,
    pub input: Bytes,
}
