use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};
use num_bigint::BigUint;
use std::collections::BTreeMap;

use crate::models::datasets::logs::DecodedLog;
use crate::models::datasets::transactions::RawTransaction;
use crate::models::errors::DecodeFailure;

/// Running "volume touched" totals for one run. Totals only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateState {
    token_volume: BTreeMap<Address, BigUint>,
    native_volume: BTreeMap<Address, BigUint>,
}

impl AggregateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` to both parties. A self-transfer is credited twice.
    pub fn add_token_transfer(&mut self, from: Address, to: Address, amount: &BigUint) {
        credit_both(&mut self.token_volume, from, to, amount);
    }

    pub fn add_native_transfer(&mut self, from: Address, to: Address, amount: &BigUint) {
        credit_both(&mut self.native_volume, from, to, amount);
    }

    /// Merge a decoded transfer event. Returns `Ok(false)` for a zero amount, and a
    /// `DecodeTypeMismatch` when the values are not `(address, address) / (uint, ..)`.
    pub fn merge_decoded_log(&mut self, log: &DecodedLog) -> Result<bool, DecodeFailure> {
        let (from, to, amount) = transfer_parts(log)?;
        if amount == U256::ZERO {
            return Ok(false);
        }
        self.add_token_transfer(from, to, &u256_to_biguint(amount));
        Ok(true)
    }

    /// Merge a raw transaction's value. Contract creations have no recipient, so only
    /// the sender is credited.
    pub fn merge_transaction(&mut self, tx: &RawTransaction) -> bool {
        if tx.value == BigUint::default() {
            return false;
        }
        match tx.to {
            Some(to) => self.add_native_transfer(tx.from, to, &tx.value),
            None => credit(&mut self.native_volume, tx.from, &tx.value),
        }
        true
    }

    pub fn token_volume(&self, address: &Address) -> BigUint {
        self.token_volume.get(address).cloned().unwrap_or_default()
    }

    pub fn native_volume(&self, address: &Address) -> BigUint {
        self.native_volume.get(address).cloned().unwrap_or_default()
    }

    pub fn token_entries(&self) -> usize {
        self.token_volume.len()
    }

    pub fn native_entries(&self) -> usize {
        self.native_volume.len()
    }
}

fn credit_both(totals: &mut BTreeMap<Address, BigUint>, from: Address, to: Address, amount: &BigUint) {
    if *amount == BigUint::default() {
        return;
    }
    credit(totals, from, amount);
    credit(totals, to, amount);
}

fn credit(totals: &mut BTreeMap<Address, BigUint>, address: Address, amount: &BigUint) {
    *totals.entry(address).or_default() += amount;
}

fn transfer_parts(log: &DecodedLog) -> Result<(Address, Address, U256), DecodeFailure> {
    let mismatch = |reason: &str| DecodeFailure::DecodeTypeMismatch {
        address: log.address,
        reason: format!("{}: {reason}", log.event_name),
    };

    let from = match log.indexed.first() {
        Some(DynSolValue::Address(address)) => *address,
        _ => return Err(mismatch("indexed[0] is not an address")),
    };
    let to = match log.indexed.get(1) {
        Some(DynSolValue::Address(address)) => *address,
        _ => return Err(mismatch("indexed[1] is not an address")),
    };
    let amount = match log.body.first() {
        Some(DynSolValue::Uint(amount, _)) => *amount,
        _ => return Err(mismatch("body[0] is not an unsigned integer")),
    };
    Ok((from, to, amount))
}

pub fn u256_to_biguint(value: U256) -> BigUint {
    BigUint::from_bytes_be(&value.to_be_bytes::<32>())
}
