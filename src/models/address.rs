use alloy_primitives::{hex, Address, B256};
use std::collections::HashSet;

use crate::models::errors::AddressError;

/// A watched address in every form the pipeline needs. Built once by
/// [`normalize_address`] and then only read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchedAddress {
    canonical: String,
    address: Address,
    topic: B256,
}

impl WatchedAddress {
    /// Lower-cased, `0x`-prefixed form.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Left-zero-padded 32-byte form used in topic filters.
    pub fn topic(&self) -> B256 {
        self.topic
    }
}

pub fn normalize_address(input: &str) -> Result<WatchedAddress, AddressError> {
    let invalid = |reason: &str| AddressError::InvalidAddressFormat {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let bytes = hex::decode(digits).map_err(|_| invalid("not valid hex"))?;
    if bytes.len() != 20 {
        return Err(invalid(&format!("expected 20 bytes, got {}", bytes.len())));
    }

    let address = Address::from_slice(&bytes);
    Ok(WatchedAddress {
        canonical: format!("0x{}", hex::encode(address)),
        address,
        topic: address.into_word(),
    })
}

/// Ordered, de-duplicated set of watched addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchedAddresses(Vec<WatchedAddress>);

impl WatchedAddresses {
    pub fn normalize<I, S>(inputs: I) -> Result<Self, AddressError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut addresses = Vec::new();
        for input in inputs {
            let watched = normalize_address(input.as_ref())?;
            if seen.insert(watched.address) {
                addresses.push(watched);
            }
        }
        Ok(Self(addresses))
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchedAddress> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.0.iter().map(WatchedAddress::address).collect()
    }

    pub fn topics(&self) -> Vec<B256> {
        self.0.iter().map(WatchedAddress::topic).collect()
    }

    pub fn canonical(&self) -> Vec<String> {
        self.0.iter().map(|a| a.canonical.clone()).collect()
    }
}
