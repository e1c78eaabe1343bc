use alloy_primitives::{Address, B256};

use crate::models::address::WatchedAddresses;
use crate::models::common::BlockRange;
use crate::models::datasets::query::{FieldSelection, LogFilter, QuerySpec, TransactionFilter};

/// Builds the per-page query. Filters are derived once in [`QueryBuilder::new`]; only
/// the cursor changes between pages.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    range: BlockRange,
    logs: Vec<LogFilter>,
    transactions: Vec<TransactionFilter>,
    field_selection: FieldSelection,
}

impl QueryBuilder {
    pub fn new(
        token_addresses: &[Address],
        watched: &WatchedAddresses,
        event_signatures: &[B256],
        range: BlockRange,
    ) -> Self {
        let watched_topics = watched.topics();
        let watched_addresses = watched.addresses();

        // A Transfer carries one address per slot, so match the watched set in either
        // the `from` slot or the `to` slot, never both at once.
        let logs = vec![
            LogFilter {
                address: token_addresses.to_vec(),
                topics: vec![event_signatures.to_vec(), watched_topics.clone(), vec![]],
            },
            LogFilter {
                address: token_addresses.to_vec(),
                topics: vec![event_signatures.to_vec(), vec![], watched_topics],
            },
        ];

        let transactions = vec![
            TransactionFilter {
                from: watched_addresses.clone(),
                to: vec![],
            },
            TransactionFilter {
                from: vec![],
                to: watched_addresses,
            },
        ];

        Self {
            range,
            logs,
            transactions,
            field_selection: FieldSelection::default(),
        }
    }

    pub fn range(&self) -> BlockRange {
        self.range
    }

    pub fn build(&self, cursor: u64) -> QuerySpec {
        QuerySpec {
            from_block: cursor,
            to_block: self.range.end_block,
            logs: self.logs.clone(),
            transactions: self.transactions.clone(),
            field_selection: self.field_selection.clone(),
        }
    }
}
