pub mod aggregator;
pub mod decoder;
pub mod query;
pub mod reporter;
pub mod rpc;

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::indexer::aggregator::AggregateState;
use crate::indexer::decoder::LogDecoder;
use crate::indexer::query::QueryBuilder;
use crate::indexer::rpc::QueryClient;
use crate::metrics::Metrics;
use crate::models::datasets::query::QueryResponsePage;
use crate::models::errors::{DecodeFailure, RetrievalError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeFailureCounts {
    pub no_abi_for_address: u64,
    pub decode_type_mismatch: u64,
}

impl DecodeFailureCounts {
    fn record(&mut self, failure: &DecodeFailure) {
        match failure {
            DecodeFailure::NoAbiForAddress { .. } => self.no_abi_for_address += 1,
            DecodeFailure::DecodeTypeMismatch { .. } => self.decode_type_mismatch += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.no_abi_for_address + self.decode_type_mismatch
    }
}

/// Outcome of one run. `final_cursor` is the first block not yet merged.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub state: AggregateState,
    pub final_cursor: u64,
    pub archive_height: u64,
    pub pages: u64,
    pub logs_decoded: u64,
    pub transactions_merged: u64,
    pub decode_failures: DecodeFailureCounts,
    pub cancelled: bool,
}

enum DriverState {
    Idle,
    Requesting,
    Merging(QueryResponsePage),
    Done,
}

/// Drives the paginated query loop for one run and owns its aggregate state.
pub struct Indexer<C> {
    client: C,
    builder: QueryBuilder,
    decoder: Arc<LogDecoder>,
    metrics: Option<Metrics>,
}

impl<C: QueryClient> Indexer<C> {
    pub fn new(client: C, builder: QueryBuilder, decoder: Arc<LogDecoder>) -> Self {
        Self {
            client,
            builder,
            decoder,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// Request pages from the configured start block until the cursor reaches the archive
    /// height (or the configured end block). Pages are merged strictly in cursor order.
    /// Cancellation is honored between pages only.
    pub async fn run(
        &self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<RunSummary, RetrievalError> {
        let range = self.builder.range();
        let mut cursor = range.start_block;
        let mut summary = RunSummary {
            state: AggregateState::new(),
            final_cursor: cursor,
            archive_height: 0,
            pages: 0,
            logs_decoded: 0,
            transactions_merged: 0,
            decode_failures: DecodeFailureCounts::default(),
            cancelled: false,
        };
        let mut page_start = Instant::now();
        let mut state = DriverState::Idle;

        loop {
            state = match state {
                DriverState::Idle => {
                    info!(
                        "Starting from block {} (end block: {:?})",
                        cursor, range.end_block
                    );
                    DriverState::Requesting
                }
                DriverState::Requesting => {
                    if shutdown.try_recv().is_ok() {
                        info!("Shutdown requested, stopping before block {}", cursor);
                        summary.cancelled = true;
                        DriverState::Done
                    } else {
                        page_start = Instant::now();
                        DriverState::Merging(self.fetch_page(cursor).await?)
                    }
                }
                DriverState::Merging(page) => {
                    let from_block = cursor;
                    let next_block = page.next_block;
                    check_progress(from_block, &page, range.end_block)?;

                    summary.archive_height = page.archive_height;
                    self.merge_page(from_block, page, &mut summary).await?;
                    cursor = next_block;
                    summary.final_cursor = cursor;
                    summary.pages += 1;

                    self.record_page(cursor, summary.archive_height, page_start);

                    if is_exhausted(cursor, summary.archive_height, range.end_block) {
                        DriverState::Done
                    } else {
                        DriverState::Requesting
                    }
                }
                DriverState::Done => break,
            };
        }

        info!(
            "Run finished at block {} (archive height {}) after {} pages: {} logs decoded, {} decode failures, {} transactions merged",
            summary.final_cursor,
            summary.archive_height,
            summary.pages,
            summary.logs_decoded,
            summary.decode_failures.total(),
            summary.transactions_merged
        );

        Ok(summary)
    }

    async fn fetch_page(&self, cursor: u64) -> Result<QueryResponsePage, RetrievalError> {
        let query = self.builder.build(cursor);
        let start = Instant::now();

        if let Some(metrics) = &self.metrics {
            metrics.query_requests.add(1, &metrics.labels());
        }

        let result = self.client.send(&query).await;

        if let Some(metrics) = &self.metrics {
            metrics
                .query_latency
                .record(start.elapsed().as_secs_f64(), &metrics.labels());
            if result.is_err() {
                metrics.query_errors.add(1, &metrics.labels());
            }
        }

        result.map_err(|source| {
            error!("Query from block {} failed: {:#}", cursor, source);
            RetrievalError::Request { cursor, source }
        })
    }

    async fn merge_page(
        &self,
        cursor: u64,
        page: QueryResponsePage,
        summary: &mut RunSummary,
    ) -> Result<(), RetrievalError> {
        let QueryResponsePage {
            logs,
            transactions,
            next_block,
            archive_height,
            ..
        } = page;
        let log_count = logs.len();

        // Decode the whole page off the async runtime; nothing is merged until it is done
        let decoder = Arc::clone(&self.decoder);
        let decoded = tokio::task::spawn_blocking(move || decoder.decode_logs(&logs))
            .await
            .map_err(|source| RetrievalError::DecodeTask { cursor, source })?;

        let mut page_failures = DecodeFailureCounts::default();
        for result in decoded {
            match result.and_then(|log| summary.state.merge_decoded_log(&log)) {
                Ok(_) => summary.logs_decoded += 1,
                Err(failure) => {
                    debug!("Skipping log: {}", failure);
                    if let Some(metrics) = &self.metrics {
                        metrics
                            .decode_failures
                            .add(1, &metrics.labels_with("reason", failure.reason()));
                    }
                    page_failures.record(&failure);
                }
            }
        }

        let mut merged_transactions = 0;
        for tx in &transactions {
            if summary.state.merge_transaction(tx) {
                merged_transactions += 1;
            }
        }
        summary.transactions_merged += merged_transactions;

        if page_failures.total() > 0 {
            warn!(
                "Blocks [{}, {}): {} logs left out of aggregation ({} without ABI, {} not matching ABI)",
                cursor,
                next_block,
                page_failures.total(),
                page_failures.no_abi_for_address,
                page_failures.decode_type_mismatch
            );
        }
        summary.decode_failures.no_abi_for_address += page_failures.no_abi_for_address;
        summary.decode_failures.decode_type_mismatch += page_failures.decode_type_mismatch;

        if let Some(metrics) = &self.metrics {
            let decoded = log_count as u64 - page_failures.total();
            metrics.logs_decoded.add(decoded, &metrics.labels());
            metrics
                .transactions_merged
                .add(merged_transactions, &metrics.labels());
        }

        info!(
            "Blocks [{}, {}): {} logs, {} transactions. Next block to query is {} (archive height {})",
            cursor,
            next_block,
            log_count,
            transactions.len(),
            next_block,
            archive_height
        );

        Ok(())
    }

    fn record_page(&self, cursor: u64, archive_height: u64, page_start: Instant) {
        if let Some(metrics) = &self.metrics {
            let labels = metrics.labels();
            metrics.pages_processed.add(1, &labels);
            metrics.latest_cursor.record(cursor, &labels);
            metrics.archive_height.record(archive_height, &labels);
            metrics
                .latest_page_processing_time
                .record(page_start.elapsed().as_secs_f64(), &labels);
        }
    }
}

fn is_exhausted(cursor: u64, archive_height: u64, end_block: Option<u64>) -> bool {
    cursor >= archive_height || end_block.is_some_and(|end| cursor >= end)
}

// The cursor must move forward on every page that does not end the run, otherwise the
// loop would never terminate.
fn check_progress(
    from_block: u64,
    page: &QueryResponsePage,
    end_block: Option<u64>,
) -> Result<(), RetrievalError> {
    if page.next_block < from_block {
        return Err(RetrievalError::CursorRegression {
            from_block,
            next_block: page.next_block,
        });
    }
    if page.next_block == from_block && !is_exhausted(page.next_block, page.archive_height, end_block) {
        return Err(RetrievalError::CursorStalled {
            cursor: from_block,
            archive_height: page.archive_height,
        });
    }
    Ok(())
}
