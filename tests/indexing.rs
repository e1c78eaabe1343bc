use alloy_primitives::{address, b256, Address, Bytes, B256, U256};
use anyhow::{anyhow, Result};
use num_bigint::BigUint;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use transfer_volume_indexer::indexer::decoder::{AbiDefinition, LogDecoder};
use transfer_volume_indexer::indexer::query::QueryBuilder;
use transfer_volume_indexer::indexer::reporter::render_report;
use transfer_volume_indexer::indexer::rpc::QueryClient;
use transfer_volume_indexer::indexer::Indexer;
use transfer_volume_indexer::models::address::WatchedAddresses;
use transfer_volume_indexer::models::common::BlockRange;
use transfer_volume_indexer::models::datasets::logs::RawLog;
use transfer_volume_indexer::models::datasets::query::{QueryResponsePage, QuerySpec};
use transfer_volume_indexer::models::datasets::transactions::RawTransaction;
use transfer_volume_indexer::models::errors::RetrievalError;

const ERC20_ABI: &str = include_str!("../abi/erc20.abi.json");

const TRANSFER: B256 = b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");
const TOKEN: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
const UNREGISTERED: Address = address!("cccccccccccccccccccccccccccccccccccccccc");
const AAA: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
const BBB: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");

const START_BLOCK: u64 = 15_000_000;
const ARCHIVE_HEIGHT: u64 = 15_000_500;

/// Replays scripted pages and records every query it receives.
#[derive(Clone, Default)]
struct ScriptedClient {
    pages: Arc<Mutex<VecDeque<Result<QueryResponsePage>>>>,
    queries: Arc<Mutex<Vec<QuerySpec>>>,
}

impl ScriptedClient {
    fn new(pages: Vec<Result<QueryResponsePage>>) -> Self {
        Self {
            pages: Arc::new(Mutex::new(pages.into())),
            queries: Arc::default(),
        }
    }

    fn from_blocks(&self) -> Vec<u64> {
        self.queries.lock().unwrap().iter().map(|q| q.from_block).collect()
    }
}

impl QueryClient for ScriptedClient {
    async fn send(&self, query: &QuerySpec) -> Result<QueryResponsePage> {
        self.queries.lock().unwrap().push(query.clone());
        let next = self.pages.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(anyhow!("no more scripted pages")))
    }
}

fn transfer_log(token: Address, from: Address, to: Address, amount: u64) -> RawLog {
    RawLog {
        block_number: Some(START_BLOCK + 1),
        log_index: Some(0),
        transaction_index: Some(0),
        transaction_hash: Some(B256::repeat_byte(0x01)),
        address: token,
        topics: vec![TRANSFER, from.into_word(), to.into_word()],
        data: Bytes::from(U256::from(amount).to_be_bytes::<32>().to_vec()),
    }
}

fn value_tx(from: Address, to: Address, value: u64) -> RawTransaction {
    RawTransaction {
        block_number: Some(START_BLOCK + 1),
        transaction_index: Some(0),
        hash: Some(B256::repeat_byte(0x01)),
        from,
        to: Some(to),
        value: BigUint::from(value),
        input: Bytes::new(),
    }
}

fn page(
    logs: Vec<RawLog>,
    transactions: Vec<RawTransaction>,
    next_block: u64,
) -> Result<QueryResponsePage> {
    Ok(QueryResponsePage {
        logs,
        transactions,
        next_block,
        archive_height: ARCHIVE_HEIGHT,
        total_execution_time: Some(10),
    })
}

fn watched() -> WatchedAddresses {
    WatchedAddresses::normalize([
        "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
        "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
    ])
    .unwrap()
}

fn indexer(client: ScriptedClient, end_block: Option<u64>) -> Indexer<ScriptedClient> {
    let abi = Arc::new(AbiDefinition::from_json_str(ERC20_ABI).unwrap());
    let decoder = Arc::new(LogDecoder::new([(TOKEN, abi)]));
    let builder = QueryBuilder::new(
        &[TOKEN],
        &watched(),
        &[TRANSFER],
        BlockRange {
            start_block: START_BLOCK,
            end_block,
        },
    );
    Indexer::new(client, builder, decoder)
}

#[tokio::test]
async fn test_two_page_run_aggregates_both_asset_classes() {
    let client = ScriptedClient::new(vec![
        page(
            vec![transfer_log(TOKEN, AAA, BBB, 500)],
            vec![value_tx(AAA, BBB, 10)],
            15_000_100,
        ),
        page(vec![], vec![], ARCHIVE_HEIGHT),
    ]);
    let (_tx, mut shutdown) = broadcast::channel(1);

    let summary = indexer(client.clone(), None).run(&mut shutdown).await.unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(client.from_blocks(), vec![START_BLOCK, 15_000_100]);
    assert_eq!(summary.final_cursor, ARCHIVE_HEIGHT);
    assert_eq!(summary.archive_height, ARCHIVE_HEIGHT);
    assert!(!summary.cancelled);

    assert_eq!(summary.state.token_volume(&AAA), BigUint::from(500u32));
    assert_eq!(summary.state.token_volume(&BBB), BigUint::from(500u32));
    assert_eq!(summary.state.native_volume(&AAA), BigUint::from(10u32));
    assert_eq!(summary.state.native_volume(&BBB), BigUint::from(10u32));
    assert_eq!(summary.logs_decoded, 1);
    assert_eq!(summary.transactions_merged, 1);

    let report = render_report(&summary.state, &watched());
    assert_eq!(
        report,
        vec![
            "ERC20 transfer volume for address 0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa is 500",
            "ERC20 transfer volume for address 0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb is 500",
            "WEI transfer volume for address 0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa is 10",
            "WEI transfer volume for address 0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb is 10",
        ]
    );
}

#[tokio::test]
async fn test_cursor_follows_next_block() {
    let client = ScriptedClient::new(vec![
        page(vec![], vec![], 15_000_010),
        page(vec![], vec![], 15_000_250),
        page(vec![], vec![], 15_000_251),
        page(vec![], vec![], ARCHIVE_HEIGHT),
    ]);
    let (_tx, mut shutdown) = broadcast::channel(1);

    let summary = indexer(client.clone(), None).run(&mut shutdown).await.unwrap();

    let from_blocks = client.from_blocks();
    assert_eq!(
        from_blocks,
        vec![START_BLOCK, 15_000_010, 15_000_250, 15_000_251]
    );
    assert!(from_blocks.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(summary.pages, 4);
}

#[tokio::test]
async fn test_end_block_bounds_the_run() {
    let client = ScriptedClient::new(vec![
        page(vec![], vec![], 15_000_100),
        page(vec![], vec![], 15_000_200),
        page(vec![], vec![], 15_000_300),
    ]);
    let (_tx, mut shutdown) = broadcast::channel(1);

    let summary = indexer(client.clone(), Some(15_000_200))
        .run(&mut shutdown)
        .await
        .unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.final_cursor, 15_000_200);
    let queries = client.queries.lock().unwrap();
    assert!(queries.iter().all(|q| q.to_block == Some(15_000_200)));
}

#[tokio::test]
async fn test_undecodable_log_is_isolated() {
    let client = ScriptedClient::new(vec![page(
        vec![
            transfer_log(TOKEN, AAA, BBB, 500),
            transfer_log(UNREGISTERED, AAA, BBB, 9_999),
        ],
        vec![],
        ARCHIVE_HEIGHT,
    )]);
    let (_tx, mut shutdown) = broadcast::channel(1);

    let summary = indexer(client, None).run(&mut shutdown).await.unwrap();

    assert_eq!(summary.logs_decoded, 1);
    assert_eq!(summary.decode_failures.no_abi_for_address, 1);
    assert_eq!(summary.decode_failures.decode_type_mismatch, 0);
    assert_eq!(summary.state.token_volume(&AAA), BigUint::from(500u32));
    assert_eq!(summary.state.token_volume(&BBB), BigUint::from(500u32));
}

#[tokio::test]
async fn test_truncated_log_counts_as_type_mismatch() {
    let mut truncated = transfer_log(TOKEN, AAA, BBB, 500);
    truncated.data = Bytes::from(vec![0u8; 8]);
    let client = ScriptedClient::new(vec![page(vec![truncated], vec![], ARCHIVE_HEIGHT)]);
    let (_tx, mut shutdown) = broadcast::channel(1);

    let summary = indexer(client, None).run(&mut shutdown).await.unwrap();

    assert_eq!(summary.decode_failures.decode_type_mismatch, 1);
    assert_eq!(summary.state.token_entries(), 0);
}

#[tokio::test]
async fn test_zero_value_records_create_no_entries() {
    let client = ScriptedClient::new(vec![page(
        vec![transfer_log(TOKEN, AAA, BBB, 0)],
        vec![value_tx(AAA, BBB, 0)],
        ARCHIVE_HEIGHT,
    )]);
    let (_tx, mut shutdown) = broadcast::channel(1);

    let summary = indexer(client, None).run(&mut shutdown).await.unwrap();

    assert_eq!(summary.state.token_entries(), 0);
    assert_eq!(summary.state.native_entries(), 0);
    assert_eq!(summary.transactions_merged, 0);
}

#[tokio::test]
async fn test_retrieval_error_carries_cursor() {
    let client = ScriptedClient::new(vec![
        page(vec![transfer_log(TOKEN, AAA, BBB, 500)], vec![], 15_000_100),
        Err(anyhow!("connection reset")),
    ]);
    let (_tx, mut shutdown) = broadcast::channel(1);

    let err = indexer(client, None).run(&mut shutdown).await.unwrap_err();

    assert!(matches!(err, RetrievalError::Request { cursor: 15_000_100, .. }));
    assert_eq!(err.cursor(), 15_000_100);
}

#[tokio::test]
async fn test_cursor_regression_aborts_run() {
    let client = ScriptedClient::new(vec![
        page(vec![], vec![], 15_000_100),
        page(vec![], vec![], 15_000_050),
    ]);
    let (_tx, mut shutdown) = broadcast::channel(1);

    let err = indexer(client, None).run(&mut shutdown).await.unwrap_err();

    assert!(matches!(
        err,
        RetrievalError::CursorRegression {
            from_block: 15_000_100,
            next_block: 15_000_050
        }
    ));
}

#[tokio::test]
async fn test_stalled_cursor_aborts_run() {
    let client = ScriptedClient::new(vec![page(vec![], vec![], START_BLOCK)]);
    let (_tx, mut shutdown) = broadcast::channel(1);

    let err = indexer(client, None).run(&mut shutdown).await.unwrap_err();

    assert!(matches!(err, RetrievalError::CursorStalled { cursor: START_BLOCK, .. }));
}

#[tokio::test]
async fn test_cancellation_is_checked_before_each_request() {
    let client = ScriptedClient::new(vec![page(vec![], vec![], 15_000_100)]);
    let (tx, mut shutdown) = broadcast::channel(1);
    tx.send(()).unwrap();

    let summary = indexer(client.clone(), None).run(&mut shutdown).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.pages, 0);
    assert_eq!(summary.final_cursor, START_BLOCK);
    assert!(client.from_blocks().is_empty());
}
