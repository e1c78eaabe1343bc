use std::sync::Arc;
use tracing::{error, info};

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use opentelemetry::metrics::{Counter, Gauge, Histogram, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::{MetricError, SdkMeterProvider};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;

pub struct Metrics {
    registry: Arc<prometheus::Registry>,
    _provider: SdkMeterProvider,
    pub network_name: String,

    // Page processing metrics
    pub pages_processed: Counter<u64>,
    pub latest_cursor: Gauge<u64>,
    pub latest_page_processing_time: Gauge<f64>,

    // Chain metrics
    pub archive_height: Gauge<u64>,

    // Decoding and aggregation metrics
    pub logs_decoded: Counter<u64>,
    pub decode_failures: Counter<u64>,
    pub transactions_merged: Counter<u64>,

    // Retrieval metrics
    pub query_requests: Counter<u64>,
    pub query_errors: Counter<u64>,
    pub query_latency: Histogram<f64>,
}

impl Metrics {
    pub fn new(network_name: String) -> Result<Self, MetricError> {
        let registry = prometheus::Registry::new();

        // Configure OpenTelemetry to use this registry
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        let meter = provider.meter("volume_indexer_metrics");

        let pages_processed = meter
            .u64_counter("volume_indexer_pages_processed")
            .with_description("Total number of response pages merged")
            .build();

        let latest_cursor = meter
            .u64_gauge("volume_indexer_latest_cursor")
            .with_description("Block number the next query starts from")
            .build();

        let latest_page_processing_time = meter
            .f64_gauge("volume_indexer_latest_page_processing")
            .with_description("Time spent requesting, decoding and merging the latest page")
            .with_unit("s")
            .build();

        let archive_height = meter
            .u64_gauge("volume_indexer_archive_height")
            .with_description("Highest block available from the service")
            .build();

        let logs_decoded = meter
            .u64_counter("volume_indexer_logs_decoded")
            .with_description("Number of logs decoded successfully")
            .build();

        let decode_failures = meter
            .u64_counter("volume_indexer_decode_failures")
            .with_description("Number of logs left out of aggregation, by reason")
            .build();

        let transactions_merged = meter
            .u64_counter("volume_indexer_transactions_merged")
            .with_description("Number of transactions with non-zero value merged")
            .build();

        let query_requests = meter
            .u64_counter("volume_indexer_query_requests")
            .with_description("Number of queries sent to the service")
            .build();

        let query_errors = meter
            .u64_counter("volume_indexer_query_errors")
            .with_description("Number of queries that failed")
            .build();

        let query_latency = meter
            .f64_histogram("volume_indexer_query_latency")
            .with_description("Query latency")
            .with_boundaries(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
            .with_unit("s")
            .build();

        Ok(Self {
            registry: Arc::new(registry),
            _provider: provider,
            network_name,
            pages_processed,
            latest_cursor,
            latest_page_processing_time,
            archive_height,
            logs_decoded,
            decode_failures,
            transactions_merged,
            query_requests,
            query_errors,
            query_latency,
        })
    }

    pub fn labels(&self) -> [KeyValue; 1] {
        [KeyValue::new("network", self.network_name.clone())]
    }

    pub fn labels_with(&self, key: &'static str, value: &'static str) -> [KeyValue; 2] {
        [
            KeyValue::new("network", self.network_name.clone()),
            KeyValue::new(key, value),
        ]
    }

    pub async fn start_metrics_server(&self, addr: &str, port: u16) -> Result<()> {
        let addr = format!("{addr}:{port}")
            .parse::<SocketAddr>()
            .context("invalid metrics address")?;
        let registry = self.registry.clone();

        let app = Router::new().route("/metrics", get(move || metrics_handler(registry.clone())));

        // Determine the access URL based on the binding address. Only used for logging.
        let access_url = if addr.ip().is_unspecified() {
            format!("http://localhost:{port}/metrics")
        } else {
            format!("http://{}:{port}/metrics", addr.ip())
        };

        info!(
            "Starting metrics server - binding to {} (accessible at {})",
            addr, access_url
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("failed to bind metrics server")?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Metrics server stopped: {}", e);
            }
        });

        Ok(())
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> String {
        encode_registry(&self.registry)
    }
}

async fn metrics_handler(registry: Arc<prometheus::Registry>) -> String {
    encode_registry(&registry)
}

fn encode_registry(registry: &prometheus::Registry) -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
