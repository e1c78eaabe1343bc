use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::{signal, sync::broadcast};
use tracing::{error, info};
use tracing_subscriber::{self, EnvFilter};

use transfer_volume_indexer::indexer::decoder::{AbiDefinition, LogDecoder};
use transfer_volume_indexer::indexer::query::QueryBuilder;
use transfer_volume_indexer::indexer::reporter::render_report;
use transfer_volume_indexer::indexer::rpc::HypersyncClient;
use transfer_volume_indexer::indexer::Indexer;
use transfer_volume_indexer::metrics::Metrics;
use transfer_volume_indexer::models::address::WatchedAddresses;
use transfer_volume_indexer::utils::{block_range, config_path, load_config, parse_event_signatures};

const CONFIG_FILE: &str = "config.yml";

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    info!("=========================== INITIALIZING ===========================");

    let config = match load_config(CONFIG_FILE) {
        Ok(config) => {
            info!("Config loaded successfully");
            config
        }
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return Err(e);
        }
    };

    // Everything below is validated before the first request goes out
    let watched = WatchedAddresses::normalize(&config.watched_addresses).inspect_err(|e| {
        error!("Watched addresses: {}", e);
    })?;
    let token_addresses = WatchedAddresses::normalize(&config.token_addresses)
        .inspect_err(|e| error!("Token addresses: {}", e))?
        .addresses();
    let event_signatures = parse_event_signatures(&config.event_signatures)?;
    let range = block_range(&config)?;

    let abi_path = match config_path(CONFIG_FILE).parent() {
        Some(dir) if Path::new(&config.abi_path).is_relative() => dir.join(&config.abi_path),
        _ => Path::new(&config.abi_path).to_path_buf(),
    };
    let abi = Arc::new(AbiDefinition::load(&abi_path).inspect_err(|e| error!("{:#}", e))?);
    info!("ABI loaded from {}", abi_path.to_string_lossy());

    // Every token contract shares the same interface
    let decoder = Arc::new(LogDecoder::new(
        token_addresses.iter().map(|address| (*address, Arc::clone(&abi))),
    ));

    info!(
        "Watching {} addresses across {} token contracts",
        watched.len(),
        decoder.registered_addresses()
    );

    let metrics = if config.metrics.enabled {
        let metrics = Metrics::new(config.network_name.clone())?;
        metrics
            .start_metrics_server(&config.metrics.address, config.metrics.port)
            .await?;
        Some(metrics)
    } else {
        info!("Metrics are disabled");
        None
    };

    let client = HypersyncClient::from_config(&config)?;
    info!("Query endpoint: {}", client.query_url());

    let builder = QueryBuilder::new(&token_addresses, &watched, &event_signatures, range);
    let indexer = Indexer::new(client, builder, decoder).with_metrics(metrics);

    // Cancellation is checked between pages
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        if let Ok(()) = signal::ctrl_c().await {
            info!("Received Ctrl+C signal, stopping after the current page...");
            let _ = shutdown_tx.send(());
        }
    });

    info!("========================= STARTING INDEXER =========================");

    let summary = match indexer.run(&mut shutdown_rx).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(
                "RetrievalError: {}. Resume from block {} to continue.",
                e,
                e.cursor()
            );
            return Err(e.into());
        }
    };

    for line in render_report(&summary.state, &watched) {
        println!("{line}");
    }

    if summary.cancelled {
        return Err(anyhow!(
            "Run cancelled before completion; resume from block {}",
            summary.final_cursor
        ));
    }

    Ok(())
}
