use std::sync::Arc;

use anyhow::{Context, Result};
use blockme_indexer::helpers::app_config::AppConfig;
use blockme_indexer::helpers::logging::init_logging;
use blockme_indexer::services::chain::JsonRpcChainClient;
use blockme_indexer::services::ingestion::{EngineConfig, IngestionEngine, InsertionErrorLog};
use blockme_sqlx::PgLedgerStore;
use dotenv::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Default allocator change
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let config = AppConfig::load_from_env().context("Invalid configuration")?;
    let _log_guards = init_logging(&config)?;

    info!("🏁 Starting blockme indexer");
    debug!(
        "rpc_url={}, schema={}, chunk_size={}, workers={}, request_delay={:?}",
        config.rpc_url(),
        config.schema,
        config.chunk_size,
        config.workers,
        config.request_delay()
    );

    let storage = match PgLedgerStore::connect(&config.database_url(), &config.schema).await {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            error!("Can't initialize the mirror: {}", e);
            return Err(e.into());
        }
    };
    let client = Arc::new(JsonRpcChainClient::from_config(&config)?);

    let cancellation = CancellationToken::new();
    let on_signal = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current chunk");
            on_signal.cancel();
        }
    });

    let engine = IngestionEngine::new(
        storage,
        client,
        EngineConfig::from_app_config(&config)?,
        Arc::new(InsertionErrorLog::new()),
        cancellation,
    );
    let report = engine.run().await?;

    if report.error_count() > 0 {
        warn!(
            "Skipped blocks and chunks are listed in {}",
            config.insertion_error_file
        );
    }
    if !report.cancelled {
        info!("✅ Run complete up to block {}", report.remote_frontier);
    }
    Ok(())
}
