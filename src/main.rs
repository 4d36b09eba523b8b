use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ergon::api::{create_router, AppState};
use ergon::chain::{DryRunLedger, ResourceLedger, TronGridClient};
use ergon::config::AppConfig;
use ergon::engine::FulfillmentEngine;
use ergon::pool::SupplierPool;
use ergon::services::{SupplierRefresher, Sweeper, SweeperConfig};
use ergon::storage::PostgresStore;
use ergon::Result;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = AppConfig::load()?;
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("config: {e}");
        }
        return Err(ergon::ErgonError::Validation(format!(
            "invalid configuration ({} problems)",
            errors.len()
        )));
    }

    let store = Arc::new(
        PostgresStore::new(&config.database.url, config.database.max_connections).await?,
    );
    store.migrate().await?;

    let chain: Arc<dyn ResourceLedger> = if config.dry_run.enabled {
        info!("dry-run mode: delegations will not reach the chain");
        Arc::new(DryRunLedger)
    } else {
        Arc::new(TronGridClient::new(
            &config.chain.node_url,
            config.chain.api_key.clone(),
            config.chain.timeout_ms,
        )?)
    };

    let pool = Arc::new(SupplierPool::new(store.clone(), chain.clone()));
    let engine = Arc::new(FulfillmentEngine::new(
        store.clone(),
        store.clone(),
        pool.clone(),
        chain,
        config.fulfillment.order_ttl_minutes,
    ));

    let sweeper = Sweeper::new(
        engine.clone(),
        store.clone(),
        SweeperConfig {
            interval_secs: config.fulfillment.sweep_interval_secs,
            batch_size: config.fulfillment.sweep_batch_size,
            pacing_delay_ms: config.fulfillment.pacing_delay_ms,
        },
    );
    let sweeper_task = sweeper.start();

    let refresher = SupplierRefresher::new(pool.clone(), config.fulfillment.refresh_interval_secs);
    let refresher_task = refresher.start();

    let state = AppState {
        engine,
        orders: store.clone(),
        ledger: store.clone(),
        wallets: store.clone(),
        suppliers: store.clone(),
        pool,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.api.bind).await?;
    info!(bind = %config.api.bind, "HTTP API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    sweeper.stop();
    refresher.stop();
    let _ = sweeper_task.await;
    let _ = refresher_task.await;

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ergon=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
