//! Startup wiring for the ledger.
//!
//! Reads the [`Config`], installs logging and metrics, opens the configured
//! record store, loads the [`Ledger`] and runs the startup checks.

pub mod config;
pub mod error;

use std::sync::Arc;

use ledger::Ledger;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use record_store::{InMemoryRecordStore, RecordStore, SqliteRecordStore};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub use config::{Config, LogFormat, StoreLocation};
pub use error::AppError;

/// A ledger over whichever store the configuration selected.
pub type AppLedger = Ledger<Arc<dyn RecordStore>>;

/// Installs the global tracing subscriber.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

/// Installs the global Prometheus metrics recorder.
pub fn init_metrics() -> Result<PrometheusHandle, AppError> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

/// Opens the record store at `location`, upgrading its schema if needed.
#[tracing::instrument]
pub async fn open_store(location: &StoreLocation) -> Result<Arc<dyn RecordStore>, AppError> {
    let store: Arc<dyn RecordStore> = match location {
        StoreLocation::Memory => {
            tracing::warn!("using in-memory store; nothing will be persisted");
            Arc::new(InMemoryRecordStore::new())
        }
        StoreLocation::Sqlite(url) => Arc::new(SqliteRecordStore::open(url).await?),
    };

    let version = store.schema_version().await?;
    tracing::info!(%version, "record store open");
    Ok(store)
}

/// Opens the store and ledger and seeds default payment terms when enabled.
pub async fn bootstrap(config: &Config) -> Result<AppLedger, AppError> {
    let store = open_store(&config.store_location()).await?;
    let ledger = Ledger::open(store).await?;

    if config.seed_defaults {
        let added = ledger.ensure_default_payment_terms().await?;
        if added > 0 {
            tracing::info!(added, "seeded default payment terms");
        }
    }

    Ok(ledger)
}

/// Boots the ledger, audits balances and logs a summary.
pub async fn run(config: &Config) -> Result<AppLedger, AppError> {
    let ledger = bootstrap(config).await?;

    for discrepancy in ledger.audit_balances().await? {
        tracing::warn!(
            customer_id = %discrepancy.customer_id,
            customer = %discrepancy.customer_name,
            recorded = discrepancy.recorded,
            derived = discrepancy.derived,
            difference = discrepancy.difference(),
            "customer balance disagrees with transactions"
        );
    }

    let summary = ledger.summary().await;
    tracing::info!(
        customers = summary.total_customers,
        total_balance = summary.total_balance,
        total_debits = summary.total_debits,
        total_credits = summary.total_credits,
        "ledger ready"
    );

    Ok(ledger)
}
