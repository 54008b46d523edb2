//! Application error types.

use ledger::LedgerError;
use record_store::StoreError;
use thiserror::Error;

/// Errors that stop the application from starting.
#[derive(Debug, Error)]
pub enum AppError {
    /// The record store could not be opened or upgraded.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A ledger operation failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The metrics recorder could not be installed.
    #[error("Metrics error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}
