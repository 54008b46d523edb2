//! Ledger entry point.

use std::process::ExitCode;

use ledger_app::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();
    ledger_app::init_tracing(&config);

    let metrics = match ledger_app::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed");
            None
        }
    };

    tracing::info!(database_url = %config.database_url, "starting ledger");
    match ledger_app::run(&config).await {
        Ok(_ledger) => {
            if let Some(handle) = metrics {
                tracing::debug!(metrics = %handle.render(), "metrics at startup");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "ledger failed to start");
            ExitCode::FAILURE
        }
    }
}
