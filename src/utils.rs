//! Miscellaneous helper utilities.

use crate::chain::ChainClient;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize `tracing` subscriber with env-based filter.
///
/// If `RUST_LOG` is not set, defaults to `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Spawns a background task that periodically reads the gas price and
/// updates a `watch` channel with an estimate in gwei. Caller decides the
/// interval. Gas is ancillary context for logging and profit estimates; the
/// pipeline fetches its own price at broadcast time.
pub fn spawn_gas_price_watcher(
    chain: Arc<dyn ChainClient>,
    tx: tokio::sync::watch::Sender<f64>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            match chain.gas_price().await {
                Ok(wei) => {
                    let gwei = wei.as_u128() as f64 / 1_000_000_000.0;
                    let _ = tx.send(gwei);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "[GAS] price fetch failed");
                }
            }
        }
    })
}
