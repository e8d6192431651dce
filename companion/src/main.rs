//! # Companion Entry Point
//!
//! Loads configuration, starts logging, wires the network services and runs
//! until Ctrl-C. On Unix, `SIGUSR1` stands in for the host returning from the
//! background and triggers a channel resume.

use std::time::Duration;

use companion::{logging, wiring, Services};
use lib_core::Config;
use tracing::{info, warn};

/// How often expired cache entries are swept while running.
const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    let _log_guard = logging::init(&config)?;

    let services = Services::build(config).await?;
    let _subscriptions = wiring::attach_channel_handlers(&services);

    services.channel.connect();
    wiring::load_predictions(&services).await;

    run_until_shutdown(&services).await?;

    services.shutdown();
    Ok(())
}

async fn run_until_shutdown(services: &Services) -> anyhow::Result<()> {
    let mut sweep = tokio::time::interval(CACHE_SWEEP_INTERVAL);
    sweep.tick().await;

    #[cfg(unix)]
    let mut foreground =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::user_defined1())?;

    loop {
        #[cfg(unix)]
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Ctrl-C received, shutting down");
                return Ok(());
            }
            _ = sweep.tick() => sweep_cache(services).await,
            _ = foreground.recv() => {
                info!("Foreground signal received");
                services.channel.resume();
            }
        }

        #[cfg(not(unix))]
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Ctrl-C received, shutting down");
                return Ok(());
            }
            _ = sweep.tick() => sweep_cache(services).await,
        }
    }
}

async fn sweep_cache(services: &Services) {
    match services.cache.clean_expired().await {
        Ok(evicted) => info!(evicted, "Periodic cache sweep complete"),
        Err(e) => warn!(error = %e, "Periodic cache sweep failed"),
    }
}
