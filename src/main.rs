use clap::Parser;
use mimalloc::MiMalloc;
use tracing::{debug, error, info};

mod api;
mod config;
mod error;
mod influx;
mod metrics;
mod model;
mod poller;
mod preview;
mod telemetry;
mod upsert;

use crate::api::{ApiClient, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::influx::InfluxStore;
use crate::poller::{Poller, ShutdownSignal};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = telemetry::init("daily-metrics-poller").await;

    let cfg = Config::parse();
    debug!(
        api_url = %cfg.api_url,
        debug_mode = %cfg.debug_mode,
        polling_interval = %cfg.polling_interval,
        http_timeout = %cfg.http_timeout,
        influx_enabled = %cfg.influx().is_some(),
        "Parsed configuration"
    );

    let poller = match build_poller(&cfg) {
        Ok(poller) => poller,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            telemetry.shutdown();
            return Err(err);
        }
    };

    let shutdown = match ShutdownSignal::install() {
        Ok(shutdown) => shutdown,
        Err(err) => {
            error!(error = %err, "failed to install signal handlers");
            telemetry.shutdown();
            return Err(err.into());
        }
    };

    // Reachability check for the backend (non-fatal)
    if let Some(store) = &poller.store {
        match store.ping().await {
            Ok(()) => debug!(bucket = %store.bucket(), "InfluxDB reachable"),
            Err(e) => error!(error = %e, bucket = %store.bucket(), "Failed to reach InfluxDB"),
        }
    } else if cfg.debug_mode {
        info!("InfluxDB configuration incomplete - running in debug mode only");
    }

    info!(
        interval_secs = cfg.polling_interval,
        debug_mode = if cfg.debug_mode { "ON" } else { "OFF" },
        storage = if poller.store.is_some() { "ENABLED" } else { "DISABLED" },
        "Starting API polling"
    );
    poller
        .run(&SystemClock, cfg.interval(), shutdown.recv())
        .await;

    telemetry.shutdown();
    Ok(())
}

fn build_poller(cfg: &Config) -> Result<Poller<InfluxStore>> {
    let api = ApiClient::new(&cfg.api_url, cfg.api_token()?, cfg.timeout())?;
    let store = cfg
        .influx()
        .map(|settings| InfluxStore::new(&settings, cfg.timeout()))
        .transpose()?;
    Ok(Poller {
        api,
        store,
        debug_mode: cfg.debug_mode,
    })
}
