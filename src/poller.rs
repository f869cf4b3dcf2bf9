use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use crate::api::{ApiClient, Clock};
use crate::error::Result;
use crate::influx::SeriesStore;
use crate::metrics;
use crate::preview;
use crate::upsert::{UpsertReport, upsert};

/// One fetch-then-store pipeline. Cycles never overlap.
pub struct Poller<S> {
    pub api: ApiClient,
    pub store: Option<S>,
    pub debug_mode: bool,
}

impl<S: SeriesStore> Poller<S> {
    /// Fetches the window ending at `today` and upserts every returned day.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self, today: NaiveDate) -> Result<UpsertReport> {
        if self.debug_mode {
            info!(%today, "polling api");
        }
        let sets = match self.api.fetch(today).await {
            Ok(sets) => sets,
            Err(err) => {
                metrics::inc_poll(err.kind());
                return Err(err);
            }
        };
        metrics::inc_poll("ok");

        if self.debug_mode {
            info!("\n{}", preview::render(&sets));
        }
        Ok(upsert(self.store.as_ref(), &sets).await)
    }

    /// Runs cycles until `shutdown` resolves. A running cycle is always finished
    /// before the shutdown is honoured.
    pub async fn run<C, F>(&self, clock: &C, interval: Duration, shutdown: F)
    where
        C: Clock,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            match self.run_cycle(clock.today()).await {
                Ok(report) => info!(
                    written = report.written,
                    skipped = report.skipped,
                    failed = report.failed,
                    "cycle complete"
                ),
                Err(err) => warn!(kind = err.kind(), error = %err, "error polling api"),
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("stopping api polling");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}

/// Ctrl-C and SIGTERM listeners, registered as soon as this is built so that a
/// signal arriving mid-cycle is queued instead of killing the process.
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(windows)]
    ctrl_c: tokio::signal::windows::CtrlC,
}

impl ShutdownSignal {
    pub fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }
        #[cfg(windows)]
        {
            Ok(Self {
                ctrl_c: tokio::signal::windows::ctrl_c()?,
            })
        }
    }

    /// Resolves once either signal has been received.
    pub async fn recv(mut self) {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.interrupt.recv() => info!("received ctrl-c"),
                _ = self.terminate.recv() => info!("received SIGTERM"),
            }
        }
        #[cfg(windows)]
        {
            self.ctrl_c.recv().await;
            info!("received ctrl-c");
        }
    }
}
