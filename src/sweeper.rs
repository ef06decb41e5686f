use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::lifecycle::InvestmentService;

/// Runs [`InvestmentService::sweep_due`] every `every` until `shutdown`.
pub fn spawn_maturity_sweeper(
    service: Arc<InvestmentService>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = every.as_secs(), "Maturity sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => match service.sweep_due().await {
                    Ok(reports) if !reports.is_empty() => {
                        let matured: usize = reports.iter().map(|r| r.matured.len()).sum();
                        info!(users = reports.len(), matured, "Scheduled maturity sweep finished");
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Scheduled maturity sweep failed"),
                },
            }
        }
        info!("Maturity sweeper stopped");
    })
}
