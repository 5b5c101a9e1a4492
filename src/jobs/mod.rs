use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use crate::metrics;

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        if self.context.config.jobs.sweep_enabled {
            tokio::spawn(Self::offer_expiry_sweep_job(Arc::clone(&self)));
        } else {
            info!("Offer expiry sweep disabled; expect an external caller on /api/waitlist/sweep");
        }

        // Spawn monitoring tasks
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Expire lapsed spot offers and pass the spots on
    async fn offer_expiry_sweep_job(scheduler: Arc<Self>) {
        let every = scheduler.context.config.jobs.sweep_interval_secs;
        let mut interval = interval(Duration::from_secs(every));

        loop {
            interval.tick().await;
            info!("Running offer expiry sweep");

            let started = Instant::now();
            let result = tasks::sweep_expired_offers(&scheduler.context).await;
            metrics::record_job(
                "offer_expiry_sweep",
                result.is_ok(),
                started.elapsed().as_secs_f64(),
            );

            match result {
                Ok(count) => {
                    if count > 0 {
                        info!("Expired {} spot offers", count);
                    } else {
                        info!("Offer expiry sweep: no lapsed offers found");
                    }
                }
                Err(e) => error!("Failed to sweep expired offers: {}", e),
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300)); // Every 5 minutes

        loop {
            interval.tick().await;

            let started = Instant::now();
            let result = tasks::health_check(&scheduler.context).await;
            metrics::record_job("health_check", result.is_ok(), started.elapsed().as_secs_f64());

            if let Err(e) = result {
                error!("Health check failed: {}", e);
            }
        }
    }
}
