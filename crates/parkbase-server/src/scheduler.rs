//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring maintenance jobs.

use std::time::Instant;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::middleware::RateLimitState;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(rate_limit: RateLimitState) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_rate_limit_prune_job(&scheduler, rate_limit).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

/// Drop expired rate-limit windows at the top of every hour
/// (`0 0 * * * *`), so idle clients do not accumulate.
async fn register_rate_limit_prune_job(
    scheduler: &JobScheduler,
    rate_limit: RateLimitState,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async("0 0 * * * *", move |_uuid, _lock| {
        let rate_limit = rate_limit.clone();

        Box::pin(async move {
            let removed = rate_limit.prune(Instant::now()).await;
            tracing::info!(removed, "scheduler: pruned expired rate-limit windows");
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!("scheduler: registered rate-limit prune job (hourly)");
    Ok(())
}
