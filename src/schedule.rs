//! Weekly sync trigger. The draw is published Saturday evening, so the
//! default cron fires shortly after the broadcast; the expression is
//! configurable for hosts not running KST. A catch-up pass at process
//! start covers draws missed while the service was down.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::reconcile::Reconciler;

pub async fn start(cron: &str, reconciler: Arc<Reconciler>) -> Result<JobScheduler> {
    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let reconciler = Arc::clone(&reconciler);
        Box::pin(async move {
            info!("scheduled sync triggered");
            reconciler.run().await;
        })
    })
    .with_context(|| format!("creating sync job for cron \"{cron}\""))?;
    sched.add(job).await.context("adding sync job")?;
    sched.start().await.context("starting scheduler")?;
    info!("weekly sync scheduled: {cron}");
    Ok(sched)
}
